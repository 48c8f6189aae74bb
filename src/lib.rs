// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # ontograph
//!
//! A dynamically-extensible semantic graph store: a triple-based knowledge
//! base whose schema (classes, properties) and data (instances) are created,
//! queried and introspected entirely at runtime, plus a declarative workflow
//! registry and a reflective proxy layer built directly on top of it.
//!
//! ## Architecture
//!
//! - **Triple store** (`store`): set-semantics (subject, predicate, object)
//!   facts over petgraph with wildcard matching — the only mutation point
//! - **Schema registry** (`schema`): runtime classes, properties, behavior
//!   companions and state machines, all stored as triples
//! - **Instance manager** (`instance`): typed instances validated against the
//!   schema, with strict/lenient unknown-property policy
//! - **Introspection** (`introspect`): generic read-only snapshots and queries
//! - **Handler registry** (`handler`): business logic as graph data — intent →
//!   extraction patterns → ordered workflow steps → condition/action rules
//! - **Workflow executor** (`workflow`): sequences steps, threads parameters,
//!   dispatches to a host-supplied action resolver
//! - **Semantic proxy** (`proxy`): method dispatch driven by schema metadata
//!   through a capability table
//!
//! ## Library usage
//!
//! ```
//! use std::collections::BTreeMap;
//! use ontograph::config::EngineConfig;
//! use ontograph::engine::Engine;
//! use ontograph::schema::PropertySpec;
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! engine
//!     .extend_class("Client", &[PropertySpec::new("hasName", "string")], None)
//!     .unwrap();
//! let id = engine
//!     .create_instance(
//!         "Client",
//!         &BTreeMap::from([("hasName".to_string(), "Ada".to_string())]),
//!         None,
//!     )
//!     .unwrap();
//! assert_eq!(engine.get_properties(&id).unwrap()["hasName"], "Ada");
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod handler;
pub mod instance;
pub mod introspect;
pub mod namespace;
pub mod proxy;
pub mod schema;
pub mod store;
pub mod term;
pub mod vocab;
pub mod workflow;
