//! Namespace registry: prefix → base-IRI bindings.
//!
//! Prefixes are unique within a store instance and, once bound, a prefix's
//! base IRI never changes — rebinding to a different base is a
//! [`SchemaError::NamespaceConflict`]. Rebinding to the *same* base is a
//! no-op, which keeps extension operations idempotent.

use std::collections::BTreeMap;

use dashmap::DashMap;

use crate::error::{SchemaError, SchemaResult};
use crate::term::Term;

/// Well-known prefix for the default schema namespace.
pub const SCHEMA_PREFIX: &str = "ex";
/// Well-known prefix for the instance namespace.
pub const INSTANCE_PREFIX: &str = "instance";

/// Prefix → base-IRI map with conflict detection.
pub struct NamespaceRegistry {
    prefixes: DashMap<String, String>,
}

impl NamespaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            prefixes: DashMap::new(),
        }
    }

    /// Create a registry pre-bound with the standard vocabularies and the
    /// store's schema/instance namespaces derived from `base_uri`
    /// (e.g. `http://example.org/`).
    pub fn with_defaults(base_uri: &str) -> Self {
        let reg = Self::new();
        let defaults = [
            ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#".to_string()),
            ("rdfs", "http://www.w3.org/2000/01/rdf-schema#".to_string()),
            ("owl", "http://www.w3.org/2002/07/owl#".to_string()),
            ("xsd", "http://www.w3.org/2001/XMLSchema#".to_string()),
            (SCHEMA_PREFIX, format!("{base_uri}ontology/")),
            (INSTANCE_PREFIX, format!("{base_uri}instance/")),
        ];
        for (prefix, base) in defaults {
            reg.prefixes.insert(prefix.to_string(), base);
        }
        reg
    }

    /// Bind a prefix to a base IRI.
    ///
    /// Idempotent for an identical binding; a different base for an existing
    /// prefix is rejected.
    pub fn bind(&self, prefix: &str, base: &str) -> SchemaResult<()> {
        if let Some(existing) = self.prefixes.get(prefix) {
            if existing.value() == base {
                return Ok(());
            }
            return Err(SchemaError::NamespaceConflict {
                prefix: prefix.to_string(),
                existing: existing.value().clone(),
                requested: base.to_string(),
            });
        }
        self.prefixes.insert(prefix.to_string(), base.to_string());
        tracing::debug!(prefix, base, "namespace bound");
        Ok(())
    }

    /// The base IRI bound to a prefix, if any.
    pub fn resolve(&self, prefix: &str) -> Option<String> {
        self.prefixes.get(prefix).map(|r| r.value().clone())
    }

    /// Expand `prefix` + `local` into an IRI term.
    pub fn expand(&self, prefix: &str, local: &str) -> SchemaResult<Term> {
        let base = self
            .resolve(prefix)
            .ok_or_else(|| SchemaError::UnknownNamespace {
                prefix: prefix.to_string(),
            })?;
        Ok(Term::iri(format!("{base}{local}")))
    }

    /// Whether a prefix is bound.
    pub fn is_bound(&self, prefix: &str) -> bool {
        self.prefixes.contains_key(prefix)
    }

    /// All bindings, sorted by prefix.
    pub fn all(&self) -> BTreeMap<String, String> {
        self.prefixes
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::with_defaults("http://example.org/")
    }
}

impl std::fmt::Debug for NamespaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceRegistry")
            .field("prefixes", &self.prefixes.len())
            .finish()
    }
}
