//! Rich diagnostic error types for the ontograph store.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the ontograph crate.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum OntoError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Instance(#[from] InstanceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("term allocator exhausted: cannot intern more than u64::MAX terms")]
    #[diagnostic(
        code(onto::store::exhausted),
        help(
            "The term ID space is exhausted. This is extremely unlikely in \
             practice (requires 2^64 interned terms). If you see this error, \
             check for an interning loop."
        )
    )]
    TermSpaceExhausted,
}

// ---------------------------------------------------------------------------
// Schema errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("namespace prefix \"{prefix}\" is already bound to <{existing}>")]
    #[diagnostic(
        code(onto::schema::namespace_conflict),
        help(
            "A prefix binds to exactly one base IRI for the lifetime of a store. \
             Rebinding \"{prefix}\" to <{requested}> would silently re-home every \
             term minted under it. Pick a different prefix."
        )
    )]
    NamespaceConflict {
        prefix: String,
        existing: String,
        requested: String,
    },

    #[error("property <{property}> is already declared with range <{existing}>")]
    #[diagnostic(
        code(onto::schema::property_range_conflict),
        help(
            "A property's range, once set, must remain consistent for every \
             triple that uses it as predicate. Declare a new property for the \
             range <{requested}> instead of redefining this one."
        )
    )]
    PropertyRangeConflict {
        property: String,
        existing: String,
        requested: String,
    },

    #[error("unknown namespace prefix \"{prefix}\"")]
    #[diagnostic(
        code(onto::schema::unknown_namespace),
        help("Bind the prefix first with NamespaceRegistry::bind, or use one of the defaults.")
    )]
    UnknownNamespace { prefix: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Instance errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InstanceError {
    #[error("class \"{class}\" is not declared in the schema")]
    #[diagnostic(
        code(onto::instance::class_not_found),
        help(
            "Instances can only be created for declared classes. \
             Declare the class first with extend_class or declare_class."
        )
    )]
    ClassNotFound { class: String },

    #[error("instance \"{instance}\" not found")]
    #[diagnostic(
        code(onto::instance::not_found),
        help("No instance with this id exists in the store. Check the id, or create the instance first.")
    )]
    InstanceNotFound { instance: String },

    #[error("property \"{property}\" is not declared for class \"{class}\"")]
    #[diagnostic(
        code(onto::instance::unknown_property),
        help(
            "The engine is running with PropertyPolicy::Strict, which rejects \
             undeclared property names. Declare the property on the class, or \
             switch to PropertyPolicy::Lenient to silently skip unknown names."
        )
    )]
    UnknownProperty { property: String, class: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Handler errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum HandlerError {
    #[error("no handler registered for intent \"{intent}\"")]
    #[diagnostic(
        code(onto::handler::not_found),
        help("Register the handler first, or list available intents with list_handlers.")
    )]
    NotFound { intent: String },

    #[error("duplicate step number {step} in workflow for intent \"{intent}\"")]
    #[diagnostic(
        code(onto::handler::duplicate_step),
        help(
            "Step numbers within one workflow must be unique: they define \
             execution order. Renumber the steps so each appears once."
        )
    )]
    DuplicateStep { intent: String, step: u32 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Workflow errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum WorkflowError {
    #[error("no handler registered for intent \"{intent}\"")]
    #[diagnostic(
        code(onto::workflow::handler_not_found),
        help("The intent has no declarative handler in the graph. Register one before executing.")
    )]
    HandlerNotFound { intent: String },
}

// ---------------------------------------------------------------------------
// Proxy errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ProxyError {
    #[error("class \"{class}\" is not declared in the schema")]
    #[diagnostic(
        code(onto::proxy::class_not_found),
        help("A proxy can only be bound to a declared class. Declare the class first.")
    )]
    ClassNotFound { class: String },

    #[error("method \"{method}\" is not declared for class \"{class}\"")]
    #[diagnostic(
        code(onto::proxy::method_not_found),
        help(
            "Proxy dispatch only accepts methods declared in the ontology \
             (on the class or its \"{class}Behavior\" companion). Declare the \
             method with declare_behavior to make dispatch succeed."
        )
    )]
    MethodNotFound { class: String, method: String },

    #[error("method \"{method}\" requires an instance, but the proxy is bound to class \"{class}\" only")]
    #[diagnostic(
        code(onto::proxy::no_instance),
        help("Create the proxy with an instance id, or create the instance first and re-bind.")
    )]
    NoInstanceBound { class: String, method: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Instance(#[from] InstanceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("serialization error: {message}")]
    #[diagnostic(
        code(onto::export::serialize),
        help("Failed to serialize the graph dump. This indicates a bug in the export types.")
    )]
    Serialize { message: String },

    #[error("parse error at line {line}: {message}")]
    #[diagnostic(
        code(onto::export::parse),
        help("The input is not valid for the requested graph format. Check the line indicated.")
    )]
    Parse { line: usize, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(onto::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },
}

/// Convenience alias for functions returning ontograph results.
pub type OntoResult<T> = std::result::Result<T, OntoError>;

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
/// Result alias for schema operations.
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;
/// Result alias for instance operations.
pub type InstanceResult<T> = std::result::Result<T, InstanceError>;
/// Result alias for handler registry operations.
pub type HandlerResult<T> = std::result::Result<T, HandlerError>;
/// Result alias for workflow execution.
pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
/// Result alias for proxy operations.
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;
/// Result alias for export/import.
pub type ExportResult<T> = std::result::Result<T, ExportError>;
