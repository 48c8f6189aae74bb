//! Engine facade: top-level API for the ontograph store.
//!
//! The `Engine` owns all subsystems behind `Arc`s and provides the public
//! interface the host (HTTP layer, agent, tests) consumes. There is no
//! process-wide default instance: whoever initializes the system constructs
//! an `Engine` and passes it by reference.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{EngineConfig, PropertyPolicy};
use crate::error::{EngineError, OntoResult};
use crate::export::{self, GraphFormat};
use crate::handler::{HandlerConfig, HandlerRegistry, HandlerSummary};
use crate::instance::InstanceManager;
use crate::introspect::{Introspector, OntologyDescription, OntologyQuery, QueryOutcome};
use crate::namespace::NamespaceRegistry;
use crate::proxy::{ClassReflection, ProxyFactory, SemanticProxy};
use crate::schema::{MethodSpec, PropertySpec, SchemaRegistry, TransitionSpec};
use crate::store::mem::TripleStore;
use crate::term::Term;
use crate::workflow::{
    ActionArgs, ActionResolver, ConditionRegistry, WorkflowExecutor, WorkflowOutcome,
};

/// The ontograph engine.
///
/// Owns the triple store and every registry built on top of it. Designed for
/// single-threaded, synchronous use; concurrent callers must be serialized by
/// the host.
pub struct Engine {
    config: EngineConfig,
    store: Arc<TripleStore>,
    namespaces: Arc<NamespaceRegistry>,
    schema: Arc<SchemaRegistry>,
    instances: Arc<InstanceManager>,
    handlers: Arc<HandlerRegistry>,
    conditions: Arc<ConditionRegistry>,
    proxies: ProxyFactory,
}

impl Engine {
    /// Create a new engine with the given configuration.
    pub fn new(config: EngineConfig) -> OntoResult<Self> {
        if !config.base_uri.contains("://") || !config.base_uri.ends_with('/') {
            return Err(EngineError::InvalidConfig {
                message: format!(
                    "base_uri must be an absolute URI ending with '/', got \"{}\"",
                    config.base_uri
                ),
            }
            .into());
        }

        tracing::info!(
            base_uri = %config.base_uri,
            policy = %config.property_policy,
            "initializing ontograph engine"
        );

        let store = Arc::new(TripleStore::new());
        let namespaces = Arc::new(NamespaceRegistry::with_defaults(&config.base_uri));
        let schema = Arc::new(SchemaRegistry::new(
            Arc::clone(&store),
            Arc::clone(&namespaces),
            config.base_uri.clone(),
        ));
        let instances = Arc::new(InstanceManager::new(
            Arc::clone(&store),
            Arc::clone(&schema),
            Arc::clone(&namespaces),
            config.property_policy,
        ));
        let handlers = Arc::new(HandlerRegistry::new(
            Arc::clone(&store),
            Arc::clone(&schema),
        ));
        let conditions = Arc::new(ConditionRegistry::with_defaults());
        let proxies = ProxyFactory::new(
            Arc::clone(&store),
            Arc::clone(&schema),
            Arc::clone(&instances),
        );

        Ok(Self {
            config,
            store,
            namespaces,
            schema,
            instances,
            handlers,
            conditions,
            proxies,
        })
    }

    // -----------------------------------------------------------------------
    // Schema surface
    // -----------------------------------------------------------------------

    /// Declare a class (idempotent). Returns its URI.
    pub fn create_class(&self, name: &str, namespace: Option<&str>) -> OntoResult<Term> {
        Ok(self.schema.declare_class(name, namespace)?)
    }

    /// Declare a class and its properties in one call (idempotent).
    pub fn extend_class(
        &self,
        name: &str,
        properties: &[PropertySpec],
        namespace: Option<&str>,
    ) -> OntoResult<Term> {
        Ok(self.schema.extend_class(name, properties, namespace)?)
    }

    /// Declare a behavior companion class with method metadata.
    pub fn declare_behavior(&self, class: &str, methods: &[MethodSpec]) -> OntoResult<Term> {
        Ok(self.schema.declare_behavior(class, methods)?)
    }

    /// Declare a state machine for a class.
    pub fn declare_state_machine(
        &self,
        class: &str,
        states: &[&str],
        transitions: &[TransitionSpec],
    ) -> OntoResult<Term> {
        Ok(self.schema.declare_state_machine(class, states, transitions)?)
    }

    // -----------------------------------------------------------------------
    // Instance surface
    // -----------------------------------------------------------------------

    /// Create an instance of a declared class.
    pub fn create_instance(
        &self,
        class: &str,
        properties: &BTreeMap<String, String>,
        instance_id: Option<&str>,
    ) -> OntoResult<String> {
        Ok(self.instances.create_instance(class, properties, instance_id)?)
    }

    /// All property values of an instance.
    pub fn get_properties(&self, instance_id: &str) -> OntoResult<BTreeMap<String, String>> {
        Ok(self.instances.get_properties(instance_id)?)
    }

    /// Replace one property value. Returns `false` if the instance is absent.
    pub fn update_property(
        &self,
        instance_id: &str,
        property: &str,
        value: &str,
    ) -> OntoResult<bool> {
        Ok(self.instances.update_property(instance_id, property, value)?)
    }

    /// First instance of `class` whose `property` equals `value`.
    pub fn find_by_property(
        &self,
        class: &str,
        property: &str,
        value: &str,
    ) -> OntoResult<Option<String>> {
        Ok(self.instances.find_by_property(class, property, value)?)
    }

    // -----------------------------------------------------------------------
    // Introspection surface
    // -----------------------------------------------------------------------

    fn introspector(&self) -> Introspector {
        Introspector::new(
            Arc::clone(&self.schema),
            Arc::clone(&self.instances),
            Arc::clone(&self.namespaces),
        )
    }

    /// Full structural snapshot of the ontology.
    pub fn describe_ontology(&self) -> OntologyDescription {
        self.introspector().describe_ontology()
    }

    /// Dispatch a generic introspection query.
    pub fn query(&self, query: &OntologyQuery) -> QueryOutcome {
        self.introspector().query(query)
    }

    // -----------------------------------------------------------------------
    // Handler / workflow surface
    // -----------------------------------------------------------------------

    /// Register (or overwrite) the declarative handler for an intent.
    pub fn register_handler(&self, intent: &str, config: &HandlerConfig) -> OntoResult<()> {
        Ok(self.handlers.register(intent, config)?)
    }

    /// The full handler definition for an intent, if registered.
    pub fn get_handler(&self, intent: &str) -> OntoResult<Option<HandlerConfig>> {
        Ok(self.handlers.get(intent)?)
    }

    /// All registered handlers.
    pub fn list_handlers(&self) -> OntoResult<Vec<HandlerSummary>> {
        Ok(self.handlers.list()?)
    }

    /// Apply a handler's extraction patterns to free text.
    pub fn extract_params(
        &self,
        intent: &str,
        text: &str,
    ) -> OntoResult<BTreeMap<String, String>> {
        Ok(self.handlers.extract_params(intent, text)?)
    }

    /// Execute the workflow registered for an intent.
    pub fn execute(
        &self,
        intent: &str,
        call_params: &ActionArgs,
        resolver: &mut dyn ActionResolver,
    ) -> OntoResult<WorkflowOutcome> {
        let executor =
            WorkflowExecutor::new(Arc::clone(&self.handlers), Arc::clone(&self.conditions));
        executor.execute(intent, call_params, resolver)
    }

    // -----------------------------------------------------------------------
    // Proxy surface
    // -----------------------------------------------------------------------

    /// Create (or fetch from cache) a proxy bound to a class and optionally
    /// an instance.
    pub fn create_proxy(
        &self,
        class: &str,
        instance_id: Option<&str>,
    ) -> OntoResult<Arc<SemanticProxy>> {
        Ok(self.proxies.create(class, instance_id)?)
    }

    /// Invoke a method on a fresh or cached proxy in one call.
    pub fn invoke(
        &self,
        class: &str,
        instance_id: Option<&str>,
        method: &str,
        args: &ActionArgs,
    ) -> OntoResult<Value> {
        let proxy = self.proxies.create(class, instance_id)?;
        Ok(proxy.invoke(method, args)?)
    }

    /// Reflect on a class's declared properties, methods, and instances.
    pub fn reflect(&self, class: &str) -> OntoResult<ClassReflection> {
        Ok(self.proxies.reflect(class)?)
    }

    // -----------------------------------------------------------------------
    // Serialization surface
    // -----------------------------------------------------------------------

    /// Serialize the full triple set.
    pub fn export(&self, format: GraphFormat) -> OntoResult<String> {
        Ok(export::export(&self.store, &self.namespaces, format)?)
    }

    /// Merge serialized triples into the store (additive).
    pub fn import(&self, data: &str, format: GraphFormat) -> OntoResult<usize> {
        Ok(export::import(&self.store, &self.namespaces, data, format)?)
    }

    /// Remove every triple from the store.
    pub fn clear(&self) {
        self.store.clear();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the triple store handle.
    pub fn store(&self) -> &TripleStore {
        &self.store
    }

    /// Get the namespace registry handle.
    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Get the schema registry handle.
    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Get the instance manager handle.
    pub fn instances(&self) -> &InstanceManager {
        &self.instances
    }

    /// Get the condition registry handle (for registering custom checks).
    pub fn conditions(&self) -> &ConditionRegistry {
        &self.conditions
    }

    /// Get system info (class/property/instance/triple/handler counts).
    pub fn info(&self) -> EngineInfo {
        let introspector = self.introspector();
        let classes = introspector.classes();
        let instance_count = classes.iter().map(|c| c.instance_count).sum();
        EngineInfo {
            classes: classes.len(),
            properties: introspector.properties().len(),
            instances: instance_count,
            triples: self.store.len(),
            handlers: self.handlers.list().map(|h| h.len()).unwrap_or(0),
            namespaces: self.namespaces.all().len(),
            policy: self.config.property_policy,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub classes: usize,
    pub properties: usize,
    pub instances: usize,
    pub triples: usize,
    pub handlers: usize,
    pub namespaces: usize,
    pub policy: PropertyPolicy,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ontograph engine info")?;
        writeln!(f, "  classes:     {}", self.classes)?;
        writeln!(f, "  properties:  {}", self.properties)?;
        writeln!(f, "  instances:   {}", self.instances)?;
        writeln!(f, "  triples:     {}", self.triples)?;
        writeln!(f, "  handlers:    {}", self.handlers)?;
        writeln!(f, "  namespaces:  {}", self.namespaces)?;
        writeln!(f, "  policy:      {}", self.policy)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_default_engine() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let info = engine.info();
        assert_eq!(info.classes, 0);
        assert_eq!(info.triples, 0);
        assert_eq!(info.policy, PropertyPolicy::Lenient);
    }

    #[test]
    fn invalid_base_uri_rejected() {
        for bad in ["", "example.org/", "http://example.org"] {
            let result = Engine::new(EngineConfig {
                base_uri: bad.into(),
                ..Default::default()
            });
            assert!(result.is_err(), "accepted invalid base_uri {bad:?}");
        }
    }

    #[test]
    fn schema_and_instance_through_facade() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine
            .extend_class("Client", &[PropertySpec::new("hasName", "string")], None)
            .unwrap();
        let id = engine
            .create_instance(
                "Client",
                &BTreeMap::from([("hasName".to_string(), "Ada".to_string())]),
                None,
            )
            .unwrap();

        assert_eq!(engine.get_properties(&id).unwrap()["hasName"], "Ada");
        assert_eq!(
            engine.find_by_property("Client", "hasName", "Ada").unwrap(),
            Some(id)
        );

        let info = engine.info();
        assert_eq!(info.classes, 1);
        assert_eq!(info.instances, 1);
        assert!(info.triples > 0);
    }

    #[test]
    fn info_displays() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let text = engine.info().to_string();
        assert!(text.contains("classes"));
        assert!(text.contains("lenient"));
    }
}
