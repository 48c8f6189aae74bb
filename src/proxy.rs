//! Semantic Proxy: reflective method dispatch driven by the schema.
//!
//! A proxy is a thin handle bound to (class, optional instance). Dispatch
//! consults a capability table — a map from method name to a tagged behavior —
//! populated from the schema registry at creation time: methods declared on
//! the class or its `<Class>Behavior` companion map to one of a small fixed
//! set of built-ins, everything else to a generic echo. Declaring a method in
//! the ontology is sufficient to make dispatch succeed, even before its real
//! behavior exists.
//!
//! The capability table is a cache: on a dispatch miss it is rebuilt from the
//! store once before [`ProxyError::MethodNotFound`] is raised, so schema
//! extensions made after proxy creation are picked up.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{InstanceError, ProxyError, ProxyResult};
use crate::instance::InstanceManager;
use crate::schema::{MethodInfo, PropertySpec, SchemaRegistry};
use crate::store::TriplePattern;
use crate::store::mem::TripleStore;
use crate::term::Term;
use crate::vocab;
use crate::workflow::ActionArgs;

/// What a declared method does when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodBehavior {
    PlaceOrder,
    Pay,
    UpdateProfile,
    ChangeState,
    /// Generic fallback: echo the call.
    Echo,
}

impl MethodBehavior {
    /// The built-in behavior for a method name; anything unrecognized echoes.
    fn for_name(name: &str) -> Self {
        match name {
            "place_order" => MethodBehavior::PlaceOrder,
            "pay" => MethodBehavior::Pay,
            "update_profile" => MethodBehavior::UpdateProfile,
            "change_state" => MethodBehavior::ChangeState,
            _ => MethodBehavior::Echo,
        }
    }
}

/// Full reflective view of a class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassReflection {
    pub class_name: String,
    pub class_uri: String,
    /// Predicates asserted on the class node itself.
    pub properties: Vec<String>,
    /// Methods declared on the class and its behavior companion.
    pub methods: Vec<MethodInfo>,
    pub instance_count: usize,
    pub instances: Vec<String>,
}

/// A proxy bound to (class, optional instance).
pub struct SemanticProxy {
    class_name: String,
    class_uri: Term,
    behavior_uri: Term,
    instance_id: Option<String>,
    capabilities: RwLock<HashMap<String, MethodBehavior>>,
    schema: Arc<SchemaRegistry>,
    instances: Arc<InstanceManager>,
}

impl SemanticProxy {
    /// The class this proxy is bound to.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The instance this proxy is bound to, if any.
    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    fn build_capabilities(&self) -> HashMap<String, MethodBehavior> {
        let mut table = HashMap::new();
        for info in self
            .schema
            .methods_of(&self.class_uri)
            .into_iter()
            .chain(self.schema.methods_of(&self.behavior_uri))
        {
            table
                .entry(info.name.clone())
                .or_insert_with(|| MethodBehavior::for_name(&info.name));
        }
        table
    }

    fn lookup(&self, method: &str) -> Option<MethodBehavior> {
        if let Some(behavior) = self
            .capabilities
            .read()
            .expect("capability lock poisoned")
            .get(method)
        {
            return Some(*behavior);
        }
        // Miss: the schema may have grown since creation. Rebuild once.
        let rebuilt = self.build_capabilities();
        let found = rebuilt.get(method).copied();
        *self.capabilities.write().expect("capability lock poisoned") = rebuilt;
        found
    }

    /// The instance id, or the appropriate error for instance-bound methods.
    fn require_instance(&self, method: &str) -> ProxyResult<&str> {
        self.instance_id
            .as_deref()
            .ok_or_else(|| ProxyError::NoInstanceBound {
                class: self.class_name.clone(),
                method: method.to_string(),
            })
    }

    /// A JSON argument in its plain string form.
    fn arg_str(args: &ActionArgs, key: &str) -> Option<String> {
        args.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Invoke a method by name.
    ///
    /// The method must be declared in the ontology (on the class or its
    /// behavior companion); undeclared names raise
    /// [`ProxyError::MethodNotFound`]. Declared names run their built-in
    /// behavior, or the generic echo when no built-in matches.
    pub fn invoke(&self, method: &str, args: &ActionArgs) -> ProxyResult<Value> {
        let behavior = self
            .lookup(method)
            .ok_or_else(|| ProxyError::MethodNotFound {
                class: self.class_name.clone(),
                method: method.to_string(),
            })?;

        tracing::debug!(
            class = %self.class_name,
            instance = self.instance_id.as_deref().unwrap_or("-"),
            method,
            ?behavior,
            "reflective dispatch"
        );

        match behavior {
            MethodBehavior::PlaceOrder => self.place_order(method, args),
            MethodBehavior::Pay => self.pay(args),
            MethodBehavior::UpdateProfile => self.update_profile(method, args),
            MethodBehavior::ChangeState => self.change_state(method, args),
            MethodBehavior::Echo => Ok(json!({
                "method": method,
                "class": self.class_name,
                "instance": self.instance_id,
                "args": Value::Object(args.clone()),
            })),
        }
    }

    fn place_order(&self, method: &str, args: &ActionArgs) -> ProxyResult<Value> {
        let instance = self.require_instance(method)?;
        // The Order class is declared lazily, like the classes the original
        // data model bootstraps on first use.
        self.schema.extend_class(
            "Order",
            &[
                PropertySpec::new("hasClient", self.class_name.as_str()),
                PropertySpec::new("hasAmount", "float"),
                PropertySpec::new("hasStatus", "string"),
            ],
            None,
        )?;

        let amount = Self::arg_str(args, "amount").unwrap_or_else(|| "0".to_string());
        let props = BTreeMap::from([
            ("hasClient".to_string(), instance.to_string()),
            ("hasAmount".to_string(), amount.clone()),
            ("hasStatus".to_string(), "pending".to_string()),
        ]);
        let order_id = self.instances.create_instance("Order", &props, None)?;
        Ok(json!({"order_id": order_id, "status": "pending", "amount": amount}))
    }

    fn pay(&self, args: &ActionArgs) -> ProxyResult<Value> {
        let amount = Self::arg_str(args, "amount").unwrap_or_else(|| "0".to_string());
        let method = Self::arg_str(args, "method").unwrap_or_else(|| "card".to_string());
        let payment_id = format!("payment_{:012x}", rand::random::<u64>() & 0xFFFF_FFFF_FFFF);
        Ok(json!({"payment_id": payment_id, "amount": amount, "method": method}))
    }

    fn update_profile(&self, method: &str, args: &ActionArgs) -> ProxyResult<Value> {
        let instance = self.require_instance(method)?;
        let mut updated = Vec::new();
        for (arg, property) in [("name", "hasName"), ("email", "hasEmail")] {
            if let Some(value) = Self::arg_str(args, arg) {
                if !self.instances.update_property(instance, property, &value)? {
                    return Err(InstanceError::InstanceNotFound {
                        instance: instance.to_string(),
                    }
                    .into());
                }
                updated.push(property);
            }
        }
        Ok(json!({"instance": instance, "updated": updated}))
    }

    fn change_state(&self, method: &str, args: &ActionArgs) -> ProxyResult<Value> {
        let instance = self.require_instance(method)?;
        let state = Self::arg_str(args, "state").unwrap_or_else(|| "unknown".to_string());
        if !self.instances.update_property(instance, "hasStatus", &state)? {
            return Err(InstanceError::InstanceNotFound {
                instance: instance.to_string(),
            }
            .into());
        }
        Ok(json!({"instance": instance, "state": state}))
    }

    /// Read one property of the bound instance.
    pub fn get_property(&self, property: &str) -> ProxyResult<Option<String>> {
        let instance = self.require_instance("get_property")?;
        Ok(self
            .instances
            .get_properties(instance)?
            .remove(property))
    }

    /// Write one property of the bound instance.
    pub fn set_property(&self, property: &str, value: &str) -> ProxyResult<bool> {
        let instance = self.require_instance("set_property")?;
        Ok(self.instances.update_property(instance, property, value)?)
    }

    /// Methods currently dispatchable through this proxy.
    pub fn methods(&self) -> Vec<MethodInfo> {
        let mut methods = self.schema.methods_of(&self.class_uri);
        let names: std::collections::HashSet<String> =
            methods.iter().map(|m| m.name.clone()).collect();
        methods.extend(
            self.schema
                .methods_of(&self.behavior_uri)
                .into_iter()
                .filter(|m| !names.contains(&m.name)),
        );
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }
}

impl std::fmt::Debug for SemanticProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticProxy")
            .field("class", &self.class_name)
            .field("instance", &self.instance_id)
            .finish()
    }
}

impl std::fmt::Display for SemanticProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.instance_id {
            Some(id) => write!(f, "SemanticProxy({}:{id})", self.class_name),
            None => write!(f, "SemanticProxy({})", self.class_name),
        }
    }
}

/// Creates and caches proxies, and serves class reflection.
pub struct ProxyFactory {
    store: Arc<TripleStore>,
    schema: Arc<SchemaRegistry>,
    instances: Arc<InstanceManager>,
    cache: DashMap<String, Arc<SemanticProxy>>,
}

impl ProxyFactory {
    pub fn new(
        store: Arc<TripleStore>,
        schema: Arc<SchemaRegistry>,
        instances: Arc<InstanceManager>,
    ) -> Self {
        Self {
            store,
            schema,
            instances,
            cache: DashMap::new(),
        }
    }

    fn cache_key(class_name: &str, instance_id: Option<&str>) -> String {
        match instance_id {
            Some(id) => format!("{class_name}:{id}"),
            None => class_name.to_string(),
        }
    }

    /// Create a proxy for a class, optionally bound to an instance.
    ///
    /// The class must be declared; the instance is deliberately *not*
    /// validated, so a proxy can be created for an instance that is populated
    /// later. Proxies are cached by (class, instance) and reused.
    pub fn create(
        &self,
        class_name: &str,
        instance_id: Option<&str>,
    ) -> ProxyResult<Arc<SemanticProxy>> {
        let key = Self::cache_key(class_name, instance_id);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        let class_uri = self
            .schema
            .find_class_by_label(class_name)
            .ok_or_else(|| ProxyError::ClassNotFound {
                class: class_name.to_string(),
            })?;
        let behavior_uri = self.schema.behavior_uri(class_name)?;

        let proxy = Arc::new(SemanticProxy {
            class_name: class_name.to_string(),
            class_uri,
            behavior_uri,
            instance_id: instance_id.map(|s| s.to_string()),
            capabilities: RwLock::new(HashMap::new()),
            schema: Arc::clone(&self.schema),
            instances: Arc::clone(&self.instances),
        });
        *proxy.capabilities.write().expect("capability lock poisoned") =
            proxy.build_capabilities();

        self.cache.insert(key, Arc::clone(&proxy));
        tracing::debug!(class = class_name, instance = instance_id.unwrap_or("-"), "proxy created");
        Ok(proxy)
    }

    /// A cached proxy, if one exists for the binding.
    pub fn get(&self, class_name: &str, instance_id: Option<&str>) -> Option<Arc<SemanticProxy>> {
        self.cache
            .get(&Self::cache_key(class_name, instance_id))
            .map(|r| Arc::clone(r.value()))
    }

    /// Reflect on a class without requiring an instance: its asserted
    /// predicates, its methods (including the `<Class>Behavior` companion's),
    /// and its instances.
    pub fn reflect(&self, class_name: &str) -> ProxyResult<ClassReflection> {
        let class_uri = self
            .schema
            .find_class_by_label(class_name)
            .ok_or_else(|| ProxyError::ClassNotFound {
                class: class_name.to_string(),
            })?;

        let rdf_type = vocab::rdf_type();
        let rdfs_label = vocab::rdfs_label();
        let mut properties: Vec<String> = self
            .store
            .matching(&TriplePattern::subject(&class_uri))
            .into_iter()
            .filter(|t| t.predicate != rdf_type && t.predicate != rdfs_label)
            .map(|t| t.predicate.local_name().to_string())
            .collect();
        properties.sort();
        properties.dedup();

        let proxy = self.create(class_name, None)?;
        let methods = proxy.methods();

        let instances = self.instances.instances_of(&class_uri);
        Ok(ClassReflection {
            class_name: class_name.to_string(),
            class_uri: class_uri.lexical().to_string(),
            properties,
            methods,
            instance_count: instances.len(),
            instances,
        })
    }
}

impl std::fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertyPolicy;
    use crate::namespace::NamespaceRegistry;
    use crate::schema::MethodSpec;

    struct Fixture {
        schema: Arc<SchemaRegistry>,
        instances: Arc<InstanceManager>,
        proxies: ProxyFactory,
    }

    fn setup() -> Fixture {
        let store = Arc::new(TripleStore::new());
        let ns = Arc::new(NamespaceRegistry::with_defaults("http://example.org/"));
        let schema = Arc::new(SchemaRegistry::new(
            Arc::clone(&store),
            Arc::clone(&ns),
            "http://example.org/",
        ));
        let instances = Arc::new(InstanceManager::new(
            Arc::clone(&store),
            Arc::clone(&schema),
            Arc::clone(&ns),
            PropertyPolicy::Lenient,
        ));
        let proxies = ProxyFactory::new(
            Arc::clone(&store),
            Arc::clone(&schema),
            Arc::clone(&instances),
        );
        Fixture {
            schema,
            instances,
            proxies,
        }
    }

    fn declare_client(f: &Fixture) {
        f.schema
            .extend_class(
                "Client",
                &[
                    PropertySpec::new("hasName", "string"),
                    PropertySpec::new("hasEmail", "string"),
                    PropertySpec::new("hasStatus", "string"),
                ],
                None,
            )
            .unwrap();
        f.schema
            .declare_behavior(
                "Client",
                &[
                    MethodSpec {
                        name: "place_order".into(),
                        parameters: vec!["products".into()],
                        return_type: Some("Order".into()),
                    },
                    MethodSpec {
                        name: "pay".into(),
                        parameters: vec!["amount".into()],
                        return_type: None,
                    },
                    MethodSpec {
                        name: "update_profile".into(),
                        parameters: vec!["name".into(), "email".into()],
                        return_type: None,
                    },
                    MethodSpec {
                        name: "request_refund".into(),
                        parameters: vec![],
                        return_type: None,
                    },
                ],
            )
            .unwrap();
    }

    #[test]
    fn create_proxy_requires_declared_class() {
        let f = setup();
        let err = f.proxies.create("Ghost", None).unwrap_err();
        assert!(matches!(err, ProxyError::ClassNotFound { .. }));

        declare_client(&f);
        assert!(f.proxies.create("Client", None).is_ok());
    }

    #[test]
    fn proxy_does_not_validate_instance() {
        let f = setup();
        declare_client(&f);
        // The instance does not exist yet; creation still succeeds.
        let proxy = f.proxies.create("Client", Some("client_later")).unwrap();
        assert_eq!(proxy.instance_id(), Some("client_later"));
    }

    #[test]
    fn proxies_are_cached_by_binding() {
        let f = setup();
        declare_client(&f);
        let a = f.proxies.create("Client", Some("c1")).unwrap();
        let b = f.proxies.create("Client", Some("c1")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let unbound = f.proxies.create("Client", None).unwrap();
        assert!(!Arc::ptr_eq(&a, &unbound));
        assert!(f.proxies.get("Client", Some("c1")).is_some());
        assert!(f.proxies.get("Client", Some("c2")).is_none());
    }

    #[test]
    fn undeclared_method_raises_method_not_found() {
        let f = setup();
        declare_client(&f);
        let proxy = f.proxies.create("Client", None).unwrap();
        let err = proxy.invoke("teleport", &ActionArgs::new()).unwrap_err();
        assert!(matches!(err, ProxyError::MethodNotFound { .. }));
    }

    #[test]
    fn declared_but_unimplemented_method_echoes() {
        let f = setup();
        declare_client(&f);
        let proxy = f.proxies.create("Client", Some("c1")).unwrap();
        let mut args = ActionArgs::new();
        args.insert("reason".into(), serde_json::json!("defective"));

        let value = proxy.invoke("request_refund", &args).unwrap();
        assert_eq!(value["method"], serde_json::json!("request_refund"));
        assert_eq!(value["args"]["reason"], serde_json::json!("defective"));
    }

    #[test]
    fn method_declared_after_proxy_creation_is_picked_up() {
        let f = setup();
        declare_client(&f);
        let proxy = f.proxies.create("Client", None).unwrap();

        assert!(proxy.invoke("subscribe", &ActionArgs::new()).is_err());
        f.schema
            .declare_behavior(
                "Client",
                &[MethodSpec {
                    name: "subscribe".into(),
                    parameters: vec![],
                    return_type: None,
                }],
            )
            .unwrap();
        // The capability table rebuilds on miss.
        assert!(proxy.invoke("subscribe", &ActionArgs::new()).is_ok());
    }

    #[test]
    fn place_order_creates_an_order_instance() {
        let f = setup();
        declare_client(&f);
        let client = f
            .instances
            .create_instance("Client", &BTreeMap::new(), Some("client_1"))
            .unwrap();
        let proxy = f.proxies.create("Client", Some(&client)).unwrap();

        let mut args = ActionArgs::new();
        args.insert("amount".into(), serde_json::json!("120.50"));
        let value = proxy.invoke("place_order", &args).unwrap();

        let order_id = value["order_id"].as_str().unwrap().to_string();
        assert!(order_id.starts_with("order_"));
        assert_eq!(value["status"], serde_json::json!("pending"));

        let props = f.instances.get_properties(&order_id).unwrap();
        assert_eq!(props.get("hasStatus").unwrap(), "pending");
        assert_eq!(props.get("hasAmount").unwrap(), "120.50");
        assert!(props.get("hasClient").unwrap().ends_with("client_1"));
    }

    #[test]
    fn place_order_requires_instance() {
        let f = setup();
        declare_client(&f);
        let proxy = f.proxies.create("Client", None).unwrap();
        let err = proxy.invoke("place_order", &ActionArgs::new()).unwrap_err();
        assert!(matches!(err, ProxyError::NoInstanceBound { .. }));
    }

    #[test]
    fn pay_returns_payment_id() {
        let f = setup();
        declare_client(&f);
        let proxy = f.proxies.create("Client", Some("c1")).unwrap();
        let mut args = ActionArgs::new();
        args.insert("amount".into(), serde_json::json!(99.5));

        let value = proxy.invoke("pay", &args).unwrap();
        assert!(value["payment_id"].as_str().unwrap().starts_with("payment_"));
        assert_eq!(value["method"], serde_json::json!("card"));
    }

    #[test]
    fn update_profile_writes_through_instance_manager() {
        let f = setup();
        declare_client(&f);
        let id = f
            .instances
            .create_instance(
                "Client",
                &BTreeMap::from([("hasName".to_string(), "Ada".to_string())]),
                None,
            )
            .unwrap();
        let proxy = f.proxies.create("Client", Some(&id)).unwrap();

        let mut args = ActionArgs::new();
        args.insert("name".into(), serde_json::json!("Ada L."));
        proxy.invoke("update_profile", &args).unwrap();

        assert_eq!(
            f.instances.get_properties(&id).unwrap().get("hasName").unwrap(),
            "Ada L."
        );
    }

    #[test]
    fn change_state_updates_status() {
        let f = setup();
        declare_client(&f);
        f.schema
            .declare_behavior(
                "Client",
                &[MethodSpec {
                    name: "change_state".into(),
                    parameters: vec!["state".into()],
                    return_type: None,
                }],
            )
            .unwrap();
        let id = f
            .instances
            .create_instance("Client", &BTreeMap::new(), None)
            .unwrap();
        let proxy = f.proxies.create("Client", Some(&id)).unwrap();

        let mut args = ActionArgs::new();
        args.insert("state".into(), serde_json::json!("suspended"));
        proxy.invoke("change_state", &args).unwrap();
        assert_eq!(
            f.instances
                .get_properties(&id)
                .unwrap()
                .get("hasStatus")
                .unwrap(),
            "suspended"
        );
    }

    #[test]
    fn property_access_requires_instance() {
        let f = setup();
        declare_client(&f);
        let proxy = f.proxies.create("Client", None).unwrap();
        assert!(matches!(
            proxy.get_property("hasName"),
            Err(ProxyError::NoInstanceBound { .. })
        ));
    }

    #[test]
    fn reflect_includes_behavior_methods() {
        let f = setup();
        declare_client(&f);
        f.instances
            .create_instance("Client", &BTreeMap::new(), Some("client_1"))
            .unwrap();

        let reflection = f.proxies.reflect("Client").unwrap();
        assert_eq!(reflection.class_name, "Client");
        assert_eq!(reflection.instance_count, 1);
        assert_eq!(reflection.instances, vec!["client_1"]);
        // hasBehavior is asserted on the class node.
        assert!(reflection.properties.contains(&"hasBehavior".to_string()));

        let names: Vec<&str> = reflection.methods.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"place_order"));
        assert!(names.contains(&"request_refund"));

        assert!(matches!(
            f.proxies.reflect("Ghost"),
            Err(ProxyError::ClassNotFound { .. })
        ));
    }
}
