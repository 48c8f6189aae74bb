//! Instance Manager: typed instances and their property values.
//!
//! Instances are URIs in the instance namespace carrying exactly one
//! `rdf:type` triple (pointing at a declared class) plus property triples.
//! Identity is the URI; updates replace property triples, never rename.
//!
//! Unknown property names on creation are handled per the configured
//! [`PropertyPolicy`]: skipped in lenient mode, rejected in strict mode.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::PropertyPolicy;
use crate::error::{InstanceError, InstanceResult};
use crate::namespace::{INSTANCE_PREFIX, NamespaceRegistry};
use crate::schema::{PropertyKind, SchemaRegistry};
use crate::store::TriplePattern;
use crate::store::mem::TripleStore;
use crate::term::Term;
use crate::vocab;

/// Instance CRUD over the triple store, validated against the schema registry.
pub struct InstanceManager {
    store: Arc<TripleStore>,
    schema: Arc<SchemaRegistry>,
    namespaces: Arc<NamespaceRegistry>,
    policy: PropertyPolicy,
}

impl InstanceManager {
    pub fn new(
        store: Arc<TripleStore>,
        schema: Arc<SchemaRegistry>,
        namespaces: Arc<NamespaceRegistry>,
        policy: PropertyPolicy,
    ) -> Self {
        Self {
            store,
            schema,
            namespaces,
            policy,
        }
    }

    /// The URI of an instance id in the instance namespace.
    pub fn instance_uri(&self, instance_id: &str) -> InstanceResult<Term> {
        Ok(self.namespaces.expand(INSTANCE_PREFIX, instance_id)?)
    }

    /// Generate a fresh opaque id: `<class_lowercase>_<12 hex chars>`.
    ///
    /// 48 random bits keep collisions out of reach for any realistic
    /// in-memory store size.
    fn fresh_id(class_name: &str) -> String {
        let suffix = rand::random::<u64>() & 0xFFFF_FFFF_FFFF;
        format!("{}_{suffix:012x}", class_name.to_lowercase())
    }

    /// Create an instance of a declared class.
    ///
    /// Fails with [`InstanceError::ClassNotFound`] when the class was never
    /// declared — and in that case adds zero triples. Property values are
    /// stored as literals for datatype properties; object-property values are
    /// stored as URI references (built from the instance namespace when the
    /// value is not already URI-shaped).
    pub fn create_instance(
        &self,
        class_name: &str,
        properties: &BTreeMap<String, String>,
        instance_id: Option<&str>,
    ) -> InstanceResult<String> {
        let class_uri = self
            .schema
            .find_class_by_label(class_name)
            .ok_or_else(|| InstanceError::ClassNotFound {
                class: class_name.to_string(),
            })?;

        // Resolve every property before the first write so strict-mode
        // failures leave the store untouched.
        let mut resolved: Vec<(Term, Term)> = Vec::with_capacity(properties.len());
        for (name, value) in properties {
            match self.resolve_property(name, value)? {
                Some(pair) => resolved.push(pair),
                None => {
                    if self.policy == PropertyPolicy::Strict {
                        return Err(InstanceError::UnknownProperty {
                            property: name.clone(),
                            class: class_name.to_string(),
                        });
                    }
                    tracing::debug!(property = %name, class = class_name, "unknown property skipped");
                }
            }
        }

        let id = match instance_id {
            Some(id) => id.to_string(),
            None => Self::fresh_id(class_name),
        };
        let uri = self.instance_uri(&id)?;

        self.store.add(&uri, &vocab::rdf_type(), &class_uri)?;
        for (prop_uri, object) in resolved {
            self.store.add(&uri, &prop_uri, &object)?;
        }

        tracing::info!(instance = %id, class = class_name, "instance created");
        Ok(id)
    }

    /// Resolve a property name to (property URI, object term), or `None` when
    /// the property is not declared.
    fn resolve_property(&self, name: &str, value: &str) -> InstanceResult<Option<(Term, Term)>> {
        let Some(prop_uri) = self.schema.find_property_by_label(name) else {
            return Ok(None);
        };
        let object = match self.schema.property_kind(&prop_uri) {
            Some(PropertyKind::Object) => {
                if value.starts_with("http://") || value.starts_with("https://") {
                    Term::iri(value)
                } else {
                    self.namespaces.expand(INSTANCE_PREFIX, value)?
                }
            }
            _ => Term::literal(value),
        };
        Ok(Some((prop_uri, object)))
    }

    /// Whether an instance exists (has a type triple).
    pub fn instance_exists(&self, instance_id: &str) -> bool {
        let Ok(uri) = self.instance_uri(instance_id) else {
            return false;
        };
        !self
            .store
            .objects_of(&uri, &vocab::rdf_type())
            .is_empty()
    }

    /// All property values of an instance, keyed by property local name.
    ///
    /// The type triple is excluded. Values are lexical forms: literal text
    /// for datatype properties, the full IRI for object references.
    pub fn get_properties(&self, instance_id: &str) -> InstanceResult<BTreeMap<String, String>> {
        let uri = self.instance_uri(instance_id)?;
        let rdf_type = vocab::rdf_type();
        Ok(self
            .store
            .matching(&TriplePattern::subject(&uri))
            .into_iter()
            .filter(|t| t.predicate != rdf_type)
            .map(|t| {
                (
                    t.predicate.local_name().to_string(),
                    t.object.lexical().to_string(),
                )
            })
            .collect())
    }

    /// Replace the value of one property on an instance.
    ///
    /// All existing triples for (instance, property) are removed before the
    /// new value is added. Returns `false` when the instance does not exist.
    pub fn update_property(
        &self,
        instance_id: &str,
        property: &str,
        value: &str,
    ) -> InstanceResult<bool> {
        if !self.instance_exists(instance_id) {
            return Ok(false);
        }
        let uri = self.instance_uri(instance_id)?;
        let (prop_uri, object) = match self.resolve_property(property, value)? {
            Some(pair) => pair,
            // Undeclared property: fall back to a schema-namespace predicate
            // with a literal value, mirroring creation-time leniency.
            None => (
                self.schema.schema_term(property)?,
                Term::literal(value),
            ),
        };

        self.store.remove_matching(&TriplePattern {
            subject: Some(&uri),
            predicate: Some(&prop_uri),
            object: None,
        });
        self.store.add(&uri, &prop_uri, &object)?;
        tracing::debug!(instance = instance_id, property, "property updated");
        Ok(true)
    }

    /// Ids of all instances of a class, sorted.
    pub fn instances_of(&self, class_uri: &Term) -> Vec<String> {
        let mut ids: Vec<String> = self
            .store
            .subjects_of(&vocab::rdf_type(), class_uri)
            .into_iter()
            .map(|uri| uri.local_name().to_string())
            .collect();
        ids.sort();
        ids
    }

    /// Number of instances of a class.
    pub fn count_instances(&self, class_uri: &Term) -> usize {
        self.store
            .subjects_of(&vocab::rdf_type(), class_uri)
            .len()
    }

    /// Find the first instance of a class whose property equals `value`.
    ///
    /// Comparison is on lexical form (string comparison for every value
    /// kind); when several instances match, which one is returned is the
    /// store's iteration order — callers must not rely on it.
    pub fn find_by_property(
        &self,
        class_name: &str,
        property: &str,
        value: &str,
    ) -> InstanceResult<Option<String>> {
        let class_uri = self
            .schema
            .find_class_by_label(class_name)
            .ok_or_else(|| InstanceError::ClassNotFound {
                class: class_name.to_string(),
            })?;
        let Some(prop_uri) = self.schema.find_property_by_label(property) else {
            return Ok(None);
        };

        for subject in self.store.subjects_of(&vocab::rdf_type(), &class_uri) {
            let matches = self
                .store
                .objects_of(&subject, &prop_uri)
                .iter()
                .any(|object| object.lexical() == value);
            if matches {
                return Ok(Some(subject.local_name().to_string()));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for InstanceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceManager")
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertySpec;

    fn setup(policy: PropertyPolicy) -> (Arc<TripleStore>, Arc<SchemaRegistry>, InstanceManager) {
        let store = Arc::new(TripleStore::new());
        let ns = Arc::new(NamespaceRegistry::with_defaults("http://example.org/"));
        let schema = Arc::new(SchemaRegistry::new(
            Arc::clone(&store),
            Arc::clone(&ns),
            "http://example.org/",
        ));
        let instances = InstanceManager::new(
            Arc::clone(&store),
            Arc::clone(&schema),
            Arc::clone(&ns),
            policy,
        );
        (store, schema, instances)
    }

    fn client_props() -> Vec<PropertySpec> {
        vec![
            PropertySpec::new("hasName", "string"),
            PropertySpec::new("hasEmail", "string"),
        ]
    }

    #[test]
    fn create_and_read_instance() {
        let (_, schema, instances) = setup(PropertyPolicy::Lenient);
        schema.extend_class("Client", &client_props(), None).unwrap();

        let props = BTreeMap::from([
            ("hasName".to_string(), "Ada".to_string()),
            ("hasEmail".to_string(), "ada@example.org".to_string()),
        ]);
        let id = instances.create_instance("Client", &props, None).unwrap();
        assert!(id.starts_with("client_"));
        assert!(instances.instance_exists(&id));

        let read = instances.get_properties(&id).unwrap();
        assert_eq!(read.get("hasName").unwrap(), "Ada");
        assert_eq!(read.get("hasEmail").unwrap(), "ada@example.org");
    }

    #[test]
    fn create_with_explicit_id() {
        let (_, schema, instances) = setup(PropertyPolicy::Lenient);
        schema.extend_class("Client", &client_props(), None).unwrap();
        let id = instances
            .create_instance("Client", &BTreeMap::new(), Some("client_42"))
            .unwrap();
        assert_eq!(id, "client_42");
        assert!(instances.instance_exists("client_42"));
    }

    #[test]
    fn undeclared_class_adds_zero_triples() {
        let (store, _, instances) = setup(PropertyPolicy::Lenient);
        let before = store.len();
        let err = instances
            .create_instance(
                "Ghost",
                &BTreeMap::from([("hasName".to_string(), "Boo".to_string())]),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, InstanceError::ClassNotFound { .. }));
        assert_eq!(store.len(), before);
    }

    #[test]
    fn lenient_mode_skips_unknown_properties() {
        let (_, schema, instances) = setup(PropertyPolicy::Lenient);
        schema.extend_class("Client", &client_props(), None).unwrap();
        let props = BTreeMap::from([
            ("hasName".to_string(), "Ada".to_string()),
            ("hasShoeSize".to_string(), "37".to_string()),
        ]);
        let id = instances.create_instance("Client", &props, None).unwrap();
        let read = instances.get_properties(&id).unwrap();
        assert_eq!(read.len(), 1);
        assert!(!read.contains_key("hasShoeSize"));
    }

    #[test]
    fn strict_mode_rejects_unknown_properties() {
        let (store, schema, instances) = setup(PropertyPolicy::Strict);
        schema.extend_class("Client", &client_props(), None).unwrap();
        let triples_before = store.len();
        let props = BTreeMap::from([("hasShoeSize".to_string(), "37".to_string())]);
        let err = instances.create_instance("Client", &props, None).unwrap_err();
        assert!(matches!(err, InstanceError::UnknownProperty { .. }));
        assert_eq!(store.len(), triples_before);
    }

    #[test]
    fn object_property_values_become_references() {
        let (store, schema, instances) = setup(PropertyPolicy::Lenient);
        schema.extend_class("Client", &client_props(), None).unwrap();
        schema
            .extend_class(
                "Order",
                &[PropertySpec::new("hasClient", "Client")],
                None,
            )
            .unwrap();

        let client = instances
            .create_instance("Client", &BTreeMap::new(), Some("client_1"))
            .unwrap();
        let order = instances
            .create_instance(
                "Order",
                &BTreeMap::from([("hasClient".to_string(), client.clone())]),
                None,
            )
            .unwrap();

        let uri = instances.instance_uri(&order).unwrap();
        let prop = schema.find_property_by_label("hasClient").unwrap();
        let objects = store.objects_of(&uri, &prop);
        assert_eq!(
            objects,
            vec![Term::iri("http://example.org/instance/client_1")]
        );
    }

    #[test]
    fn update_property_replaces_old_value() {
        let (store, schema, instances) = setup(PropertyPolicy::Lenient);
        schema.extend_class("Client", &client_props(), None).unwrap();
        let id = instances
            .create_instance(
                "Client",
                &BTreeMap::from([("hasName".to_string(), "Ada".to_string())]),
                None,
            )
            .unwrap();

        assert!(instances.update_property(&id, "hasName", "Ada L.").unwrap());
        let read = instances.get_properties(&id).unwrap();
        assert_eq!(read.get("hasName").unwrap(), "Ada L.");

        // Exactly one value remains.
        let uri = instances.instance_uri(&id).unwrap();
        let prop = schema.find_property_by_label("hasName").unwrap();
        assert_eq!(store.objects_of(&uri, &prop).len(), 1);
    }

    #[test]
    fn update_property_on_missing_instance_returns_false() {
        let (_, schema, instances) = setup(PropertyPolicy::Lenient);
        schema.extend_class("Client", &client_props(), None).unwrap();
        assert!(!instances
            .update_property("client_ghost", "hasName", "X")
            .unwrap());
    }

    #[test]
    fn find_by_property() {
        let (_, schema, instances) = setup(PropertyPolicy::Lenient);
        schema.extend_class("Client", &client_props(), None).unwrap();
        let ada = instances
            .create_instance(
                "Client",
                &BTreeMap::from([("hasName".to_string(), "Ada".to_string())]),
                None,
            )
            .unwrap();
        instances
            .create_instance(
                "Client",
                &BTreeMap::from([("hasName".to_string(), "Bo".to_string())]),
                None,
            )
            .unwrap();

        let found = instances
            .find_by_property("Client", "hasName", "Ada")
            .unwrap();
        assert_eq!(found, Some(ada));

        let missing = instances
            .find_by_property("Client", "hasName", "Nobody")
            .unwrap();
        assert_eq!(missing, None);

        assert!(matches!(
            instances.find_by_property("Ghost", "hasName", "Ada"),
            Err(InstanceError::ClassNotFound { .. })
        ));
    }

    #[test]
    fn instances_of_and_count() {
        let (_, schema, instances) = setup(PropertyPolicy::Lenient);
        schema.extend_class("Client", &client_props(), None).unwrap();
        let class_uri = schema.find_class_by_label("Client").unwrap();
        assert_eq!(instances.count_instances(&class_uri), 0);

        instances
            .create_instance("Client", &BTreeMap::new(), Some("client_b"))
            .unwrap();
        instances
            .create_instance("Client", &BTreeMap::new(), Some("client_a"))
            .unwrap();

        assert_eq!(instances.count_instances(&class_uri), 2);
        assert_eq!(
            instances.instances_of(&class_uri),
            vec!["client_a".to_string(), "client_b".to_string()]
        );
    }
}
