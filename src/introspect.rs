//! Introspection Engine: read-only generic queries over the store.
//!
//! This is the only place generic (type-erased) traversal logic lives. UI and
//! API layers consume these snapshots instead of querying the triple store
//! directly, so adding a new introspection view never touches the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::instance::InstanceManager;
use crate::namespace::NamespaceRegistry;
use crate::schema::{PropertyKind, SchemaRegistry};
use crate::term::Term;

/// One declared class, with its derived instance count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInfo {
    pub uri: String,
    pub name: String,
    pub label: String,
    pub instance_count: usize,
}

/// One declared property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub uri: String,
    pub name: String,
    pub label: String,
    pub kind: PropertyKind,
    pub range: String,
}

/// One instance with its property values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub uri: String,
    pub id: String,
    pub class: String,
    pub properties: BTreeMap<String, String>,
}

/// Full structural snapshot of the ontology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyDescription {
    pub classes: Vec<ClassInfo>,
    pub properties: Vec<PropertyInfo>,
    /// Instances grouped by class name.
    pub instances: BTreeMap<String, Vec<InstanceInfo>>,
    pub namespaces: BTreeMap<String, String>,
}

/// A generic introspection query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OntologyQuery {
    Classes,
    Properties,
    Instances {
        #[serde(default)]
        class: Option<String>,
    },
    /// Alias for the full structural snapshot.
    Structure,
}

/// The result of an [`OntologyQuery`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Classes(Vec<ClassInfo>),
    Properties(Vec<PropertyInfo>),
    Instances(Vec<InstanceInfo>),
    Structure(OntologyDescription),
}

/// Read-only snapshot assembler over schema and instance state.
pub struct Introspector {
    schema: Arc<SchemaRegistry>,
    instances: Arc<InstanceManager>,
    namespaces: Arc<NamespaceRegistry>,
}

impl Introspector {
    pub fn new(
        schema: Arc<SchemaRegistry>,
        instances: Arc<InstanceManager>,
        namespaces: Arc<NamespaceRegistry>,
    ) -> Self {
        Self {
            schema,
            instances,
            namespaces,
        }
    }

    /// All declared classes, sorted by URI.
    pub fn classes(&self) -> Vec<ClassInfo> {
        let mut classes: Vec<ClassInfo> = self
            .schema
            .classes()
            .into_iter()
            .map(|uri| ClassInfo {
                name: uri.local_name().to_string(),
                label: self.schema.label_of(&uri),
                instance_count: self.instances.count_instances(&uri),
                uri: uri.lexical().to_string(),
            })
            .collect();
        classes.sort_by(|a, b| a.uri.cmp(&b.uri));
        classes
    }

    /// All declared properties (datatype first, then object), sorted by URI
    /// within each kind.
    pub fn properties(&self) -> Vec<PropertyInfo> {
        let mut out = Vec::new();
        for kind in [PropertyKind::Datatype, PropertyKind::Object] {
            let mut props: Vec<PropertyInfo> = self
                .schema
                .properties_of_kind(kind)
                .into_iter()
                .map(|uri| PropertyInfo {
                    name: uri.local_name().to_string(),
                    label: self.schema.label_of(&uri),
                    kind,
                    range: self
                        .schema
                        .property_range(&uri)
                        .map(|t| t.lexical().to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    uri: uri.lexical().to_string(),
                })
                .collect();
            props.sort_by(|a, b| a.uri.cmp(&b.uri));
            out.extend(props);
        }
        out
    }

    fn instances_of_class(&self, class_uri: &Term) -> Vec<InstanceInfo> {
        let class_name = class_uri.local_name().to_string();
        self.instances
            .instances_of(class_uri)
            .into_iter()
            .map(|id| {
                let properties = self.instances.get_properties(&id).unwrap_or_default();
                let uri = self
                    .instances
                    .instance_uri(&id)
                    .map(|t| t.lexical().to_string())
                    .unwrap_or_default();
                InstanceInfo {
                    uri,
                    id,
                    class: class_name.clone(),
                    properties,
                }
            })
            .collect()
    }

    /// Instances, optionally filtered to one class (by label or local name).
    pub fn instances(&self, class: Option<&str>) -> Vec<InstanceInfo> {
        match class {
            Some(name) => self
                .schema
                .find_class_by_label(name)
                .map(|uri| self.instances_of_class(&uri))
                .unwrap_or_default(),
            None => {
                let mut all = Vec::new();
                let mut classes = self.schema.classes();
                classes.sort();
                for class_uri in classes {
                    all.extend(self.instances_of_class(&class_uri));
                }
                all
            }
        }
    }

    /// Assemble the full structural snapshot. Pure and side-effect-free.
    pub fn describe_ontology(&self) -> OntologyDescription {
        let classes = self.classes();
        let mut instances = BTreeMap::new();
        for class in &classes {
            let class_uri = Term::iri(class.uri.clone());
            instances.insert(class.name.clone(), self.instances_of_class(&class_uri));
        }
        OntologyDescription {
            classes,
            properties: self.properties(),
            instances,
            namespaces: self.namespaces.all(),
        }
    }

    /// Dispatch a generic query.
    pub fn query(&self, query: &OntologyQuery) -> QueryOutcome {
        match query {
            OntologyQuery::Classes => QueryOutcome::Classes(self.classes()),
            OntologyQuery::Properties => QueryOutcome::Properties(self.properties()),
            OntologyQuery::Instances { class } => {
                QueryOutcome::Instances(self.instances(class.as_deref()))
            }
            OntologyQuery::Structure => QueryOutcome::Structure(self.describe_ontology()),
        }
    }
}

impl std::fmt::Debug for Introspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Introspector").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap as Map;

    use super::*;
    use crate::config::PropertyPolicy;
    use crate::schema::PropertySpec;
    use crate::store::mem::TripleStore;

    fn setup() -> (Arc<SchemaRegistry>, Arc<InstanceManager>, Introspector) {
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
        let introspector = Introspector::new(
            Arc::clone(&schema),
            Arc::clone(&instances),
            Arc::clone(&ns),
        );
        (schema, instances, introspector)
    }

    fn populate(schema: &SchemaRegistry, instances: &InstanceManager) {
        schema
            .extend_class(
                "Client",
                &[
                    PropertySpec::new("hasName", "string"),
                    PropertySpec::new("hasEmail", "string"),
                ],
                None,
            )
            .unwrap();
        schema
            .extend_class(
                "Order",
                &[
                    PropertySpec::new("hasAmount", "float"),
                    PropertySpec::new("hasClient", "Client"),
                ],
                None,
            )
            .unwrap();
        instances
            .create_instance(
                "Client",
                &Map::from([("hasName".to_string(), "Ada".to_string())]),
                Some("client_1"),
            )
            .unwrap();
    }

    #[test]
    fn classes_with_instance_counts() {
        let (schema, instances, introspector) = setup();
        populate(&schema, &instances);

        let classes = introspector.classes();
        assert_eq!(classes.len(), 2);
        let client = classes.iter().find(|c| c.name == "Client").unwrap();
        assert_eq!(client.instance_count, 1);
        assert_eq!(client.label, "Client");
        let order = classes.iter().find(|c| c.name == "Order").unwrap();
        assert_eq!(order.instance_count, 0);
    }

    #[test]
    fn properties_carry_kind_and_range() {
        let (schema, instances, introspector) = setup();
        populate(&schema, &instances);

        let props = introspector.properties();
        assert_eq!(props.len(), 4);
        let has_client = props.iter().find(|p| p.name == "hasClient").unwrap();
        assert_eq!(has_client.kind, PropertyKind::Object);
        assert!(has_client.range.ends_with("/Client"));
        let has_name = props.iter().find(|p| p.name == "hasName").unwrap();
        assert_eq!(has_name.kind, PropertyKind::Datatype);
    }

    #[test]
    fn instances_filtered_by_class() {
        let (schema, instances, introspector) = setup();
        populate(&schema, &instances);

        let clients = introspector.instances(Some("Client"));
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, "client_1");
        assert_eq!(clients[0].properties.get("hasName").unwrap(), "Ada");

        assert!(introspector.instances(Some("Order")).is_empty());
        assert!(introspector.instances(Some("Ghost")).is_empty());
        assert_eq!(introspector.instances(None).len(), 1);
    }

    #[test]
    fn describe_ontology_snapshot() {
        let (schema, instances, introspector) = setup();
        populate(&schema, &instances);

        let desc = introspector.describe_ontology();
        assert_eq!(desc.classes.len(), 2);
        assert_eq!(desc.properties.len(), 4);
        assert_eq!(desc.instances.get("Client").unwrap().len(), 1);
        assert!(desc.instances.get("Order").unwrap().is_empty());
        assert!(desc.namespaces.contains_key("rdf"));
        assert!(desc.namespaces.contains_key("ex"));
    }

    #[test]
    fn query_dispatch() {
        let (schema, instances, introspector) = setup();
        populate(&schema, &instances);

        assert!(matches!(
            introspector.query(&OntologyQuery::Classes),
            QueryOutcome::Classes(c) if c.len() == 2
        ));
        assert!(matches!(
            introspector.query(&OntologyQuery::Structure),
            QueryOutcome::Structure(_)
        ));
        let outcome = introspector.query(&OntologyQuery::Instances {
            class: Some("Client".into()),
        });
        assert!(matches!(outcome, QueryOutcome::Instances(i) if i.len() == 1));
    }

    #[test]
    fn query_deserializes_from_json() {
        let q: OntologyQuery =
            serde_json::from_str(r#"{"kind": "instances", "class": "Client"}"#).unwrap();
        assert!(matches!(q, OntologyQuery::Instances { class: Some(c) } if c == "Client"));
        let q: OntologyQuery = serde_json::from_str(r#"{"kind": "structure"}"#).unwrap();
        assert!(matches!(q, OntologyQuery::Structure));
    }
}
