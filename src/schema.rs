//! Schema Registry: runtime class and property declarations.
//!
//! Classes and properties are ordinary triples (`rdf:type owl:Class`,
//! `owl:DatatypeProperty` / `owl:ObjectProperty` with an `rdfs:range`), so the
//! schema is as dynamic as the data it describes. All declaration operations
//! are idempotent: re-declaring an existing class or an identical property is
//! success, not an error.
//!
//! Beyond plain classes, the registry can declare behavior companion classes
//! (method metadata consumed by the semantic proxy) and state machines.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::namespace::{NamespaceRegistry, SCHEMA_PREFIX};
use crate::store::mem::TripleStore;
use crate::store::TriplePattern;
use crate::term::Term;
use crate::vocab;

/// Whether a property stores literal values or references to other nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Datatype,
    Object,
}

/// The range of a property: a primitive type tag, or another class
/// (which makes the property an object property).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyRange {
    Str,
    Int,
    Float,
    DateTime,
    /// Reference to a class by name; resolved in the declaring namespace.
    ClassRef(String),
}

impl PropertyRange {
    /// Parse a type tag. Unknown tags are treated as class references.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "string" | "str" => PropertyRange::Str,
            "int" | "integer" => PropertyRange::Int,
            "float" | "decimal" => PropertyRange::Float,
            "dateTime" | "datetime" => PropertyRange::DateTime,
            other => PropertyRange::ClassRef(other.to_string()),
        }
    }

    /// Whether this range denotes a datatype (literal-valued) property.
    pub fn is_datatype(&self) -> bool {
        !matches!(self, PropertyRange::ClassRef(_))
    }
}

/// One property in an `extend_class` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySpec {
    /// Property name (e.g. `hasName`).
    pub name: String,
    /// Type tag: `string`, `int`, `float`, `dateTime`, or a class name.
    #[serde(rename = "type")]
    pub range: String,
    /// Optional human-readable label; defaults to the name.
    #[serde(default)]
    pub label: Option<String>,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: range.into(),
            label: None,
        }
    }
}

/// A method on a behavior companion class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSpec {
    pub name: String,
    /// Parameter names; all parameters are string-typed.
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Optional return class name.
    #[serde(default)]
    pub return_type: Option<String>,
}

/// A declared method, as read back from the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
}

/// One transition in a state machine declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub trigger: Option<String>,
}

/// Schema Registry over the triple store.
///
/// Holds no state of its own: every query re-reads the store, so schema and
/// data can mutate continuously without invalidating anything here.
pub struct SchemaRegistry {
    store: Arc<TripleStore>,
    namespaces: Arc<NamespaceRegistry>,
    base_uri: String,
}

impl SchemaRegistry {
    pub fn new(
        store: Arc<TripleStore>,
        namespaces: Arc<NamespaceRegistry>,
        base_uri: impl Into<String>,
    ) -> Self {
        Self {
            store,
            namespaces,
            base_uri: base_uri.into(),
        }
    }

    /// Expand a local name in the default schema namespace.
    pub fn schema_term(&self, local: &str) -> SchemaResult<Term> {
        self.namespaces.expand(SCHEMA_PREFIX, local)
    }

    /// Resolve the namespace to declare into, binding a fresh one derived from
    /// the base URI when the prefix is unknown.
    fn declaring_namespace(&self, namespace: Option<&str>) -> SchemaResult<String> {
        let prefix = namespace.unwrap_or(SCHEMA_PREFIX);
        if !self.namespaces.is_bound(prefix) {
            self.namespaces
                .bind(prefix, &format!("{}{}/", self.base_uri, prefix))?;
        }
        Ok(prefix.to_string())
    }

    // -----------------------------------------------------------------------
    // Classes
    // -----------------------------------------------------------------------

    /// Declare a class, creating it if absent. Returns the class URI either way.
    pub fn declare_class(&self, name: &str, namespace: Option<&str>) -> SchemaResult<Term> {
        let prefix = self.declaring_namespace(namespace)?;
        let uri = self.namespaces.expand(&prefix, name)?;
        if !self.class_exists(&uri) {
            self.store.add(&uri, &vocab::rdf_type(), &vocab::owl_class())?;
            self.store
                .add(&uri, &vocab::rdfs_label(), &Term::literal(name))?;
            tracing::info!(class = name, uri = uri.lexical(), "class declared");
        }
        Ok(uri)
    }

    /// Whether a URI is declared as a class.
    pub fn class_exists(&self, uri: &Term) -> bool {
        self.store.contains(uri, &vocab::rdf_type(), &vocab::owl_class())
    }

    /// Find a class URI by its label.
    pub fn find_class_by_label(&self, label: &str) -> Option<Term> {
        self.store
            .subjects_of(&vocab::rdfs_label(), &Term::literal(label))
            .into_iter()
            .find(|uri| self.class_exists(uri))
    }

    /// All declared class URIs.
    pub fn classes(&self) -> Vec<Term> {
        self.store
            .subjects_of(&vocab::rdf_type(), &vocab::owl_class())
    }

    /// The `rdfs:label` of a URI, falling back to its local name.
    pub fn label_of(&self, uri: &Term) -> String {
        self.store
            .objects_of(uri, &vocab::rdfs_label())
            .into_iter()
            .next()
            .map(|t| t.lexical().to_string())
            .unwrap_or_else(|| uri.local_name().to_string())
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    /// Resolve a range to its term form.
    fn range_term(&self, range: &PropertyRange, prefix: &str) -> SchemaResult<Term> {
        Ok(match range {
            PropertyRange::Str => Term::iri(vocab::XSD_STRING),
            PropertyRange::Int => Term::iri(vocab::XSD_INTEGER),
            PropertyRange::Float => Term::iri(vocab::XSD_FLOAT),
            PropertyRange::DateTime => Term::iri(vocab::XSD_DATETIME),
            PropertyRange::ClassRef(class) => self.namespaces.expand(prefix, class)?,
        })
    }

    /// Declare a property with the given range.
    ///
    /// Idempotent when the existing declaration has the same range; a
    /// different range is a [`SchemaError::PropertyRangeConflict`].
    pub fn declare_property(
        &self,
        name: &str,
        range: &PropertyRange,
        label: Option<&str>,
        namespace: Option<&str>,
    ) -> SchemaResult<Term> {
        let prefix = self.declaring_namespace(namespace)?;
        let uri = self.namespaces.expand(&prefix, name)?;
        let range_uri = self.range_term(range, &prefix)?;

        if self.property_exists(&uri) {
            let existing = self.property_range(&uri);
            if existing.as_ref() != Some(&range_uri) {
                return Err(SchemaError::PropertyRangeConflict {
                    property: uri.lexical().to_string(),
                    existing: existing
                        .map(|t| t.lexical().to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    requested: range_uri.lexical().to_string(),
                });
            }
            return Ok(uri);
        }

        let kind = if range.is_datatype() {
            vocab::owl_datatype_property()
        } else {
            vocab::owl_object_property()
        };
        self.store.add(&uri, &vocab::rdf_type(), &kind)?;
        self.store.add(
            &uri,
            &vocab::rdfs_label(),
            &Term::literal(label.unwrap_or(name)),
        )?;
        self.store.add(&uri, &vocab::rdfs_range(), &range_uri)?;
        tracing::debug!(property = name, range = range_uri.lexical(), "property declared");
        Ok(uri)
    }

    /// Whether a URI is declared as a property (datatype or object).
    pub fn property_exists(&self, uri: &Term) -> bool {
        self.property_kind(uri).is_some()
    }

    /// The kind of a declared property.
    pub fn property_kind(&self, uri: &Term) -> Option<PropertyKind> {
        if self
            .store
            .contains(uri, &vocab::rdf_type(), &vocab::owl_datatype_property())
        {
            Some(PropertyKind::Datatype)
        } else if self
            .store
            .contains(uri, &vocab::rdf_type(), &vocab::owl_object_property())
        {
            Some(PropertyKind::Object)
        } else {
            None
        }
    }

    /// The declared range of a property.
    pub fn property_range(&self, uri: &Term) -> Option<Term> {
        self.store
            .objects_of(uri, &vocab::rdfs_range())
            .into_iter()
            .next()
    }

    /// Find a property URI by its label.
    pub fn find_property_by_label(&self, label: &str) -> Option<Term> {
        self.store
            .subjects_of(&vocab::rdfs_label(), &Term::literal(label))
            .into_iter()
            .find(|uri| self.property_exists(uri))
    }

    /// All declared property URIs of the given kind.
    pub fn properties_of_kind(&self, kind: PropertyKind) -> Vec<Term> {
        let marker = match kind {
            PropertyKind::Datatype => vocab::owl_datatype_property(),
            PropertyKind::Object => vocab::owl_object_property(),
        };
        self.store.subjects_of(&vocab::rdf_type(), &marker)
    }

    /// Declare a class and a set of properties in one call.
    ///
    /// Everything already declared is left untouched; calling twice with the
    /// same arguments yields the same schema state as calling once.
    pub fn extend_class(
        &self,
        name: &str,
        properties: &[PropertySpec],
        namespace: Option<&str>,
    ) -> SchemaResult<Term> {
        let class_uri = self.declare_class(name, namespace)?;
        for spec in properties {
            let range = PropertyRange::parse(&spec.range);
            self.declare_property(&spec.name, &range, spec.label.as_deref(), namespace)?;
        }
        tracing::info!(
            class = name,
            properties = properties.len(),
            "ontology extended"
        );
        Ok(class_uri)
    }

    // -----------------------------------------------------------------------
    // Behavior companion classes
    // -----------------------------------------------------------------------

    /// The conventional behavior companion of a class (`<Class>Behavior`).
    pub fn behavior_uri(&self, class_name: &str) -> SchemaResult<Term> {
        self.schema_term(&format!("{class_name}Behavior"))
    }

    /// Declare a behavior companion class carrying method metadata.
    ///
    /// Each method becomes an object property with `rdfs:domain` pointing at
    /// the companion class; method parameters become string-typed datatype
    /// properties with `rdfs:domain` pointing at the method. Returns the
    /// companion class URI.
    pub fn declare_behavior(
        &self,
        class_name: &str,
        methods: &[MethodSpec],
    ) -> SchemaResult<Term> {
        let class_uri = self.declare_class(class_name, None)?;
        let behavior_name = format!("{class_name}Behavior");
        let behavior_uri = self.declare_class(&behavior_name, None)?;
        self.store.add(
            &class_uri,
            &self.schema_term("hasBehavior")?,
            &behavior_uri,
        )?;

        for method in methods {
            let method_uri = self.schema_term(&method.name)?;
            self.store
                .add(&method_uri, &vocab::rdf_type(), &vocab::owl_object_property())?;
            self.store.add(
                &method_uri,
                &vocab::rdfs_label(),
                &Term::literal(&method.name),
            )?;
            self.store
                .add(&method_uri, &vocab::rdfs_domain(), &behavior_uri)?;

            if let Some(ret) = &method.return_type {
                let ret_uri = self.schema_term(ret)?;
                self.store.add(&method_uri, &vocab::rdfs_range(), &ret_uri)?;
            }

            for param in &method.parameters {
                let param_uri = self.schema_term(&format!("{}_{param}", method.name))?;
                self.store.add(
                    &param_uri,
                    &vocab::rdf_type(),
                    &vocab::owl_datatype_property(),
                )?;
                self.store
                    .add(&param_uri, &vocab::rdfs_label(), &Term::literal(param))?;
                self.store
                    .add(&param_uri, &vocab::rdfs_domain(), &method_uri)?;
                self.store.add(
                    &param_uri,
                    &vocab::rdfs_range(),
                    &Term::iri(vocab::XSD_STRING),
                )?;
            }
        }
        tracing::info!(
            class = class_name,
            methods = methods.len(),
            "behavior class declared"
        );
        Ok(behavior_uri)
    }

    /// Whether `method_uri` is declared with `rdfs:domain` = `class_uri`.
    pub fn method_declared(&self, class_uri: &Term, method_uri: &Term) -> bool {
        self.store
            .contains(method_uri, &vocab::rdf_type(), &vocab::owl_object_property())
            && self
                .store
                .contains(method_uri, &vocab::rdfs_domain(), class_uri)
    }

    /// All methods declared with the given class as domain.
    pub fn methods_of(&self, class_uri: &Term) -> Vec<MethodInfo> {
        let mut methods: Vec<MethodInfo> = self
            .store
            .subjects_of(&vocab::rdfs_domain(), class_uri)
            .into_iter()
            .filter(|uri| {
                self.store
                    .contains(uri, &vocab::rdf_type(), &vocab::owl_object_property())
            })
            .map(|method_uri| {
                let mut parameters: Vec<String> = self
                    .store
                    .subjects_of(&vocab::rdfs_domain(), &method_uri)
                    .into_iter()
                    .filter(|uri| {
                        self.store.contains(
                            uri,
                            &vocab::rdf_type(),
                            &vocab::owl_datatype_property(),
                        )
                    })
                    .map(|uri| self.label_of(&uri))
                    .collect();
                parameters.sort();

                let return_type = self
                    .store
                    .objects_of(&method_uri, &vocab::rdfs_range())
                    .into_iter()
                    .next()
                    .map(|t| t.local_name().to_string());

                MethodInfo {
                    name: method_uri.local_name().to_string(),
                    parameters,
                    return_type,
                }
            })
            .collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }

    // -----------------------------------------------------------------------
    // State machines
    // -----------------------------------------------------------------------

    /// Declare a state machine for a class: a `<Class>StateMachine` class,
    /// one individual per state, and one object property per transition
    /// (`rdfs:domain` = from-state, `rdfs:range` = to-state).
    pub fn declare_state_machine(
        &self,
        class_name: &str,
        states: &[&str],
        transitions: &[TransitionSpec],
    ) -> SchemaResult<Term> {
        let class_uri = self.declare_class(class_name, None)?;
        let sm_name = format!("{class_name}StateMachine");
        let sm_uri = self.declare_class(&sm_name, None)?;
        self.store.add(
            &class_uri,
            &self.schema_term("hasStateMachine")?,
            &sm_uri,
        )?;

        for state in states {
            let state_uri = self.schema_term(&format!("{class_name}_{state}"))?;
            self.store.add(&state_uri, &vocab::rdf_type(), &sm_uri)?;
            self.store
                .add(&state_uri, &vocab::rdfs_label(), &Term::literal(*state))?;
        }

        for trans in transitions {
            let trans_uri =
                self.schema_term(&format!("{class_name}_{}_to_{}", trans.from, trans.to))?;
            let from_uri = self.schema_term(&format!("{class_name}_{}", trans.from))?;
            let to_uri = self.schema_term(&format!("{class_name}_{}", trans.to))?;
            self.store
                .add(&trans_uri, &vocab::rdf_type(), &vocab::owl_object_property())?;
            self.store.add(
                &trans_uri,
                &vocab::rdfs_label(),
                &Term::literal(format!("{} -> {}", trans.from, trans.to)),
            )?;
            self.store.add(&trans_uri, &vocab::rdfs_domain(), &from_uri)?;
            self.store.add(&trans_uri, &vocab::rdfs_range(), &to_uri)?;
            if let Some(trigger) = &trans.trigger {
                self.store.add(
                    &trans_uri,
                    &self.schema_term("hasTrigger")?,
                    &Term::literal(trigger),
                )?;
            }
        }
        tracing::info!(
            class = class_name,
            states = states.len(),
            transitions = transitions.len(),
            "state machine declared"
        );
        Ok(sm_uri)
    }

    /// The states of a declared state machine, sorted by label.
    pub fn states_of(&self, class_name: &str) -> SchemaResult<Vec<String>> {
        let sm_uri = self.schema_term(&format!("{class_name}StateMachine"))?;
        let mut states: Vec<String> = self
            .store
            .matching(&TriplePattern {
                subject: None,
                predicate: Some(&vocab::rdf_type()),
                object: Some(&sm_uri),
            })
            .into_iter()
            .map(|t| self.label_of(&t.subject))
            .collect();
        states.sort();
        Ok(states)
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("classes", &self.classes().len())
            .finish()
    }
}
