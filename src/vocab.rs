//! RDF/RDFS/OWL/XSD vocabulary used by the schema layer.
//!
//! Only the handful of terms the store actually writes are declared here;
//! this is not a general-purpose vocabulary crate.

use crate::term::Term;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";

pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
pub const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
pub const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

/// `rdf:type` as a term.
pub fn rdf_type() -> Term {
    Term::iri(RDF_TYPE)
}

/// `rdfs:label` as a term.
pub fn rdfs_label() -> Term {
    Term::iri(RDFS_LABEL)
}

/// `rdfs:domain` as a term.
pub fn rdfs_domain() -> Term {
    Term::iri(RDFS_DOMAIN)
}

/// `rdfs:range` as a term.
pub fn rdfs_range() -> Term {
    Term::iri(RDFS_RANGE)
}

/// `owl:Class` as a term.
pub fn owl_class() -> Term {
    Term::iri(OWL_CLASS)
}

/// `owl:DatatypeProperty` as a term.
pub fn owl_datatype_property() -> Term {
    Term::iri(OWL_DATATYPE_PROPERTY)
}

/// `owl:ObjectProperty` as a term.
pub fn owl_object_property() -> Term {
    Term::iri(OWL_OBJECT_PROPERTY)
}
