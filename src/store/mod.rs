//! Triple Store: the single mutation point for the semantic graph.
//!
//! Everything in ontograph — schema, instances, handlers — is a projection
//! over a set of (subject, predicate, object) triples held by
//! [`mem::TripleStore`]. The store enforces set semantics (no duplicate
//! triples) and supports wildcard matching on any combination of positions.

pub mod mem;

use serde::{Deserialize, Serialize};

use crate::term::Term;

/// A (subject, predicate, object) fact, the atomic unit of the graph.
///
/// Subjects and predicates are IRIs by convention; the store itself is
/// generic and does not police term kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    /// The subject of the triple.
    pub subject: Term,
    /// The predicate (relation) of the triple.
    pub predicate: Term,
    /// The object: an IRI reference or a literal value.
    pub object: Term,
}

impl Triple {
    /// Create a new triple.
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// A match pattern: `None` in any position is a wildcard.
#[derive(Debug, Clone, Default)]
pub struct TriplePattern<'a> {
    pub subject: Option<&'a Term>,
    pub predicate: Option<&'a Term>,
    pub object: Option<&'a Term>,
}

impl<'a> TriplePattern<'a> {
    /// The all-wildcard pattern.
    pub fn any() -> Self {
        Self::default()
    }

    /// Pattern with a fixed subject.
    pub fn subject(s: &'a Term) -> Self {
        Self {
            subject: Some(s),
            ..Self::default()
        }
    }
}
