//! Core term types for the ontograph store.
//!
//! Terms are the atomic units of the graph. Every IRI and literal is interned
//! to a [`TermId`] so that triples are three machine words and comparisons are
//! integer comparisons. The [`AtomicTermAllocator`] provides thread-safe ID
//! generation; the [`TermInterner`] is the bidirectional term ↔ ID map.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Unique, niche-optimized identifier for an interned term.
///
/// Uses `NonZeroU64` so that `Option<TermId>` is the same size as `TermId`
/// (the niche optimization lets the compiler use 0 as the `None` discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TermId(NonZeroU64);

impl TermId {
    /// Create a `TermId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(TermId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "term:{}", self.0)
    }
}

/// A graph term: an IRI node or a literal value.
///
/// Subjects and predicates are always IRIs; objects may be either. Literals
/// carry their lexical form only — datatype information lives in the schema
/// (the declaring property's range), not on the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Term {
    /// A resource identifier.
    Iri(String),
    /// A literal value in lexical form.
    Literal(String),
}

impl Term {
    /// Construct an IRI term.
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    /// Construct a literal term.
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal(value.into())
    }

    /// Whether this term is an IRI.
    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    /// The lexical form: the IRI string or the literal value.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(s) | Term::Literal(s) => s,
        }
    }

    /// The fragment after the last `/` or `#`, or the whole lexical form.
    ///
    /// For `http://example.org/ontology/hasName` this is `hasName`; literals
    /// return their full value.
    pub fn local_name(&self) -> &str {
        match self {
            Term::Literal(s) => s,
            Term::Iri(s) => s
                .rsplit(|c| c == '/' || c == '#')
                .next()
                .unwrap_or(s.as_str()),
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Iri(s) => write!(f, "<{s}>"),
            Term::Literal(s) => write!(f, "\"{s}\""),
        }
    }
}

/// Thread-safe term ID allocator.
///
/// Produces monotonically increasing IDs starting from 1.
#[derive(Debug)]
pub struct AtomicTermAllocator {
    next: AtomicU64,
}

impl AtomicTermAllocator {
    /// Create a new allocator that starts from ID 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next term ID.
    ///
    /// Returns an error if the ID space is exhausted (after 2^64 - 1 allocations).
    pub fn next_id(&self) -> StoreResult<TermId> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        TermId::new(raw).ok_or(StoreError::TermSpaceExhausted)
    }

    /// Return the next ID that *would* be allocated, without consuming it.
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for AtomicTermAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Bidirectional term interner mapping terms to IDs and back.
///
/// Interning is idempotent: the same term always resolves to the same ID
/// within one store instance. Both directions are O(1) via `DashMap`.
pub struct TermInterner {
    term_to_id: DashMap<Term, TermId>,
    id_to_term: DashMap<TermId, Term>,
    allocator: AtomicTermAllocator,
}

impl TermInterner {
    /// Create an empty interner.
    pub fn new() -> Self {
        Self {
            term_to_id: DashMap::new(),
            id_to_term: DashMap::new(),
            allocator: AtomicTermAllocator::new(),
        }
    }

    /// Intern a term, allocating a fresh ID on first sight.
    pub fn intern(&self, term: &Term) -> StoreResult<TermId> {
        if let Some(existing) = self.term_to_id.get(term) {
            return Ok(*existing.value());
        }
        // The entry API keeps a racing intern of the same term from
        // allocating two IDs.
        let entry = self.term_to_id.entry(term.clone());
        let id = match entry {
            dashmap::mapref::entry::Entry::Occupied(o) => *o.get(),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                let id = self.allocator.next_id()?;
                v.insert(id);
                self.id_to_term.insert(id, term.clone());
                id
            }
        };
        Ok(id)
    }

    /// Look up the ID of an already-interned term.
    pub fn get(&self, term: &Term) -> Option<TermId> {
        self.term_to_id.get(term).map(|r| *r.value())
    }

    /// Resolve an ID back to its term.
    pub fn resolve(&self, id: TermId) -> Option<Term> {
        self.id_to_term.get(&id).map(|r| r.value().clone())
    }

    /// Number of interned terms.
    pub fn len(&self) -> usize {
        self.term_to_id.len()
    }

    /// Whether the interner is empty.
    pub fn is_empty(&self) -> bool {
        self.term_to_id.is_empty()
    }
}

impl Default for TermInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TermInterner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermInterner")
            .field("terms", &self.len())
            .finish()
    }
}
