//! In-memory triple store with dual-indexing.
//!
//! Uses `petgraph` for the graph structure (stable indices, so edges can be
//! removed without invalidating the maps) and `DashMap` for fast lookups by
//! subject, predicate, or object. All higher layers are implemented purely in
//! terms of `add` / `remove` / `matching` / `contains`, which keeps the set
//! invariants in one place.

use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use crate::error::StoreResult;
use crate::term::{Term, TermId, TermInterner};

use super::{Triple, TriplePattern};

/// Edge payload: the predicate of the triple this edge encodes.
#[derive(Debug, Clone, Copy)]
struct EdgeData {
    predicate: TermId,
}

type TripleKey = (TermId, TermId, TermId);

/// In-memory triple store backed by petgraph with dual-indexing.
///
/// Nodes are interned terms appearing in subject or object position; each
/// triple is one edge. Secondary indexes provide O(1) duplicate detection
/// and fast predicate-based matching.
///
/// `add` is idempotent and `remove` on an absent triple is a no-op, so the
/// store behaves as a set of facts.
pub struct TripleStore {
    interner: TermInterner,
    /// The directed graph: nodes are TermIds, edges carry the predicate.
    graph: RwLock<StableDiGraph<TermId, EdgeData>>,
    /// TermId → NodeIndex mapping for O(1) node lookups.
    node_index: DashMap<TermId, NodeIndex>,
    /// Exact-triple index: (s, p, o) → edge, for contains/remove.
    triples: DashMap<TripleKey, petgraph::stable_graph::EdgeIndex>,
    /// Predicate index: predicate → set of (subject, object) pairs.
    predicate_index: DashMap<TermId, HashSet<(TermId, TermId)>>,
    /// Triple count.
    triple_count: AtomicUsize,
}

impl TripleStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            interner: TermInterner::new(),
            graph: RwLock::new(StableDiGraph::new()),
            node_index: DashMap::new(),
            triples: DashMap::new(),
            predicate_index: DashMap::new(),
            triple_count: AtomicUsize::new(0),
        }
    }

    /// Ensure a node exists for the given term, returning its NodeIndex.
    fn ensure_node(&self, term: TermId) -> NodeIndex {
        if let Some(idx) = self.node_index.get(&term) {
            return *idx.value();
        }
        let mut graph = self.graph.write().expect("graph lock poisoned");
        // Double-check after acquiring write lock
        if let Some(idx) = self.node_index.get(&term) {
            return *idx.value();
        }
        let idx = graph.add_node(term);
        self.node_index.insert(term, idx);
        idx
    }

    /// Add a triple. Returns `true` if it was newly inserted, `false` if it
    /// was already present (set semantics: adding twice is a no-op).
    pub fn add(&self, subject: &Term, predicate: &Term, object: &Term) -> StoreResult<bool> {
        let s = self.interner.intern(subject)?;
        let p = self.interner.intern(predicate)?;
        let o = self.interner.intern(object)?;

        if self.triples.contains_key(&(s, p, o)) {
            return Ok(false);
        }

        let subj_idx = self.ensure_node(s);
        let obj_idx = self.ensure_node(o);

        let edge = {
            let mut graph = self.graph.write().expect("graph lock poisoned");
            graph.add_edge(subj_idx, obj_idx, EdgeData { predicate: p })
        };

        self.triples.insert((s, p, o), edge);
        self.predicate_index.entry(p).or_default().insert((s, o));
        self.triple_count.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Remove a triple. Returns `true` if it was present; removing an absent
    /// triple is a no-op, not an error.
    pub fn remove(&self, subject: &Term, predicate: &Term, object: &Term) -> bool {
        let (Some(s), Some(p), Some(o)) = (
            self.interner.get(subject),
            self.interner.get(predicate),
            self.interner.get(object),
        ) else {
            return false;
        };

        let Some((_, edge)) = self.triples.remove(&(s, p, o)) else {
            return false;
        };

        {
            let mut graph = self.graph.write().expect("graph lock poisoned");
            graph.remove_edge(edge);
        }

        if let Some(mut pairs) = self.predicate_index.get_mut(&p) {
            pairs.remove(&(s, o));
        }
        self.triple_count.fetch_sub(1, Ordering::Relaxed);
        true
    }

    /// Check for an exact triple.
    pub fn contains(&self, subject: &Term, predicate: &Term, object: &Term) -> bool {
        let (Some(s), Some(p), Some(o)) = (
            self.interner.get(subject),
            self.interner.get(predicate),
            self.interner.get(object),
        ) else {
            return false;
        };
        self.triples.contains_key(&(s, p, o))
    }

    /// Match triples against a pattern; `None` in any position is a wildcard.
    ///
    /// Iteration order is unspecified — callers that need determinism must
    /// sort the result.
    pub fn matching(&self, pattern: &TriplePattern<'_>) -> Vec<Triple> {
        self.matching_ids(pattern)
            .into_iter()
            .filter_map(|(s, p, o)| {
                Some(Triple::new(
                    self.interner.resolve(s)?,
                    self.interner.resolve(p)?,
                    self.interner.resolve(o)?,
                ))
            })
            .collect()
    }

    /// Remove every triple matching the pattern. Returns the number removed.
    pub fn remove_matching(&self, pattern: &TriplePattern<'_>) -> usize {
        let keys = self.matching_ids(pattern);
        let mut removed = 0;
        for (s, p, o) in keys {
            let Some((_, edge)) = self.triples.remove(&(s, p, o)) else {
                continue;
            };
            {
                let mut graph = self.graph.write().expect("graph lock poisoned");
                graph.remove_edge(edge);
            }
            if let Some(mut pairs) = self.predicate_index.get_mut(&p) {
                pairs.remove(&(s, o));
            }
            self.triple_count.fetch_sub(1, Ordering::Relaxed);
            removed += 1;
        }
        removed
    }

    fn matching_ids(&self, pattern: &TriplePattern<'_>) -> Vec<TripleKey> {
        let s = pattern.subject.map(|t| self.interner.get(t));
        let p = pattern.predicate.map(|t| self.interner.get(t));
        let o = pattern.object.map(|t| self.interner.get(t));

        // A bound position whose term was never interned cannot match.
        if matches!(s, Some(None)) || matches!(p, Some(None)) || matches!(o, Some(None)) {
            return Vec::new();
        }
        let s = s.flatten();
        let p = p.flatten();
        let o = o.flatten();

        match (s, p, o) {
            (Some(s), Some(p), Some(o)) => {
                if self.triples.contains_key(&(s, p, o)) {
                    vec![(s, p, o)]
                } else {
                    Vec::new()
                }
            }
            (Some(s), p, o) => self.from_subject(s, p, o),
            (None, p, Some(o)) => self.to_object(o, p),
            (None, Some(p), None) => self
                .predicate_index
                .get(&p)
                .map(|pairs| pairs.iter().map(|&(s, o)| (s, p, o)).collect())
                .unwrap_or_default(),
            (None, None, None) => self.triples.iter().map(|e| *e.key()).collect(),
        }
    }

    /// Triples with a fixed subject, optionally filtered by predicate/object.
    fn from_subject(&self, s: TermId, p: Option<TermId>, o: Option<TermId>) -> Vec<TripleKey> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let Some(idx) = self.node_index.get(&s).map(|i| *i.value()) else {
            return Vec::new();
        };
        graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| p.is_none_or(|p| e.weight().predicate == p))
            .filter_map(|e| {
                let obj = *graph.node_weight(e.target())?;
                if o.is_none_or(|o| obj == o) {
                    Some((s, e.weight().predicate, obj))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Triples with a fixed object, optionally filtered by predicate.
    fn to_object(&self, o: TermId, p: Option<TermId>) -> Vec<TripleKey> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let Some(idx) = self.node_index.get(&o).map(|i| *i.value()) else {
            return Vec::new();
        };
        graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| p.is_none_or(|p| e.weight().predicate == p))
            .filter_map(|e| {
                let subj = *graph.node_weight(e.source())?;
                Some((subj, e.weight().predicate, o))
            })
            .collect()
    }

    /// All objects for a (subject, predicate) pair.
    pub fn objects_of(&self, subject: &Term, predicate: &Term) -> Vec<Term> {
        self.matching(&TriplePattern {
            subject: Some(subject),
            predicate: Some(predicate),
            object: None,
        })
        .into_iter()
        .map(|t| t.object)
        .collect()
    }

    /// All subjects for a (predicate, object) pair.
    pub fn subjects_of(&self, predicate: &Term, object: &Term) -> Vec<Term> {
        self.matching(&TriplePattern {
            subject: None,
            predicate: Some(predicate),
            object: Some(object),
        })
        .into_iter()
        .map(|t| t.subject)
        .collect()
    }

    /// Number of triples in the store.
    pub fn len(&self) -> usize {
        self.triple_count.load(Ordering::Relaxed)
    }

    /// Whether the store holds no triples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All triples, in unspecified order.
    pub fn all_triples(&self) -> Vec<Triple> {
        self.matching(&TriplePattern::any())
    }

    /// Remove every triple. Interned terms are kept (IDs stay stable).
    pub fn clear(&self) {
        let keys: Vec<TripleKey> = self.triples.iter().map(|e| *e.key()).collect();
        for (s, p, o) in keys {
            if let Some((_, edge)) = self.triples.remove(&(s, p, o)) {
                let mut graph = self.graph.write().expect("graph lock poisoned");
                graph.remove_edge(edge);
                drop(graph);
                if let Some(mut pairs) = self.predicate_index.get_mut(&p) {
                    pairs.remove(&(s, o));
                }
                self.triple_count.fetch_sub(1, Ordering::Relaxed);
            }
        }
    }
}

impl Default for TripleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TripleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleStore")
            .field("terms", &self.interner.len())
            .field("triples", &self.len())
            .finish()
    }
}
