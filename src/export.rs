//! Export/import: round-trip the triple set through textual graph formats.
//!
//! Two formats are supported: line-oriented N-Triples and a JSON dump that
//! also carries the namespace bindings. Import is additive — it merges into
//! the existing store and never clears it first; callers wanting replacement
//! semantics clear the store explicitly beforehand.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};
use crate::namespace::NamespaceRegistry;
use crate::store::mem::TripleStore;
use crate::store::Triple;
use crate::term::Term;

/// Supported serialization formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GraphFormat {
    NTriples,
    Json,
}

/// The JSON dump shape: namespace bindings plus the full triple set.
#[derive(Debug, Serialize, Deserialize)]
struct GraphDump {
    namespaces: BTreeMap<String, String>,
    triples: Vec<Triple>,
}

/// Serialize the full triple set.
///
/// Output is sorted, so equal stores export byte-identical documents.
pub fn export(
    store: &TripleStore,
    namespaces: &NamespaceRegistry,
    format: GraphFormat,
) -> ExportResult<String> {
    let mut triples = store.all_triples();
    triples.sort();

    match format {
        GraphFormat::NTriples => {
            let mut out = String::new();
            for triple in &triples {
                out.push_str(&format_term(&triple.subject));
                out.push(' ');
                out.push_str(&format_term(&triple.predicate));
                out.push(' ');
                out.push_str(&format_term(&triple.object));
                out.push_str(" .\n");
            }
            Ok(out)
        }
        GraphFormat::Json => {
            let dump = GraphDump {
                namespaces: namespaces.all(),
                triples,
            };
            serde_json::to_string_pretty(&dump).map_err(|e| ExportError::Serialize {
                message: e.to_string(),
            })
        }
    }
}

/// Merge serialized triples into the store. Returns the number of triples
/// actually added (duplicates of existing facts count as zero).
pub fn import(
    store: &TripleStore,
    namespaces: &NamespaceRegistry,
    data: &str,
    format: GraphFormat,
) -> ExportResult<usize> {
    let triples = match format {
        GraphFormat::NTriples => parse_ntriples(data)?,
        GraphFormat::Json => {
            let dump: GraphDump =
                serde_json::from_str(data).map_err(|e| ExportError::Parse {
                    line: e.line(),
                    message: e.to_string(),
                })?;
            for (prefix, base) in &dump.namespaces {
                namespaces.bind(prefix, base)?;
            }
            dump.triples
        }
    };

    let mut added = 0;
    for triple in &triples {
        if store.add(&triple.subject, &triple.predicate, &triple.object)? {
            added += 1;
        }
    }
    tracing::info!(parsed = triples.len(), added, "graph imported");
    Ok(added)
}

fn format_term(term: &Term) -> String {
    match term {
        Term::Iri(iri) => format!("<{iri}>"),
        Term::Literal(value) => format!("\"{}\"", escape_literal(value)),
    }
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn parse_ntriples(data: &str) -> ExportResult<Vec<Triple>> {
    let mut triples = Vec::new();
    for (i, raw_line) in data.lines().enumerate() {
        let line_no = i + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut rest = line;
        let subject = take_term(&mut rest, line_no)?;
        let predicate = take_term(&mut rest, line_no)?;
        let object = take_term(&mut rest, line_no)?;
        let rest = rest.trim_start();
        if rest != "." {
            return Err(ExportError::Parse {
                line: line_no,
                message: format!("expected terminating '.', found {rest:?}"),
            });
        }
        triples.push(Triple::new(subject, predicate, object));
    }
    Ok(triples)
}

/// Consume one term (`<iri>` or `"literal"`) from the front of `rest`.
fn take_term<'a>(rest: &mut &'a str, line: usize) -> ExportResult<Term> {
    let cur: &'a str = *rest;
    let s = cur.trim_start();
    if let Some(tail) = s.strip_prefix('<') {
        let end = tail.find('>').ok_or_else(|| ExportError::Parse {
            line,
            message: "unterminated IRI".to_string(),
        })?;
        let iri = &tail[..end];
        *rest = &tail[end + 1..];
        return Ok(Term::iri(iri));
    }
    if let Some(tail) = s.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = tail.char_indices();
        while let Some((idx, c)) = chars.next() {
            match c {
                '"' => {
                    *rest = &tail[idx + 1..];
                    return Ok(Term::literal(value));
                }
                '\\' => {
                    let (_, escaped) = chars.next().ok_or_else(|| ExportError::Parse {
                        line,
                        message: "dangling escape in literal".to_string(),
                    })?;
                    value.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => other,
                    });
                }
                other => value.push(other),
            }
        }
        return Err(ExportError::Parse {
            line,
            message: "unterminated literal".to_string(),
        });
    }
    Err(ExportError::Parse {
        line,
        message: format!("expected '<' or '\"', found {s:?}"),
    })
}
