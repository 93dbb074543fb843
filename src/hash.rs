//! Order-independent content hashes for graphs, datasets and result sets.
//!
//! Each triple, quad or solution row is hashed on its own with SHA-256, truncated to
//! 64 bits, and the item hashes are summed with wrapping addition. Blank nodes are
//! replaced by labels derived from where they occur, so relabelled copies of the
//! same data hash equal while differently shaped data does not.

use std::collections::{HashMap, HashSet};

use oxigraph::model::{Dataset, Graph, GraphNameRef, NamedOrBlankNodeRef, QuadRef, Term, TermRef};
use sha2::{Digest, Sha256};

use crate::rdf::Solutions;

const BLANK_NODE: &str = "_:";

/// Structural labels of blank nodes, keyed by their local identifier
type BlankLabels<'a> = HashMap<&'a str, u64>;

fn item_hash(parts: &[String]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

fn blank_key(id: &str, labels: &BlankLabels<'_>) -> String {
    let label = labels.get(id).copied().unwrap_or_default();
    format!("{BLANK_NODE}{label:016x}")
}

fn term_key(term: TermRef<'_>, labels: &BlankLabels<'_>) -> String {
    match term {
        TermRef::BlankNode(node) => blank_key(node.as_str(), labels),
        other => other.to_string(),
    }
}

fn quad_key(quad: &QuadRef<'_>, labels: &BlankLabels<'_>) -> Vec<String> {
    let graph_name = match quad.graph_name {
        GraphNameRef::BlankNode(node) => blank_key(node.as_str(), labels),
        other => other.to_string(),
    };
    vec![
        term_key(quad.subject.into(), labels),
        quad.predicate.to_string(),
        term_key(quad.object, labels),
        graph_name,
    ]
}

/// Blank nodes of a quad with their position (0 subject, 2 object, 3 graph)
fn blank_positions<'a>(quad: &QuadRef<'a>) -> Vec<(u8, &'a str)> {
    let mut found = Vec::new();
    if let NamedOrBlankNodeRef::BlankNode(node) = quad.subject {
        found.push((0, node.as_str()));
    }
    if let TermRef::BlankNode(node) = quad.object {
        found.push((2, node.as_str()));
    }
    if let GraphNameRef::BlankNode(node) = quad.graph_name {
        found.push((3, node.as_str()));
    }
    found
}

/// Colour refinement over the blank nodes of a quad set.
///
/// Every blank node starts with the same label. Each round relabels a node from its
/// previous label and the sorted keys of the quads it occurs in, and stops once a
/// round no longer splits any class.
fn blank_labels<'a>(quads: &[QuadRef<'a>]) -> BlankLabels<'a> {
    let mut labels = BlankLabels::new();
    for quad in quads {
        for (_, id) in blank_positions(quad) {
            labels.insert(id, 0);
        }
    }

    let mut classes = usize::from(!labels.is_empty());
    for _ in 0..labels.len() {
        let mut neighbourhoods: HashMap<&str, Vec<String>> = HashMap::new();
        for quad in quads {
            let key = quad_key(quad, &labels).join(" ");
            for (position, id) in blank_positions(quad) {
                neighbourhoods
                    .entry(id)
                    .or_default()
                    .push(format!("{position}|{key}"));
            }
        }

        let refined: BlankLabels<'a> = neighbourhoods
            .into_iter()
            .map(|(id, mut seen)| {
                seen.sort();
                seen.push(blank_key(id, &labels));
                (id, item_hash(&seen))
            })
            .collect();

        let refined_classes = refined.values().collect::<HashSet<_>>().len();
        labels = refined;
        if refined_classes == classes {
            break;
        }
        classes = refined_classes;
    }

    labels
}

fn hash_quads(quads: &[QuadRef<'_>]) -> u64 {
    let labels = blank_labels(quads);
    quads
        .iter()
        .map(|quad| item_hash(&quad_key(quad, &labels)))
        .fold(0, u64::wrapping_add)
}

pub fn hash_graph(graph: &Graph) -> u64 {
    let quads: Vec<_> = graph
        .iter()
        .map(|triple| triple.in_graph(GraphNameRef::DefaultGraph))
        .collect();
    hash_quads(&quads)
}

pub fn hash_dataset(dataset: &Dataset) -> u64 {
    hash_quads(&dataset.iter().collect::<Vec<_>>())
}

fn row_key(solutions: &Solutions, row: &[Option<Term>], labels: &BlankLabels<'_>) -> Vec<String> {
    let mut bindings: Vec<String> = solutions
        .variables
        .iter()
        .zip(row)
        .filter_map(|(variable, term)| {
            term.as_ref()
                .map(|term| format!("{}={}", variable.as_str(), term_key(term.as_ref(), labels)))
        })
        .collect();
    bindings.sort();
    bindings
}

/// Blank nodes of a result set, labelled by the rows and variables they are bound in
fn solution_blank_labels(solutions: &Solutions) -> BlankLabels<'_> {
    let anonymous = BlankLabels::new();
    let mut occurrences: HashMap<&str, Vec<String>> = HashMap::new();

    for row in &solutions.rows {
        let key = row_key(solutions, row, &anonymous).join(" ");
        for (variable, term) in solutions.variables.iter().zip(row) {
            if let Some(Term::BlankNode(node)) = term {
                occurrences
                    .entry(node.as_str())
                    .or_default()
                    .push(format!("{}@{key}", variable.as_str()));
            }
        }
    }

    occurrences
        .into_iter()
        .map(|(id, mut seen)| {
            seen.sort();
            (id, item_hash(&seen))
        })
        .collect()
}

/// Hash of a SELECT result; variable order and row order do not matter.
pub fn hash_solutions(solutions: &Solutions) -> u64 {
    let mut variables: Vec<String> = solutions
        .variables
        .iter()
        .map(|v| v.as_str().to_string())
        .collect();
    variables.sort();

    let labels = solution_blank_labels(solutions);
    solutions
        .rows
        .iter()
        .map(|row| item_hash(&row_key(solutions, row, &labels)))
        .fold(item_hash(&variables), u64::wrapping_add)
}

pub fn hash_boolean(value: bool) -> u64 {
    item_hash(&[value.to_string()])
}

/// Strong ETag for one representation of a result: content hash plus the variant's
/// media type, quoted.
pub fn entity_tag(hash: u64, media_type: &str) -> String {
    let variant = Sha256::digest(media_type.as_bytes());
    format!("\"{hash:016x}-{}\"", hex::encode(&variant[..4]))
}
