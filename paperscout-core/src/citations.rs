//! Citation network construction and influence ranking.
//!
//! Built from per-paper citation lookups: nodes are every paper id
//! encountered (seed papers plus everything they reference or are referenced
//! by), edges are directed citing -> cited relationships.

use crate::sources::CitationRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Citation weight multiplier for influential citations.
const INFLUENTIAL_WEIGHT: u64 = 3;

/// Per-paper citation statistics recorded for seed papers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperCitationStats {
    pub reference_count: usize,
    pub citation_count: usize,
    pub influential_citation_count: u64,
}

/// A directed citation graph over paper ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationNetwork {
    /// All paper ids in the graph, in first-encounter order.
    pub nodes: Vec<String>,
    /// Directed edges, citing paper -> cited paper.
    pub edges: Vec<(String, String)>,
    /// Stats per seed paper.
    pub metadata: HashMap<String, PaperCitationStats>,
    pub node_count: usize,
    pub edge_count: usize,
    /// Top seed papers ranked by influence score, (paper_id, score).
    pub most_influential: Vec<(String, u64)>,
}

/// Influence score used only for ranking.
pub fn influence_score(citation_count: u64, influential_citation_count: u64) -> u64 {
    citation_count + INFLUENTIAL_WEIGHT * influential_citation_count
}

/// Build a citation network from per-seed-paper citation records.
///
/// `records` pairs each seed paper id with its (possibly zeroed) lookup
/// result, in relevance order. The influence ranking covers seed papers
/// only; ties keep relevance order.
pub fn build_citation_network(
    records: &[(String, CitationRecord)],
    top_k: usize,
) -> CitationNetwork {
    let mut nodes: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut edges: Vec<(String, String)> = Vec::new();
    let mut metadata: HashMap<String, PaperCitationStats> = HashMap::new();

    let add_node = |nodes: &mut Vec<String>, seen: &mut HashSet<String>, id: &str| {
        if seen.insert(id.to_string()) {
            nodes.push(id.to_string());
        }
    };

    for (paper_id, record) in records {
        add_node(&mut nodes, &mut seen, paper_id);

        metadata.insert(
            paper_id.clone(),
            PaperCitationStats {
                reference_count: record.references.len(),
                citation_count: record.citations.len(),
                influential_citation_count: record.influential_citation_count,
            },
        );

        // This paper cites its references.
        for ref_id in &record.references {
            if ref_id.is_empty() {
                continue;
            }
            edges.push((paper_id.clone(), ref_id.clone()));
            add_node(&mut nodes, &mut seen, ref_id);
        }

        // Citing papers cite this paper.
        for cit_id in &record.citations {
            if cit_id.is_empty() {
                continue;
            }
            edges.push((cit_id.clone(), paper_id.clone()));
            add_node(&mut nodes, &mut seen, cit_id);
        }
    }

    let mut ranked: Vec<(String, u64)> = records
        .iter()
        .map(|(paper_id, record)| {
            (
                paper_id.clone(),
                influence_score(
                    record.citations.len() as u64,
                    record.influential_citation_count,
                ),
            )
        })
        .collect();
    // Stable: ties keep relevance order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top_k);

    let node_count = nodes.len();
    let edge_count = edges.len();

    tracing::info!(
        nodes = node_count,
        edges = edge_count,
        "Citation network built"
    );

    CitationNetwork {
        nodes,
        edges,
        metadata,
        node_count,
        edge_count,
        most_influential: ranked,
    }
}

impl CitationNetwork {
    /// Check the structural invariants: counts match and every edge endpoint
    /// is a known node.
    pub fn is_consistent(&self) -> bool {
        if self.node_count != self.nodes.len() || self.edge_count != self.edges.len() {
            return false;
        }
        let node_set: HashSet<&str> = self.nodes.iter().map(|s| s.as_str()).collect();
        self.edges
            .iter()
            .all(|(from, to)| node_set.contains(from.as_str()) && node_set.contains(to.as_str()))
    }
}
