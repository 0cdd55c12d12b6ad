//! The research workflow graph: nodes, backbone edges, and the conditional
//! edge out of the reflection step.
//!
//! decompose -> [approve] -> search -> analyze -> build_citations ->
//! synthesize -> reflect, with reflect routing back to search on a
//! "continue" decision and to the terminal state otherwise.

use crate::workflow::state::{ResearchState, StepTag};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Identifier of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Decompose,
    Approve,
    Search,
    Analyze,
    BuildCitations,
    Synthesize,
    Reflect,
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeId::Decompose => "decompose",
            NodeId::Approve => "approve",
            NodeId::Search => "search",
            NodeId::Analyze => "analyze",
            NodeId::BuildCitations => "build_citations",
            NodeId::Synthesize => "synthesize",
            NodeId::Reflect => "reflect",
        };
        write!(f, "{}", s)
    }
}

/// The compiled edge structure of the research workflow.
///
/// The approval node is structurally optional: when disabled, the edge from
/// decompose targets search directly and no other node's contract changes.
#[derive(Debug, Clone, Copy)]
pub struct ResearchGraph {
    enable_approval: bool,
}

impl ResearchGraph {
    pub fn new(enable_approval: bool) -> Self {
        info!(hitl = enable_approval, "Research workflow graph constructed");
        Self { enable_approval }
    }

    pub fn has_approval(&self) -> bool {
        self.enable_approval
    }

    /// The entry node.
    pub fn entry(&self) -> NodeId {
        NodeId::Decompose
    }

    /// The node following `current`, or `None` for the terminal state.
    ///
    /// The conditional edge out of reflect reads the decision token from
    /// `current_step`. Unrecognized tokens default to terminal, never to
    /// looping, so state corruption cannot produce an infinite loop.
    pub fn next(&self, current: NodeId, state: &ResearchState) -> Option<NodeId> {
        match current {
            NodeId::Decompose => {
                if self.enable_approval {
                    Some(NodeId::Approve)
                } else {
                    Some(NodeId::Search)
                }
            }
            NodeId::Approve => Some(NodeId::Search),
            NodeId::Search => Some(NodeId::Analyze),
            NodeId::Analyze => Some(NodeId::BuildCitations),
            NodeId::BuildCitations => Some(NodeId::Synthesize),
            NodeId::Synthesize => Some(NodeId::Reflect),
            NodeId::Reflect => match state.current_step {
                StepTag::Continue => {
                    info!("Continuing research, looping back to search");
                    Some(NodeId::Search)
                }
                StepTag::Complete => {
                    info!("Workflow complete");
                    None
                }
                other => {
                    warn!(step = %other, "Unclear decision token, defaulting to end");
                    None
                }
            },
        }
    }

    /// All nodes present in this graph, in backbone order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = vec![NodeId::Decompose];
        if self.enable_approval {
            nodes.push(NodeId::Approve);
        }
        nodes.extend([
            NodeId::Search,
            NodeId::Analyze,
            NodeId::BuildCitations,
            NodeId::Synthesize,
            NodeId::Reflect,
        ]);
        nodes
    }
}
