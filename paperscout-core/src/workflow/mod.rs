//! The research workflow: state model, step nodes, graph, and executor.

pub mod executor;
pub mod graph;
pub mod nodes;
pub mod state;

pub use executor::WorkflowExecutor;
pub use graph::{NodeId, ResearchGraph};
pub use nodes::{
    AnalyzeNode, ApprovalDecision, ApprovalHandler, ApproveNode, AutoApproveHandler, CitationNode,
    DecomposeNode, ReflectNode, SearchNode, StepNode, SynthesizeNode,
};
pub use state::{MergePolicy, ResearchState, StateUpdate, StepTag, field_policies};

use crate::config::AgentConfig;
use crate::llm::LlmClient;
use crate::sources::{CitationProvider, SearchProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// Wire the standard seven-node research workflow.
///
/// The approval gate is included only when `approval` is provided and the
/// configuration enables it; in automated mode the node is structurally
/// absent from the graph.
pub fn create_research_workflow(
    llm: Arc<LlmClient>,
    scholar: Arc<dyn SearchProvider>,
    arxiv: Arc<dyn SearchProvider>,
    citations: Arc<dyn CitationProvider>,
    approval: Option<Arc<dyn ApprovalHandler>>,
    config: &AgentConfig,
) -> WorkflowExecutor {
    let enable_approval = config.workflow.enable_approval && approval.is_some();
    let graph = ResearchGraph::new(enable_approval);

    let mut node_set: HashMap<NodeId, Arc<dyn StepNode>> = HashMap::new();
    node_set.insert(
        NodeId::Decompose,
        Arc::new(DecomposeNode::new(llm.clone())),
    );
    if enable_approval {
        if let Some(handler) = approval {
            node_set.insert(NodeId::Approve, Arc::new(ApproveNode::new(handler)));
        }
    }
    node_set.insert(
        NodeId::Search,
        Arc::new(SearchNode::new(scholar, arxiv, config.search.clone())),
    );
    node_set.insert(NodeId::Analyze, Arc::new(AnalyzeNode::new(llm.clone())));
    node_set.insert(
        NodeId::BuildCitations,
        Arc::new(CitationNode::new(citations, config.citations.clone())),
    );
    node_set.insert(
        NodeId::Synthesize,
        Arc::new(SynthesizeNode::new(
            llm,
            config.workflow.synthesis_paper_limit,
        )),
    );
    node_set.insert(
        NodeId::Reflect,
        Arc::new(ReflectNode::new(config.workflow.reflection.clone())),
    );

    WorkflowExecutor::new(node_set, graph, config.workflow.max_loop_iterations)
}
