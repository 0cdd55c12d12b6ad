//! Drives the research graph from the initial state to the terminal state.
//!
//! The executor owns the merge: it invokes the current node, applies the
//! partial update via the state's merge policy, and advances along the
//! graph's edges. The reflection step's own stop conditions are the primary
//! loop bound; a configurable iteration cap backstops a broken decision
//! function.

use crate::error::WorkflowError;
use crate::workflow::graph::{NodeId, ResearchGraph};
use crate::workflow::nodes::StepNode;
use crate::workflow::state::ResearchState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Executes a research workflow to completion.
pub struct WorkflowExecutor {
    nodes: HashMap<NodeId, Arc<dyn StepNode>>,
    graph: ResearchGraph,
    max_loop_iterations: usize,
}

impl WorkflowExecutor {
    pub fn new(
        nodes: HashMap<NodeId, Arc<dyn StepNode>>,
        graph: ResearchGraph,
        max_loop_iterations: usize,
    ) -> Self {
        Self {
            nodes,
            graph,
            max_loop_iterations,
        }
    }

    pub fn graph(&self) -> &ResearchGraph {
        &self.graph
    }

    /// Run the workflow from `state` until the terminal state.
    ///
    /// Always returns the (possibly degraded) final state, except when a
    /// node surfaces a fatal error such as the approval gate's
    /// [`WorkflowError::Aborted`], which propagates to the caller uncaught.
    /// Wall-clock duration is recorded into `execution_time` at termination.
    pub async fn run(&self, mut state: ResearchState) -> Result<ResearchState, WorkflowError> {
        let started = Instant::now();
        let mut loop_backs = 0usize;
        let mut current = Some(self.graph.entry());

        info!(query = %state.original_query, "Starting research workflow");

        while let Some(node_id) = current {
            let node = self
                .nodes
                .get(&node_id)
                .ok_or_else(|| WorkflowError::NodeNotRegistered {
                    node: node_id.to_string(),
                })?;

            debug!(node = %node_id, "Running workflow node");
            let update = node.run(&state).await?;
            state.apply(update);
            debug!(state = %state.summary(), "Node complete");

            let mut next = self.graph.next(node_id, &state);

            if node_id == NodeId::Reflect && next == Some(NodeId::Search) {
                loop_backs += 1;
                if loop_backs >= self.max_loop_iterations {
                    warn!(
                        loop_backs,
                        cap = self.max_loop_iterations,
                        "Loop iteration cap reached, forcing termination"
                    );
                    next = None;
                }
            }

            current = next;
        }

        state.execution_time = started.elapsed().as_secs_f64();
        info!(
            secs = state.execution_time,
            papers = state.analyzed_papers.len(),
            errors = state.error_count,
            "Research workflow finished"
        );

        Ok(state)
    }
}
