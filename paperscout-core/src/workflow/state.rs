//! Research state, partial updates, and the per-field merge policy.
//!
//! The state is the single record threaded through the whole run. Steps
//! never mutate it directly: each returns a [`StateUpdate`] carrying only
//! the fields it changes, and [`ResearchState::apply`] owns the merge.

use crate::citations::CitationNetwork;
use crate::error::WorkflowError;
use crate::paper::{AnalyzedPaper, Paper};
use serde::{Deserialize, Serialize};

/// Phase tag recorded after every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTag {
    Start,
    Decomposed,
    Approved,
    Searched,
    Analyzed,
    CitationsBuilt,
    Synthesized,
    /// Reflection decided the research is sufficient.
    Complete,
    /// Reflection decided more papers are needed.
    Continue,
    ErrorDecomposition,
    ErrorSearch,
    ErrorAnalysis,
    ErrorSynthesis,
}

impl StepTag {
    /// Whether this tag marks a failed step.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            StepTag::ErrorDecomposition
                | StepTag::ErrorSearch
                | StepTag::ErrorAnalysis
                | StepTag::ErrorSynthesis
        )
    }
}

impl std::fmt::Display for StepTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepTag::Start => "start",
            StepTag::Decomposed => "decomposed",
            StepTag::Approved => "approved",
            StepTag::Searched => "searched",
            StepTag::Analyzed => "analyzed",
            StepTag::CitationsBuilt => "citations_built",
            StepTag::Synthesized => "synthesized",
            StepTag::Complete => "complete",
            StepTag::Continue => "continue",
            StepTag::ErrorDecomposition => "error_decomposition",
            StepTag::ErrorSearch => "error_search",
            StepTag::ErrorAnalysis => "error_analysis",
            StepTag::ErrorSynthesis => "error_synthesis",
        };
        write!(f, "{}", s)
    }
}

/// How a field's value is merged when an update carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// New sequence is concatenated onto the current one, order preserved,
    /// no deduplication at merge time.
    Append,
    /// New value overwrites the old.
    Replace,
}

/// Declared merge policy per state field.
pub fn field_policies() -> &'static [(&'static str, MergePolicy)] {
    &[
        ("original_query", MergePolicy::Replace),
        ("sub_queries", MergePolicy::Append),
        ("sub_queries_edit", MergePolicy::Replace),
        ("user_approved", MergePolicy::Replace),
        ("papers", MergePolicy::Append),
        ("analyzed_papers", MergePolicy::Append),
        ("citation_network", MergePolicy::Replace),
        ("key_findings", MergePolicy::Replace),
        ("research_gaps", MergePolicy::Replace),
        ("final_report", MergePolicy::Replace),
        ("current_step", MergePolicy::Replace),
        ("error_count", MergePolicy::Replace),
        ("execution_time", MergePolicy::Replace),
    ]
}

/// The central state record for one research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResearchState {
    /// The user's original research question. Written once at creation.
    pub original_query: String,
    /// Decomposed search phrases. Accumulates across decompositions.
    pub sub_queries: Vec<String>,
    /// Whether the human approved the sub-queries.
    pub user_approved: bool,
    /// Accumulated papers from all searches (deduplicated before storage).
    pub papers: Vec<Paper>,
    /// Papers with extracted analysis, sorted by relevance.
    pub analyzed_papers: Vec<AnalyzedPaper>,
    pub citation_network: Option<CitationNetwork>,
    pub key_findings: Vec<String>,
    pub research_gaps: Vec<String>,
    pub final_report: String,
    /// Most recently completed or failed phase.
    pub current_step: StepTag,
    /// Errors encountered so far. Only ever increases.
    pub error_count: u32,
    /// Wall-clock duration in seconds, set by the executor at termination.
    pub execution_time: f64,
}

impl ResearchState {
    /// Create the initial state for a research query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            original_query: query.into(),
            sub_queries: Vec::new(),
            user_approved: false,
            papers: Vec::new(),
            analyzed_papers: Vec::new(),
            citation_network: None,
            key_findings: Vec::new(),
            research_gaps: Vec::new(),
            final_report: String::new(),
            current_step: StepTag::Start,
            error_count: 0,
            execution_time: 0.0,
        }
    }

    /// Merge a partial update into this state according to the per-field
    /// policy: appending fields concatenate, replacing fields overwrite,
    /// absent fields are untouched.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(queries) = update.sub_queries {
            self.sub_queries.extend(queries);
        }
        if let Some(edited) = update.sub_queries_edit {
            self.sub_queries = edited;
        }
        if let Some(approved) = update.user_approved {
            self.user_approved = approved;
        }
        if let Some(papers) = update.papers {
            self.papers.extend(papers);
        }
        if let Some(analyzed) = update.analyzed_papers {
            self.analyzed_papers.extend(analyzed);
        }
        if let Some(network) = update.citation_network {
            self.citation_network = network;
        }
        if let Some(findings) = update.key_findings {
            self.key_findings = findings;
        }
        if let Some(gaps) = update.research_gaps {
            self.research_gaps = gaps;
        }
        if let Some(report) = update.final_report {
            self.final_report = report;
        }
        if let Some(step) = update.current_step {
            self.current_step = step;
        }
        if let Some(errors) = update.error_count {
            self.error_count = errors;
        }
        if let Some(secs) = update.execution_time {
            self.execution_time = secs;
        }
    }

    /// Human-readable one-line summary for logs.
    pub fn summary(&self) -> String {
        let query: String = self.original_query.chars().take(50).collect();
        format!(
            "Step: {} | Query: \"{}\" | Sub-queries: {} | Papers: {} | Analyzed: {} | Errors: {}",
            self.current_step,
            query,
            self.sub_queries.len(),
            self.papers.len(),
            self.analyzed_papers.len(),
            self.error_count,
        )
    }
}

/// A partial state update produced by one step.
///
/// Every field is optional; absent fields leave the state untouched. The
/// approval step's wholesale edit travels in `sub_queries_edit` (replace
/// policy) so `sub_queries` itself stays a pure append field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateUpdate {
    pub sub_queries: Option<Vec<String>>,
    pub sub_queries_edit: Option<Vec<String>>,
    pub user_approved: Option<bool>,
    pub papers: Option<Vec<Paper>>,
    pub analyzed_papers: Option<Vec<AnalyzedPaper>>,
    pub citation_network: Option<Option<CitationNetwork>>,
    pub key_findings: Option<Vec<String>>,
    pub research_gaps: Option<Vec<String>>,
    pub final_report: Option<String>,
    pub current_step: Option<StepTag>,
    pub error_count: Option<u32>,
    pub execution_time: Option<f64>,
}

impl StateUpdate {
    /// Shorthand for the common "advance the step tag" update.
    pub fn step(tag: StepTag) -> Self {
        Self {
            current_step: Some(tag),
            ..Default::default()
        }
    }

    /// Shorthand for a failed step: error tag plus incremented count.
    pub fn step_error(tag: StepTag, previous_errors: u32) -> Self {
        Self {
            current_step: Some(tag),
            error_count: Some(previous_errors + 1),
            ..Default::default()
        }
    }

    /// Parse an update from JSON, rejecting unknown fields.
    ///
    /// This is the schema-violation boundary for externally-shaped updates
    /// (checkpoint restores, tooling). In-process updates are typed and
    /// cannot carry unknown keys.
    pub fn from_json(value: serde_json::Value) -> Result<Self, WorkflowError> {
        serde_json::from_value(value).map_err(|e| WorkflowError::UnknownStateField {
            message: e.to_string(),
        })
    }
}
