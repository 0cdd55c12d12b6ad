//! The seven workflow step nodes.
//!
//! Each node is a transformation from the current state to a partial update.
//! Expected external failures are absorbed here: the node increments
//! `error_count`, tags `current_step`, and lets the graph keep moving. `Err`
//! is reserved for the fatal paths (user abort, missing registration).

use crate::citations::build_citation_network;
use crate::config::{CitationConfig, ReflectionConfig, SearchConfig};
use crate::error::WorkflowError;
use crate::llm::LlmClient;
use crate::paper::{AnalyzedPaper, Source, deduplicate_papers, merge_paper_lists};
use crate::prompts::{
    ANALYSIS_SYSTEM_PROMPT, DECOMPOSITION_SYSTEM_PROMPT, PaperAnalysis, SYNTHESIS_SYSTEM_PROMPT,
    SubQueryList, analysis_prompt, decomposition_prompt, synthesis_prompt,
};
use crate::report::{extract_findings, extract_gaps};
use crate::sources::{CitationProvider, CitationRecord, SearchProvider};
use crate::workflow::state::{ResearchState, StateUpdate, StepTag};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

const DECOMPOSE_TEMPERATURE: f32 = 0.7;
const ANALYZE_TEMPERATURE: f32 = 0.3;
const SYNTHESIZE_TEMPERATURE: f32 = 0.5;

/// A single unit of work in the research graph.
#[async_trait]
pub trait StepNode: Send + Sync {
    /// Run against the current state and return the fields this step changes.
    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, WorkflowError>;
}

/// Outcome of presenting sub-queries to the human reviewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    /// Replacement sub-queries, one per reviewed query.
    ApproveWithEdits(Vec<String>),
    Reject,
}

/// The human interaction channel behind the approval gate.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn review(&self, sub_queries: &[String]) -> ApprovalDecision;
}

/// Approves everything as-is. Useful for tests and scripted runs.
pub struct AutoApproveHandler;

#[async_trait]
impl ApprovalHandler for AutoApproveHandler {
    async fn review(&self, _sub_queries: &[String]) -> ApprovalDecision {
        ApprovalDecision::Approve
    }
}

// ---------------------------------------------------------------------------
// Node 1: Decompose
// ---------------------------------------------------------------------------

/// Decomposes the research question into 3-5 focused sub-queries.
pub struct DecomposeNode {
    llm: Arc<LlmClient>,
}

impl DecomposeNode {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StepNode for DecomposeNode {
    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, WorkflowError> {
        info!(query = %state.original_query, "Decomposing research question");

        let prompt = decomposition_prompt(&state.original_query);
        match self
            .llm
            .generate_structured::<SubQueryList>(
                &prompt,
                DECOMPOSE_TEMPERATURE,
                Some(DECOMPOSITION_SYSTEM_PROMPT),
            )
            .await
        {
            Ok(result) => {
                info!(
                    count = result.queries.len(),
                    reasoning = %result.reasoning,
                    "Generated sub-queries"
                );
                Ok(StateUpdate {
                    sub_queries: Some(result.queries),
                    current_step: Some(StepTag::Decomposed),
                    ..Default::default()
                })
            }
            Err(e) => {
                warn!(error = %e, "Query decomposition failed");
                Ok(StateUpdate::step_error(
                    StepTag::ErrorDecomposition,
                    state.error_count,
                ))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Node 2: Approve (optional interrupt)
// ---------------------------------------------------------------------------

/// Suspends the run for human review of the sub-queries.
///
/// Absent entirely from the graph in automated mode. Rejection is the one
/// fatal path a step produces: it unwinds the whole run instead of being
/// folded into the error count.
pub struct ApproveNode {
    handler: Arc<dyn ApprovalHandler>,
}

impl ApproveNode {
    pub fn new(handler: Arc<dyn ApprovalHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl StepNode for ApproveNode {
    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, WorkflowError> {
        info!(count = state.sub_queries.len(), "Awaiting sub-query approval");

        match self.handler.review(&state.sub_queries).await {
            ApprovalDecision::Approve => {
                info!("Sub-queries approved");
                Ok(StateUpdate {
                    user_approved: Some(true),
                    current_step: Some(StepTag::Approved),
                    ..Default::default()
                })
            }
            ApprovalDecision::ApproveWithEdits(edited) => {
                if edited.len() != state.sub_queries.len() {
                    return Err(WorkflowError::InvalidEdit {
                        expected: state.sub_queries.len(),
                        got: edited.len(),
                    });
                }
                info!("Sub-queries edited and approved");
                Ok(StateUpdate {
                    sub_queries_edit: Some(edited),
                    user_approved: Some(true),
                    current_step: Some(StepTag::Approved),
                    ..Default::default()
                })
            }
            ApprovalDecision::Reject => {
                warn!("Sub-queries rejected by user");
                Err(WorkflowError::Aborted {
                    reason: "sub-queries rejected by user".to_string(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Node 3: Parallel Search
// ---------------------------------------------------------------------------

/// Searches both paper sources for every sub-query.
///
/// The two lookups for one sub-query run concurrently; sub-queries run
/// sequentially. A failed source contributes an empty result set for that
/// sub-query.
pub struct SearchNode {
    scholar: Arc<dyn SearchProvider>,
    arxiv: Arc<dyn SearchProvider>,
    config: SearchConfig,
}

impl SearchNode {
    pub fn new(
        scholar: Arc<dyn SearchProvider>,
        arxiv: Arc<dyn SearchProvider>,
        config: SearchConfig,
    ) -> Self {
        Self {
            scholar,
            arxiv,
            config,
        }
    }
}

#[async_trait]
impl StepNode for SearchNode {
    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, WorkflowError> {
        if state.sub_queries.is_empty() {
            warn!("No sub-queries to search");
            return Ok(StateUpdate {
                papers: Some(Vec::new()),
                ..StateUpdate::step_error(StepTag::ErrorSearch, state.error_count)
            });
        }

        info!(count = state.sub_queries.len(), "Searching paper sources");

        let mut all_papers = Vec::new();
        let mut failures = 0u32;

        for sub_query in &state.sub_queries {
            let (scholar_result, arxiv_result) = tokio::join!(
                self.scholar
                    .search(sub_query, self.config.scholar_limit, self.config.year_min),
                self.arxiv
                    .search(sub_query, self.config.arxiv_limit, self.config.year_min),
            );

            let scholar_papers = match scholar_result {
                Ok(papers) => papers,
                Err(e) => {
                    warn!(source = self.scholar.name(), query = %sub_query, error = %e, "Search failed");
                    failures += 1;
                    Vec::new()
                }
            };
            let arxiv_papers = match arxiv_result {
                Ok(papers) => papers,
                Err(e) => {
                    warn!(source = self.arxiv.name(), query = %sub_query, error = %e, "Search failed");
                    failures += 1;
                    Vec::new()
                }
            };

            let query_papers = merge_paper_lists(vec![scholar_papers, arxiv_papers]);
            info!(query = %sub_query, found = query_papers.len(), "Sub-query search complete");
            all_papers.extend(query_papers);
        }

        let unique = deduplicate_papers(all_papers);
        info!(total = unique.len(), "Search complete");

        Ok(StateUpdate {
            papers: Some(unique),
            current_step: Some(StepTag::Searched),
            error_count: (failures > 0).then(|| state.error_count + failures),
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Node 4: Analyze
// ---------------------------------------------------------------------------

/// Extracts structured analysis from every paper.
///
/// A per-paper failure keeps the paper with placeholder analysis; the batch
/// continues. The result is stably sorted by relevance descending.
pub struct AnalyzeNode {
    llm: Arc<LlmClient>,
}

impl AnalyzeNode {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StepNode for AnalyzeNode {
    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, WorkflowError> {
        info!(count = state.papers.len(), "Analyzing papers");

        let mut analyzed = Vec::with_capacity(state.papers.len());
        let mut failures = 0u32;

        for (i, paper) in state.papers.iter().enumerate() {
            info!(n = i + 1, total = state.papers.len(), title = %paper.title, "Analyzing paper");

            let prompt = analysis_prompt(paper, &state.original_query);
            match self
                .llm
                .generate_structured::<PaperAnalysis>(
                    &prompt,
                    ANALYZE_TEMPERATURE,
                    Some(ANALYSIS_SYSTEM_PROMPT),
                )
                .await
            {
                Ok(analysis) => analyzed.push(AnalyzedPaper {
                    paper: paper.clone(),
                    contribution: analysis.contribution,
                    methodology: analysis.methodology,
                    results: analysis.results,
                    limitations: analysis.limitations,
                    relevance_score: analysis.relevance_score,
                }),
                Err(e) => {
                    warn!(title = %paper.title, error = %e, "Paper analysis failed");
                    failures += 1;
                    analyzed.push(AnalyzedPaper::analysis_failed(paper.clone()));
                }
            }
        }

        // Stable sort: ties keep original order.
        analyzed.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

        info!(count = analyzed.len(), failures, "Analysis complete");

        Ok(StateUpdate {
            analyzed_papers: Some(analyzed),
            current_step: Some(StepTag::Analyzed),
            error_count: (failures > 0).then(|| state.error_count + failures),
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Node 5: Build Citation Network
// ---------------------------------------------------------------------------

/// Builds a citation graph from the citation-capable papers.
///
/// Fewer than two qualifying papers is a graceful no-op, not an error.
/// Individual fetch failures degrade to zeroed records and never block the
/// pipeline.
pub struct CitationNode {
    provider: Arc<dyn CitationProvider>,
    config: CitationConfig,
}

impl CitationNode {
    pub fn new(provider: Arc<dyn CitationProvider>, config: CitationConfig) -> Self {
        Self { provider, config }
    }
}

#[async_trait]
impl StepNode for CitationNode {
    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, WorkflowError> {
        // Only Semantic Scholar papers carry usable citation ids.
        let qualifying: Vec<&AnalyzedPaper> = state
            .analyzed_papers
            .iter()
            .filter(|p| p.paper.source == Source::SemanticScholar && !p.paper.id.is_empty())
            .collect();

        info!(count = qualifying.len(), "Building citation network");

        if qualifying.len() < 2 {
            warn!("Not enough citation-capable papers for a network");
            return Ok(StateUpdate {
                citation_network: Some(None),
                current_step: Some(StepTag::CitationsBuilt),
                ..Default::default()
            });
        }

        let mut records: Vec<(String, CitationRecord)> = Vec::new();
        let mut failures = 0u32;

        for analyzed in qualifying.iter().take(self.config.seed_papers) {
            let paper_id = &analyzed.paper.id;
            match self
                .provider
                .get_citations(
                    paper_id,
                    self.config.max_references,
                    self.config.max_citations,
                )
                .await
            {
                Ok(record) => records.push((paper_id.clone(), record)),
                Err(e) => {
                    warn!(paper_id = %paper_id, error = %e, "Citation fetch failed");
                    failures += 1;
                    records.push((paper_id.clone(), CitationRecord::zeroed()));
                }
            }
        }

        let network = build_citation_network(&records, self.config.top_k_influential);

        Ok(StateUpdate {
            citation_network: Some(Some(network)),
            current_step: Some(StepTag::CitationsBuilt),
            error_count: (failures > 0).then(|| state.error_count + failures),
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Node 6: Synthesize
// ---------------------------------------------------------------------------

/// Generates the final markdown report and scrapes findings/gaps from it.
pub struct SynthesizeNode {
    llm: Arc<LlmClient>,
    paper_limit: usize,
}

impl SynthesizeNode {
    pub fn new(llm: Arc<LlmClient>, paper_limit: usize) -> Self {
        Self { llm, paper_limit }
    }
}

#[async_trait]
impl StepNode for SynthesizeNode {
    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, WorkflowError> {
        info!(count = state.analyzed_papers.len(), "Synthesizing findings");

        let slice_end = self.paper_limit.min(state.analyzed_papers.len());
        let prompt = synthesis_prompt(
            &state.original_query,
            &state.analyzed_papers[..slice_end],
            state.analyzed_papers.len(),
            state.citation_network.as_ref(),
        );

        match self
            .llm
            .generate(&prompt, SYNTHESIZE_TEMPERATURE, Some(SYNTHESIS_SYSTEM_PROMPT))
            .await
        {
            Ok(report) => {
                let key_findings = extract_findings(&report);
                let research_gaps = extract_gaps(&report);
                info!(
                    findings = key_findings.len(),
                    gaps = research_gaps.len(),
                    chars = report.len(),
                    "Report generated"
                );
                Ok(StateUpdate {
                    final_report: Some(report),
                    key_findings: Some(key_findings),
                    research_gaps: Some(research_gaps),
                    current_step: Some(StepTag::Synthesized),
                    ..Default::default()
                })
            }
            Err(e) => {
                warn!(error = %e, "Report generation failed");
                Ok(StateUpdate {
                    final_report: Some("Error generating report".to_string()),
                    ..StateUpdate::step_error(StepTag::ErrorSynthesis, state.error_count)
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Node 7: Reflect
// ---------------------------------------------------------------------------

/// Pure decision step: continue searching or complete the run.
pub struct ReflectNode {
    thresholds: ReflectionConfig,
}

impl ReflectNode {
    pub fn new(thresholds: ReflectionConfig) -> Self {
        Self { thresholds }
    }
}

#[async_trait]
impl StepNode for ReflectNode {
    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, WorkflowError> {
        let papers_count = state.analyzed_papers.len();
        let high_relevance = state
            .analyzed_papers
            .iter()
            .filter(|p| p.relevance_score >= 4)
            .count();

        info!(
            papers = papers_count,
            high_relevance, "Reflecting on research quality"
        );

        let decision = if papers_count >= self.thresholds.min_papers
            && high_relevance >= self.thresholds.min_high_relevance
        {
            info!("Research quality sufficient");
            StepTag::Complete
        } else if papers_count >= self.thresholds.max_papers {
            // Hard cap to bound cost regardless of quality.
            info!("Maximum papers reached");
            StepTag::Complete
        } else if state.error_count > self.thresholds.max_errors {
            warn!(errors = state.error_count, "Too many errors, stopping");
            StepTag::Complete
        } else {
            info!("Need more papers");
            StepTag::Continue
        };

        Ok(StateUpdate::step(decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, SourceError};
    use crate::llm::MockLlmProvider;
    use crate::paper::Paper;
    use std::sync::Mutex;

    fn paper(id: &str, title: &str, source: Source) -> Paper {
        Paper {
            id: id.into(),
            source,
            title: title.into(),
            abstract_text: "An abstract.".into(),
            authors: vec!["A. Author".into()],
            year: Some(2024),
            citation_count: 1,
            url: String::new(),
            venue: String::new(),
            publication_date: String::new(),
            categories: Vec::new(),
            pdf_url: None,
            updated: None,
        }
    }

    fn analyzed(id: &str, source: Source, score: u8) -> AnalyzedPaper {
        AnalyzedPaper {
            paper: paper(id, &format!("Paper {}", id), source),
            contribution: "c".into(),
            methodology: "m".into(),
            results: "r".into(),
            limitations: String::new(),
            relevance_score: score,
        }
    }

    fn llm_with(responses: &[&str]) -> Arc<LlmClient> {
        let mock = Arc::new(MockLlmProvider::new());
        for r in responses {
            mock.queue_text(r);
        }
        Arc::new(LlmClient::new(mock, 2000))
    }

    fn failing_llm() -> Arc<LlmClient> {
        let mock = Arc::new(MockLlmProvider::new());
        for _ in 0..3 {
            mock.queue_error(LlmError::Connection {
                message: "down".into(),
            });
        }
        Arc::new(LlmClient::new(mock, 2000))
    }

    /// Search provider returning a fixed result or failing.
    struct StubSearch {
        name: String,
        papers: Vec<Paper>,
        fail: bool,
    }

    #[async_trait]
    impl SearchProvider for StubSearch {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
            _year_min: Option<i32>,
        ) -> Result<Vec<Paper>, SourceError> {
            if self.fail {
                Err(SourceError::Request {
                    provider: self.name.clone(),
                    message: "unreachable".into(),
                })
            } else {
                Ok(self.papers.clone())
            }
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    /// Citation provider with scripted records.
    struct StubCitations {
        records: Mutex<Vec<Result<CitationRecord, SourceError>>>,
    }

    impl StubCitations {
        fn new(records: Vec<Result<CitationRecord, SourceError>>) -> Self {
            Self {
                records: Mutex::new(records),
            }
        }
    }

    #[async_trait]
    impl CitationProvider for StubCitations {
        async fn get_citations(
            &self,
            _paper_id: &str,
            _max_refs: usize,
            _max_cites: usize,
        ) -> Result<CitationRecord, SourceError> {
            let mut records = self.records.lock().unwrap();
            if records.is_empty() {
                Ok(CitationRecord::zeroed())
            } else {
                records.remove(0)
            }
        }
    }

    struct RejectingHandler;

    #[async_trait]
    impl ApprovalHandler for RejectingHandler {
        async fn review(&self, _sub_queries: &[String]) -> ApprovalDecision {
            ApprovalDecision::Reject
        }
    }

    struct EditingHandler {
        edits: Vec<String>,
    }

    #[async_trait]
    impl ApprovalHandler for EditingHandler {
        async fn review(&self, _sub_queries: &[String]) -> ApprovalDecision {
            ApprovalDecision::ApproveWithEdits(self.edits.clone())
        }
    }

    // --- Decompose ---

    #[tokio::test]
    async fn test_decompose_success() {
        let llm = llm_with(&[
            r#"{"queries": ["vision transformers", "self-attention images", "ViT benchmarks"], "reasoning": "coverage"}"#,
        ]);
        let node = DecomposeNode::new(llm);
        let state = ResearchState::new("How are transformers used in vision?");

        let update = node.run(&state).await.unwrap();
        assert_eq!(update.sub_queries.as_ref().unwrap().len(), 3);
        assert_eq!(update.current_step, Some(StepTag::Decomposed));
        assert!(update.error_count.is_none());
    }

    #[tokio::test]
    async fn test_decompose_failure_tags_error_and_leaves_queries() {
        let node = DecomposeNode::new(failing_llm());
        let state = ResearchState::new("q");

        let update = node.run(&state).await.unwrap();
        assert!(update.sub_queries.is_none());
        assert_eq!(update.current_step, Some(StepTag::ErrorDecomposition));
        assert_eq!(update.error_count, Some(1));
    }

    // --- Approve ---

    #[tokio::test]
    async fn test_approve_as_is() {
        let node = ApproveNode::new(Arc::new(AutoApproveHandler));
        let mut state = ResearchState::new("q");
        state.sub_queries = vec!["a".into(), "b".into(), "c".into()];

        let update = node.run(&state).await.unwrap();
        assert_eq!(update.user_approved, Some(true));
        assert_eq!(update.current_step, Some(StepTag::Approved));
        assert!(update.sub_queries_edit.is_none());
    }

    #[tokio::test]
    async fn test_approve_with_edits() {
        let node = ApproveNode::new(Arc::new(EditingHandler {
            edits: vec!["x".into(), "y".into()],
        }));
        let mut state = ResearchState::new("q");
        state.sub_queries = vec!["a".into(), "b".into()];

        let update = node.run(&state).await.unwrap();
        assert_eq!(
            update.sub_queries_edit,
            Some(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(update.user_approved, Some(true));
    }

    #[tokio::test]
    async fn test_approve_edit_length_mismatch() {
        let node = ApproveNode::new(Arc::new(EditingHandler {
            edits: vec!["only one".into()],
        }));
        let mut state = ResearchState::new("q");
        state.sub_queries = vec!["a".into(), "b".into(), "c".into()];

        let result = node.run(&state).await;
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidEdit {
                expected: 3,
                got: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_reject_aborts() {
        let node = ApproveNode::new(Arc::new(RejectingHandler));
        let mut state = ResearchState::new("q");
        state.sub_queries = vec!["a".into()];

        let result = node.run(&state).await;
        assert!(matches!(result, Err(WorkflowError::Aborted { .. })));
    }

    // --- Search ---

    #[tokio::test]
    async fn test_search_merges_and_dedups_both_sources() {
        let scholar = Arc::new(StubSearch {
            name: "semantic_scholar".into(),
            papers: vec![
                paper("s1", "Shared Title", Source::SemanticScholar),
                paper("s2", "Scholar Only", Source::SemanticScholar),
            ],
            fail: false,
        });
        let arxiv = Arc::new(StubSearch {
            name: "arxiv".into(),
            papers: vec![paper("", "shared title", Source::Arxiv)],
            fail: false,
        });
        let node = SearchNode::new(scholar, arxiv, SearchConfig::default());
        let mut state = ResearchState::new("q");
        state.sub_queries = vec!["only query".into()];

        let update = node.run(&state).await.unwrap();
        let papers = update.papers.unwrap();
        assert_eq!(papers.len(), 2); // title dedup dropped the arXiv copy
        assert_eq!(update.current_step, Some(StepTag::Searched));
        assert!(update.error_count.is_none());
    }

    #[tokio::test]
    async fn test_search_tolerates_single_source_failure() {
        let scholar = Arc::new(StubSearch {
            name: "semantic_scholar".into(),
            papers: Vec::new(),
            fail: true,
        });
        let arxiv = Arc::new(StubSearch {
            name: "arxiv".into(),
            papers: vec![paper("a1", "Arxiv Paper", Source::Arxiv)],
            fail: false,
        });
        let node = SearchNode::new(scholar, arxiv, SearchConfig::default());
        let mut state = ResearchState::new("q");
        state.sub_queries = vec!["one".into(), "two".into()];

        let update = node.run(&state).await.unwrap();
        // The surviving source's papers come through; dedup collapses the
        // identical result across the two sub-queries.
        assert_eq!(update.papers.unwrap().len(), 1);
        assert_eq!(update.current_step, Some(StepTag::Searched));
        // One failure per sub-query for the dead source.
        assert_eq!(update.error_count, Some(2));
    }

    #[tokio::test]
    async fn test_search_no_sub_queries_is_error_not_abort() {
        let scholar = Arc::new(StubSearch {
            name: "semantic_scholar".into(),
            papers: Vec::new(),
            fail: false,
        });
        let arxiv = Arc::new(StubSearch {
            name: "arxiv".into(),
            papers: Vec::new(),
            fail: false,
        });
        let node = SearchNode::new(scholar, arxiv, SearchConfig::default());
        let state = ResearchState::new("q");

        let update = node.run(&state).await.unwrap();
        assert!(update.papers.as_ref().is_some_and(|p| p.is_empty()));
        assert_eq!(update.current_step, Some(StepTag::ErrorSearch));
        assert_eq!(update.error_count, Some(1));
    }

    // --- Analyze ---

    #[tokio::test]
    async fn test_analyze_sorts_by_relevance_descending() {
        let llm = llm_with(&[
            r#"{"contribution": "low", "methodology": "m", "results": "r", "relevance_score": 2}"#,
            r#"{"contribution": "high", "methodology": "m", "results": "r", "relevance_score": 5}"#,
            r#"{"contribution": "mid", "methodology": "m", "results": "r", "relevance_score": 3}"#,
        ]);
        let node = AnalyzeNode::new(llm);
        let mut state = ResearchState::new("q");
        state.papers = vec![
            paper("1", "First", Source::SemanticScholar),
            paper("2", "Second", Source::SemanticScholar),
            paper("3", "Third", Source::Arxiv),
        ];

        let update = node.run(&state).await.unwrap();
        let analyzed = update.analyzed_papers.unwrap();
        let scores: Vec<u8> = analyzed.iter().map(|p| p.relevance_score).collect();
        assert_eq!(scores, vec![5, 3, 2]);
        assert_eq!(update.current_step, Some(StepTag::Analyzed));
    }

    #[tokio::test]
    async fn test_analyze_per_paper_failure_keeps_paper() {
        let mock = Arc::new(MockLlmProvider::new());
        // First paper succeeds; second exhausts all structured attempts.
        mock.queue_text(
            r#"{"contribution": "ok", "methodology": "m", "results": "r", "relevance_score": 4}"#,
        );
        for _ in 0..3 {
            mock.queue_text("not json");
        }
        let llm = Arc::new(LlmClient::new(mock, 2000));
        let node = AnalyzeNode::new(llm);
        let mut state = ResearchState::new("q");
        state.papers = vec![
            paper("1", "Good", Source::SemanticScholar),
            paper("2", "Bad", Source::SemanticScholar),
        ];

        let update = node.run(&state).await.unwrap();
        let analyzed = update.analyzed_papers.unwrap();
        assert_eq!(analyzed.len(), 2);
        // Failed paper kept with placeholder analysis and default score.
        let failed = analyzed.iter().find(|p| p.paper.id == "2").unwrap();
        assert_eq!(failed.contribution, "Analysis failed");
        assert_eq!(failed.relevance_score, 3);
        assert_eq!(update.error_count, Some(1));
        assert_eq!(update.current_step, Some(StepTag::Analyzed));
    }

    // --- Citations ---

    #[tokio::test]
    async fn test_citation_node_too_few_papers_is_graceful() {
        let node = CitationNode::new(
            Arc::new(StubCitations::new(Vec::new())),
            CitationConfig::default(),
        );
        let mut state = ResearchState::new("q");
        state.analyzed_papers = vec![
            analyzed("s1", Source::SemanticScholar, 5),
            analyzed("", Source::SemanticScholar, 4), // no id, does not qualify
            analyzed("a1", Source::Arxiv, 5),         // wrong source
        ];

        let update = node.run(&state).await.unwrap();
        assert!(matches!(update.citation_network, Some(None)));
        assert_eq!(update.current_step, Some(StepTag::CitationsBuilt));
        assert!(update.error_count.is_none());
    }

    #[tokio::test]
    async fn test_citation_node_builds_network() {
        let record = CitationRecord {
            references: vec!["r1".into()],
            citations: vec!["c1".into()],
            influential_citation_count: 2,
        };
        let node = CitationNode::new(
            Arc::new(StubCitations::new(vec![Ok(record.clone()), Ok(record)])),
            CitationConfig::default(),
        );
        let mut state = ResearchState::new("q");
        state.analyzed_papers = vec![
            analyzed("s1", Source::SemanticScholar, 5),
            analyzed("s2", Source::SemanticScholar, 4),
        ];

        let update = node.run(&state).await.unwrap();
        let network = update.citation_network.unwrap().unwrap();
        assert!(network.is_consistent());
        // s1, s2, r1, c1
        assert_eq!(network.node_count, 4);
        assert_eq!(network.most_influential.len(), 2);
        assert_eq!(update.current_step, Some(StepTag::CitationsBuilt));
    }

    #[tokio::test]
    async fn test_citation_fetch_failure_degrades_and_counts() {
        let record = CitationRecord {
            references: vec!["r1".into()],
            citations: Vec::new(),
            influential_citation_count: 0,
        };
        let node = CitationNode::new(
            Arc::new(StubCitations::new(vec![
                Ok(record),
                Err(SourceError::Status {
                    provider: "semantic_scholar".into(),
                    status: 503,
                }),
            ])),
            CitationConfig::default(),
        );
        let mut state = ResearchState::new("q");
        state.analyzed_papers = vec![
            analyzed("s1", Source::SemanticScholar, 5),
            analyzed("s2", Source::SemanticScholar, 4),
        ];

        let update = node.run(&state).await.unwrap();
        let network = update.citation_network.unwrap().unwrap();
        // Failed paper still appears as an isolated node.
        assert!(network.nodes.contains(&"s2".to_string()));
        assert_eq!(update.error_count, Some(1));
        assert_eq!(update.current_step, Some(StepTag::CitationsBuilt));
    }

    // --- Synthesize ---

    #[tokio::test]
    async fn test_synthesize_extracts_sections() {
        let report = "## Key Findings\n- finding a\n- finding b\n\n## Research Gaps\n- gap a\n";
        let llm = llm_with(&[report]);
        let node = SynthesizeNode::new(llm, 15);
        let mut state = ResearchState::new("q");
        state.analyzed_papers = vec![analyzed("1", Source::SemanticScholar, 4)];

        let update = node.run(&state).await.unwrap();
        assert_eq!(update.final_report.as_deref(), Some(report));
        assert_eq!(
            update.key_findings,
            Some(vec!["finding a".to_string(), "finding b".to_string()])
        );
        assert_eq!(update.research_gaps, Some(vec!["gap a".to_string()]));
        assert_eq!(update.current_step, Some(StepTag::Synthesized));
    }

    #[tokio::test]
    async fn test_synthesize_failure_produces_error_report() {
        let node = SynthesizeNode::new(failing_llm(), 15);
        let mut state = ResearchState::new("q");
        state.analyzed_papers = vec![analyzed("1", Source::SemanticScholar, 4)];

        let update = node.run(&state).await.unwrap();
        assert_eq!(update.final_report.as_deref(), Some("Error generating report"));
        assert_eq!(update.current_step, Some(StepTag::ErrorSynthesis));
        assert_eq!(update.error_count, Some(1));
    }

    // --- Reflect ---

    fn reflect_state(total: usize, high: usize, errors: u32) -> ResearchState {
        let mut state = ResearchState::new("q");
        for i in 0..total {
            let score = if i < high { 5 } else { 2 };
            state
                .analyzed_papers
                .push(analyzed(&i.to_string(), Source::SemanticScholar, score));
        }
        state.error_count = errors;
        state
    }

    #[tokio::test]
    async fn test_reflect_quality_stop() {
        let node = ReflectNode::new(ReflectionConfig::default());
        // 12 papers, 6 high relevance
        let update = node.run(&reflect_state(12, 6, 0)).await.unwrap();
        assert_eq!(update.current_step, Some(StepTag::Complete));
    }

    #[tokio::test]
    async fn test_reflect_continues_when_insufficient() {
        let node = ReflectNode::new(ReflectionConfig::default());
        // 8 papers, 2 high relevance, no errors
        let update = node.run(&reflect_state(8, 2, 0)).await.unwrap();
        assert_eq!(update.current_step, Some(StepTag::Continue));
    }

    #[tokio::test]
    async fn test_reflect_hard_cap() {
        let node = ReflectNode::new(ReflectionConfig::default());
        // 21 papers, zero high relevance
        let update = node.run(&reflect_state(21, 0, 0)).await.unwrap();
        assert_eq!(update.current_step, Some(StepTag::Complete));
    }

    #[tokio::test]
    async fn test_reflect_error_budget_stop() {
        let node = ReflectNode::new(ReflectionConfig::default());
        let update = node.run(&reflect_state(3, 0, 4)).await.unwrap();
        assert_eq!(update.current_step, Some(StepTag::Complete));
    }

    #[tokio::test]
    async fn test_reflect_terminates_for_growing_papers() {
        // For any monotonically growing analyzed set, the >= 20 cap bounds
        // the number of Continue decisions.
        let node = ReflectNode::new(ReflectionConfig::default());
        let mut continues = 0;
        for total in (0..40).step_by(4) {
            let update = node.run(&reflect_state(total, 0, 0)).await.unwrap();
            if update.current_step == Some(StepTag::Continue) {
                continues += 1;
            }
        }
        assert!(continues <= 5); // only while total < 20
    }
}
