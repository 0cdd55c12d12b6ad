//! Paperscout core: the research workflow orchestrator.
//!
//! Given a natural-language research question, the workflow decomposes it
//! into sub-queries, searches two academic sources, extracts structured
//! analysis per paper with an LLM, builds a citation network, and
//! synthesizes a markdown report. An explicit state machine sequences the
//! steps, with a reflection loop deciding between continuing the search and
//! completing, and an optional human-approval gate.
//!
//! Module map:
//! - [`workflow`]: state model, merge policy, step nodes, graph, executor
//! - [`llm`]: provider trait, concrete providers with failover, client
//! - [`paper`]: standardized paper records and deduplication
//! - [`citations`]: citation network construction and influence ranking
//! - [`sources`]: boundary traits for search and citation capabilities
//! - [`prompts`]: prompt builders and structured-output schemas
//! - [`report`]: section extraction from the synthesized report
//! - [`checkpoint`]: atomic save/restore of the research state
//! - [`config`], [`error`]: layered configuration and typed errors

pub mod checkpoint;
pub mod citations;
pub mod config;
pub mod error;
pub mod llm;
pub mod paper;
pub mod prompts;
pub mod report;
pub mod sources;
pub mod workflow;

pub use citations::{CitationNetwork, PaperCitationStats, build_citation_network};
pub use config::{AgentConfig, load_config};
pub use error::{ConfigError, LlmError, PaperscoutError, Result, SourceError, WorkflowError};
pub use llm::{LlmClient, LlmProvider, MockLlmProvider, providers::create_provider};
pub use paper::{AnalyzedPaper, Paper, Source, deduplicate_papers, merge_paper_lists};
pub use sources::{CitationProvider, CitationRecord, SearchProvider};
pub use workflow::{
    ApprovalDecision, ApprovalHandler, ResearchState, StateUpdate, StepTag, WorkflowExecutor,
    create_research_workflow,
};
