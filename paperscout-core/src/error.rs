//! Error types for the Paperscout core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the LLM, paper-source, workflow, and configuration domains.

use std::path::PathBuf;

/// Top-level error type for the Paperscout core library.
#[derive(Debug, thiserror::Error)]
pub enum PaperscoutError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Structured output failed validation after {attempts} attempts: {message}")]
    SchemaValidation { attempts: usize, message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from paper-source clients (Semantic Scholar, arXiv).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} returned status {status}")]
    Status { provider: String, status: u16 },

    #[error("{provider} response parse error: {message}")]
    Parse { provider: String, message: String },
}

impl SourceError {
    /// HTTP status code if this error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SourceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the research workflow orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The user rejected the plan at the approval gate. Not caught by the
    /// executor's per-step handling; unwinds the whole run.
    #[error("Research aborted: {reason}")]
    Aborted { reason: String },

    #[error("Unknown state field in update: {message}")]
    UnknownStateField { message: String },

    #[error("Invalid sub-query edit: expected {expected} queries, got {got}")]
    InvalidEdit { expected: usize, got: usize },

    #[error("No step registered for graph node '{node}'")]
    NodeNotRegistered { node: String },

    #[error("Checkpoint error: {message}")]
    Checkpoint { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `PaperscoutError`.
pub type Result<T> = std::result::Result<T, PaperscoutError>;
