//! Configuration system for Paperscout.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> environment. Configuration is loaded from
//! `~/.config/paperscout/config.toml` and/or `.paperscout/config.toml` in the
//! workspace directory, with `PAPERSCOUT_`-prefixed environment overrides.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for the Paperscout agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub citations: CitationConfig,
    pub workflow: WorkflowConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "openrouter", "anthropic", or any OpenAI-compatible endpoint.
    pub provider: String,
    /// Model identifier (e.g., "deepseek/deepseek-r1").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Fallback providers tried in order if the primary fails.
    #[serde(default)]
    pub fallback_providers: Vec<FallbackProviderConfig>,
    /// Retry policy for transient provider errors.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: "deepseek/deepseek-r1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            base_url: None,
            max_tokens: 2000,
            temperature: 0.7,
            fallback_providers: vec![FallbackProviderConfig {
                provider: "anthropic".to_string(),
                model: "claude-sonnet-4-5".to_string(),
                api_key_env: "ANTHROPIC_API_KEY".to_string(),
                base_url: None,
            }],
            retry: RetryConfig::default(),
        }
    }
}

/// Configuration for a fallback LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackProviderConfig {
    /// Provider name: "openrouter", "anthropic", etc.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Retry policy with exponential backoff and jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial call.
    pub max_retries: u32,
    /// Initial backoff delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Multiplier applied to the backoff on each retry.
    pub backoff_multiplier: f64,
    /// Whether to add random jitter (up to 25%) to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Paper search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Papers requested from Semantic Scholar per sub-query.
    pub scholar_limit: usize,
    /// Papers requested from arXiv per sub-query.
    pub arxiv_limit: usize,
    /// Minimum publication year, if any.
    pub year_min: Option<i32>,
    /// Environment variable holding the optional Semantic Scholar API key.
    pub scholar_api_key_env: String,
    /// Retry policy for search and citation requests.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            scholar_limit: 5,
            arxiv_limit: 3,
            year_min: Some(2022),
            scholar_api_key_env: "SEMANTIC_SCHOLAR_API_KEY".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

/// Citation network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    /// Maximum references fetched per paper.
    pub max_references: usize,
    /// Maximum citing papers fetched per paper.
    pub max_citations: usize,
    /// Number of top-relevance papers seeded into the network.
    pub seed_papers: usize,
    /// Size of the ranked "most influential" list.
    pub top_k_influential: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            max_references: 10,
            max_citations: 10,
            seed_papers: 10,
            top_k_influential: 5,
        }
    }
}

/// Workflow orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Whether the human-approval gate is present in the graph.
    pub enable_approval: bool,
    /// Hard cap on reflect -> search loop-backs. The reflection thresholds
    /// are the primary stop condition; this is defensive hardening against
    /// a broken decision function.
    pub max_loop_iterations: usize,
    /// Number of analyzed papers fed into the synthesis prompt.
    pub synthesis_paper_limit: usize,
    /// Reflection stop thresholds.
    #[serde(default)]
    pub reflection: ReflectionConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enable_approval: true,
            max_loop_iterations: 8,
            synthesis_paper_limit: 15,
            reflection: ReflectionConfig::default(),
        }
    }
}

/// Thresholds for the reflection step's continue/complete decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionConfig {
    /// Minimum analyzed papers for a quality-based stop.
    pub min_papers: usize,
    /// Minimum papers with relevance >= 4 for a quality-based stop.
    pub min_high_relevance: usize,
    /// Hard cap on analyzed papers regardless of quality.
    pub max_papers: usize,
    /// Error budget; exceeding it forces completion.
    pub max_errors: u32,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            min_papers: 10,
            min_high_relevance: 5,
            max_papers: 20,
            max_errors: 3,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `PAPERSCOUT_`)
/// 3. Workspace-local config (`.paperscout/config.toml`)
/// 4. User config (`~/.config/paperscout/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&AgentConfig>,
) -> Result<AgentConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AgentConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "paperscout", "paperscout") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".paperscout").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (PAPERSCOUT_LLM__MODEL, PAPERSCOUT_SEARCH__YEAR_MIN, etc.)
    figment = figment.merge(Env::prefixed("PAPERSCOUT_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
