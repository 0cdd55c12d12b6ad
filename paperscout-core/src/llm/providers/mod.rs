//! LLM provider implementations.
//!
//! Concrete implementations of the `LlmProvider` trait:
//! - OpenAI-compatible chat completions (OpenRouter, OpenAI, local endpoints)
//! - Anthropic Messages API
//!
//! Use `create_provider()` to instantiate a provider from config; when
//! fallbacks are configured the result is wrapped in a `FailoverProvider`
//! with circuit breaker protection.

pub mod anthropic;
pub mod failover;
pub mod openai_compat;

use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use crate::llm::LlmProvider;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use anthropic::AnthropicProvider;
pub use failover::{CircuitBreaker, CircuitState, FailoverProvider};
pub use openai_compat::OpenAiCompatibleProvider;

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// Retries on `LlmError::RateLimited` (respects `retry_after_secs`),
/// `LlmError::Connection`, and `LlmError::Timeout`. Permanent errors
/// (auth, parse) return immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, LlmError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !is_retryable(&e) || attempt == config.max_retries {
                    return Err(e);
                }

                let backoff_ms = compute_backoff(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient LLM error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| LlmError::Connection {
        message: "All retry attempts exhausted".to_string(),
    }))
}

/// Check if an error is retryable (transient).
fn is_retryable(err: &LlmError) -> bool {
    matches!(
        err,
        LlmError::RateLimited { .. } | LlmError::Connection { .. } | LlmError::Timeout { .. }
    )
}

/// Compute backoff delay, respecting rate limit retry-after hints.
fn compute_backoff(config: &RetryConfig, attempt: u32, err: &LlmError) -> u64 {
    if let LlmError::RateLimited { retry_after_secs } = err {
        let server_ms = retry_after_secs * 1000;
        let computed = compute_exponential_backoff(config, attempt);
        return server_ms.max(computed);
    }
    compute_exponential_backoff(config, attempt)
}

/// Pure exponential backoff with optional jitter.
fn compute_exponential_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        // Up to 25% jitter to avoid thundering herds
        let jitter = (capped as f64 * rand::thread_rng().gen_range(0.0..0.25)) as u64;
        capped + jitter
    } else {
        capped
    }
}

/// Resolve the API key for a provider from its configured environment variable.
pub fn resolve_api_key(api_key_env: &str, provider: &str) -> Result<String, LlmError> {
    std::env::var(api_key_env).map_err(|_| LlmError::AuthFailed {
        provider: format!("{} (env var '{}' not set)", provider, api_key_env),
    })
}

/// Create a single LLM provider based on the configuration.
fn create_single_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicProvider::new(config)?)),
        _ => Ok(Arc::new(OpenAiCompatibleProvider::new(config)?)),
    }
}

/// Create an LLM provider based on the configuration.
///
/// Routes to the appropriate provider implementation:
/// - `"anthropic"` -> `AnthropicProvider` (native Anthropic Messages API)
/// - Everything else -> `OpenAiCompatibleProvider` (OpenRouter, OpenAI, local)
///
/// If `fallback_providers` are configured, wraps in a `FailoverProvider` that
/// tries providers in priority order with circuit breaker protection.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let primary = create_single_provider(config)?;

    if config.fallback_providers.is_empty() {
        return Ok(primary);
    }

    // Build fallback providers, logging warnings for any that fail to initialize
    let mut providers: Vec<Arc<dyn LlmProvider>> = vec![primary];
    for fallback_config in &config.fallback_providers {
        let fb_llm_config = LlmConfig {
            provider: fallback_config.provider.clone(),
            model: fallback_config.model.clone(),
            api_key_env: fallback_config.api_key_env.clone(),
            base_url: fallback_config.base_url.clone(),
            ..config.clone()
        };
        match create_single_provider(&fb_llm_config) {
            Ok(p) => providers.push(p),
            Err(e) => {
                tracing::warn!(
                    provider = %fallback_config.provider,
                    model = %fallback_config.model,
                    error = %e,
                    "Skipping fallback provider that failed to initialize"
                );
            }
        }
    }

    if providers.len() == 1 {
        // All fallbacks failed to initialize, just return primary
        return Ok(providers.remove(0));
    }

    Ok(Arc::new(FailoverProvider::new(
        providers,
        5,                       // open circuit after 5 consecutive failures
        Duration::from_secs(60), // recovery timeout
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            model: "test-model".to_string(),
            api_key_env: "PAPERSCOUT_TEST_API_KEY".to_string(),
            base_url: None,
            max_tokens: 2000,
            temperature: 0.7,
            fallback_providers: Vec::new(),
            retry: RetryConfig::default(),
        }
    }

    #[test]
    fn test_create_provider_openrouter() {
        unsafe { std::env::set_var("PAPERSCOUT_TEST_API_KEY", "test-key-123") };
        let config = test_config("openrouter");
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "test-model");
        unsafe { std::env::remove_var("PAPERSCOUT_TEST_API_KEY") };
    }

    #[test]
    fn test_create_provider_anthropic() {
        unsafe { std::env::set_var("PAPERSCOUT_TEST_API_KEY", "test-key-456") };
        let config = test_config("anthropic");
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "test-model");
        unsafe { std::env::remove_var("PAPERSCOUT_TEST_API_KEY") };
    }

    #[test]
    fn test_create_provider_missing_key() {
        unsafe { std::env::remove_var("PAPERSCOUT_NONEXISTENT_KEY") };
        let mut config = test_config("openrouter");
        config.api_key_env = "PAPERSCOUT_NONEXISTENT_KEY".to_string();
        let result = create_provider(&config);
        match result {
            Err(LlmError::AuthFailed { provider }) => {
                assert!(provider.contains("PAPERSCOUT_NONEXISTENT_KEY"));
            }
            other => panic!("Expected AuthFailed, got {:?}", other.map(|p| p.model_name().to_string())),
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&LlmError::RateLimited {
            retry_after_secs: 30
        }));
        assert!(is_retryable(&LlmError::Connection {
            message: "reset".into()
        }));
        assert!(is_retryable(&LlmError::Timeout { timeout_secs: 30 }));
        assert!(!is_retryable(&LlmError::AuthFailed {
            provider: "test".into()
        }));
        assert!(!is_retryable(&LlmError::ResponseParse {
            message: "bad json".into()
        }));
    }

    #[test]
    fn test_compute_backoff_exponential() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(compute_exponential_backoff(&config, 0), 1000);
        assert_eq!(compute_exponential_backoff(&config, 1), 2000);
        assert_eq!(compute_exponential_backoff(&config, 2), 4000);
    }

    #[test]
    fn test_compute_backoff_respects_cap() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 3000,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(compute_exponential_backoff(&config, 2), 3000); // capped
    }

    #[test]
    fn test_compute_backoff_jitter_bounds() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: true,
        };
        for _ in 0..20 {
            let backoff = compute_exponential_backoff(&config, 0);
            assert!((1000..=1250).contains(&backoff));
        }
    }

    #[test]
    fn test_compute_backoff_rate_limit_uses_server_value() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        let err = LlmError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(compute_backoff(&config, 0, &err), 30_000);
    }

    #[tokio::test]
    async fn test_with_retry_succeeds_first_try() {
        let config = RetryConfig::default();
        let result = with_retry(&config, || async { Ok::<_, LlmError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_retry_permanent_error_no_retry() {
        let config = RetryConfig {
            max_retries: 3,
            ..Default::default()
        };
        let call_count = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let cc = call_count.clone();
        let result = with_retry(&config, || {
            let cc = cc.clone();
            async move {
                cc.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err::<i32, _>(LlmError::AuthFailed {
                    provider: "test".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(call_count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_transient_then_success() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff_multiplier: 1.0,
            jitter: false,
        };
        let call_count = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let cc = call_count.clone();
        let result = with_retry(&config, || {
            let cc = cc.clone();
            async move {
                let n = cc.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n < 2 {
                    Err(LlmError::Connection {
                        message: "flaky".into(),
                    })
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(call_count.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
