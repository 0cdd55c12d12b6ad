//! OpenAI-compatible LLM provider.
//!
//! Supports OpenRouter (the default primary endpoint), OpenAI, and any
//! endpoint that follows the OpenAI chat completions API format.

use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider, Message, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// The default OpenRouter API base URL.
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Request timeout for completion calls.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// OpenAI-compatible LLM provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryConfig,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider from configuration.
    ///
    /// Reads the API key from the environment variable specified in
    /// `config.api_key_env`. Returns `LlmError::AuthFailed` if unset.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = super::resolve_api_key(&config.api_key_env, "OpenAI-compatible")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("Paperscout/0.3")
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: config.model.clone(),
            retry: config.retry.clone(),
        })
    }

    fn messages_to_json(messages: &[Message]) -> Value {
        json!(
            messages
                .iter()
                .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
                .collect::<Vec<_>>()
        )
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed {
                provider: "OpenAI-compatible".to_string(),
            },
            429 => {
                // Try to honor a retry hint in the error message
                let retry_secs = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| {
                        v.get("error")?
                            .get("message")?
                            .as_str()
                            .map(|s| s.to_string())
                    })
                    .and_then(|msg| {
                        msg.split("in ")
                            .last()
                            .and_then(|s| s.trim_end_matches('s').parse::<u64>().ok())
                    })
                    .unwrap_or(5);
                LlmError::RateLimited {
                    retry_after_secs: retry_secs,
                }
            }
            s if s >= 500 => LlmError::Connection {
                message: format!("Server error ({}): {}", s, truncate(body, 200)),
            },
            s => LlmError::ApiRequest {
                message: format!("HTTP {}: {}", s, truncate(body, 200)),
            },
        }
    }

    fn parse_response(json: &Value, model: &str) -> Result<CompletionResponse, LlmError> {
        let text = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No message content in response".to_string(),
            })?
            .to_string();

        let usage = json
            .get("usage")
            .map(|u| TokenUsage {
                input_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
                output_tokens: u
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0),
            })
            .unwrap_or_default();

        let model = json
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_string();

        Ok(CompletionResponse { text, usage, model })
    }

    async fn complete_once(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": Self::messages_to_json(&request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false,
        });

        debug!(url = %url, model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_secs: REQUEST_TIMEOUT_SECS,
                    }
                } else {
                    LlmError::Connection {
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| LlmError::Connection {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON: {}", e),
            })?;

        Self::parse_response(&json, &self.model)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        super::with_retry(&self.retry, || self.complete_once(&request)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn make_provider() -> OpenAiCompatibleProvider {
        unsafe { std::env::set_var("PAPERSCOUT_OPENAI_TEST_KEY", "sk-test") };
        let config = LlmConfig {
            provider: "openrouter".into(),
            api_key_env: "PAPERSCOUT_OPENAI_TEST_KEY".into(),
            ..Default::default()
        };
        OpenAiCompatibleProvider::new(&config).unwrap()
    }

    #[test]
    fn test_default_base_url() {
        let provider = make_provider();
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.model_name(), "deepseek/deepseek-r1");
    }

    #[test]
    fn test_messages_to_json() {
        let messages = vec![Message::system("be terse"), Message::user("hello")];
        let json = OpenAiCompatibleProvider::messages_to_json(&messages);
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["role"], "system");
        assert_eq!(arr[1]["content"], "hello");
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "model": "deepseek/deepseek-r1",
            "choices": [{ "message": { "role": "assistant", "content": "42" } }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 2 }
        });
        let response = OpenAiCompatibleProvider::parse_response(&body, "fallback").unwrap();
        assert_eq!(response.text, "42");
        assert_eq!(response.usage.input_tokens, 10);
        assert_eq!(response.usage.output_tokens, 2);
        assert_eq!(response.model, "deepseek/deepseek-r1");
    }

    #[test]
    fn test_parse_response_missing_content() {
        let body = json!({ "choices": [] });
        let result = OpenAiCompatibleProvider::parse_response(&body, "m");
        assert!(matches!(result, Err(LlmError::ResponseParse { .. })));
    }

    #[test]
    fn test_map_http_error_auth() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::UNAUTHORIZED,
            "unauthorized",
        );
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[test]
    fn test_map_http_error_rate_limit_with_hint() {
        let body = r#"{"error": {"message": "Rate limit exceeded, try again in 12s"}}"#;
        let err =
            OpenAiCompatibleProvider::map_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, body);
        match err {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 12),
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_map_http_error_server_error_is_retryable() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::BAD_GATEWAY,
            "bad gateway",
        );
        assert!(matches!(err, LlmError::Connection { .. }));
    }
}
