//! High-level LLM client used by the workflow steps.
//!
//! Wraps an `LlmProvider` (usually a `FailoverProvider`) with the two calls
//! the pipeline needs: free-text generation and schema-validated structured
//! generation. Tracks call and token statistics across the run.

use crate::error::LlmError;
use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider, Message};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Attempts made to parse and validate structured output before giving up.
const STRUCTURED_MAX_ATTEMPTS: usize = 3;

/// System prompt used for structured generation when the caller has none.
const STRUCTURED_SYSTEM_PROMPT: &str =
    "You are a precise assistant that generates structured JSON output.";

/// A type that can be produced by structured generation.
///
/// Implementors supply a JSON schema that is embedded into the prompt and a
/// validation pass run after deserialization (range checks, length bounds).
pub trait StructuredOutput: DeserializeOwned {
    /// JSON schema describing the expected output shape.
    fn schema() -> serde_json::Value;

    /// Validate constraints the schema alone cannot express.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Usage statistics accumulated across a client's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LlmStats {
    /// Completed calls (including structured-generation retries).
    pub calls: u64,
    /// Calls that returned an error.
    pub errors: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl LlmStats {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// The single configured text-generation capability shared by every step.
///
/// Constructed once and passed explicitly into each step (dependency
/// injection) so steps stay independently testable with a mock provider.
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    max_tokens: usize,
    stats: Mutex<LlmStats>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, max_tokens: usize) -> Self {
        Self {
            provider,
            max_tokens,
            stats: Mutex::new(LlmStats::default()),
        }
    }

    /// Generate a free-text completion.
    pub async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        system_prompt: Option<&str>,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));

        let request = CompletionRequest {
            messages,
            temperature,
            max_tokens: self.max_tokens,
        };

        match self.provider.complete(request).await {
            Ok(response) => {
                self.record_success(&response);
                Ok(response.text)
            }
            Err(e) => {
                self.record_error();
                Err(e)
            }
        }
    }

    /// Generate output matching a structured schema.
    ///
    /// The schema is embedded in the prompt; the response is stripped of
    /// markdown fences, parsed, and validated. Parse/validation failures are
    /// retried up to [`STRUCTURED_MAX_ATTEMPTS`] times before surfacing
    /// `LlmError::SchemaValidation`.
    pub async fn generate_structured<T: StructuredOutput>(
        &self,
        prompt: &str,
        temperature: f32,
        system_prompt: Option<&str>,
    ) -> Result<T, LlmError> {
        let schema =
            serde_json::to_string_pretty(&T::schema()).map_err(|e| LlmError::ResponseParse {
                message: format!("Failed to render schema: {}", e),
            })?;

        let enhanced_prompt = format!(
            "{prompt}\n\nIMPORTANT: Respond with ONLY valid JSON matching this exact schema:\n\n\
             {schema}\n\nRequirements:\n\
             - Return pure JSON with no markdown code blocks\n\
             - All required fields must be present\n\
             - Types must match exactly\n\
             - No additional fields beyond the schema\n"
        );
        let system = system_prompt.unwrap_or(STRUCTURED_SYSTEM_PROMPT);

        let mut last_failure = String::new();
        for attempt in 1..=STRUCTURED_MAX_ATTEMPTS {
            debug!(attempt, max = STRUCTURED_MAX_ATTEMPTS, "Structured generation attempt");

            let text = self
                .generate(&enhanced_prompt, temperature, Some(system))
                .await?;
            let cleaned = strip_code_fences(&text);

            match serde_json::from_str::<T>(cleaned) {
                Ok(value) => match value.validate() {
                    Ok(()) => return Ok(value),
                    Err(msg) => {
                        warn!(attempt, error = %msg, "Structured output failed validation");
                        last_failure = msg;
                    }
                },
                Err(e) => {
                    warn!(attempt, error = %e, "Structured output failed to parse");
                    last_failure = e.to_string();
                }
            }
        }

        Err(LlmError::SchemaValidation {
            attempts: STRUCTURED_MAX_ATTEMPTS,
            message: last_failure,
        })
    }

    /// Snapshot of usage statistics.
    pub fn stats(&self) -> LlmStats {
        *self.stats.lock().unwrap()
    }

    /// The model name of the underlying (primary) provider.
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    fn record_success(&self, response: &CompletionResponse) {
        let mut stats = self.stats.lock().unwrap();
        stats.calls += 1;
        stats.input_tokens += response.usage.input_tokens;
        stats.output_tokens += response.usage.output_tokens;
    }

    fn record_error(&self) {
        let mut stats = self.stats.lock().unwrap();
        stats.calls += 1;
        stats.errors += 1;
    }
}

/// Strip a leading/trailing markdown code fence from a model response.
fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}
