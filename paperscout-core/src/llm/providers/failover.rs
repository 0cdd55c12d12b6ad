//! Multi-provider failover with circuit breaker protection.
//!
//! Tries providers in priority order, skipping any whose circuit breaker is
//! open, and recovers automatically via a half-open probe state. This is the
//! mechanism behind the "primary model with automatic fallback" behavior.

use crate::error::LlmError;
use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    /// Normal operation: calls are permitted.
    Closed,
    /// Too many failures: calls are blocked.
    Open { since: Instant },
    /// Recovery probe: one call is permitted to test the provider.
    HalfOpen,
}

/// A circuit breaker that trips after consecutive failures and recovers
/// after a timeout.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: usize,
    failure_threshold: usize,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: usize, recovery_timeout: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            failure_threshold,
            recovery_timeout,
        }
    }

    /// Whether a call is currently permitted.
    pub fn is_call_permitted(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open { since } => {
                if since.elapsed() >= self.recovery_timeout {
                    debug!("Circuit breaker transitioning to half-open");
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    /// Record a successful call.
    pub fn record_success(&mut self) {
        self.failure_count = 0;
        if self.state == CircuitState::HalfOpen {
            debug!("Circuit breaker closing after successful probe");
        }
        self.state = CircuitState::Closed;
    }

    /// Record a failed call.
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        if self.failure_count >= self.failure_threshold {
            warn!(
                failures = self.failure_count,
                threshold = self.failure_threshold,
                "Circuit breaker opening"
            );
            self.state = CircuitState::Open {
                since: Instant::now(),
            };
        }
    }

    /// Get the current state.
    pub fn state(&self) -> CircuitState {
        self.state
    }
}

/// A provider with its circuit breaker.
struct ProviderEntry {
    provider: Arc<dyn LlmProvider>,
    circuit_breaker: Mutex<CircuitBreaker>,
}

/// An LLM provider that tries multiple backends in priority order,
/// skipping providers with open circuit breakers.
pub struct FailoverProvider {
    providers: Vec<ProviderEntry>,
}

impl FailoverProvider {
    /// Create a new FailoverProvider.
    ///
    /// Providers are tried in the order given. The first provider is the primary.
    pub fn new(
        providers: Vec<Arc<dyn LlmProvider>>,
        failure_threshold: usize,
        recovery_timeout: Duration,
    ) -> Self {
        let entries = providers
            .into_iter()
            .map(|provider| ProviderEntry {
                provider,
                circuit_breaker: Mutex::new(CircuitBreaker::new(
                    failure_threshold,
                    recovery_timeout,
                )),
            })
            .collect();

        Self { providers: entries }
    }

    /// Get the primary (first) provider.
    fn primary(&self) -> &dyn LlmProvider {
        &*self.providers[0].provider
    }
}

#[async_trait]
impl LlmProvider for FailoverProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut last_error = None;

        for (i, entry) in self.providers.iter().enumerate() {
            let mut cb = entry.circuit_breaker.lock().await;
            if !cb.is_call_permitted() {
                debug!(provider_index = i, "Skipping provider, circuit open");
                continue;
            }
            drop(cb); // release lock before making the call

            match entry.provider.complete(request.clone()).await {
                Ok(response) => {
                    let mut cb = entry.circuit_breaker.lock().await;
                    cb.record_success();
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        provider_index = i,
                        model = entry.provider.model_name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    let mut cb = entry.circuit_breaker.lock().await;
                    cb.record_failure();
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(LlmError::Connection {
            message: "All providers failed or circuits open".into(),
        }))
    }

    fn model_name(&self) -> &str {
        self.primary().model_name()
    }
}
