//! Provider adapter implementations.
//!
//! | Adapter | Coverage | Transport |
//! |---------|----------|-----------|
//! | [`KairosAdapter`] | Ghana | JSON over HTTPS, key/secret headers |
//! | [`AfricasTalkingAdapter`] | Configured countries | Form POST, `apiKey` header |
//! | [`TwilioAdapter`] | Configured countries (usually `*`) | Form POST, basic auth |
//! | [`MockAdapter`] | Anything | None, scripted outcomes for tests |
//!
//! The HTTP adapters share [`Upstream`], which applies the per-adapter rate
//! gate, circuit breaker, and retry policy around every upstream call.

mod africastalking;
mod kairos;
mod mock;
mod twilio;

use std::sync::Arc;
use std::time::Instant;

pub use africastalking::AfricasTalkingAdapter;
pub use kairos::KairosAdapter;
pub use mock::{MockAdapter, MockReply};
pub use twilio::TwilioAdapter;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::config::{ProviderConfig, ProviderKind};
use crate::domain::{codes, ProviderCapabilities, SendOutcome, SendStatus};
use crate::error::{ConfigError, ProviderError, ValidationError};
use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::provider::ProviderAdapter;
use crate::retry::RetryConfig;
use crate::stats::ProviderStats;
use crate::throttling::RateGate;

/// Build a real adapter from one `[[providers]]` entry.
pub fn build_adapter(
    config: &ProviderConfig,
    http_client: Arc<dyn HttpClient>,
) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    let capabilities = config.capabilities()?;
    let rate_limit = config.rate_limit_per_minute.unwrap_or(0);

    let adapter: Arc<dyn ProviderAdapter> = match config.kind {
        ProviderKind::Kairos => {
            let mut adapter = KairosAdapter::new(
                capabilities,
                http_client,
                config.credential("api_key")?,
                config.credential("api_secret")?,
            )
            .with_rate_limit_per_minute(rate_limit);
            if let Some(base_url) = &config.base_url {
                adapter = adapter.with_base_url(base_url);
            }
            Arc::new(adapter)
        }
        ProviderKind::AfricasTalking => {
            let mut adapter = AfricasTalkingAdapter::new(
                capabilities,
                http_client,
                config.credential("username")?,
                config.credential("api_key")?,
            )
            .with_rate_limit_per_minute(rate_limit);
            if let Some(base_url) = &config.base_url {
                adapter = adapter.with_base_url(base_url);
            }
            Arc::new(adapter)
        }
        ProviderKind::Twilio => {
            let mut adapter = TwilioAdapter::new(
                capabilities,
                http_client,
                config.credential("account_sid")?,
                config.credential("auth_token")?,
            )
            .with_rate_limit_per_minute(rate_limit);
            if let Some(base_url) = &config.base_url {
                adapter = adapter.with_base_url(base_url);
            }
            Arc::new(adapter)
        }
    };

    Ok(adapter)
}

/// Why an upstream call never produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    CircuitOpen,
    RateLimited,
    Transport(HttpError),
}

impl CallError {
    /// Failed send outcome. Generic transport failures carry no code.
    pub fn into_outcome(self, provider: &str) -> SendOutcome {
        match self {
            Self::CircuitOpen => SendOutcome::failure(
                provider,
                SendStatus::ProviderError,
                format!("{provider} circuit breaker is open; skipping upstream call"),
            )
            .with_error_code(codes::CIRCUIT_OPEN),
            Self::RateLimited => SendOutcome::failure(
                provider,
                SendStatus::ProviderError,
                format!("{provider} send quota exhausted"),
            )
            .with_error_code(codes::RATE_LIMITED),
            Self::Transport(error) => SendOutcome::failure(
                provider,
                SendStatus::ProviderError,
                format!("{provider} transport error: {}", error.message()),
            ),
        }
    }
}

impl From<CallError> for ProviderError {
    fn from(error: CallError) -> Self {
        match error {
            CallError::CircuitOpen => Self::Transport(String::from("circuit breaker is open")),
            CallError::RateLimited => Self::Transport(String::from("send quota exhausted")),
            CallError::Transport(error) => Self::Transport(error.message().to_owned()),
        }
    }
}

/// Resilience wrapper shared by the HTTP adapters.
pub struct Upstream {
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: CircuitBreaker,
    rate_gate: Option<RateGate>,
    retry: RetryConfig,
    timeout_ms: u64,
}

impl Upstream {
    pub fn new(http_client: Arc<dyn HttpClient>, capabilities: &ProviderCapabilities) -> Self {
        Self {
            http_client,
            circuit_breaker: CircuitBreaker::default(),
            rate_gate: None,
            retry: RetryConfig::with_max_retries(capabilities.max_retries),
            timeout_ms: capabilities.timeout_ms,
        }
    }

    pub fn set_retry(&mut self, retry: RetryConfig) {
        self.retry = retry;
    }

    pub fn set_circuit_breaker(&mut self, config: CircuitBreakerConfig) {
        self.circuit_breaker = CircuitBreaker::new(config);
    }

    pub fn set_rate_limit_per_minute(&mut self, per_minute: u32) {
        self.rate_gate = RateGate::per_minute(per_minute);
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Send-path call: consumes one unit of the rate gate first.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CallError> {
        if let Some(gate) = &self.rate_gate {
            if !gate.try_acquire() {
                return Err(CallError::RateLimited);
            }
        }
        self.call(request).await
    }

    /// Breaker-guarded call with bounded retries of transient failures.
    ///
    /// Transport errors and 5xx responses count against the breaker; any
    /// other response closes it.
    pub async fn call(&self, request: HttpRequest) -> Result<HttpResponse, CallError> {
        if !self.circuit_breaker.allow_request() {
            return Err(CallError::CircuitOpen);
        }

        let request = request.with_timeout_ms(self.timeout_ms);
        let mut attempt = 0;
        loop {
            let can_retry = attempt < self.retry.max_retries;
            match self.http_client.execute(request.clone()).await {
                Ok(response) => {
                    if can_retry && self.retry.should_retry_status(response.status) {
                        tracing::debug!(status = response.status, attempt, "retrying upstream status");
                    } else {
                        if response.is_server_error() {
                            self.record_breaker_failure();
                        } else {
                            self.circuit_breaker.record_success();
                        }
                        return Ok(response);
                    }
                }
                Err(error) => {
                    if !(can_retry && self.retry.should_retry_error(&error)) {
                        self.record_breaker_failure();
                        return Err(CallError::Transport(error));
                    }
                    tracing::debug!(error = %error, attempt, "retrying upstream transport error");
                }
            }

            tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }

    fn record_breaker_failure(&self) {
        if self.circuit_breaker.record_failure() {
            tracing::warn!(
                failures = self.circuit_breaker.consecutive_failures(),
                "circuit breaker opened"
            );
        }
    }
}

/// Record the attempt on `stats` and stamp the measured latency.
pub(crate) fn finish(stats: &ProviderStats, started: Instant, outcome: SendOutcome) -> SendOutcome {
    let latency_ms = elapsed_ms(started);
    stats.record_attempt(outcome.success, Some(latency_ms));
    outcome.with_latency_ms(latency_ms)
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Local validation failure. Never reaches the network.
pub(crate) fn invalid_parameters(
    provider: &str,
    code: &str,
    error: &ValidationError,
) -> SendOutcome {
    SendOutcome::failure(provider, SendStatus::InvalidParameters, error.to_string())
        .with_error_code(code)
}

/// Strip a trailing slash so paths can be appended with `format!`.
pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_owned()
}

/// Parse an amount like `"KES 0.8000"` or `"-0.0075"`.
pub(crate) fn parse_money(value: &str) -> Option<(f64, Option<String>)> {
    let mut parts = value.split_whitespace();
    let first = parts.next()?;
    match parts.next() {
        Some(amount) => {
            let amount = amount.parse::<f64>().ok()?;
            Some((amount, Some(first.to_owned())))
        }
        None => first.parse::<f64>().ok().map(|amount| (amount, None)),
    }
}
