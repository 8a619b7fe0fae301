use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapters::{finish, invalid_parameters, trim_base_url, Upstream};
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState};
use crate::domain::{
    codes, validate_alphanumeric_sender, Balance, DeliveryState, DeliveryStatus, Msisdn,
    ProviderCapabilities, SendOptions, SendOutcome, SendStatus,
};
use crate::error::ProviderError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::provider::{BoxFuture, ProviderAdapter};
use crate::retry::RetryConfig;
use crate::stats::ProviderStats;

pub const KAIROS_BASE_URL: &str = "https://api.kairosafrika.com";
const MAX_SENDER_LEN: usize = 11;
const DEFAULT_CURRENCY: &str = "GHS";

/// Kairos Afrika SMS. Ghanaian mobile numbers only.
pub struct KairosAdapter {
    capabilities: ProviderCapabilities,
    stats: ProviderStats,
    upstream: Upstream,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl KairosAdapter {
    pub fn new(
        capabilities: ProviderCapabilities,
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        let upstream = Upstream::new(http_client, &capabilities);
        Self {
            capabilities,
            stats: ProviderStats::new(),
            upstream,
            base_url: String::from(KAIROS_BASE_URL),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = trim_base_url(base_url);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.upstream.set_retry(retry);
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.upstream.set_circuit_breaker(config);
        self
    }

    pub fn with_rate_limit_per_minute(mut self, per_minute: u32) -> Self {
        self.upstream.set_rate_limit_per_minute(per_minute);
        self
    }

    fn authenticated(&self, request: HttpRequest) -> HttpRequest {
        request
            .with_header("x-api-key", &self.api_key)
            .with_header("x-api-secret", &self.api_secret)
    }

    async fn submit(&self, options: &SendOptions) -> SendOutcome {
        let provider = self.name();
        if let Err(error) = options.validate_message() {
            return invalid_parameters(provider, codes::EMPTY_MESSAGE, &error);
        }
        let recipient = match Msisdn::parse_ghana_mobile(&options.recipient) {
            Ok(recipient) => recipient,
            Err(error) => return invalid_parameters(provider, codes::INVALID_RECIPIENT, &error),
        };
        if let Err(error) = validate_alphanumeric_sender(&options.sender_id, MAX_SENDER_LEN) {
            return invalid_parameters(provider, codes::INVALID_SENDER, &error);
        }

        let body = json!({
            "to": recipient.digits(),
            "from": options.sender_id.trim(),
            "message": options.message,
        });
        let request = self.authenticated(
            HttpRequest::post(format!("{}/v1/external/sms/quick", self.base_url)).with_json(&body),
        );

        match self.upstream.send(request).await {
            Ok(response) => interpret_send(provider, &response),
            Err(error) => error.into_outcome(provider),
        }
    }

    async fn lookup(&self, external_id: &str) -> DeliveryStatus {
        let provider = self.name();
        let request = self.authenticated(HttpRequest::get(format!(
            "{}/v1/external/sms/{}",
            self.base_url,
            urlencoding::encode(external_id)
        )));

        let response = match self.upstream.call(request).await {
            Ok(response) => response,
            Err(error) => {
                return DeliveryStatus::unknown(external_id, ProviderError::from(error).to_string())
                    .with_provider(provider)
            }
        };

        if !response.is_success() {
            return DeliveryStatus::unknown(
                external_id,
                format!("kairos status lookup returned {}", response.status),
            )
            .with_provider(provider);
        }

        let state = serde_json::from_str::<KairosEnvelope>(&response.body)
            .ok()
            .and_then(|envelope| envelope.data)
            .and_then(|data| data.get("status").and_then(Value::as_str).map(str::to_owned))
            .map(|status| delivery_state(&status));

        match state {
            Some(DeliveryState::Unknown) | None => DeliveryStatus::unknown(
                external_id,
                "kairos did not report a recognizable delivery status",
            )
            .with_provider(provider),
            Some(state) => DeliveryStatus::new(external_id, state, provider),
        }
    }

    async fn balance(&self) -> Result<Balance, ProviderError> {
        let request = self.authenticated(HttpRequest::get(format!(
            "{}/v1/external/balance",
            self.base_url
        )));
        let response = self.upstream.call(request).await?;

        match response.status {
            401 | 403 => return Err(ProviderError::Authentication),
            status if !response.is_success() => {
                return Err(ProviderError::Upstream {
                    status,
                    message: envelope_message(&response.body).unwrap_or_default(),
                })
            }
            _ => {}
        }

        let data = serde_json::from_str::<KairosEnvelope>(&response.body)
            .map_err(|error| ProviderError::Decode(error.to_string()))?
            .data
            .ok_or_else(|| ProviderError::Decode(String::from("balance response has no data")))?;

        let amount = match data.get("balance") {
            Some(Value::Number(number)) => number.as_f64(),
            Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| ProviderError::Decode(String::from("balance is missing or not numeric")))?;
        let currency = data
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CURRENCY);

        Ok(Balance::new(amount, currency))
    }
}

impl ProviderAdapter for KairosAdapter {
    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn stats(&self) -> &ProviderStats {
        &self.stats
    }

    fn circuit_state(&self) -> CircuitState {
        self.upstream.circuit_state()
    }

    fn send<'a>(&'a self, options: SendOptions) -> BoxFuture<'a, SendOutcome> {
        Box::pin(async move {
            let started = Instant::now();
            let outcome = self.submit(&options).await;
            finish(&self.stats, started, outcome)
        })
    }

    fn delivery_status<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, DeliveryStatus> {
        Box::pin(self.lookup(external_id))
    }

    fn check_balance<'a>(&'a self) -> BoxFuture<'a, Result<Balance, ProviderError>> {
        Box::pin(self.balance())
    }
}

#[derive(Debug, Deserialize)]
struct KairosEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

fn envelope_message(body: &str) -> Option<String> {
    serde_json::from_str::<KairosEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.message)
}

fn mentions_insufficient(message: &str) -> bool {
    message.to_ascii_lowercase().contains("insufficient")
}

fn interpret_send(provider: &str, response: &HttpResponse) -> SendOutcome {
    let envelope = serde_json::from_str::<KairosEnvelope>(&response.body).ok();
    let message = envelope
        .as_ref()
        .and_then(|envelope| envelope.message.clone())
        .unwrap_or_else(|| format!("kairos responded with status {}", response.status));

    match response.status {
        401 | 403 => {
            return SendOutcome::failure(provider, SendStatus::AuthenticationError, message)
        }
        402 => return SendOutcome::failure(provider, SendStatus::InsufficientCredit, message),
        _ if !response.is_success() && mentions_insufficient(&message) => {
            return SendOutcome::failure(provider, SendStatus::InsufficientCredit, message)
        }
        400 | 422 => return SendOutcome::failure(provider, SendStatus::Rejected, message),
        status if status >= 500 => {
            return SendOutcome::failure(provider, SendStatus::ProviderError, message)
        }
        _ if !response.is_success() => {
            return SendOutcome::failure(provider, SendStatus::Rejected, message)
        }
        _ => {}
    }

    let Some(envelope) = envelope else {
        return SendOutcome::failure(
            provider,
            SendStatus::ProviderError,
            "kairos returned an unreadable response body",
        );
    };

    if !envelope.success {
        let status = if mentions_insufficient(&message) {
            SendStatus::InsufficientCredit
        } else {
            SendStatus::Rejected
        };
        return SendOutcome::failure(provider, status, message);
    }

    let external_id = envelope
        .data
        .as_ref()
        .and_then(|data| data.get("id"))
        .and_then(|id| match id {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        });

    SendOutcome::accepted(provider, SendStatus::Submitted, external_id, message)
}

fn delivery_state(status: &str) -> DeliveryState {
    match status.trim().to_ascii_lowercase().as_str() {
        "delivered" => DeliveryState::Delivered,
        "sent" | "submitted" => DeliveryState::Sent,
        "failed" | "rejected" | "undelivered" | "expired" => DeliveryState::Failed,
        "pending" | "queued" | "scheduled" => DeliveryState::Pending,
        _ => DeliveryState::Unknown,
    }
}
