use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::adapters::{finish, invalid_parameters, parse_money, trim_base_url, Upstream};
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState};
use crate::domain::{
    codes, validate_alphanumeric_sender, Balance, DeliveryStatus, Msisdn, ProviderCapabilities,
    SendOptions, SendOutcome, SendStatus,
};
use crate::error::ProviderError;
use crate::http_client::{encode_pairs, HttpClient, HttpRequest, HttpResponse};
use crate::provider::{BoxFuture, ProviderAdapter};
use crate::retry::RetryConfig;
use crate::stats::ProviderStats;

pub const AFRICASTALKING_BASE_URL: &str = "https://api.africastalking.com";
pub const AFRICASTALKING_SANDBOX_URL: &str = "https://api.sandbox.africastalking.com";
const SANDBOX_USERNAME: &str = "sandbox";
const MAX_SENDER_LEN: usize = 11;

/// Africa's Talking bulk SMS API, one recipient per request.
pub struct AfricasTalkingAdapter {
    capabilities: ProviderCapabilities,
    stats: ProviderStats,
    upstream: Upstream,
    base_url: String,
    username: String,
    api_key: String,
}

impl AfricasTalkingAdapter {
    /// The `sandbox` username targets the sandbox host unless a base URL is
    /// set explicitly.
    pub fn new(
        capabilities: ProviderCapabilities,
        http_client: Arc<dyn HttpClient>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let username = username.into();
        let base_url = if username == SANDBOX_USERNAME {
            AFRICASTALKING_SANDBOX_URL
        } else {
            AFRICASTALKING_BASE_URL
        };
        let upstream = Upstream::new(http_client, &capabilities);
        Self {
            capabilities,
            stats: ProviderStats::new(),
            upstream,
            base_url: String::from(base_url),
            username,
            api_key: api_key.into(),
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

    async fn submit(&self, options: &SendOptions) -> SendOutcome {
        let provider = self.name();
        if let Err(error) = options.validate_message() {
            return invalid_parameters(provider, codes::EMPTY_MESSAGE, &error);
        }
        let recipient = match Msisdn::parse(&options.recipient) {
            Ok(recipient) => recipient,
            Err(error) => return invalid_parameters(provider, codes::INVALID_RECIPIENT, &error),
        };
        let sender = options.sender_id.trim();
        if !sender.is_empty() && !sender.chars().all(|ch| ch.is_ascii_digit()) {
            if let Err(error) = validate_alphanumeric_sender(sender, MAX_SENDER_LEN) {
                return invalid_parameters(provider, codes::INVALID_SENDER, &error);
            }
        }

        let mut fields = vec![
            ("username", self.username.as_str()),
            ("to", recipient.as_str()),
            ("message", options.message.as_str()),
        ];
        if !sender.is_empty() {
            fields.push(("from", sender));
        }

        let request = HttpRequest::post(format!("{}/version1/messaging", self.base_url))
            .with_form(&fields)
            .with_header("apiKey", &self.api_key);

        match self.upstream.send(request).await {
            Ok(response) => interpret_send(provider, &response),
            Err(error) => error.into_outcome(provider),
        }
    }

    async fn balance(&self) -> Result<Balance, ProviderError> {
        let query = encode_pairs(&[("username", self.username.as_str())]);
        let request = HttpRequest::get(format!("{}/version1/user?{query}", self.base_url))
            .with_header("accept", "application/json")
            .with_header("apiKey", &self.api_key);
        let response = self.upstream.call(request).await?;

        match response.status {
            401 => return Err(ProviderError::Authentication),
            status if !response.is_success() => {
                return Err(ProviderError::Upstream {
                    status,
                    message: response.body.trim().to_owned(),
                })
            }
            _ => {}
        }

        let payload: UserPayload = serde_json::from_str(&response.body)
            .map_err(|error| ProviderError::Decode(error.to_string()))?;
        let (amount, currency) = parse_money(&payload.user_data.balance).ok_or_else(|| {
            ProviderError::Decode(format!(
                "unrecognized balance '{}'",
                payload.user_data.balance
            ))
        })?;

        Ok(Balance::new(amount, currency.unwrap_or_default()))
    }
}

impl ProviderAdapter for AfricasTalkingAdapter {
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

    /// Delivery reports are pushed to a callback URL; there is no lookup API.
    fn delivery_status<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, DeliveryStatus> {
        Box::pin(async move {
            DeliveryStatus::unknown(
                external_id,
                "africastalking reports delivery through callbacks only",
            )
            .with_provider(self.name())
        })
    }

    fn check_balance<'a>(&'a self) -> BoxFuture<'a, Result<Balance, ProviderError>> {
        Box::pin(self.balance())
    }
}

#[derive(Debug, Deserialize)]
struct MessagingPayload {
    #[serde(rename = "SMSMessageData")]
    data: MessageData,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Recipients", default)]
    recipients: Vec<Recipient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Recipient {
    status_code: u16,
    #[serde(default)]
    status: String,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    cost: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    #[serde(rename = "UserData")]
    user_data: UserData,
}

#[derive(Debug, Deserialize)]
struct UserData {
    balance: String,
}

/// Per-recipient status code to send status.
fn recipient_status(status_code: u16) -> SendStatus {
    match status_code {
        100 | 102 => SendStatus::Submitted,
        101 => SendStatus::Sent,
        403 | 404 => SendStatus::InvalidParameters,
        405 => SendStatus::InsufficientCredit,
        401 | 406 => SendStatus::Rejected,
        _ => SendStatus::ProviderError,
    }
}

fn interpret_send(provider: &str, response: &HttpResponse) -> SendOutcome {
    match response.status {
        401 => {
            return SendOutcome::failure(
                provider,
                SendStatus::AuthenticationError,
                response.body.trim(),
            )
        }
        status if status >= 500 => {
            return SendOutcome::failure(provider, SendStatus::ProviderError, response.body.trim())
        }
        _ if !response.is_success() => {
            return SendOutcome::failure(provider, SendStatus::Rejected, response.body.trim())
        }
        _ => {}
    }

    let payload = match serde_json::from_str::<MessagingPayload>(&response.body) {
        Ok(payload) => payload.data,
        Err(error) => {
            return SendOutcome::failure(
                provider,
                SendStatus::ProviderError,
                format!("africastalking returned an unreadable response body: {error}"),
            )
        }
    };

    let Some(recipient) = payload.recipients.into_iter().next() else {
        return SendOutcome::failure(provider, SendStatus::Rejected, payload.message);
    };

    let status = recipient_status(recipient.status_code);
    let message = if recipient.status.is_empty() {
        payload.message
    } else {
        recipient.status.clone()
    };

    let mut outcome = if matches!(status, SendStatus::Submitted | SendStatus::Sent) {
        SendOutcome::accepted(provider, status, recipient.message_id, message)
    } else {
        SendOutcome::failure(provider, status, message).with_error_code(recipient.status)
    };

    if let Some((amount, Some(currency))) = recipient.cost.as_deref().and_then(parse_money) {
        outcome = outcome.with_cost(amount, currency);
    }
    outcome
}
