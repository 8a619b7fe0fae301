use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::adapters::{finish, invalid_parameters, trim_base_url, Upstream};
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState};
use crate::domain::{
    codes, validate_alphanumeric_sender, Balance, DeliveryState, DeliveryStatus, Msisdn,
    ProviderCapabilities, SendOptions, SendOutcome, SendStatus,
};
use crate::error::{ProviderError, ValidationError};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse};
use crate::provider::{BoxFuture, ProviderAdapter};
use crate::retry::RetryConfig;
use crate::stats::ProviderStats;

pub const TWILIO_BASE_URL: &str = "https://api.twilio.com";
const API_VERSION: &str = "2010-04-01";
const MAX_ALPHANUMERIC_SENDER_LEN: usize = 11;

/// Twilio Programmable Messaging.
pub struct TwilioAdapter {
    capabilities: ProviderCapabilities,
    stats: ProviderStats,
    upstream: Upstream,
    base_url: String,
    account_sid: String,
    auth: HttpAuth,
}

impl TwilioAdapter {
    pub fn new(
        capabilities: ProviderCapabilities,
        http_client: Arc<dyn HttpClient>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        let account_sid = account_sid.into();
        let auth = HttpAuth::Basic {
            username: account_sid.clone(),
            password: auth_token.into(),
        };
        let upstream = Upstream::new(http_client, &capabilities);
        Self {
            capabilities,
            stats: ProviderStats::new(),
            upstream,
            base_url: String::from(TWILIO_BASE_URL),
            account_sid,
            auth,
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

    fn account_url(&self, path: &str) -> String {
        format!(
            "{}/{API_VERSION}/Accounts/{}/{path}",
            self.base_url,
            urlencoding::encode(&self.account_sid)
        )
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
        let sender = match normalize_sender(&options.sender_id) {
            Ok(sender) => sender,
            Err(error) => return invalid_parameters(provider, codes::INVALID_SENDER, &error),
        };

        let request = HttpRequest::post(self.account_url("Messages.json"))
            .with_form(&[
                ("To", recipient.as_str()),
                ("From", sender.as_str()),
                ("Body", options.message.as_str()),
            ])
            .with_auth(&self.auth);

        match self.upstream.send(request).await {
            Ok(response) => interpret_send(provider, &response),
            Err(error) => error.into_outcome(provider),
        }
    }

    async fn lookup(&self, external_id: &str) -> DeliveryStatus {
        let provider = self.name();
        let path = format!("Messages/{}.json", urlencoding::encode(external_id));
        let request = HttpRequest::get(self.account_url(&path))
            .with_header("accept", "application/json")
            .with_auth(&self.auth);

        let response = match self.upstream.call(request).await {
            Ok(response) => response,
            Err(error) => {
                return DeliveryStatus::unknown(external_id, ProviderError::from(error).to_string())
                    .with_provider(provider)
            }
        };

        if response.status == 404 {
            return DeliveryStatus::unknown(external_id, "twilio has no message with this sid")
                .with_provider(provider);
        }
        if !response.is_success() {
            return DeliveryStatus::unknown(
                external_id,
                format!("twilio status lookup returned {}", response.status),
            )
            .with_provider(provider);
        }

        let message = match serde_json::from_str::<MessageResource>(&response.body) {
            Ok(message) => message,
            Err(error) => {
                return DeliveryStatus::unknown(
                    external_id,
                    format!("could not decode twilio message: {error}"),
                )
                .with_provider(provider)
            }
        };

        let state = delivery_state(&message.status);
        let status = if state == DeliveryState::Unknown {
            DeliveryStatus::unknown(
                external_id,
                format!("unrecognized twilio status '{}'", message.status),
            )
            .with_provider(provider)
        } else {
            DeliveryStatus::new(external_id, state, provider)
        };

        match message.error_message {
            Some(error) if state == DeliveryState::Failed => status.with_error(error),
            _ => status,
        }
    }

    async fn balance(&self) -> Result<Balance, ProviderError> {
        let request = HttpRequest::get(self.account_url("Balance.json"))
            .with_header("accept", "application/json")
            .with_auth(&self.auth);
        let response = self.upstream.call(request).await?;

        match response.status {
            401 => return Err(ProviderError::Authentication),
            status if !response.is_success() => {
                return Err(ProviderError::Upstream {
                    status,
                    message: error_resource(&response)
                        .and_then(|error| error.message)
                        .unwrap_or_default(),
                })
            }
            _ => {}
        }

        let payload: BalanceResource = serde_json::from_str(&response.body)
            .map_err(|error| ProviderError::Decode(error.to_string()))?;
        let amount = payload.balance.trim().parse::<f64>().map_err(|_| {
            ProviderError::Decode(format!("unrecognized balance '{}'", payload.balance))
        })?;

        Ok(Balance::new(amount, payload.currency))
    }
}

impl ProviderAdapter for TwilioAdapter {
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
struct MessageResource {
    sid: Option<String>,
    status: String,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    price_unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResource {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResource {
    balance: String,
    currency: String,
}

fn error_resource(response: &HttpResponse) -> Option<ErrorResource> {
    serde_json::from_str(&response.body).ok()
}

/// E.164 numbers are normalized; anything else must be a short alphanumeric id.
fn normalize_sender(sender: &str) -> Result<String, ValidationError> {
    let trimmed = sender.trim();
    if trimmed.starts_with('+') || trimmed.starts_with("00") {
        return Msisdn::parse(trimmed).map(String::from);
    }
    validate_alphanumeric_sender(trimmed, MAX_ALPHANUMERIC_SENDER_LEN)?;
    Ok(trimmed.to_owned())
}

fn message_status(status: &str) -> SendStatus {
    match status {
        "queued" | "accepted" | "scheduled" => SendStatus::Submitted,
        "sending" | "sent" => SendStatus::Sent,
        "delivered" => SendStatus::Delivered,
        "undelivered" => SendStatus::Rejected,
        _ => SendStatus::Failed,
    }
}

fn error_status(http_status: u16, code: Option<i64>) -> SendStatus {
    match code {
        Some(21606 | 21211) => SendStatus::InvalidParameters,
        Some(20003) => SendStatus::AuthenticationError,
        Some(21408) => SendStatus::Rejected,
        _ if http_status == 401 => SendStatus::AuthenticationError,
        _ if http_status >= 500 => SendStatus::ProviderError,
        _ => SendStatus::Rejected,
    }
}

fn interpret_send(provider: &str, response: &HttpResponse) -> SendOutcome {
    if !response.is_success() {
        let error = error_resource(response);
        let code = error.as_ref().and_then(|error| error.code);
        let message = error
            .and_then(|error| error.message)
            .unwrap_or_else(|| format!("twilio responded with status {}", response.status));
        let outcome = SendOutcome::failure(provider, error_status(response.status, code), message);
        return match code {
            Some(code) => outcome.with_error_code(code.to_string()),
            None => outcome,
        };
    }

    let message = match serde_json::from_str::<MessageResource>(&response.body) {
        Ok(message) => message,
        Err(error) => {
            return SendOutcome::failure(
                provider,
                SendStatus::ProviderError,
                format!("twilio returned an unreadable response body: {error}"),
            )
        }
    };

    let status = message_status(&message.status);
    let mut outcome = match status {
        SendStatus::Submitted | SendStatus::Sent | SendStatus::Delivered => {
            SendOutcome::accepted(provider, status, message.sid, message.status)
        }
        _ => {
            let text = message.error_message.unwrap_or(message.status);
            let outcome = SendOutcome::failure(provider, status, text);
            match message.error_code {
                Some(code) => outcome.with_error_code(code.to_string()),
                None => outcome,
            }
        }
    };

    let price = message
        .price
        .as_deref()
        .and_then(|price| price.trim().parse::<f64>().ok());
    if let (Some(price), Some(unit)) = (price, message.price_unit) {
        outcome = outcome.with_cost(price.abs(), unit);
    }
    outcome
}

fn delivery_state(status: &str) -> DeliveryState {
    match status {
        "queued" | "accepted" | "scheduled" | "sending" => DeliveryState::Pending,
        "sent" => DeliveryState::Sent,
        "delivered" | "read" => DeliveryState::Delivered,
        "failed" | "undelivered" | "canceled" => DeliveryState::Failed,
        _ => DeliveryState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::http_client::ScriptedHttpClient;

    fn adapter(client: Arc<ScriptedHttpClient>) -> TwilioAdapter {
        let capabilities = ProviderCapabilities::new("twilio", ["*"]).expect("capabilities");
        TwilioAdapter::new(capabilities, client, "AC123", "token")
            .with_base_url("https://twilio.test")
            .with_retry(RetryConfig::fixed(Duration::ZERO, 0))
    }

    fn options() -> SendOptions {
        SendOptions::new("+233244123456", "hello", "+15005550006")
    }

    #[tokio::test]
    async fn queued_message_is_submitted_with_price() {
        let client = Arc::new(ScriptedHttpClient::new().with_response(HttpResponse::new(
            201,
            r#"{"sid":"SM1","status":"queued","error_code":null,"error_message":null,"price":"-0.0075","price_unit":"USD"}"#,
        )));
        let adapter = adapter(Arc::clone(&client));

        let outcome = adapter.send(options()).await;

        assert!(outcome.success);
        assert_eq!(outcome.status, SendStatus::Submitted);
        assert_eq!(outcome.external_id.as_deref(), Some("SM1"));
        assert_eq!(outcome.cost, Some(0.0075));
        assert_eq!(outcome.currency.as_deref(), Some("USD"));

        let request = &client.requests()[0];
        assert_eq!(
            request.url,
            "https://twilio.test/2010-04-01/Accounts/AC123/Messages.json"
        );
        assert_eq!(
            request.basic_auth,
            Some((String::from("AC123"), String::from("token")))
        );
    }

    #[test]
    fn message_statuses_map_to_send_statuses() {
        assert_eq!(message_status("accepted"), SendStatus::Submitted);
        assert_eq!(message_status("scheduled"), SendStatus::Submitted);
        assert_eq!(message_status("sending"), SendStatus::Sent);
        assert_eq!(message_status("delivered"), SendStatus::Delivered);
        assert_eq!(message_status("failed"), SendStatus::Failed);
        assert_eq!(message_status("undelivered"), SendStatus::Rejected);
    }

    #[test]
    fn error_codes_take_precedence_over_http_status() {
        assert_eq!(error_status(400, Some(21211)), SendStatus::InvalidParameters);
        assert_eq!(error_status(400, Some(21606)), SendStatus::InvalidParameters);
        assert_eq!(error_status(401, Some(20003)), SendStatus::AuthenticationError);
        assert_eq!(error_status(400, Some(21408)), SendStatus::Rejected);
        assert_eq!(error_status(401, None), SendStatus::AuthenticationError);
        assert_eq!(error_status(429, Some(20429)), SendStatus::Rejected);
        assert_eq!(error_status(503, None), SendStatus::ProviderError);
    }

    #[tokio::test]
    async fn upstream_error_code_is_passed_through() {
        let client = Arc::new(ScriptedHttpClient::new().with_response(HttpResponse::new(
            400,
            r#"{"code":21211,"message":"The 'To' number is not a valid phone number.","status":400}"#,
        )));

        let outcome = adapter(client).send(options()).await;

        assert_eq!(outcome.status, SendStatus::InvalidParameters);
        assert_eq!(outcome.error_code.as_deref(), Some("21211"));
    }

    #[tokio::test]
    async fn alphanumeric_sender_is_accepted() {
        let client = Arc::new(ScriptedHttpClient::new().with_response(HttpResponse::new(
            201,
            r#"{"sid":"SM2","status":"accepted"}"#,
        )));
        let adapter = adapter(Arc::clone(&client));

        let outcome = adapter
            .send(SendOptions::new("+233244123456", "hello", "MSGATE"))
            .await;

        assert!(outcome.success);
        assert!(client.requests()[0]
            .body
            .as_deref()
            .is_some_and(|body| body.contains("From=MSGATE")));
    }

    #[tokio::test]
    async fn missing_message_lookup_is_unknown() {
        let client = Arc::new(ScriptedHttpClient::new().with_response(HttpResponse::new(
            404,
            r#"{"code":20404,"message":"not found","status":404}"#,
        )));

        let status = adapter(client).delivery_status("SM404").await;

        assert_eq!(status.status, DeliveryState::Unknown);
        assert!(status.error.is_some());
        assert_eq!(status.provider_id.as_deref(), Some("twilio"));
    }

    #[tokio::test]
    async fn failed_lookup_carries_error_message() {
        let client = Arc::new(ScriptedHttpClient::new().with_response(HttpResponse::ok_json(
            r#"{"sid":"SM3","status":"undelivered","error_code":30003,"error_message":"Unreachable destination handset"}"#,
        )));

        let status = adapter(client).delivery_status("SM3").await;

        assert_eq!(status.status, DeliveryState::Failed);
        assert_eq!(
            status.error.as_deref(),
            Some("Unreachable destination handset")
        );
    }

    #[tokio::test]
    async fn balance_is_read_from_balance_resource() {
        let client = Arc::new(ScriptedHttpClient::new().with_response(HttpResponse::ok_json(
            r#"{"account_sid":"AC123","balance":"12.34","currency":"USD"}"#,
        )));

        let balance = adapter(client).check_balance().await.expect("balance");

        assert_eq!(balance, Balance::new(12.34, "USD"));
    }
}
