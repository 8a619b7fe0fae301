use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ValidationError;

/// Provider id reported when the router itself produced the outcome.
pub const ROUTER_PROVIDER_ID: &str = "router";
/// Provider id reported when every candidate failed.
pub const MULTI_PROVIDER_ID: &str = "multiple";

/// Machine-readable error codes attached to failed outcomes.
pub mod codes {
    pub const NO_PROVIDER: &str = "NO_PROVIDER";
    pub const ALL_FAILED: &str = "ALL_FAILED";
    pub const ROUTING_ERROR: &str = "ROUTING_ERROR";
    pub const CANCELLED: &str = "CANCELLED";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const INVALID_RECIPIENT: &str = "INVALID_RECIPIENT";
    pub const INVALID_SENDER: &str = "INVALID_SENDER";
    pub const EMPTY_MESSAGE: &str = "EMPTY_MESSAGE";
    pub const CIRCUIT_OPEN: &str = "CIRCUIT_OPEN";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
}

/// Closed set of statuses a send attempt can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Submitted,
    Sent,
    Delivered,
    Failed,
    Rejected,
    InvalidParameters,
    AuthenticationError,
    InsufficientCredit,
    ProviderError,
}

impl SendStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
            Self::InvalidParameters => "invalid_parameters",
            Self::AuthenticationError => "authentication_error",
            Self::InsufficientCredit => "insufficient_credit",
            Self::ProviderError => "provider_error",
        }
    }
}

impl Display for SendStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized input to a send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    /// Phone number or email address.
    pub recipient: String,
    pub message: String,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl SendOptions {
    pub fn new(
        recipient: impl Into<String>,
        message: impl Into<String>,
        sender_id: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            message: message.into(),
            sender_id: sender_id.into(),
            correlation_id: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Reject empty bodies before they reach an upstream.
    pub fn validate_message(&self) -> Result<(), ValidationError> {
        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(())
    }
}

/// Unified result of a send attempt, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub status: SendStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Providers tried for this request, in attempt order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl SendOutcome {
    /// Outcome for a message the upstream accepted.
    pub fn accepted(
        provider_id: impl Into<String>,
        status: SendStatus,
        external_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            status,
            external_id,
            message: message.into(),
            error_code: None,
            provider_id: provider_id.into(),
            cost: None,
            currency: None,
            attempts: Vec::new(),
            latency_ms: None,
        }
    }

    /// Outcome for a failed attempt.
    pub fn failure(
        provider_id: impl Into<String>,
        status: SendStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            status,
            external_id: None,
            message: message.into(),
            error_code: None,
            provider_id: provider_id.into(),
            cost: None,
            currency: None,
            attempts: Vec::new(),
            latency_ms: None,
        }
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_cost(mut self, cost: f64, currency: impl Into<String>) -> Self {
        self.cost = Some(cost);
        self.currency = Some(currency.into());
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_attempts(mut self, attempts: Vec<String>) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Delivery states a status lookup can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Sent,
    Delivered,
    Failed,
    Pending,
    Unknown,
}

impl DeliveryState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Pending => "pending",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for DeliveryState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a delivery-status lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub status: DeliveryState,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

impl DeliveryStatus {
    pub fn new(
        external_id: impl Into<String>,
        status: DeliveryState,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            status,
            timestamp: OffsetDateTime::now_utc(),
            external_id: external_id.into(),
            error: None,
            provider_id: Some(provider_id.into()),
        }
    }

    pub fn unknown(external_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: DeliveryState::Unknown,
            timestamp: OffsetDateTime::now_utc(),
            external_id: external_id.into(),
            error: Some(error.into()),
            provider_id: None,
        }
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub const fn is_known(&self) -> bool {
        !matches!(self.status, DeliveryState::Unknown)
    }
}

/// Account balance reported by an upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub amount: f64,
    pub currency: String,
}

impl Balance {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}
