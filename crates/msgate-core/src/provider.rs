//! Provider adapter contract.
//!
//! Every upstream integration implements [`ProviderAdapter`]. Adapters own
//! their [`ProviderStats`] and record one entry per `send` before returning,
//! so the router and health reporting see consistent counters no matter
//! which caller drove the attempt.
//!
//! # Example
//!
//! ```rust,ignore
//! use msgate_core::{ProviderAdapter, SendOptions};
//!
//! async fn send_once(adapter: &dyn ProviderAdapter) {
//!     let options = SendOptions::new("+233244123456", "Your code is 1234", "MSGATE");
//!     let outcome = adapter.send(options).await;
//!     println!("{} -> {}", outcome.provider_id, outcome.status);
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitState;
use crate::domain::{Balance, DeliveryStatus, ProviderCapabilities, SendOptions, SendOutcome};
use crate::error::ProviderError;
use crate::stats::{ProviderStats, StatsSnapshot};

/// Boxed `Send` future returned by adapter operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Uniform contract implemented by every upstream messaging integration.
///
/// `send` never fails at the type level: transport errors, rejected
/// messages, and malformed upstream bodies all come back as an outcome with
/// `success = false`. Only construction can fail.
pub trait ProviderAdapter: Send + Sync {
    /// Static descriptor used for candidate resolution.
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Unique provider name.
    fn name(&self) -> &str {
        &self.capabilities().name
    }

    /// Counters owned by this adapter.
    fn stats(&self) -> &ProviderStats;

    /// Breaker state guarding the upstream, when the adapter has one.
    fn circuit_state(&self) -> CircuitState {
        CircuitState::Closed
    }

    /// One delivery attempt. Records a stats entry before resolving.
    fn send<'a>(&'a self, options: SendOptions) -> BoxFuture<'a, SendOutcome>;

    /// Best-effort lookup; answers `unknown` rather than failing.
    fn delivery_status<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, DeliveryStatus>;

    fn check_balance<'a>(&'a self) -> BoxFuture<'a, Result<Balance, ProviderError>>;
}

/// Health report for one adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Balance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub circuit: CircuitState,
    pub stats: StatsSnapshot,
}

impl ProviderHealth {
    /// Healthy iff the balance check succeeded with a non-negative amount.
    pub fn from_balance(
        result: Result<Balance, ProviderError>,
        circuit: CircuitState,
        stats: StatsSnapshot,
    ) -> Self {
        match result {
            Ok(balance) => Self {
                healthy: balance.amount >= 0.0,
                error: (balance.amount < 0.0)
                    .then(|| format!("negative balance {:.2} {}", balance.amount, balance.currency)),
                balance: Some(balance),
                circuit,
                stats,
            },
            Err(error) => Self {
                healthy: false,
                balance: None,
                error: Some(error.to_string()),
                circuit,
                stats,
            },
        }
    }
}
