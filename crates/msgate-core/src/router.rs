//! Candidate resolution, sequential failover, and provider ranking.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::RoutingConfig;
use crate::domain::{
    codes, normalize_country, normalize_network, DeliveryStatus, SendOptions, SendOutcome,
    SendStatus, MULTI_PROVIDER_ID, ROUTER_PROVIDER_ID,
};
use crate::error::ValidationError;
use crate::provider::ProviderAdapter;
use crate::registry::ProviderRegistry;

/// Ranking applied by [`Router::best_provider`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionCriterion {
    /// Configured priority order.
    #[default]
    Cost,
    /// Lowest average latency first.
    Speed,
    /// Highest success rate first.
    Reliability,
}

impl SelectionCriterion {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Speed => "speed",
            Self::Reliability => "reliability",
        }
    }
}

impl Display for SelectionCriterion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionCriterion {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cost" => Ok(Self::Cost),
            "speed" => Ok(Self::Speed),
            "reliability" => Ok(Self::Reliability),
            _ => Err(ValidationError::UnknownCriterion {
                value: value.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Latency assumed for adapters with no recorded attempt when ranking by
    /// speed. Large enough to rank them behind any measured adapter.
    pub default_latency_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::from(&RoutingConfig::default())
    }
}

impl From<&RoutingConfig> for RouterConfig {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            default_latency_ms: config.default_latency_ms,
        }
    }
}

/// Routes each message through the registry's candidates for a destination.
///
/// Attempts within one request are strictly sequential and stop at the first
/// success. Independent requests may run concurrently against the same
/// router.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<ProviderRegistry>,
    config: RouterConfig,
}

impl Router {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self::with_config(registry, RouterConfig::default())
    }

    pub fn with_config(registry: Arc<ProviderRegistry>, config: RouterConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub const fn config(&self) -> RouterConfig {
        self.config
    }

    /// Candidate names in the order `send` would try them.
    pub fn candidates(&self, country: &str, network: Option<&str>) -> Vec<String> {
        self.resolve(country, network)
            .unwrap_or_default()
            .iter()
            .map(|adapter| adapter.name().to_owned())
            .collect()
    }

    pub async fn send(
        &self,
        options: SendOptions,
        country: &str,
        network: Option<&str>,
    ) -> SendOutcome {
        self.send_with_cancel(options, country, network, &CancellationToken::new())
            .await
    }

    /// Like [`Self::send`], but stops before the next candidate once `cancel`
    /// fires. An attempt already in flight always completes.
    pub async fn send_with_cancel(
        &self,
        options: SendOptions,
        country: &str,
        network: Option<&str>,
        cancel: &CancellationToken,
    ) -> SendOutcome {
        let candidates = match self.resolve(country, network) {
            Ok(candidates) => candidates,
            Err(error) => {
                tracing::warn!(country, ?network, %error, "candidate resolution failed");
                return router_failure(codes::ROUTING_ERROR, error.to_string(), Vec::new());
            }
        };

        if candidates.is_empty() {
            tracing::warn!(country, ?network, "no provider serves destination");
            return router_failure(
                codes::NO_PROVIDER,
                match network {
                    Some(network) => format!("no provider available for {country}/{network}"),
                    None => format!("no provider available for {country}"),
                },
                Vec::new(),
            );
        }

        let mut attempts = Vec::with_capacity(candidates.len());
        let mut last_failure = None;

        for adapter in &candidates {
            if cancel.is_cancelled() {
                tracing::info!(attempted = ?attempts, "send cancelled before next candidate");
                return router_failure(codes::CANCELLED, "send cancelled", attempts);
            }

            attempts.push(adapter.name().to_owned());
            let outcome = self.attempt(adapter.as_ref(), options.clone()).await;

            if outcome.success {
                tracing::info!(
                    provider = %outcome.provider_id,
                    status = %outcome.status,
                    attempts = attempts.len(),
                    correlation_id = ?options.correlation_id,
                    "message accepted"
                );
                return outcome.with_attempts(attempts);
            }

            tracing::warn!(
                provider = %outcome.provider_id,
                status = %outcome.status,
                error_code = ?outcome.error_code,
                message = %outcome.message,
                "attempt failed, trying next candidate"
            );
            last_failure = Some(outcome);
        }

        match last_failure {
            Some(outcome) => exhausted(outcome, attempts),
            None => router_failure(codes::NO_PROVIDER, "no provider attempted", attempts),
        }
    }

    /// First adapter under `criterion`, if any serves the destination.
    pub fn best_provider(
        &self,
        country: &str,
        network: Option<&str>,
        criterion: SelectionCriterion,
    ) -> Option<Arc<dyn ProviderAdapter>> {
        self.rank(country, network, criterion).into_iter().next()
    }

    /// Candidates re-sorted by `criterion`. The sort is stable, so ties keep
    /// priority order.
    pub fn rank(
        &self,
        country: &str,
        network: Option<&str>,
        criterion: SelectionCriterion,
    ) -> Vec<Arc<dyn ProviderAdapter>> {
        let candidates = self.resolve(country, network).unwrap_or_default();

        match criterion {
            SelectionCriterion::Cost => candidates,
            SelectionCriterion::Speed => {
                let default_latency = self.config.default_latency_ms as f64;
                let mut keyed: Vec<_> = candidates
                    .into_iter()
                    .map(|adapter| {
                        let latency = adapter
                            .stats()
                            .snapshot()
                            .avg_latency_ms
                            .unwrap_or(default_latency);
                        (latency, adapter)
                    })
                    .collect();
                keyed.sort_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                keyed.into_iter().map(|(_, adapter)| adapter).collect()
            }
            SelectionCriterion::Reliability => {
                let mut keyed: Vec<_> = candidates
                    .into_iter()
                    .map(|adapter| (adapter.stats().snapshot().success_rate, adapter))
                    .collect();
                keyed.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));
                keyed.into_iter().map(|(_, adapter)| adapter).collect()
            }
        }
    }

    /// Ask the named provider, or probe every provider in registration order
    /// until one recognizes `external_id`.
    pub async fn check_delivery_status(
        &self,
        external_id: &str,
        provider: Option<&str>,
    ) -> DeliveryStatus {
        if let Some(name) = provider {
            return match self.registry.get_by_name(name) {
                Some(adapter) => lookup(adapter.as_ref(), external_id).await,
                None => DeliveryStatus::unknown(
                    external_id,
                    format!("provider '{name}' is not registered"),
                ),
            };
        }

        for adapter in self.registry.all() {
            let status = lookup(adapter.as_ref(), external_id).await;
            if status.is_known() {
                return status;
            }
            tracing::debug!(provider = adapter.name(), external_id, "provider did not recognize message");
        }

        DeliveryStatus::unknown(
            external_id,
            "no registered provider recognized the message id",
        )
    }

    fn resolve(
        &self,
        country: &str,
        network: Option<&str>,
    ) -> Result<Vec<Arc<dyn ProviderAdapter>>, ValidationError> {
        let country = normalize_country(country)?;
        match network {
            Some(network) => {
                let network = normalize_network(network)?;
                Ok(self.registry.get_for_network(&country, &network))
            }
            None => Ok(self.registry.get_for_country(&country)),
        }
    }

    /// One adapter call bounded by the adapter's timeout. A timed-out call is
    /// recorded on the adapter's stats here, since the adapter never finished.
    async fn attempt(&self, adapter: &dyn ProviderAdapter, options: SendOptions) -> SendOutcome {
        let capabilities = adapter.capabilities();
        let started = Instant::now();
        match tokio::time::timeout(capabilities.timeout(), adapter.send(options)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                let latency_ms = elapsed.max(capabilities.timeout_ms);
                adapter.stats().record_attempt(false, Some(latency_ms));
                SendOutcome::failure(
                    adapter.name(),
                    SendStatus::ProviderError,
                    format!(
                        "{} did not answer within {} ms",
                        adapter.name(),
                        capabilities.timeout_ms
                    ),
                )
                .with_error_code(codes::TIMEOUT)
                .with_latency_ms(latency_ms)
            }
        }
    }
}

async fn lookup(adapter: &dyn ProviderAdapter, external_id: &str) -> DeliveryStatus {
    let timeout = adapter.capabilities().timeout();
    match tokio::time::timeout(timeout, adapter.delivery_status(external_id)).await {
        Ok(status) => status,
        Err(_) => DeliveryStatus::unknown(
            external_id,
            format!("{} status lookup timed out", adapter.name()),
        )
        .with_provider(adapter.name()),
    }
}

fn router_failure(code: &str, message: impl Into<String>, attempts: Vec<String>) -> SendOutcome {
    SendOutcome::failure(ROUTER_PROVIDER_ID, SendStatus::Failed, message)
        .with_error_code(code)
        .with_attempts(attempts)
}

/// Every candidate failed: report the last failure under the `multiple`
/// sentinel, keeping its code when it has one.
fn exhausted(mut outcome: SendOutcome, attempts: Vec<String>) -> SendOutcome {
    tracing::error!(
        attempts = ?attempts,
        last_status = %outcome.status,
        "all providers failed"
    );
    outcome.success = false;
    outcome.provider_id = String::from(MULTI_PROVIDER_ID);
    if outcome.error_code.is_none() {
        outcome.error_code = Some(String::from(codes::ALL_FAILED));
    }
    outcome.with_attempts(attempts)
}
