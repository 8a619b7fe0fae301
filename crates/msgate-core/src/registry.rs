//! Registry of configured provider adapters.
//!
//! Populated once at startup and then shared read-only (behind an `Arc`) by
//! the router and any concurrent callers.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::adapters;
use crate::config::GatewayConfig;
use crate::domain::{normalize_country, normalize_network};
use crate::error::{ConfigError, RegistryError};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::provider::{ProviderAdapter, ProviderHealth};

/// Ordered, append-only collection of adapters keyed by unique name.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured provider on top of the production HTTP client.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Self::from_config_with_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    /// Same as [`Self::from_config`] with an injected transport, shared by
    /// all adapters.
    pub fn from_config_with_client(
        config: &GatewayConfig,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut registry = Self::new();
        for provider in &config.providers {
            let adapter = adapters::build_adapter(provider, Arc::clone(&http_client))?;
            registry.register(adapter)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) -> Result<(), RegistryError> {
        let name = adapter.name().to_owned();
        if self.adapters.iter().any(|existing| existing.name() == name) {
            return Err(RegistryError::DuplicateProvider { name });
        }

        let capabilities = adapter.capabilities();
        tracing::info!(
            provider = %name,
            countries = ?capabilities.countries,
            networks = ?capabilities.networks,
            priority = capabilities.priority,
            "registered provider"
        );
        self.adapters.push(adapter);
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.name() == name)
            .cloned()
    }

    /// Adapters serving `country` (or `*`), lowest priority first. Ties keep
    /// registration order. An unparseable code matches nothing.
    pub fn get_for_country(&self, country: &str) -> Vec<Arc<dyn ProviderAdapter>> {
        let Ok(country) = normalize_country(country) else {
            return Vec::new();
        };

        let mut matches: Vec<_> = self
            .adapters
            .iter()
            .filter(|adapter| adapter.capabilities().serves_country(&country))
            .cloned()
            .collect();
        matches.sort_by_key(|adapter| adapter.capabilities().priority);
        matches
    }

    /// Country candidates further narrowed to adapters that either declare
    /// no network restriction or list `network`.
    pub fn get_for_network(&self, country: &str, network: &str) -> Vec<Arc<dyn ProviderAdapter>> {
        let Ok(network) = normalize_network(network) else {
            return Vec::new();
        };

        self.get_for_country(country)
            .into_iter()
            .filter(|adapter| adapter.capabilities().serves_network(&network))
            .collect()
    }

    /// All adapters in registration order.
    pub fn all(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Query every adapter's balance concurrently.
    pub async fn health_check_all(&self) -> BTreeMap<String, ProviderHealth> {
        let mut tasks = JoinSet::new();
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            tasks.spawn(async move {
                let balance = adapter.check_balance().await;
                let health = ProviderHealth::from_balance(
                    balance,
                    adapter.circuit_state(),
                    adapter.stats().snapshot(),
                );
                (adapter.name().to_owned(), health)
            });
        }

        let mut report = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, health)) => {
                    if !health.healthy {
                        tracing::warn!(provider = %name, error = ?health.error, "provider unhealthy");
                    }
                    report.insert(name, health);
                }
                Err(error) => tracing::error!(%error, "health check task failed"),
            }
        }
        report
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.adapters.iter().map(|adapter| adapter.name()))
            .finish()
    }
}
