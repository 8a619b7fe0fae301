use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Country entry meaning "every destination".
pub const WILDCARD_COUNTRY: &str = "*";

pub const DEFAULT_PRIORITY: i32 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 1;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Static routing descriptor for one adapter. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub name: String,
    /// Upper-case ISO 3166-1 alpha-2 codes, or `*`.
    pub countries: Vec<String>,
    /// Upper-case network identifiers; `None` serves every network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<BTreeSet<String>>,
    /// Lower is tried first.
    pub priority: i32,
    pub max_retries: u32,
    pub timeout_ms: u64,
}

impl ProviderCapabilities {
    pub fn new<I, S>(name: impl Into<String>, countries: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyProviderName);
        }

        let mut normalized = Vec::new();
        for country in countries {
            let code = normalize_country(country.as_ref())?;
            if !normalized.contains(&code) {
                normalized.push(code);
            }
        }
        if normalized.is_empty() {
            return Err(ValidationError::NoCountries { name });
        }

        Ok(Self {
            name,
            countries: normalized,
            networks: None,
            priority: DEFAULT_PRIORITY,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    pub fn with_networks<I, S>(mut self, networks: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = networks
            .into_iter()
            .map(|network| normalize_network(network.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        self.networks = Some(set);
        Ok(self)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `country` must already be normalized (see [`normalize_country`]).
    pub fn serves_country(&self, country: &str) -> bool {
        self.countries
            .iter()
            .any(|code| code == WILDCARD_COUNTRY || code == country)
    }

    /// `network` must already be normalized (see [`normalize_network`]).
    pub fn serves_network(&self, network: &str) -> bool {
        self.networks
            .as_ref()
            .map_or(true, |networks| networks.contains(network))
    }
}

/// Upper-case a two-letter country code, accepting the wildcard.
pub fn normalize_country(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed == WILDCARD_COUNTRY {
        return Ok(String::from(WILDCARD_COUNTRY));
    }

    if trimmed.len() != 2 || !trimmed.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidCountry {
            value: trimmed.to_owned(),
        });
    }

    Ok(trimmed.to_ascii_uppercase())
}

pub fn normalize_network(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyNetwork);
    }
    Ok(trimmed.to_ascii_uppercase())
}
