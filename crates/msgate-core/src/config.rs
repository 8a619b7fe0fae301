//! Gateway configuration model and loader.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. TOML file (`msgate.toml` unless another path is given)
//! 3. `MSGATE_*` environment variables for the scalar sections
//!
//! Provider credentials left out of the file fall back to each upstream's
//! conventional environment variables (see [`ProviderKind::credential_env`]).

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::{
    ProviderCapabilities, DEFAULT_MAX_RETRIES, DEFAULT_PRIORITY, DEFAULT_TIMEOUT_MS,
};
use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "msgate.toml";
pub const ENV_PREFIX: &str = "MSGATE_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub logging: LoggingConfig,
    pub routing: RoutingConfig,
    pub bulk: BulkConfig,
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive. `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    /// Latency assumed for adapters that have not been tried yet when ranking
    /// by speed.
    pub default_latency_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_latency_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BulkConfig {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_delay_ms: 1_000,
        }
    }
}

impl BulkConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Upstream integrations that can be built from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Kairos,
    #[serde(rename = "africastalking")]
    AfricasTalking,
    Twilio,
}

impl ProviderKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kairos => "kairos",
            Self::AfricasTalking => "africastalking",
            Self::Twilio => "twilio",
        }
    }

    /// Environment variable consulted when `field` is absent from the file.
    pub fn credential_env(self, field: &str) -> Option<&'static str> {
        match (self, field) {
            (Self::Kairos, "api_key") => Some("KAIROS_API_KEY"),
            (Self::Kairos, "api_secret") => Some("KAIROS_API_SECRET"),
            (Self::AfricasTalking, "username") => Some("AT_USERNAME"),
            (Self::AfricasTalking, "api_key") => Some("AT_API_KEY"),
            (Self::Twilio, "account_sid") => Some("TWILIO_ACCOUNT_SID"),
            (Self::Twilio, "auth_token") => Some("TWILIO_AUTH_TOKEN"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl ProviderCredentials {
    fn field(&self, field: &str) -> Option<&str> {
        match field {
            "api_key" => self.api_key.as_deref(),
            "api_secret" => self.api_secret.as_deref(),
            "username" => self.username.as_deref(),
            "account_sid" => self.account_sid.as_deref(),
            "auth_token" => self.auth_token.as_deref(),
            _ => None,
        }
    }
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub countries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<String>>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub credentials: ProviderCredentials,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ProviderConfig {
    pub fn capabilities(&self) -> Result<ProviderCapabilities, ConfigError> {
        let mut capabilities = ProviderCapabilities::new(self.name.clone(), &self.countries)?
            .with_priority(self.priority)
            .with_max_retries(self.max_retries)
            .with_timeout_ms(self.timeout_ms);
        if let Some(networks) = &self.networks {
            capabilities = capabilities.with_networks(networks)?;
        }
        Ok(capabilities)
    }

    /// Credential from the file, else from the kind's environment variable.
    pub fn credential(&self, field: &'static str) -> Result<String, ConfigError> {
        let configured = self
            .credentials
            .field(field)
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(value) = configured {
            return Ok(value.to_owned());
        }

        let env_key = self.kind.credential_env(field);
        if let Some(value) = env_key
            .and_then(|key| std::env::var(key).ok())
            .filter(|value| !value.trim().is_empty())
        {
            return Ok(value.trim().to_owned());
        }

        Err(ConfigError::MissingCredential {
            provider: self.name.clone(),
            field,
            env: env_key.unwrap_or("-").to_owned(),
        })
    }
}

impl GatewayConfig {
    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid(String::from(
                "at least one [[providers]] entry is required",
            )));
        }

        let mut names = BTreeSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "provider name '{}' is used more than once",
                    provider.name
                )));
            }
            if provider.timeout_ms == 0 {
                return Err(ConfigError::Invalid(format!(
                    "providers.{}.timeout_ms must be greater than zero",
                    provider.name
                )));
            }
            if matches!(&provider.base_url, Some(url) if url.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "providers.{}.base_url must not be empty",
                    provider.name
                )));
            }
            provider.capabilities()?;
        }

        if self.bulk.batch_size == 0 {
            return Err(ConfigError::Invalid(String::from(
                "bulk.batch_size must be greater than zero",
            )));
        }

        Ok(())
    }
}

/// Load the file at `path` with env overrides and validate the result.
pub fn load_config_from_path(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = build_figment(path).extract()?;
    config.validate()?;
    Ok(config)
}

/// Parse TOML content on top of the defaults. No env overrides, no validation.
pub fn load_config_from_str(toml_content: &str) -> Result<GatewayConfig, ConfigError> {
    let config = Figment::new()
        .merge(Serialized::defaults(GatewayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()?;
    Ok(config)
}

/// Layered figment before extraction.
pub fn build_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(GatewayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
}

/// `MSGATE_BULK_BATCH_SIZE` -> `bulk.batch_size`. Providers are not
/// overridable from the environment.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX)
        .filter(|key| {
            let key = key.as_str().to_ascii_lowercase();
            key.starts_with("logging_") || key.starts_with("routing_") || key.starts_with("bulk_")
        })
        .map(|key| {
            key.as_str()
                .to_ascii_lowercase()
                .replacen("logging_", "logging.", 1)
                .replacen("routing_", "routing.", 1)
                .replacen("bulk_", "bulk.", 1)
                .into()
        })
}
