//! # msgate Core
//!
//! Provider routing and failover for the msgate SMS gateway.
//!
//! ## Overview
//!
//! This crate owns everything between "send this message to that country"
//! and the upstream SMS APIs:
//!
//! - **Provider adapters** behind one [`ProviderAdapter`] contract
//! - **Registry** of configured adapters with country/network coverage
//! - **Router** with priority-ordered failover and provider ranking
//! - **Per-adapter statistics** feeding selection and health reports
//! - **Resilience**: retry with backoff, circuit breaker, send quotas
//! - **Configuration** loaded from TOML with environment overrides
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Kairos, Africa's Talking, Twilio, and the scripted mock |
//! | [`bulk`] | Paced batch dispatch above the router |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`config`] | Configuration model and figment loader |
//! | [`domain`] | Send options, outcomes, statuses, phone numbers |
//! | [`error`] | Error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`provider`] | Adapter trait and health report |
//! | [`registry`] | Provider registry |
//! | [`retry`] | Retry policy |
//! | [`router`] | Failover routing and provider ranking |
//! | [`stats`] | Per-adapter counters |
//! | [`throttling`] | Per-adapter send quota |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use msgate_core::{load_config_from_path, ProviderRegistry, Router, SendOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config_from_path(Path::new("msgate.toml"))?;
//!     let registry = Arc::new(ProviderRegistry::from_config(&config)?);
//!     let router = Router::new(registry);
//!
//!     let options = SendOptions::new("+233244123456", "Your code is 1234", "MSGATE");
//!     let outcome = router.send(options, "GH", None).await;
//!     println!("{} via {}", outcome.status, outcome.provider_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │     Router      │────▶│ ProviderRegistry │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ ProviderAdapter │────▶│ Upstream (retry, │
//! │ + ProviderStats │     │ breaker, quota)  │
//! └─────────────────┘     └────────┬─────────┘
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │ HttpClient       │
//!                         │ (reqwest/script) │
//!                         └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Sending never returns `Err`: every failure is a [`SendOutcome`] with
//! `success == false`, a [`SendStatus`], and usually an error code.
//!
//! ```rust
//! use msgate_core::{codes, SendOutcome, SendStatus};
//!
//! fn describe(outcome: &SendOutcome) -> &'static str {
//!     match (outcome.status, outcome.error_code.as_deref()) {
//!         (_, Some(codes::NO_PROVIDER)) => "destination not covered",
//!         (_, Some(codes::ALL_FAILED)) => "every provider failed",
//!         (SendStatus::InsufficientCredit, _) => "top up the account",
//!         _ if outcome.success => "accepted",
//!         _ => "failed",
//!     }
//! }
//! ```
//!
//! Only startup can fail hard, with a [`ConfigError`].

pub mod adapters;
pub mod bulk;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod router;
pub mod stats;
pub mod throttling;

// Adapter implementations
pub use adapters::{
    build_adapter, AfricasTalkingAdapter, KairosAdapter, MockAdapter, MockReply, TwilioAdapter,
};

// Bulk dispatch
pub use bulk::{BulkDispatcher, BulkJob, BulkReport};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::{
    load_config_from_path, load_config_from_str, BulkConfig, GatewayConfig, LogFormat,
    LoggingConfig, ProviderConfig, ProviderCredentials, ProviderKind, RoutingConfig,
    DEFAULT_CONFIG_PATH,
};

// Domain models
pub use domain::{
    codes, normalize_country, normalize_network, validate_alphanumeric_sender, Balance,
    DeliveryState, DeliveryStatus, Msisdn, ProviderCapabilities, SendOptions, SendOutcome,
    SendStatus, MULTI_PROVIDER_ID, ROUTER_PROVIDER_ID, WILDCARD_COUNTRY,
};

// Error types
pub use error::{ConfigError, ProviderError, RegistryError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient,
};

// Adapter contract
pub use provider::{BoxFuture, ProviderAdapter, ProviderHealth};

// Registry
pub use registry::ProviderRegistry;

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Routing
pub use router::{Router, RouterConfig, SelectionCriterion};

// Statistics
pub use stats::{ProviderStats, StatsSnapshot};

// Throttling
pub use throttling::RateGate;

// Cancellation token accepted by `Router::send_with_cancel` and bulk dispatch
pub use tokio_util::sync::CancellationToken;
