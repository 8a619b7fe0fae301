//! # Domain Models
//!
//! Canonical types shared by the router, the registry, and every adapter.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ProviderCapabilities`] | Countries, networks, priority, retry and timeout budget of an adapter |
//! | [`SendOptions`] | Normalized send request handed to the router |
//! | [`SendOutcome`] | Unified result of a send attempt |
//! | [`SendStatus`] | Closed set of send statuses |
//! | [`DeliveryStatus`] | Result of a delivery-status lookup |
//! | [`Balance`] | Upstream account balance |
//! | [`Msisdn`] | Validated E.164 mobile number |
//!
//! Phone number and sender id checks live here but are applied by each
//! adapter, since every upstream has its own rules.

mod capabilities;
mod message;
mod phone;

pub use capabilities::{
    normalize_country, normalize_network, ProviderCapabilities, DEFAULT_MAX_RETRIES,
    DEFAULT_PRIORITY, DEFAULT_TIMEOUT_MS, WILDCARD_COUNTRY,
};
pub use message::{
    codes, Balance, DeliveryState, DeliveryStatus, SendOptions, SendOutcome, SendStatus,
    MULTI_PROVIDER_ID, ROUTER_PROVIDER_ID,
};
pub use phone::{validate_alphanumeric_sender, Msisdn};
