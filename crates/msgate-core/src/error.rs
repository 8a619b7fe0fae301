use thiserror::Error;

/// Validation errors for destinations, recipients, and sender identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("phone number cannot be empty")]
    EmptyPhoneNumber,
    #[error("phone number contains invalid character '{ch}' at index {index}")]
    PhoneInvalidChar { ch: char, index: usize },
    #[error("phone number must have between {min} and {max} digits, got {len}")]
    PhoneLength { len: usize, min: usize, max: usize },
    #[error("phone number '{value}' is not a mobile number in the {country} numbering plan")]
    NotInNumberingPlan { value: String, country: &'static str },

    #[error("sender id cannot be empty")]
    EmptySenderId,
    #[error("sender id length {len} exceeds max {max}")]
    SenderIdTooLong { len: usize, max: usize },
    #[error("sender id contains invalid character '{ch}'")]
    SenderIdInvalidChar { ch: char },

    #[error("invalid country code '{value}', expected ISO 3166-1 alpha-2 or '*'")]
    InvalidCountry { value: String },
    #[error("network identifier cannot be empty")]
    EmptyNetwork,
    #[error("provider '{name}' must serve at least one country")]
    NoCountries { name: String },
    #[error("provider name cannot be empty")]
    EmptyProviderName,

    #[error("message body cannot be empty")]
    EmptyMessage,

    #[error("unknown selection criterion '{value}', expected cost, speed or reliability")]
    UnknownCriterion { value: String },
}

/// Failures raised by adapters outside the send path (balance checks, decoding).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("authentication rejected by upstream")]
    Authentication,
    #[error("could not decode upstream response: {0}")]
    Decode(String),
    #[error("operation not supported: {0}")]
    Unsupported(String),
}

/// Registry construction errors. These are fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("provider '{name}' is already registered")]
    DuplicateProvider { name: String },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("provider '{provider}' is missing credential '{field}' (set it in config or via {env})")]
    MissingCredential {
        provider: String,
        field: &'static str,
        env: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Load(Box::new(error))
    }
}
