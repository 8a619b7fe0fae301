mod best;
mod bulk;
mod health;
mod providers;
mod send;
mod status;

use std::sync::Arc;
use std::time::Instant;

use msgate_core::{GatewayConfig, ProviderRegistry, Router, RouterConfig, SendOutcome};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::Metadata;
use crate::output::{Envelope, EnvelopeError};

pub struct CommandResult {
    pub data: Value,
    pub errors: Vec<EnvelopeError>,
    pub provider_chain: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value, provider_chain: Vec<String>) -> Self {
        Self {
            data,
            errors: Vec::new(),
            provider_chain,
        }
    }

    pub fn with_error(mut self, error: EnvelopeError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub async fn run(cli: &Cli, config: &GatewayConfig) -> Result<Envelope, CliError> {
    let started = Instant::now();
    let registry = Arc::new(ProviderRegistry::from_config(config)?);
    let router = Arc::new(Router::with_config(
        Arc::clone(&registry),
        RouterConfig::from(&config.routing),
    ));

    let result = match &cli.command {
        Command::Send(args) => send::run(args, &router).await?,
        Command::Bulk(args) => bulk::run(args, Arc::clone(&router), &config.bulk).await?,
        Command::Status(args) => status::run(args, &router).await?,
        Command::Health => health::run(&registry).await?,
        Command::Providers(args) => providers::run(args, &router)?,
        Command::Best(args) => best::run(args, &router)?,
    };

    let CommandResult {
        data,
        errors,
        provider_chain,
    } = result;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    Ok(Envelope {
        meta: Metadata::new(provider_chain, latency_ms),
        data,
        errors,
    })
}

/// Envelope error for a failed send; `None` when it succeeded.
fn outcome_error(outcome: &SendOutcome) -> Option<EnvelopeError> {
    if outcome.success {
        return None;
    }
    let code = outcome
        .error_code
        .clone()
        .unwrap_or_else(|| outcome.status.as_str().to_ascii_uppercase());
    Some(EnvelopeError::new(code, outcome.message.clone()).with_provider(&outcome.provider_id))
}
