use std::sync::Arc;

use msgate_core::{CircuitState, ProviderAdapter, ProviderCapabilities, Router, StatsSnapshot};
use serde::Serialize;

use crate::cli::ProvidersArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct ProviderEntry {
    capabilities: ProviderCapabilities,
    circuit: CircuitState,
    stats: StatsSnapshot,
}

impl ProviderEntry {
    fn from_adapter(adapter: &Arc<dyn ProviderAdapter>) -> Self {
        Self {
            capabilities: adapter.capabilities().clone(),
            circuit: adapter.circuit_state(),
            stats: adapter.stats().snapshot(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProvidersResponseData {
    providers: Vec<ProviderEntry>,
}

/// Registration order, or routing order when `--country` is given.
pub fn run(args: &ProvidersArgs, router: &Router) -> Result<CommandResult, CliError> {
    let adapters: Vec<Arc<dyn ProviderAdapter>> = match &args.country {
        Some(country) => router
            .candidates(country, args.network.as_deref())
            .iter()
            .filter_map(|name| router.registry().get_by_name(name))
            .collect(),
        None => router.registry().all().to_vec(),
    };

    let provider_chain = adapters
        .iter()
        .map(|adapter| adapter.name().to_owned())
        .collect();
    let data = ProvidersResponseData {
        providers: adapters.iter().map(ProviderEntry::from_adapter).collect(),
    };

    Ok(CommandResult::ok(serde_json::to_value(data)?, provider_chain))
}
