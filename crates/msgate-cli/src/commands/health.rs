use msgate_core::ProviderRegistry;

use crate::error::CliError;
use crate::output::EnvelopeError;

use super::CommandResult;

pub async fn run(registry: &ProviderRegistry) -> Result<CommandResult, CliError> {
    let report = registry.health_check_all().await;

    let errors = report
        .iter()
        .filter(|(_, health)| !health.healthy)
        .map(|(name, health)| {
            EnvelopeError::new(
                "UNHEALTHY",
                health
                    .error
                    .clone()
                    .unwrap_or_else(|| String::from("provider is unhealthy")),
            )
            .with_provider(name)
        })
        .collect();
    let provider_chain = report.keys().cloned().collect();

    Ok(CommandResult::ok(serde_json::to_value(&report)?, provider_chain).with_errors(errors))
}
