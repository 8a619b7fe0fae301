use std::sync::Arc;

use msgate_core::{BulkConfig, BulkDispatcher, BulkJob, CancellationToken, Router};

use crate::cli::BulkArgs;
use crate::error::CliError;

use super::{outcome_error, CommandResult};

pub async fn run(
    args: &BulkArgs,
    router: Arc<Router>,
    config: &BulkConfig,
) -> Result<CommandResult, CliError> {
    let raw = tokio::fs::read_to_string(&args.file).await?;
    let jobs: Vec<BulkJob> = serde_json::from_str(&raw).map_err(|source| CliError::BulkInput {
        path: args.file.display().to_string(),
        source,
    })?;
    tracing::info!(jobs = jobs.len(), file = %args.file.display(), "starting bulk dispatch");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current batch");
            on_interrupt.cancel();
        }
    });

    let dispatcher = BulkDispatcher::new(router, config);
    let report = dispatcher.dispatch_with_cancel(jobs, &cancel).await;
    interrupt.abort();

    let mut provider_chain: Vec<String> = Vec::new();
    let mut errors = Vec::new();
    for (index, outcome) in report.outcomes.iter().enumerate() {
        if outcome.success && !provider_chain.contains(&outcome.provider_id) {
            provider_chain.push(outcome.provider_id.clone());
        }
        if let Some(mut error) = outcome_error(outcome) {
            error.message = format!("job {index}: {}", error.message);
            errors.push(error);
        }
    }

    Ok(CommandResult::ok(serde_json::to_value(&report)?, provider_chain).with_errors(errors))
}
