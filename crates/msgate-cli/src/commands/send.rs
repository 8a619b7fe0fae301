use msgate_core::{Router, SendOptions};

use crate::cli::SendArgs;
use crate::error::CliError;

use super::{outcome_error, CommandResult};

pub async fn run(args: &SendArgs, router: &Router) -> Result<CommandResult, CliError> {
    let mut options = SendOptions::new(&args.to, &args.message, &args.sender);
    if let Some(correlation_id) = &args.correlation_id {
        options = options.with_correlation_id(correlation_id);
    }

    let outcome = router
        .send(options, &args.country, args.network.as_deref())
        .await;

    let provider_chain = outcome.attempts.clone();
    let error = outcome_error(&outcome);
    let mut result = CommandResult::ok(serde_json::to_value(&outcome)?, provider_chain);
    if let Some(error) = error {
        result = result.with_error(error);
    }
    Ok(result)
}
