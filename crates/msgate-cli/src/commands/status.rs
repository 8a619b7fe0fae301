use msgate_core::Router;

use crate::cli::StatusArgs;
use crate::error::CliError;
use crate::output::EnvelopeError;

use super::CommandResult;

pub async fn run(args: &StatusArgs, router: &Router) -> Result<CommandResult, CliError> {
    let status = router
        .check_delivery_status(&args.external_id, args.provider.as_deref())
        .await;

    let provider_chain = status.provider_id.iter().cloned().collect();
    let error = (!status.is_known()).then(|| {
        EnvelopeError::new(
            "UNKNOWN_STATUS",
            status
                .error
                .clone()
                .unwrap_or_else(|| String::from("delivery status is unknown")),
        )
    });

    let mut result = CommandResult::ok(serde_json::to_value(&status)?, provider_chain);
    if let Some(error) = error {
        result = result.with_error(error);
    }
    Ok(result)
}
