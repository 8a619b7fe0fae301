use msgate_core::{codes, Router, SelectionCriterion};
use serde::Serialize;

use crate::cli::BestArgs;
use crate::error::CliError;
use crate::output::EnvelopeError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct BestResponseData {
    criterion: SelectionCriterion,
    provider: Option<String>,
    ranking: Vec<String>,
}

pub fn run(args: &BestArgs, router: &Router) -> Result<CommandResult, CliError> {
    let criterion = SelectionCriterion::from(args.criterion);
    let ranking: Vec<String> = router
        .rank(&args.country, args.network.as_deref(), criterion)
        .iter()
        .map(|adapter| adapter.name().to_owned())
        .collect();
    let provider = ranking.first().cloned();

    let data = BestResponseData {
        criterion,
        provider: provider.clone(),
        ranking,
    };
    let result = CommandResult::ok(serde_json::to_value(data)?, provider.into_iter().collect());

    if result.provider_chain.is_empty() {
        return Ok(result.with_error(EnvelopeError::new(
            codes::NO_PROVIDER,
            format!("no provider available for {}", args.country),
        )));
    }
    Ok(result)
}
