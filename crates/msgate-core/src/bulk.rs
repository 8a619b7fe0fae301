//! Paced bulk sending above the router.
//!
//! Jobs are split into batches of `batch_size`. A batch is sent
//! concurrently and awaited in full, then the dispatcher sleeps
//! `batch_delay` before starting the next one. There is no delay after the
//! last batch.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::BulkConfig;
use crate::domain::{codes, SendOptions, SendOutcome, SendStatus, ROUTER_PROVIDER_ID};
use crate::router::Router;

/// One message of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkJob {
    pub options: SendOptions,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl BulkJob {
    pub fn new(options: SendOptions, country: impl Into<String>) -> Self {
        Self {
            options,
            country: country.into(),
            network: None,
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }
}

/// Outcomes in the same order as the submitted jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkReport {
    pub outcomes: Vec<SendOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub batches: usize,
}

impl BulkReport {
    fn from_outcomes(outcomes: Vec<SendOutcome>, batches: usize) -> Self {
        let succeeded = outcomes.iter().filter(|outcome| outcome.success).count();
        Self {
            failed: outcomes.len() - succeeded,
            succeeded,
            outcomes,
            batches,
        }
    }
}

pub struct BulkDispatcher {
    router: Arc<Router>,
    batch_size: usize,
    batch_delay: Duration,
}

impl BulkDispatcher {
    pub fn new(router: Arc<Router>, config: &BulkConfig) -> Self {
        Self {
            router,
            batch_size: config.batch_size.max(1),
            batch_delay: config.batch_delay(),
        }
    }

    pub async fn dispatch(&self, jobs: Vec<BulkJob>) -> BulkReport {
        self.dispatch_with_cancel(jobs, &CancellationToken::new())
            .await
    }

    /// Once `cancel` fires no further batch starts; jobs of skipped batches
    /// are reported as `CANCELLED`.
    pub async fn dispatch_with_cancel(
        &self,
        jobs: Vec<BulkJob>,
        cancel: &CancellationToken,
    ) -> BulkReport {
        let total = jobs.len();
        let mut outcomes: Vec<Option<SendOutcome>> = vec![None; total];
        let mut batches = 0;
        let mut pending = jobs.into_iter().enumerate().peekable();

        while pending.peek().is_some() {
            if cancel.is_cancelled() {
                tracing::info!(remaining = pending.len(), "bulk dispatch cancelled");
                break;
            }

            batches += 1;
            let mut tasks = JoinSet::new();
            for (index, job) in pending.by_ref().take(self.batch_size) {
                let router = Arc::clone(&self.router);
                let cancel = cancel.clone();
                tasks.spawn(async move {
                    let outcome = router
                        .send_with_cancel(job.options, &job.country, job.network.as_deref(), &cancel)
                        .await;
                    (index, outcome)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, outcome)) => outcomes[index] = Some(outcome),
                    Err(error) => tracing::error!(%error, "bulk send task failed"),
                }
            }
            tracing::debug!(batch = batches, "bulk batch finished");

            if pending.peek().is_some() && !self.batch_delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(self.batch_delay) => {}
                    () = cancel.cancelled() => {}
                }
            }
        }

        let outcomes = outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| {
                    let (code, message) = if cancel.is_cancelled() {
                        (codes::CANCELLED, "bulk dispatch cancelled before this message")
                    } else {
                        (codes::ROUTING_ERROR, "send task ended without an outcome")
                    };
                    SendOutcome::failure(ROUTER_PROVIDER_ID, SendStatus::Failed, message)
                        .with_error_code(code)
                })
            })
            .collect();

        let report = BulkReport::from_outcomes(outcomes, batches);
        tracing::info!(
            total,
            succeeded = report.succeeded,
            failed = report.failed,
            batches = report.batches,
            "bulk dispatch finished"
        );
        report
    }
}
