use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::{Duration, Instant};

use crate::adapters::finish;
use crate::domain::{
    Balance, DeliveryState, DeliveryStatus, ProviderCapabilities, SendOptions, SendOutcome,
    SendStatus,
};
use crate::error::ProviderError;
use crate::provider::{BoxFuture, ProviderAdapter};
use crate::stats::ProviderStats;

/// One scripted send result. The provider id is filled in by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct MockReply {
    pub success: bool,
    pub status: SendStatus,
    pub external_id: Option<String>,
    pub error_code: Option<String>,
    pub message: String,
    pub cost: Option<(f64, String)>,
}

impl MockReply {
    pub fn submitted(external_id: impl Into<String>) -> Self {
        Self {
            success: true,
            status: SendStatus::Submitted,
            external_id: Some(external_id.into()),
            error_code: None,
            message: String::from("accepted"),
            cost: None,
        }
    }

    pub fn failed(status: SendStatus) -> Self {
        Self {
            success: false,
            status,
            external_id: None,
            error_code: None,
            message: format!("scripted {status}"),
            cost: None,
        }
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_cost(mut self, amount: f64, currency: impl Into<String>) -> Self {
        self.cost = Some((amount, currency.into()));
        self
    }

    fn into_outcome(self, provider: &str) -> SendOutcome {
        let mut outcome = if self.success {
            SendOutcome::accepted(provider, self.status, self.external_id, self.message)
        } else {
            SendOutcome::failure(provider, self.status, self.message)
        };
        if let Some(code) = self.error_code {
            outcome = outcome.with_error_code(code);
        }
        if let Some((amount, currency)) = self.cost {
            outcome = outcome.with_cost(amount, currency);
        }
        outcome
    }
}

/// In-process adapter with scripted behaviour. Never built from
/// configuration.
#[derive(Debug)]
pub struct MockAdapter {
    capabilities: ProviderCapabilities,
    stats: ProviderStats,
    script: Mutex<VecDeque<MockReply>>,
    default_reply: MockReply,
    delay: Option<Duration>,
    statuses: BTreeMap<String, DeliveryState>,
    balance: Result<Balance, ProviderError>,
    calls: AtomicUsize,
    received: Mutex<Vec<SendOptions>>,
}

impl MockAdapter {
    /// Adapter that accepts every message with external id `"<name>-ok"`.
    pub fn new(capabilities: ProviderCapabilities) -> Self {
        let default_reply = MockReply::submitted(format!("{}-ok", capabilities.name));
        Self {
            capabilities,
            stats: ProviderStats::new(),
            script: Mutex::new(VecDeque::new()),
            default_reply,
            delay: None,
            statuses: BTreeMap::new(),
            balance: Ok(Balance::new(100.0, "USD")),
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Reply used once the script is exhausted.
    pub fn with_default_reply(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Queue a reply for the next send.
    pub fn then(self, reply: MockReply) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_delivery_status(
        mut self,
        external_id: impl Into<String>,
        state: DeliveryState,
    ) -> Self {
        self.statuses.insert(external_id.into(), state);
        self
    }

    pub fn with_balance(mut self, balance: Result<Balance, ProviderError>) -> Self {
        self.balance = balance;
        self
    }

    /// Number of `send` calls that started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<SendOptions> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self) -> MockReply {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

impl ProviderAdapter for MockAdapter {
    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn stats(&self) -> &ProviderStats {
        &self.stats
    }

    fn send<'a>(&'a self, options: SendOptions) -> BoxFuture<'a, SendOutcome> {
        Box::pin(async move {
            let started = Instant::now();
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.received
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(options);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let outcome = self.next_reply().into_outcome(self.name());
            finish(&self.stats, started, outcome)
        })
    }

    fn delivery_status<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, DeliveryStatus> {
        Box::pin(async move {
            match self.statuses.get(external_id) {
                Some(state) => DeliveryStatus::new(external_id, *state, self.name()),
                None => DeliveryStatus::unknown(
                    external_id,
                    format!("{} has no record of message", self.name()),
                )
                .with_provider(self.name()),
            }
        })
    }

    fn check_balance<'a>(&'a self) -> BoxFuture<'a, Result<Balance, ProviderError>> {
        Box::pin(async move { self.balance.clone() })
    }
}
