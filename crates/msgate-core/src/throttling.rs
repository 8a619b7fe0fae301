use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-adapter send quota. When the budget is spent the adapter fails the
/// attempt immediately so the router can move on to the next candidate.
#[derive(Clone)]
pub struct RateGate {
    limiter: Arc<DirectRateLimiter>,
    per_minute: u32,
}

impl RateGate {
    /// `None` when `per_minute` is zero (no gate).
    pub fn per_minute(per_minute: u32) -> Option<Self> {
        let limit = NonZeroU32::new(per_minute)?;
        Some(Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(limit))),
            per_minute,
        })
    }

    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub const fn limit_per_minute(&self) -> u32 {
        self.per_minute
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("per_minute", &self.per_minute)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_disables_gate() {
        assert!(RateGate::per_minute(0).is_none());
    }

    #[test]
    fn burst_is_bounded_by_quota() {
        let gate = RateGate::per_minute(3).expect("non-zero quota");

        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire(), "fourth send within the minute must be refused");
        assert_eq!(gate.limit_per_minute(), 3);
    }
}
