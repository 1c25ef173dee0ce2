#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Rate Governor (§4.1): a priority-queued, per-[`RequestKind`] token
//! bucket scheduler with centralized retry/backoff, sitting between the
//! Pipeline Orchestrator and the Broker Session.

pub mod bucket;
pub mod error;
pub mod governor;
pub mod kind;
pub mod priority;
pub mod request;
pub mod retry;
pub mod stats;

pub use error::GovernorError;
pub use governor::{DispatchOutcome, Dispatcher, LimitTable, RateGovernor};
pub use kind::RequestKind;
pub use priority::Priority;
pub use request::{Request, RequestStatus, Ticket};
pub use retry::{BackoffPolicy, FailureClass};
pub use stats::{GovernorStats, KindStats};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Clone)]
    struct EchoDispatcher;

    impl Dispatcher<u32> for EchoDispatcher {
        type Output = u32;

        async fn dispatch(&self, payload: &u32) -> DispatchOutcome<u32> {
            DispatchOutcome::Success(*payload * 2)
        }
    }

    #[tokio::test]
    async fn submit_and_await_round_trip() {
        let governor = std::sync::Arc::new(RateGovernor::new(
            EchoDispatcher,
            LimitTable::new(),
            BackoffPolicy::default(),
        ));
        let (_tx, rx) = tokio::sync::oneshot::channel();
        let pump = tokio::spawn(governor.clone().run(rx));

        let ticket = governor.submit(RequestKind::Account, Priority::default(), 21).await;
        let result = governor.await_result(ticket).await.unwrap();
        assert_eq!(result, 42);

        pump.abort();
    }

    #[derive(Clone)]
    struct AlwaysThrottled;

    impl Dispatcher<u32> for AlwaysThrottled {
        type Output = u32;

        async fn dispatch(&self, _payload: &u32) -> DispatchOutcome<u32> {
            DispatchOutcome::Failure {
                class: FailureClass::Transient,
                message: "throttled".into(),
            }
        }
    }

    #[tokio::test]
    async fn retries_exhaust_after_attempt_cap() {
        let mut backoff = BackoffPolicy::default();
        backoff.base = Duration::from_millis(1);
        backoff.cap = Duration::from_millis(5);
        backoff.max_attempts = 2;

        let governor = std::sync::Arc::new(RateGovernor::new(
            AlwaysThrottled,
            LimitTable::new(),
            backoff,
        ));
        let (_tx, rx) = tokio::sync::oneshot::channel();
        let pump = tokio::spawn(governor.clone().run(rx));

        let ticket = governor.submit(RequestKind::Historical, Priority::default(), 1).await;
        let err = governor.await_result(ticket).await.unwrap_err();
        assert!(matches!(err, GovernorError::RetriesExhausted(_, _)));

        pump.abort();
    }

    #[tokio::test]
    async fn respects_per_kind_token_bucket_capacity() {
        let mut limits = LimitTable::new();
        limits.insert(RequestKind::Historical, (2, Duration::from_secs(60)));

        let governor = std::sync::Arc::new(RateGovernor::new(
            EchoDispatcher,
            limits,
            BackoffPolicy::default(),
        ));
        let (_tx, rx) = tokio::sync::oneshot::channel();
        let pump = tokio::spawn(governor.clone().run(rx));

        let mut tickets = Vec::new();
        for i in 0..5u32 {
            tickets.push(governor.submit(RequestKind::Historical, Priority::default(), i).await);
        }
        // Give the pump a moment to admit what capacity allows.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stats = governor.stats().await;
        let kind_stats = stats.by_kind.get(&RequestKind::Historical).unwrap();
        assert!(kind_stats.queue_depth + kind_stats.in_flight <= 5);

        for ticket in tickets {
            let _ = governor.await_result(ticket).await;
        }
        pump.abort();
    }
}
