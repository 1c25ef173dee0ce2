#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Broker Session (§4.2): connection lifecycle, request/response
//! correlation and dispatch over a session-oriented broker API.

pub mod backoff;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod session;
pub mod state;

pub use error::SessionError;
pub use mock::MockBroker;
pub use protocol::{AccountInfo, BrokerRequest, BrokerResponsePart, RequestId, WhatToShow};
pub use session::{BrokerSession, BrokerTransport};
pub use state::SessionState;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dna_instrument::{Symbol, Timeframe};

    #[tokio::test]
    async fn connect_probes_account_and_reaches_ready() {
        let session = BrokerSession::new(MockBroker::new(), "mock://local", "client-1");
        assert_eq!(session.status().await, SessionState::Disconnected);
        session.connect().await.unwrap();
        assert_eq!(session.status().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn failed_probe_leaves_session_not_ready() {
        let session = BrokerSession::new(MockBroker::new().with_failing_probe(), "mock://local", "client-1");
        assert!(session.connect().await.is_err());
        assert_eq!(session.status().await, SessionState::Disconnected);
    }

    #[tokio::test]
    async fn historical_bars_round_trip_terminates() {
        let session = BrokerSession::new(MockBroker::new(), "mock://local", "client-1");
        session.connect().await.unwrap();

        let from = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 4, 9, 35, 0).unwrap();
        let parts = session
            .dispatch_collect(
                BrokerRequest::HistoricalBars {
                    symbol: Symbol::from("AAPL"),
                    timeframe: Timeframe::M1,
                    from,
                    to,
                    what_to_show: WhatToShow::Trades,
                },
                std::time::Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert!(matches!(parts.last(), Some(BrokerResponsePart::Terminator)));
        let bars: Vec<_> = parts
            .iter()
            .filter_map(|p| match p {
                BrokerResponsePart::Bars(bars) => Some(bars),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(bars.len(), 5);
    }

    #[tokio::test]
    async fn dispatch_before_connect_is_rejected() {
        let session = BrokerSession::new(MockBroker::new(), "mock://local", "client-1");
        let err = session
            .dispatch(BrokerRequest::RequestAccountInfo)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotReady(_)));
    }
}
