use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};
use std::sync::Mutex as StdMutex;

use chrono::Utc;
use dna_instrument::{Bar, BarSource, Symbol, Timeframe};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::protocol::{AccountInfo, BrokerRequest, BrokerResponsePart, RequestId};
use crate::session::BrokerTransport;

/// Deterministic in-memory broker used by tests and by callers that want
/// to exercise the pipeline without a live broker dialect, per the
/// Non-goal in §1 ("one broker dialect is assumed at the boundary").
#[derive(Debug, Default)]
pub struct MockBroker {
    fail_probe: AtomicBool,
    /// Exact bars to hand back for a (symbol, timeframe) `HistoricalBars`
    /// request instead of synthesizing them, so tests can set up a precise
    /// price path (take-profit fills, forced closes, OHLC violations).
    overrides: StdMutex<HashMap<(Symbol, Timeframe), Vec<Bar>>>,
    /// Number of remaining `HistoricalBars` requests that should fail with
    /// [`SessionError::Throttled`] before the broker starts answering them,
    /// to exercise the Rate Governor's retry path.
    throttle_remaining: AtomicU32,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the account-info probe fail, to exercise the not-READY path.
    pub fn with_failing_probe(self) -> Self {
        self.fail_probe.store(true, AtomicOrdering::Relaxed);
        self
    }

    /// Replaces the synthesized bars for `(symbol, timeframe)` with exactly
    /// `bars`, regardless of the requested range.
    pub fn with_override(self, symbol: Symbol, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.overrides.lock().unwrap().insert((symbol, timeframe), bars);
        self
    }

    /// Fails the first `count` `HistoricalBars` requests with a transient
    /// [`SessionError::Throttled`], then answers normally.
    pub fn with_throttled_historical(self, count: u32) -> Self {
        self.throttle_remaining.store(count, AtomicOrdering::Relaxed);
        self
    }

    fn synthesize_bars(symbol: &dna_instrument::Symbol, timeframe: dna_instrument::Timeframe, from: chrono::DateTime<Utc>, to: chrono::DateTime<Utc>) -> Vec<Bar> {
        let now = Utc::now();
        timeframe
            .grid_between(from, to)
            .into_iter()
            .enumerate()
            .map(|(i, ts)| {
                let base = dec!(100) + Decimal::from(i % 7);
                Bar::new(
                    symbol.clone(),
                    timeframe,
                    ts,
                    base,
                    base + dec!(0.50),
                    base - dec!(0.50),
                    base + dec!(0.10),
                    dec!(1000),
                    BarSource::Historical,
                    now,
                )
                .expect("synthesized bar respects OHLCV invariants by construction")
            })
            .collect()
    }
}

impl BrokerTransport for MockBroker {
    async fn connect(&self, _endpoint: &str, _client_id: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn send(
        &self,
        _request_id: RequestId,
        request: BrokerRequest,
    ) -> Result<mpsc::Receiver<BrokerResponsePart>, SessionError> {
        let (tx, rx) = mpsc::channel(64);
        match request {
            BrokerRequest::HistoricalBars {
                symbol,
                timeframe,
                from,
                to,
                what_to_show: _,
            } => {
                if self
                    .throttle_remaining
                    .fetch_update(AtomicOrdering::Relaxed, AtomicOrdering::Relaxed, |n| {
                        (n > 0).then_some(n - 1)
                    })
                    .is_ok()
                {
                    return Err(SessionError::Throttled);
                }
                let bars = match self.overrides.lock().unwrap().get(&(symbol.clone(), timeframe)) {
                    Some(overridden) => overridden.clone(),
                    None => Self::synthesize_bars(&symbol, timeframe, from, to),
                };
                tokio::spawn(async move {
                    let _ = tx.send(BrokerResponsePart::Bars(bars)).await;
                    let _ = tx.send(BrokerResponsePart::Terminator).await;
                });
            }
            BrokerRequest::SubscribeMarketData { .. } => {
                tokio::spawn(async move {
                    let _ = tx.send(BrokerResponsePart::Ack).await;
                    let _ = tx.send(BrokerResponsePart::Terminator).await;
                });
            }
            BrokerRequest::RequestAccountInfo => {
                tokio::spawn(async move {
                    let _ = tx
                        .send(BrokerResponsePart::Account(AccountInfo {
                            account_id: "DNA-MOCK".to_string(),
                            buying_power: dec!(100_000),
                        }))
                        .await;
                    let _ = tx.send(BrokerResponsePart::Terminator).await;
                });
            }
            BrokerRequest::Cancel(_) => {
                tokio::spawn(async move {
                    let _ = tx.send(BrokerResponsePart::Ack).await;
                    let _ = tx.send(BrokerResponsePart::Terminator).await;
                });
            }
        }
        Ok(rx)
    }

    async fn abort(&self, _request_id: RequestId) {}

    async fn probe_account(&self) -> Result<(), SessionError> {
        if self.fail_probe.load(AtomicOrdering::Relaxed) {
            Err(SessionError::ProbeTimedOut)
        } else {
            Ok(())
        }
    }
}
