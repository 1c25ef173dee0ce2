use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display};
use dna_instrument::{Bar, Symbol, Timeframe};
use dna_integration::RequestKind;
use serde::{Deserialize, Serialize};

/// Session-scoped monotonic identifier correlating a [`BrokerRequest`] to
/// its [`BrokerResponsePart`] stream, per §4.2.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, Constructor)]
#[display("RequestId({_0})")]
pub struct RequestId(pub u64);

/// What the historical-bars verb should return, mirroring the broker
/// dialect's `what-to-show` parameter named in §6.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum WhatToShow {
    Trades,
    MidPoint,
    Bid,
    Ask,
}

/// The verbs the core depends on at the broker boundary (§6): historical
/// bars, market-data subscription, account-info probe, and cancellation.
/// `Connect`/`disconnect` are modeled as dedicated [`BrokerSession`]
/// methods rather than requests, since they govern the session itself.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum BrokerRequest {
    HistoricalBars {
        symbol: Symbol,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        what_to_show: WhatToShow,
    },
    SubscribeMarketData {
        symbol: Symbol,
        timeframe: Timeframe,
    },
    RequestAccountInfo,
    Cancel(RequestId),
}

impl BrokerRequest {
    /// Which [`RequestKind`] the Rate Governor should meter and deadline
    /// this request under, per §6.
    pub fn kind(&self) -> RequestKind {
        match self {
            BrokerRequest::HistoricalBars { .. } => RequestKind::Historical,
            BrokerRequest::SubscribeMarketData { .. } => RequestKind::Market,
            BrokerRequest::RequestAccountInfo => RequestKind::Account,
            BrokerRequest::Cancel(_) => RequestKind::Order,
        }
    }
}

/// Account snapshot returned by the account-info probe and
/// `RequestAccountInfo`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccountInfo {
    pub account_id: String,
    pub buying_power: rust_decimal::Decimal,
}

/// One part of a (possibly multi-part) response stream. A stream always
/// ends with an explicit [`BrokerResponsePart::Terminator`]; its absence
/// within the per-kind timeout marks the request transient-failed (§4.2).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum BrokerResponsePart {
    Bars(Vec<Bar>),
    Account(AccountInfo),
    Ack,
    Terminator,
}
