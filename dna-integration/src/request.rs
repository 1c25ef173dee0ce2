use std::cmp::Ordering;
use std::time::Instant;

use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};

use crate::kind::RequestKind;
use crate::priority::Priority;

/// Opaque handle returned by [`RateGovernor::submit`](crate::governor::RateGovernor::submit).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, Constructor)]
#[display("Ticket({_0})")]
pub struct Ticket(pub u64);

/// Lifecycle state of a [`Request`], per §3.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Queued,
    InFlight,
    Completed,
    Failed,
    Cancelled,
}

/// A request owned by the Rate Governor from enqueue to terminal status
/// (§3). `P` is the broker-specific payload; the governor never inspects
/// it, only schedules around it.
#[derive(Debug, Clone)]
pub struct Request<P> {
    pub ticket: Ticket,
    pub kind: RequestKind,
    pub priority: Priority,
    pub payload: P,
    pub attempt_count: u32,
    pub first_seen_at: Instant,
    pub status: RequestStatus,
}

/// Queue entry used to order pending requests by `(priority DESC,
/// first_seen_at ASC)`, per §4.1.
pub struct QueueEntry {
    pub ticket: Ticket,
    pub priority: Priority,
    pub first_seen_at: Instant,
}

impl Eq for QueueEntry {}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.first_seen_at == other.first_seen_at
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority and earlier arrival
        // should sort "greater" so they are popped first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.first_seen_at.cmp(&self.first_seen_at))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
