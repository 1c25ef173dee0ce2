use thiserror::Error;

use crate::request::Ticket;

/// Errors surfaced by [`RateGovernor`](crate::governor::RateGovernor)
/// operations.
#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("ticket {0} is unknown to this governor")]
    UnknownTicket(Ticket),

    #[error("request {0} was cancelled")]
    Cancelled(Ticket),

    #[error("request {0} exhausted its retry budget: {1}")]
    RetriesExhausted(Ticket, String),

    #[error("request {0} failed fatally: {1}")]
    Fatal(Ticket, String),
}
