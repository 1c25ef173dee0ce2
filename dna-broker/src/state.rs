use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Broker Session connection lifecycle, per §4.2.
///
/// `DEGRADED` is entered when consecutive in-flight requests time out; it
/// returns to `READY` once a reconnect succeeds and the post-connect
/// account-info probe passes again.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Handshaking,
    Ready,
    Degraded,
    Disconnecting,
}

impl SessionState {
    /// True if dispatching a request is currently permitted.
    pub fn accepts_requests(self) -> bool {
        matches!(self, SessionState::Ready)
    }

    /// Validates a transition according to the state machine in §4.2.
    /// Returns `false` for transitions the machine does not allow.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Handshaking)
                | (Connecting, Disconnected)
                | (Handshaking, Ready)
                | (Handshaking, Disconnected)
                | (Ready, Degraded)
                | (Ready, Disconnecting)
                | (Degraded, Ready)
                | (Degraded, Connecting)
                | (Degraded, Disconnecting)
                | (Disconnecting, Disconnected)
        )
    }
}
