use thiserror::Error;

/// Errors the Broker Session can raise. `is_transient` implements the
/// fixed transient/fatal mapping table named in §6: network-level,
/// timeout, and broker-signalled throttling are transient; authentication,
/// malformed request, and unknown symbol are fatal.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not READY (state: {0})")]
    NotReady(String),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("account-info probe did not complete within the post-connect deadline")]
    ProbeTimedOut,

    #[error("request timed out waiting for a terminator")]
    Timeout,

    #[error("broker signalled back-pressure")]
    Throttled,

    #[error("authentication rejected: {0}")]
    AuthenticationFailed(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("request aborted by caller")]
    Aborted,

    #[error("transport error: {0}")]
    Transport(String),
}

impl SessionError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::Timeout | SessionError::Throttled | SessionError::Transport(_)
        )
    }
}
