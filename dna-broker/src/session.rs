use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use dna_integration::governor::{DispatchOutcome, Dispatcher};
use dna_integration::retry::FailureClass;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::backoff::{ReconnectBackoff, ReconnectState};
use crate::error::SessionError;
use crate::protocol::{BrokerRequest, BrokerResponsePart, RequestId};
use crate::state::SessionState;

/// Consecutive in-flight timeouts before the session is marked DEGRADED,
/// per §4.2.
const DEGRADED_TIMEOUT_THRESHOLD: u32 = 3;

/// Deadline for the post-connect account-info probe, per §4.2.
const PROBE_DEADLINE: Duration = Duration::from_secs(10);

/// The socket-level half of the session: one dialect implementation per
/// broker. The core depends on exactly the verbs named in §6; everything
/// else (framing, auth, keepalive) is the transport's concern.
pub trait BrokerTransport: Send + Sync + 'static {
    fn connect(
        &self,
        endpoint: &str,
        client_id: &str,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    fn send(
        &self,
        request_id: RequestId,
        request: BrokerRequest,
    ) -> impl Future<Output = Result<mpsc::Receiver<BrokerResponsePart>, SessionError>> + Send;

    fn abort(&self, request_id: RequestId) -> impl Future<Output = ()> + Send;

    fn probe_account(&self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// The Broker Session from §4.2: connection lifecycle, request dispatch
/// and response correlation over a session-oriented broker API.
pub struct BrokerSession<T: BrokerTransport> {
    transport: Arc<T>,
    state: Arc<Mutex<SessionState>>,
    endpoint: String,
    client_id: String,
    next_request_id: AtomicU64,
    consecutive_timeouts: AtomicU32,
    reconnect_backoff: ReconnectBackoff,
}

impl<T: BrokerTransport> BrokerSession<T> {
    pub fn new(transport: T, endpoint: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            transport: Arc::new(transport),
            state: Arc::new(Mutex::new(SessionState::Disconnected)),
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            next_request_id: AtomicU64::new(1),
            consecutive_timeouts: AtomicU32::new(0),
            reconnect_backoff: ReconnectBackoff::default(),
        }
    }

    pub async fn status(&self) -> SessionState {
        *self.state.lock().await
    }

    async fn transition(&self, next: SessionState) -> Result<(), SessionError> {
        let mut guard = self.state.lock().await;
        if !guard.can_transition_to(next) {
            return Err(SessionError::NotReady(format!(
                "cannot transition {} -> {next}",
                *guard
            )));
        }
        *guard = next;
        Ok(())
    }

    /// Establishes the session: DISCONNECTED -> CONNECTING -> HANDSHAKING
    /// -> READY, gated by one account-info probe (§4.2). If the probe
    /// fails within [`PROBE_DEADLINE`], the session is declared not READY
    /// and returned to DISCONNECTED.
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.transition(SessionState::Connecting).await?;
        self.transition(SessionState::Handshaking).await?;

        if let Err(err) = self.transport.connect(&self.endpoint, &self.client_id).await {
            let mut guard = self.state.lock().await;
            *guard = SessionState::Disconnected;
            return Err(err);
        }

        match timeout(PROBE_DEADLINE, self.transport.probe_account()).await {
            Ok(Ok(())) => {
                self.transition(SessionState::Ready).await?;
                self.consecutive_timeouts.store(0, AtomicOrdering::Relaxed);
                info!(client_id = %self.client_id, "broker session READY");
                Ok(())
            }
            Ok(Err(err)) => {
                let mut guard = self.state.lock().await;
                *guard = SessionState::Disconnected;
                Err(err)
            }
            Err(_) => {
                let mut guard = self.state.lock().await;
                *guard = SessionState::Disconnected;
                Err(SessionError::ProbeTimedOut)
            }
        }
    }

    pub async fn disconnect(&self) {
        let _ = self.transition(SessionState::Disconnecting).await;
        self.transport.disconnect().await;
        let mut guard = self.state.lock().await;
        *guard = SessionState::Disconnected;
    }

    /// Dispatches `request`, returning its raw response stream. Does not
    /// enforce the per-kind timeout itself; see [`Self::dispatch_collect`]
    /// for the common case of collecting a full multi-part response.
    pub async fn dispatch(
        &self,
        request: BrokerRequest,
    ) -> Result<mpsc::Receiver<BrokerResponsePart>, SessionError> {
        if !self.status().await.accepts_requests() {
            return Err(SessionError::NotReady(format!("{}", self.status().await)));
        }
        let id = RequestId::new(self.next_request_id.fetch_add(1, AtomicOrdering::Relaxed));
        self.transport.send(id, request).await
    }

    /// Dispatches `request` and drains its response stream until the
    /// explicit terminator, per §4.2. A missing terminator within
    /// `per_kind_timeout` marks the request transient-failed and, after
    /// [`DEGRADED_TIMEOUT_THRESHOLD`] consecutive occurrences, drives the
    /// session into DEGRADED and kicks off a reconnect.
    pub async fn dispatch_collect(
        &self,
        request: BrokerRequest,
        per_kind_timeout: Duration,
    ) -> Result<Vec<BrokerResponsePart>, SessionError> {
        let mut rx = self.dispatch(request).await?;
        let mut parts = Vec::new();

        let drain = async {
            while let Some(part) = rx.recv().await {
                let is_terminator = matches!(part, BrokerResponsePart::Terminator);
                parts.push(part);
                if is_terminator {
                    return Ok(());
                }
            }
            Err(SessionError::Transport("response stream closed early".into()))
        };

        match timeout(per_kind_timeout, drain).await {
            Ok(Ok(())) => {
                self.consecutive_timeouts.store(0, AtomicOrdering::Relaxed);
                Ok(parts)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                self.on_timeout().await;
                Err(SessionError::Timeout)
            }
        }
    }

    async fn on_timeout(&self) {
        let count = self.consecutive_timeouts.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        if count >= DEGRADED_TIMEOUT_THRESHOLD {
            let mut guard = self.state.lock().await;
            if *guard == SessionState::Ready {
                *guard = SessionState::Degraded;
                warn!(client_id = %self.client_id, "session entering DEGRADED, scheduling reconnect");
                drop(guard);
                self.spawn_reconnect();
            }
        }
    }

    fn spawn_reconnect(&self) {
        let transport = self.transport.clone();
        let state = self.state.clone();
        let endpoint = self.endpoint.clone();
        let client_id = self.client_id.clone();
        let mut reconnect_state = ReconnectState::from(self.reconnect_backoff);

        tokio::spawn(async move {
            loop {
                let delay = reconnect_state.advance();
                tokio::time::sleep(delay).await;

                let connected = transport.connect(&endpoint, &client_id).await.is_ok();
                let probed = connected
                    && matches!(
                        timeout(PROBE_DEADLINE, transport.probe_account()).await,
                        Ok(Ok(()))
                    );
                if probed {
                    let mut guard = state.lock().await;
                    *guard = SessionState::Ready;
                    info!(%client_id, "session reconnected, back to READY");
                    return;
                }
            }
        });
    }

    /// Best-effort abort of an in-flight request, per §4.1's cancellation
    /// contract: the caller sees [`BrokerResponsePart`]s stop arriving
    /// once the session confirms the abort.
    pub async fn abort(&self, request_id: RequestId) {
        self.transport.abort(request_id).await;
    }
}

impl<T: BrokerTransport> Dispatcher<BrokerRequest> for BrokerSession<T> {
    type Output = Vec<BrokerResponsePart>;

    async fn dispatch(&self, payload: &BrokerRequest) -> DispatchOutcome<Self::Output> {
        let deadline = payload.kind().default_deadline();
        match self.dispatch_collect(payload.clone(), deadline).await {
            Ok(parts) => DispatchOutcome::Success(parts),
            Err(err) => DispatchOutcome::Failure {
                class: if err.is_transient() {
                    FailureClass::Transient
                } else {
                    FailureClass::Fatal
                },
                message: err.to_string(),
            },
        }
    }
}
