use std::collections::{BinaryHeap, HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::bucket::TokenBucket;
use crate::error::GovernorError;
use crate::kind::RequestKind;
use crate::priority::Priority;
use crate::request::{QueueEntry, Request, RequestStatus, Ticket};
use crate::retry::{BackoffPolicy, FailureClass};
use crate::stats::GovernorStats;

/// Outcome of one dispatch attempt against the broker boundary.
pub enum DispatchOutcome<T> {
    Success(T),
    Failure { class: FailureClass, message: String },
}

/// Implemented by whatever actually talks to the broker (the Broker
/// Session, §4.2). The Rate Governor owns scheduling and retries;
/// dispatch is the only seam where an external system is called, per §9
/// ("centralize retries in the Rate Governor; no other component retries
/// the broker").
pub trait Dispatcher<P>: Send + Sync + 'static {
    type Output: Send + 'static;

    fn dispatch(&self, payload: &P) -> impl Future<Output = DispatchOutcome<Self::Output>> + Send;
}

struct GovernorState<P, O> {
    queues: HashMap<RequestKind, BinaryHeap<QueueEntry>>,
    buckets: HashMap<RequestKind, TokenBucket>,
    requests: HashMap<Ticket, Request<P>>,
    waiters: HashMap<Ticket, oneshot::Sender<Result<O, GovernorError>>>,
    results: HashMap<Ticket, Result<O, GovernorError>>,
    cancelled: HashSet<Ticket>,
    stats: GovernorStats,
}

/// Per-kind `(capacity, window)` overrides; unspecified kinds fall back to
/// [`RequestKind::default_limit`].
pub type LimitTable = HashMap<RequestKind, (u32, std::time::Duration)>;

/// The Rate Governor from §4.1: a priority queue per [`RequestKind`], each
/// gated by its own token bucket, with centralized retry/backoff.
pub struct RateGovernor<P, D>
where
    D: Dispatcher<P>,
{
    dispatcher: Arc<D>,
    backoff: BackoffPolicy,
    next_ticket: AtomicU64,
    state: Arc<Mutex<GovernorState<P, D::Output>>>,
    notify: Arc<Notify>,
}

impl<P, D> RateGovernor<P, D>
where
    P: Clone + Send + 'static,
    D: Dispatcher<P>,
{
    pub fn new(dispatcher: D, limits: LimitTable, backoff: BackoffPolicy) -> Self {
        let mut buckets = HashMap::new();
        let mut queues = HashMap::new();
        for kind in RequestKind::all() {
            let (capacity, window) = limits.get(&kind).copied().unwrap_or_else(|| kind.default_limit());
            buckets.insert(kind, TokenBucket::new(capacity, window));
            queues.insert(kind, BinaryHeap::new());
        }

        Self {
            dispatcher: Arc::new(dispatcher),
            backoff,
            next_ticket: AtomicU64::new(1),
            state: Arc::new(Mutex::new(GovernorState {
                queues,
                buckets,
                requests: HashMap::new(),
                waiters: HashMap::new(),
                results: HashMap::new(),
                cancelled: HashSet::new(),
                stats: GovernorStats::empty(),
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Enqueues `payload` under `kind` at `priority`. Returns a [`Ticket`]
    /// that can later be passed to [`Self::await_result`] or
    /// [`Self::cancel`].
    pub async fn submit(&self, kind: RequestKind, priority: Priority, payload: P) -> Ticket {
        let ticket = Ticket::new(self.next_ticket.fetch_add(1, AtomicOrdering::Relaxed));
        let first_seen_at = Instant::now();

        let request = Request {
            ticket,
            kind,
            priority,
            payload,
            attempt_count: 0,
            first_seen_at,
            status: RequestStatus::Pending,
        };

        let mut state = self.state.lock().await;
        state.requests.insert(ticket, request);
        state.queues.entry(kind).or_default().push(QueueEntry {
            ticket,
            priority,
            first_seen_at,
        });
        state.stats.by_kind.entry(kind).or_default().queue_depth += 1;
        drop(state);

        debug!(?ticket, %kind, priority = priority.value(), "request submitted");
        self.notify.notify_one();
        ticket
    }

    /// Awaits the terminal result of a previously submitted [`Ticket`].
    ///
    /// `finalize` can run before the caller reaches this call (the pump
    /// races ahead on its own task), so a terminal result may already be
    /// sitting in `state.results` with no waiter ever registered for it.
    /// Check there first instead of blindly registering a fresh oneshot.
    pub async fn await_result(&self, ticket: Ticket) -> Result<D::Output, GovernorError> {
        let rx = {
            let mut state = self.state.lock().await;
            if let Some(result) = state.results.remove(&ticket) {
                return result;
            }
            if !state.requests.contains_key(&ticket) {
                return Err(GovernorError::UnknownTicket(ticket));
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.insert(ticket, tx);
            rx
        };
        self.notify.notify_one();
        rx.await.unwrap_or(Err(GovernorError::UnknownTicket(ticket)))
    }

    /// Cancels a request. Pending/queued requests are removed with no
    /// token spent; in-flight requests are marked for best-effort
    /// cancellation and resolve to [`GovernorError::Cancelled`] once the
    /// in-flight dispatch task observes the cancellation, per §4.1.
    pub async fn cancel(&self, ticket: Ticket) -> Result<(), GovernorError> {
        let mut state = self.state.lock().await;
        let status = state
            .requests
            .get(&ticket)
            .map(|r| r.status)
            .ok_or(GovernorError::UnknownTicket(ticket))?;

        match status {
            RequestStatus::Pending | RequestStatus::Queued => {
                state.requests.get_mut(&ticket).unwrap().status = RequestStatus::Cancelled;
                if let Some(kind) = state.requests.get(&ticket).map(|r| r.kind) {
                    if let Some(stats) = state.stats.by_kind.get_mut(&kind) {
                        stats.queue_depth = stats.queue_depth.saturating_sub(1);
                        stats.cancelled += 1;
                    }
                }
                match state.waiters.remove(&ticket) {
                    Some(tx) => {
                        let _ = tx.send(Err(GovernorError::Cancelled(ticket)));
                    }
                    None => {
                        state.results.insert(ticket, Err(GovernorError::Cancelled(ticket)));
                    }
                }
                Ok(())
            }
            RequestStatus::InFlight => {
                state.cancelled.insert(ticket);
                Ok(())
            }
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled => Ok(()),
        }
    }

    /// Current queue depths, wait times, retry counts and success ratios
    /// per kind, per §4.1.
    pub async fn stats(&self) -> GovernorStats {
        self.state.lock().await.stats.clone()
    }

    /// Runs the scheduling pump until `shutdown` resolves. Admits requests
    /// from each kind's priority queue as their token bucket permits
    /// capacity, spawning one dispatch task per admitted request so that
    /// kinds (and requests within a kind) never block one another —
    /// the suspension points named in §5 (token wait, dispatch) never hold
    /// another stage's resource.
    pub async fn run(self: Arc<Self>, mut shutdown: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("rate governor pump shutting down");
                    return;
                }
                _ = self.admit_ready() => {}
            }
        }
    }

    async fn admit_ready(&self) {
        let notified = self.notify.notified();
        let mut admitted_any = false;
        {
            let mut state = self.state.lock().await;
            for kind in RequestKind::all() {
                loop {
                    let has_head = state.queues.get(&kind).map(|q| !q.is_empty()).unwrap_or(false);
                    if !has_head {
                        break;
                    }
                    let has_capacity = state
                        .buckets
                        .get_mut(&kind)
                        .map(|b| b.try_acquire())
                        .unwrap_or(false);
                    if !has_capacity {
                        break;
                    }
                    let entry = state.queues.get_mut(&kind).unwrap().pop().unwrap();
                    let ticket = entry.ticket;
                    if let Some(request) = state.requests.get_mut(&ticket) {
                        if request.status == RequestStatus::Cancelled {
                            continue;
                        }
                        request.status = RequestStatus::InFlight;
                        let wait = entry.first_seen_at.elapsed();
                        if let Some(stats) = state.stats.by_kind.get_mut(&kind) {
                            stats.queue_depth = stats.queue_depth.saturating_sub(1);
                            stats.in_flight += 1;
                            stats.total_wait += wait;
                            stats.wait_samples += 1;
                        }
                        admitted_any = true;
                        let governor_state = self.state.clone();
                        let dispatcher = self.dispatcher.clone();
                        let backoff = self.backoff;
                        tokio::spawn(run_dispatch_loop(governor_state, dispatcher, backoff, ticket));
                    }
                }
            }
        }

        if !admitted_any {
            notified.await;
        }
    }
}

async fn run_dispatch_loop<P, D>(
    state: Arc<Mutex<GovernorState<P, D::Output>>>,
    dispatcher: Arc<D>,
    backoff: BackoffPolicy,
    ticket: Ticket,
) where
    P: Clone + Send + 'static,
    D: Dispatcher<P>,
{
    loop {
        let cancelled = {
            let guard = state.lock().await;
            guard.cancelled.contains(&ticket)
        };
        if cancelled {
            finalize(&state, ticket, Err(GovernorError::Cancelled(ticket))).await;
            return;
        }

        let (payload, kind, attempt) = {
            let mut guard = state.lock().await;
            let Some(request) = guard.requests.get_mut(&ticket) else {
                return;
            };
            request.attempt_count += 1;
            (
                request.payload.clone(),
                request.kind,
                request.attempt_count,
            )
        };
        let outcome = dispatcher.dispatch(&payload).await;

        match outcome {
            DispatchOutcome::Success(value) => {
                finalize(&state, ticket, Ok(value)).await;
                bump_stat(&state, kind, |s| s.completed += 1).await;
                return;
            }
            DispatchOutcome::Failure { class, message } => {
                let exhausted = backoff.attempts_exhausted(attempt);
                if class == FailureClass::Fatal || exhausted {
                    bump_stat(&state, kind, |s| s.failed += 1).await;
                    let err = if exhausted {
                        GovernorError::RetriesExhausted(ticket, message)
                    } else {
                        GovernorError::Fatal(ticket, message)
                    };
                    finalize(&state, ticket, Err(err)).await;
                    return;
                }
                bump_stat(&state, kind, |s| s.retry_count += 1).await;
                warn!(?ticket, attempt, %message, "transient dispatch failure, backing off");
                let delay = backoff.delay_for_attempt(attempt);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn finalize<P, O>(
    state: &Arc<Mutex<GovernorState<P, O>>>,
    ticket: Ticket,
    result: Result<O, GovernorError>,
) {
    let mut guard = state.lock().await;
    if let Some(request) = guard.requests.get_mut(&ticket) {
        request.status = match &result {
            Ok(_) => RequestStatus::Completed,
            Err(GovernorError::Cancelled(_)) => RequestStatus::Cancelled,
            Err(_) => RequestStatus::Failed,
        };
        let kind = request.kind;
        if let Some(stats) = guard.stats.by_kind.get_mut(&kind) {
            stats.in_flight = stats.in_flight.saturating_sub(1);
        }
    }
    match guard.waiters.remove(&ticket) {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => {
            guard.results.insert(ticket, result);
        }
    }
}

async fn bump_stat<P, O>(
    state: &Arc<Mutex<GovernorState<P, O>>>,
    kind: RequestKind,
    f: impl FnOnce(&mut crate::stats::KindStats),
) {
    let mut guard = state.lock().await;
    if let Some(stats) = guard.stats.by_kind.get_mut(&kind) {
        f(stats);
    }
}
