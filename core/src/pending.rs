//! State machine of one in-flight request and the handle that awaits it.
//!
//! # Design
//! A `PendingRequest` holds the lifecycle state, the primitive handle and the
//! settled outcome behind one mutex shared by the `CancellableRequest` and
//! its `CancelHandle`s. Primitive signals arrive on a queue and are applied
//! only while the request is polled, so every transition happens on the
//! awaiting task. Settling clears the primitive handle; any event that finds
//! the request terminal is dropped.
//!
//! `cancel()` moves an unsettled request to `Cancelling`, aborts the
//! primitive and queues `Event::Cancel`. Whatever event is applied next,
//! including a completion that was already queued, settles the request as
//! `Cancelled`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, WeakUnboundedSender};
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::primitive::{Event, ReadyState, RequestPrimitive, Signal, SignalSink};

/// Lifecycle of a request: `Open -> Sent -> terminal`, with `Cancelling`
/// recorded when cancellation is requested before settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Open,
    Sent,
    Cancelling,
    Succeeded,
    ParseFailed,
    Aborted,
    NetworkFailed,
    TimedOut,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            RequestState::Open | RequestState::Sent | RequestState::Cancelling
        )
    }
}

struct PendingRequest {
    state: RequestState,
    primitive: Option<Arc<dyn RequestPrimitive>>,
    outcome: Option<Result<Value, TransportError>>,
}

impl PendingRequest {
    fn settle(&mut self, state: RequestState, outcome: Result<Value, TransportError>) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.outcome = Some(outcome);
        self.primitive = None;
    }
}

/// A request in flight: a future of the parsed JSON response that can also
/// be cancelled.
///
/// Resolves with the parsed response body, or fails with `ParseError`,
/// `Aborted`, `NetworkFailure`, `Timeout` or `Cancelled`. Dropping an
/// unsettled request cancels it.
pub struct CancellableRequest {
    shared: Arc<Mutex<PendingRequest>>,
    events: UnboundedReceiver<Event>,
    cancel: CancelHandle,
    endpoint: String,
    payload: String,
}

/// Cancels the request it was taken from. Cheap to clone; usable from any
/// task or thread.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Mutex<PendingRequest>>,
    events: WeakUnboundedSender<Event>,
}

impl CancelHandle {
    /// Request cancellation. A no-op once the request has settled or is
    /// already being cancelled.
    pub fn cancel(&self) {
        let primitive = {
            let mut pending = self.shared.lock();
            if pending.state.is_terminal() || pending.state == RequestState::Cancelling {
                return;
            }
            pending.state = RequestState::Cancelling;
            pending.primitive.clone()
        };
        if let Some(primitive) = primitive {
            primitive.abort();
        }
        if let Some(tx) = self.events.upgrade() {
            let _ = tx.send(Event::Cancel);
        }
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("state", &self.shared.lock().state)
            .finish()
    }
}

impl CancellableRequest {
    /// Create an `Open` request around `primitive`. The returned sink must be
    /// given to the primitive before it is sent.
    pub(crate) fn open(
        primitive: Arc<dyn RequestPrimitive>,
        endpoint: &str,
        payload: String,
    ) -> (Self, SignalSink) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(PendingRequest {
            state: RequestState::Open,
            primitive: Some(primitive),
            outcome: None,
        }));
        let cancel = CancelHandle {
            shared: Arc::clone(&shared),
            events: tx.downgrade(),
        };
        let request = CancellableRequest {
            shared,
            events: rx,
            cancel,
            endpoint: endpoint.to_string(),
            payload,
        };
        (request, SignalSink::new(tx))
    }

    pub(crate) fn mark_sent(&self) {
        let mut pending = self.shared.lock();
        if pending.state == RequestState::Open {
            pending.state = RequestState::Sent;
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> RequestState {
        self.shared.lock().state
    }

    pub fn is_settled(&self) -> bool {
        self.state().is_terminal()
    }

    fn apply(&self, event: Event) {
        let mut pending = self.shared.lock();
        let Some(primitive) = pending.primitive.clone() else {
            trace!(endpoint = %self.endpoint, ?event, "ignoring event after settlement");
            return;
        };

        if pending.state == RequestState::Cancelling {
            pending.settle(RequestState::Cancelled, Err(TransportError::Cancelled));
        } else {
            match event {
                Event::Cancel => {
                    pending.settle(RequestState::Cancelled, Err(TransportError::Cancelled))
                }
                Event::Signal(Signal::ReadyStateChange(ReadyState::Done)) => {
                    let body = primitive.response_body();
                    match serde_json::from_slice::<Value>(&body) {
                        Ok(value) => pending.settle(RequestState::Succeeded, Ok(value)),
                        Err(e) => {
                            warn!(endpoint = %self.endpoint, error = %e, "response is not JSON");
                            pending.settle(
                                RequestState::ParseFailed,
                                Err(TransportError::Parse {
                                    payload: self.payload.clone(),
                                    endpoint: self.endpoint.clone(),
                                    detail: e.to_string(),
                                }),
                            );
                        }
                    }
                }
                Event::Signal(Signal::ReadyStateChange(_)) => return,
                Event::Signal(Signal::Abort) => {
                    pending.settle(RequestState::Aborted, Err(TransportError::Aborted))
                }
                Event::Signal(Signal::Error) => {
                    pending.settle(RequestState::NetworkFailed, Err(TransportError::NetworkFailure))
                }
                Event::Signal(Signal::Timeout) => {
                    pending.settle(RequestState::TimedOut, Err(TransportError::Timeout))
                }
            }
        }
        debug!(endpoint = %self.endpoint, state = ?pending.state, "request settled");
    }

    /// Every sender is gone: the primitive dropped its sink without settling.
    fn apply_closed(&self) {
        let mut pending = self.shared.lock();
        match pending.state {
            state if state.is_terminal() => {}
            RequestState::Cancelling => {
                pending.settle(RequestState::Cancelled, Err(TransportError::Cancelled))
            }
            _ => {
                warn!(endpoint = %self.endpoint, "transport primitive went away without a result");
                pending.settle(RequestState::NetworkFailed, Err(TransportError::NetworkFailure));
            }
        }
    }

    fn outcome(&self) -> Option<Result<Value, TransportError>> {
        self.shared.lock().outcome.clone()
    }
}

impl Future for CancellableRequest {
    type Output = Result<Value, TransportError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            if let Some(outcome) = this.outcome() {
                return Poll::Ready(outcome);
            }
            match this.events.poll_recv(cx) {
                Poll::Ready(Some(event)) => this.apply(event),
                Poll::Ready(None) => this.apply_closed(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for CancellableRequest {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for CancellableRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellableRequest")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}
