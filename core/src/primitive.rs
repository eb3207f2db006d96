//! The transport primitive: whatever actually puts a request on the wire.
//!
//! # Design
//! `RequestPrimitive` is shaped like a browser XHR object: open, set headers
//! and timeout, send, abort, and lifecycle notifications. Notifications are
//! not callbacks into the executor. A primitive pushes `Signal`s into a
//! `SignalSink`, a non-blocking queue that the owning request drains when it
//! is polled. A primitive may therefore signal from any thread, including
//! from inside its own `abort()`, without re-entering the request state.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::http::Body;

/// XHR-style ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Unsent,
    Opened,
    HeadersReceived,
    Loading,
    Done,
}

/// Lifecycle notification from a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    ReadyStateChange(ReadyState),
    Abort,
    Error,
    Timeout,
}

/// Items on a request's event queue. Primitives only ever produce `Signal`s;
/// `Cancel` is queued by the request's cancel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Signal(Signal),
    Cancel,
}

/// Where a primitive reports lifecycle signals.
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: UnboundedSender<Event>,
}

impl SignalSink {
    pub(crate) fn new(tx: UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// Queue a signal. Returns false once the request is gone.
    pub fn emit(&self, signal: Signal) -> bool {
        self.tx.send(Event::Signal(signal)).is_ok()
    }
}

/// Reasons `RequestPrimitive::open` refuses a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    #[error("unsupported HTTP method {0}")]
    UnsupportedMethod(String),
    #[error("invalid URL {0}")]
    InvalidUrl(String),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// One single-use request on some transport medium.
///
/// All methods take `&self`; implementations keep their own interior state
/// so the request and its cancel handles can share one instance.
pub trait RequestPrimitive: Send + Sync {
    fn open(&self, method: &str, url: &str) -> Result<(), OpenError>;

    /// `None` disables the deadline.
    fn set_timeout(&self, timeout: Option<Duration>);

    fn set_request_header(&self, name: &str, value: &str);

    fn set_signal_sink(&self, sink: SignalSink);

    fn send(&self, body: Body);

    /// Request abort. A primitive that is still in flight reports `Signal::Abort`.
    fn abort(&self);

    fn ready_state(&self) -> ReadyState;

    /// Raw response body received so far.
    fn response_body(&self) -> Vec<u8>;
}
