//! In-memory primitive that answers each request with its own body.
//!
//! Useful for dry runs and for exercising callers without a server. A JSON
//! body comes back unchanged; a form comes back as
//! `{"form": ["field", ...]}`.

use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tracing::debug;

use crate::http::Body;
use crate::primitive::{OpenError, ReadyState, RequestPrimitive, Signal, SignalSink};

#[derive(Default)]
struct Inner {
    state: Option<ReadyState>,
    url: String,
    response: Vec<u8>,
    sink: Option<SignalSink>,
}

#[derive(Default)]
pub struct LoopbackPrimitive {
    inner: Mutex<Inner>,
}

impl LoopbackPrimitive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestPrimitive for LoopbackPrimitive {
    fn open(&self, method: &str, url: &str) -> Result<(), OpenError> {
        if method.is_empty() {
            return Err(OpenError::UnsupportedMethod(method.to_string()));
        }
        let mut inner = self.inner.lock();
        inner.url = url.to_string();
        inner.state = Some(ReadyState::Opened);
        Ok(())
    }

    fn set_timeout(&self, _timeout: Option<Duration>) {}

    fn set_request_header(&self, _name: &str, _value: &str) {}

    fn set_signal_sink(&self, sink: SignalSink) {
        self.inner.lock().sink = Some(sink);
    }

    fn send(&self, body: Body) {
        let mut inner = self.inner.lock();
        if inner.state != Some(ReadyState::Opened) {
            return;
        }
        inner.response = match body {
            Body::Text(text) => text.into_bytes(),
            Body::Form(form) => json!({ "form": form.field_names() }).to_string().into_bytes(),
        };
        inner.state = Some(ReadyState::Done);
        debug!(url = %inner.url, "loopback answered");
        if let Some(sink) = inner.sink.take() {
            sink.emit(Signal::ReadyStateChange(ReadyState::Done));
        }
    }

    fn abort(&self) {
        let mut inner = self.inner.lock();
        if inner.state == Some(ReadyState::Opened) {
            inner.state = Some(ReadyState::Unsent);
            if let Some(sink) = inner.sink.take() {
                sink.emit(Signal::Abort);
            }
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.inner.lock().state.unwrap_or(ReadyState::Unsent)
    }

    fn response_body(&self) -> Vec<u8> {
        self.inner.lock().response.clone()
    }
}
