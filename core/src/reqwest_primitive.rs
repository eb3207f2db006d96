//! HTTP primitive on top of `reqwest`.
//!
//! # Design
//! `send` spawns the round-trip as a task on the tokio runtime that was
//! current when the request was opened, and reports the outcome through the
//! signal sink. `abort` aborts that task, which drops the connection, and
//! signals `Abort`. The per-request timeout covers connect through the end of
//! the body; a reqwest timeout becomes `Signal::Timeout` and every other
//! reqwest failure `Signal::Error`. Non-2xx statuses are not failures at this
//! level. The body is kept as raw bytes so that decoding problems surface as
//! parse failures, not transport failures.
//!
//! Forms are encoded by `reqwest::multipart`, which percent-encodes field
//! names and filenames and sets the multipart content type with its boundary.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Url};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::http::Body;
use crate::payload::FormData;
use crate::primitive::{OpenError, ReadyState, RequestPrimitive, Signal, SignalSink};

struct Inner {
    state: ReadyState,
    method: Option<Method>,
    url: Option<Url>,
    runtime: Option<Handle>,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    sent: bool,
    aborted: bool,
    response: Vec<u8>,
    sink: Option<SignalSink>,
    task: Option<AbortHandle>,
}

/// One HTTP request executed with `reqwest`.
pub struct ReqwestPrimitive {
    client: Client,
    inner: Arc<Mutex<Inner>>,
}

impl ReqwestPrimitive {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            inner: Arc::new(Mutex::new(Inner {
                state: ReadyState::Unsent,
                method: None,
                url: None,
                runtime: None,
                headers: Vec::new(),
                timeout: None,
                sent: false,
                aborted: false,
                response: Vec::new(),
                sink: None,
                task: None,
            })),
        }
    }

    /// True while the request task is still running.
    pub fn in_flight(&self) -> bool {
        self.inner
            .lock()
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

fn multipart_form(form: &FormData) -> Result<Form, reqwest::Error> {
    let mut out = Form::new();
    for part in form.parts() {
        let mut body = Part::bytes(part.data.clone());
        if let Some(filename) = &part.filename {
            body = body.file_name(filename.clone());
        }
        if let Some(content_type) = &part.content_type {
            body = body.mime_str(content_type)?;
        }
        out = out.part(part.name.clone(), body);
    }
    Ok(out)
}

async fn fetch(builder: RequestBuilder, inner: &Mutex<Inner>) -> Result<Vec<u8>, reqwest::Error> {
    let response = builder.send().await?;
    debug!(status = response.status().as_u16(), url = %response.url(), "response received");
    {
        let mut inner = inner.lock();
        if !inner.aborted {
            inner.state = ReadyState::HeadersReceived;
            if let Some(sink) = &inner.sink {
                sink.emit(Signal::ReadyStateChange(ReadyState::HeadersReceived));
            }
        }
    }
    Ok(response.bytes().await?.to_vec())
}

fn finish(inner: &Mutex<Inner>, result: Result<Vec<u8>, reqwest::Error>) {
    let mut inner = inner.lock();
    if inner.aborted {
        return;
    }
    inner.state = ReadyState::Done;
    let signal = match result {
        Ok(body) => {
            inner.response = body;
            Signal::ReadyStateChange(ReadyState::Done)
        }
        Err(e) if e.is_timeout() => {
            debug!(error = %e, "request timed out");
            Signal::Timeout
        }
        Err(e) => {
            debug!(error = %e, "request failed");
            Signal::Error
        }
    };
    if let Some(sink) = inner.sink.take() {
        sink.emit(signal);
    }
}

impl RequestPrimitive for ReqwestPrimitive {
    fn open(&self, method: &str, url: &str) -> Result<(), OpenError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| OpenError::UnsupportedMethod(method.to_string()))?;
        let url = Url::parse(url).map_err(|_| OpenError::InvalidUrl(url.to_string()))?;
        let runtime = Handle::try_current()
            .map_err(|_| OpenError::Unavailable("no tokio runtime is running".to_string()))?;

        let mut inner = self.inner.lock();
        inner.method = Some(method);
        inner.url = Some(url);
        inner.runtime = Some(runtime);
        inner.state = ReadyState::Opened;
        Ok(())
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        self.inner.lock().timeout = timeout;
    }

    fn set_request_header(&self, name: &str, value: &str) {
        self.inner
            .lock()
            .headers
            .push((name.to_string(), value.to_string()));
    }

    fn set_signal_sink(&self, sink: SignalSink) {
        self.inner.lock().sink = Some(sink);
    }

    fn send(&self, body: Body) {
        let mut inner = self.inner.lock();
        if inner.state != ReadyState::Opened || inner.sent || inner.aborted {
            return;
        }
        let (Some(method), Some(url), Some(runtime)) =
            (inner.method.clone(), inner.url.clone(), inner.runtime.clone())
        else {
            return;
        };
        inner.sent = true;

        // GET and HEAD never carry a body, as with XHR
        let bodyless = method == Method::GET || method == Method::HEAD;
        let mut builder = self.client.request(method, url);
        for (name, value) in &inner.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = inner.timeout {
            builder = builder.timeout(timeout);
        }
        if !bodyless {
            builder = match body {
                Body::Text(text) => builder.body(text),
                Body::Form(form) => match multipart_form(&form) {
                    Ok(form) => builder.multipart(form),
                    Err(e) => {
                        warn!(error = %e, "form part has an invalid content type");
                        inner.state = ReadyState::Done;
                        if let Some(sink) = inner.sink.take() {
                            sink.emit(Signal::Error);
                        }
                        return;
                    }
                },
            };
        }

        let shared = Arc::clone(&self.inner);
        let task = runtime.spawn(async move {
            let result = fetch(builder, &shared).await;
            finish(&shared, result);
        });
        inner.task = Some(task.abort_handle());
    }

    fn abort(&self) {
        let mut inner = self.inner.lock();
        if inner.aborted || inner.state == ReadyState::Done {
            return;
        }
        inner.aborted = true;
        inner.state = ReadyState::Unsent;
        if let Some(task) = &inner.task {
            task.abort();
        }
        if inner.sent {
            if let Some(sink) = inner.sink.take() {
                sink.emit(Signal::Abort);
            }
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.inner.lock().state
    }

    fn response_body(&self) -> Vec<u8> {
        self.inner.lock().response.clone()
    }
}
