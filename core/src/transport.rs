//! `Transport`: issues one request per `execute` call.
//!
//! # Design
//! `Transport` holds only the endpoint, the effective configuration, the
//! default headers and a factory for fresh primitives; it carries no state
//! between calls. `execute` validates the payload synchronously, then opens,
//! configures and sends a new primitive and hands back the
//! `CancellableRequest` that will settle from the primitive's signals.

use std::sync::Arc;

use tracing::debug;

use crate::config::{ConfigOverrides, Endpoint, TransportConfig};
use crate::error::TransportError;
use crate::http::{HeaderSet, CONTENT_TYPE};
use crate::loopback::LoopbackPrimitive;
use crate::payload::RequestPayload;
use crate::pending::CancellableRequest;
use crate::primitive::RequestPrimitive;
use crate::reqwest_primitive::ReqwestPrimitive;

/// Anything that can perform a request for a payload.
pub trait RequestExecutor {
    /// Issue one request for `payload`.
    ///
    /// `Err` is reserved for problems detected before anything is sent. Every
    /// failure after that is reported by the returned request.
    fn execute(&self, payload: RequestPayload) -> Result<CancellableRequest, TransportError>;
}

type PrimitiveFactory = Arc<dyn Fn() -> Arc<dyn RequestPrimitive> + Send + Sync>;

#[derive(Clone)]
pub struct Transport {
    endpoint: Endpoint,
    config: TransportConfig,
    headers: HeaderSet,
    factory: PrimitiveFactory,
}

impl Transport {
    /// HTTP transport backed by `reqwest`. Requests share one connection
    /// pool and must be executed inside a tokio runtime.
    pub fn new(endpoint: &str, overrides: Option<ConfigOverrides>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::InvalidArgument(format!("HTTP client: {e}")))?;
        Self::with_primitive(endpoint, overrides, move || {
            Arc::new(ReqwestPrimitive::new(client.clone())) as Arc<dyn RequestPrimitive>
        })
    }

    /// In-memory transport that answers every request with its own body.
    pub fn loopback(endpoint: &str, overrides: Option<ConfigOverrides>) -> Result<Self, TransportError> {
        Self::with_primitive(endpoint, overrides, || {
            Arc::new(LoopbackPrimitive::new()) as Arc<dyn RequestPrimitive>
        })
    }

    /// Transport over any primitive. `factory` is called once per request.
    pub fn with_primitive<F>(
        endpoint: &str,
        overrides: Option<ConfigOverrides>,
        factory: F,
    ) -> Result<Self, TransportError>
    where
        F: Fn() -> Arc<dyn RequestPrimitive> + Send + Sync + 'static,
    {
        Ok(Self {
            endpoint: Endpoint::new(endpoint)?,
            config: TransportConfig::merged(overrides),
            headers: HeaderSet::json_defaults(),
            factory: Arc::new(factory),
        })
    }

    /// Add a header sent with every request.
    pub fn with_default_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn default_headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// Headers for one request. Binary forms get no content type so the
    /// primitive can announce its multipart boundary.
    pub fn effective_headers(&self, payload: &RequestPayload) -> HeaderSet {
        let mut headers = self.headers.clone();
        if payload.is_binary_form() {
            headers.remove(CONTENT_TYPE);
        }
        headers
    }
}

impl RequestExecutor for Transport {
    fn execute(&self, payload: RequestPayload) -> Result<CancellableRequest, TransportError> {
        if payload.is_missing() {
            return Err(TransportError::InvalidArgument("empty request".to_string()));
        }

        let headers = self.effective_headers(&payload);
        let method = self.config.wire_method();
        let description = payload.describe();
        debug!(%method, endpoint = %self.endpoint, payload = %description, "requesting");

        let primitive = (self.factory)();
        primitive
            .open(&method, self.endpoint.as_str())
            .map_err(|e| TransportError::InvalidArgument(e.to_string()))?;
        primitive.set_timeout(self.config.timeout());
        for (name, value) in headers.iter() {
            primitive.set_request_header(name, value);
        }

        let (request, sink) =
            CancellableRequest::open(Arc::clone(&primitive), self.endpoint.as_str(), description);
        primitive.set_signal_sink(sink);
        primitive.send(payload.into_body());
        request.mark_sent();
        Ok(request)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
