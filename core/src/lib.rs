//! Single-request RPC transport with cancellable results.
//!
//! # Overview
//! `Transport` sends one JSON (or multipart form) payload per `execute` call
//! and returns a `CancellableRequest`: a future of the parsed JSON response
//! that can be cancelled while it is in flight. The wire work is done by a
//! `RequestPrimitive`, an XHR-shaped object that reports its lifecycle as
//! signals; `reqwest` backs the default one.
//!
//! # Design
//! - Argument problems (missing endpoint, missing payload) are returned
//!   synchronously; every lifecycle failure comes out of the future.
//! - Each request owns an explicit `RequestState` machine that settles once.
//!   Late signals and cancellation after settlement are no-ops.
//! - `Transport` is stateless between calls; a fresh primitive is created per
//!   request.

pub mod config;
pub mod error;
pub mod http;
pub mod loopback;
pub mod payload;
pub mod pending;
pub mod primitive;
pub mod reqwest_primitive;
pub mod transport;

pub use config::{ConfigOverrides, Endpoint, TransportConfig, DEFAULT_CONFIG};
pub use error::{ErrorKind, TransportError};
pub use http::{Body, HeaderSet, JSON_CONTENT_TYPE};
pub use loopback::LoopbackPrimitive;
pub use payload::{FormData, FormPart, RequestPayload};
pub use pending::{CancelHandle, CancellableRequest, RequestState};
pub use primitive::{OpenError, ReadyState, RequestPrimitive, Signal, SignalSink};
pub use reqwest_primitive::ReqwestPrimitive;
pub use transport::{RequestExecutor, Transport};
