//! Transport configuration: endpoint, HTTP method and timeout.
//!
//! # Design
//! `DEFAULT_CONFIG` is a constant. Callers pass a `ConfigOverrides` whose
//! present fields replace the matching defaults one key at a time; nothing is
//! merged deeply and nothing is stored globally. The method keeps the
//! caller's spelling and is upper-cased when a request is opened.

use std::time::Duration;

use serde::Deserialize;

use crate::error::TransportError;

/// Default configuration applied before caller overrides.
pub const DEFAULT_CONFIG: ConfigDefaults = ConfigDefaults {
    method: "POST",
    timeout_millis: 3000,
};

/// Compile-time form of `TransportConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigDefaults {
    pub method: &'static str,
    pub timeout_millis: u64,
}

/// Effective configuration of a `Transport`. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    method: String,
    timeout_millis: u64,
}

/// Caller-supplied configuration fields. Absent fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default, alias = "timeout")]
    pub timeout_millis: Option<u64>,
}

impl ConfigOverrides {
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn timeout_millis(mut self, millis: u64) -> Self {
        self.timeout_millis = Some(millis);
        self
    }

    /// Parse overrides from a JSON object such as `{"method":"put","timeoutMillis":500}`.
    pub fn from_json(raw: &str) -> Result<Self, TransportError> {
        serde_json::from_str(raw)
            .map_err(|e| TransportError::InvalidArgument(format!("config overrides: {e}")))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::merged(None)
    }
}

impl TransportConfig {
    /// Overlay `overrides` on the default configuration.
    pub fn merged(overrides: Option<ConfigOverrides>) -> Self {
        let overrides = overrides.unwrap_or_default();
        TransportConfig {
            method: overrides
                .method
                .unwrap_or_else(|| DEFAULT_CONFIG.method.to_string()),
            timeout_millis: overrides
                .timeout_millis
                .unwrap_or(DEFAULT_CONFIG.timeout_millis),
        }
    }

    /// Method as configured, without normalization.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Method normalized to upper case, as put on the wire.
    pub fn wire_method(&self) -> String {
        self.method.to_ascii_uppercase()
    }

    pub fn timeout_millis(&self) -> u64 {
        self.timeout_millis
    }

    /// Zero means the request never times out.
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_millis {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Where requests are sent. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        if endpoint.trim().is_empty() {
            return Err(TransportError::InvalidArgument(
                "transport constructed without an endpoint".to_string(),
            ));
        }
        Ok(Endpoint(endpoint.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
