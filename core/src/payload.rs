//! Request payloads: JSON values and binary multipart forms.
//!
//! # Design
//! A payload is either serializable data, which goes out as JSON text with
//! the JSON content type, or a `FormData`, which goes out as-is. Encoding
//! the form, boundary and content type included, is left to the transport
//! primitive. `is_missing` is the single check `execute` runs before any
//! request exists.

use serde::Serialize;
use serde_json::Value;

use crate::error::TransportError;
use crate::http::Body;

/// What a caller hands to `RequestExecutor::execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Json(Value),
    Form(FormData),
}

impl RequestPayload {
    /// Serialize any `Serialize` value into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, TransportError> {
        Ok(RequestPayload::Json(serde_json::to_value(value)?))
    }

    pub fn is_binary_form(&self) -> bool {
        matches!(self, RequestPayload::Form(_))
    }

    /// True for `null`, the empty string, and forms without parts.
    pub fn is_missing(&self) -> bool {
        match self {
            RequestPayload::Json(Value::Null) => true,
            RequestPayload::Json(Value::String(s)) => s.is_empty(),
            RequestPayload::Json(_) => false,
            RequestPayload::Form(form) => form.is_empty(),
        }
    }

    /// Short rendering used in logs and parse-failure messages.
    pub fn describe(&self) -> String {
        match self {
            RequestPayload::Json(value) => value.to_string(),
            RequestPayload::Form(form) => format!("<form: {}>", form.field_names().join(", ")),
        }
    }

    pub fn into_body(self) -> Body {
        match self {
            RequestPayload::Json(value) => Body::Text(value.to_string()),
            RequestPayload::Form(form) => Body::Form(form),
        }
    }
}

impl From<Value> for RequestPayload {
    fn from(value: Value) -> Self {
        RequestPayload::Json(value)
    }
}

impl From<FormData> for RequestPayload {
    fn from(form: FormData) -> Self {
        RequestPayload::Form(form)
    }
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Ordered multipart form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    parts: Vec<FormPart>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push(FormPart {
            name: name.to_string(),
            filename: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        });
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: Vec<u8>) -> Self {
        self.parts.push(FormPart {
            name: name.to_string(),
            filename: Some(filename.to_string()),
            content_type: Some(content_type.to_string()),
            data,
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_payloads() {
        assert!(RequestPayload::Json(Value::Null).is_missing());
        assert!(RequestPayload::Json(json!("")).is_missing());
        assert!(RequestPayload::Form(FormData::new()).is_missing());

        assert!(!RequestPayload::Json(json!({})).is_missing());
        assert!(!RequestPayload::Json(json!(0)).is_missing());
        assert!(!RequestPayload::Json(json!("ping")).is_missing());
        assert!(!RequestPayload::Form(FormData::new().text("a", "b")).is_missing());
    }

    #[test]
    fn only_forms_are_binary() {
        assert!(RequestPayload::from(FormData::new().text("a", "b")).is_binary_form());
        assert!(!RequestPayload::from(json!([1, 2])).is_binary_form());
    }

    #[test]
    fn json_payload_becomes_text_body() {
        let payload = RequestPayload::json(&json!({"jsonrpc": "2.0", "method": "ping"})).unwrap();
        match payload.into_body() {
            Body::Text(text) => {
                let back: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(back["method"], "ping");
            }
            Body::Form(_) => panic!("expected text body"),
        }
    }

    #[test]
    fn describe_lists_form_fields() {
        let payload = RequestPayload::from(FormData::new().text("a", "1").text("b", "2"));
        assert_eq!(payload.describe(), "<form: a, b>");
    }
}
