use std::time::Duration;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::debug;

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Body of the `binary` rpc method: invalid UTF-8 followed by a brace.
pub const BINARY_BODY: &[u8] = &[0xff, 0xfe, b'{'];

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError { code, message }),
        }
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/rpc", any(rpc))
        .route("/upload", post(upload))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// JSON-RPC endpoint. `echo` reflects what arrived, `sleep` stalls for
/// `params.millis`, `garbage` answers with a body that is not JSON and
/// `binary` with one that is not even UTF-8.
async fn rpc(method: Method, headers: HeaderMap, body: Bytes) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return Json(RpcResponse::error(Value::Null, PARSE_ERROR, e.to_string())).into_response()
        }
    };
    debug!(rpc_method = %request.method, http_method = %method, "rpc call");

    match request.method.as_str() {
        "echo" => Json(RpcResponse::result(
            request.id,
            json!({
                "params": request.params,
                "http_method": method.as_str(),
                "content_type": content_type(&headers),
            }),
        ))
        .into_response(),
        "sleep" => {
            let millis = request.params.get("millis").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Json(RpcResponse::result(request.id, json!("slept"))).into_response()
        }
        "garbage" => (StatusCode::OK, "not json").into_response(),
        "binary" => (StatusCode::OK, BINARY_BODY.to_vec()).into_response(),
        other => Json(RpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        ))
        .into_response(),
    }
}

/// Header lines of every part, in order. A line starting with `--` opens a
/// header block and the first empty line closes it.
fn part_headers(body: &str) -> Vec<String> {
    let mut headers = Vec::new();
    let mut in_headers = false;
    for line in body.split("\r\n") {
        if line.starts_with("--") {
            in_headers = true;
        } else if line.is_empty() {
            in_headers = false;
        } else if in_headers {
            headers.push(line.to_string());
        }
    }
    headers
}

/// Accepts any body and reports its content type, length, multipart part
/// count and part header lines.
async fn upload(headers: HeaderMap, body: Bytes) -> Json<Value> {
    let text = String::from_utf8_lossy(&body);
    let part_headers = part_headers(&text);
    let parts = part_headers
        .iter()
        .filter(|line| line.starts_with("Content-Disposition: form-data"))
        .count();
    Json(json!({
        "content_type": content_type(&headers),
        "length": body.len(),
        "parts": parts,
        "part_headers": part_headers,
    }))
}
