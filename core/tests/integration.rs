//! Requests over real HTTP against the mock JSON-RPC server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `Transport` with the
//! default reqwest primitive through every outcome a live server can produce:
//! success, undecodable bodies, timeout, cancellation, connection failure and
//! multipart uploads.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::json;
use transport_core::{
    ConfigOverrides, ErrorKind, FormData, RequestExecutor, RequestPayload, RequestState,
    Transport, TransportError,
};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn rpc(method: &str, params: serde_json::Value) -> RequestPayload {
    RequestPayload::from(json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}))
}

#[tokio::test]
async fn echo_round_trip() {
    let addr = start_server();
    let transport = Transport::new(&format!("http://{addr}/rpc"), None).unwrap();

    let request = transport.execute(rpc("echo", json!({"n": 42}))).unwrap();
    let response = request.await.unwrap();

    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["params"], json!({"n": 42}));
    assert_eq!(response["result"]["http_method"], "POST");
    assert_eq!(response["result"]["content_type"], "application/json;charset=utf-8");
}

#[tokio::test]
async fn configured_method_is_upper_cased_on_the_wire() {
    let addr = start_server();
    let transport = Transport::new(
        &format!("http://{addr}/rpc"),
        Some(ConfigOverrides::default().method("put")),
    )
    .unwrap();

    let response = transport.execute(rpc("echo", json!(null))).unwrap().await.unwrap();
    assert_eq!(response["result"]["http_method"], "PUT");
}

#[tokio::test]
async fn extension_methods_reach_the_server() {
    let addr = start_server();
    let transport = Transport::new(
        &format!("http://{addr}/rpc"),
        Some(ConfigOverrides::default().method("propfind")),
    )
    .unwrap();

    let response = transport.execute(rpc("echo", json!(null))).unwrap().await.unwrap();
    assert_eq!(response["result"]["http_method"], "PROPFIND");
}

#[tokio::test]
async fn rpc_level_errors_still_resolve() {
    let addr = start_server();
    let transport = Transport::new(&format!("http://{addr}/rpc"), None).unwrap();

    let response = transport.execute(rpc("nope", json!(null))).unwrap().await.unwrap();
    assert_eq!(response["error"]["code"], mock_server::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn non_json_body_is_a_parse_error() {
    let addr = start_server();
    let endpoint = format!("http://{addr}/rpc");
    let transport = Transport::new(&endpoint, None).unwrap();

    let mut request = transport.execute(rpc("garbage", json!(null))).unwrap();
    let err = (&mut request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(err.to_string().contains(&endpoint));
    assert_eq!(request.state(), RequestState::ParseFailed);
}

#[tokio::test]
async fn non_utf8_body_is_a_parse_error() {
    let addr = start_server();
    let endpoint = format!("http://{addr}/rpc");
    let transport = Transport::new(&endpoint, None).unwrap();

    let mut request = transport.execute(rpc("binary", json!(null))).unwrap();
    let err = (&mut request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(err.to_string().contains(&endpoint));
    assert_eq!(request.state(), RequestState::ParseFailed);
}

#[tokio::test]
async fn slow_server_times_out() {
    let addr = start_server();
    let transport = Transport::new(
        &format!("http://{addr}/rpc"),
        Some(ConfigOverrides::default().timeout_millis(100)),
    )
    .unwrap();

    let request = transport.execute(rpc("sleep", json!({"millis": 2000}))).unwrap();
    assert_eq!(request.await.unwrap_err(), TransportError::Timeout);
}

#[tokio::test]
async fn cancel_interrupts_a_slow_request() {
    let addr = start_server();
    let transport = Transport::new(&format!("http://{addr}/rpc"), None).unwrap();

    let request = transport.execute(rpc("sleep", json!({"millis": 2000}))).unwrap();
    let handle = request.cancel_handle();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let outcome = tokio::time::timeout(Duration::from_millis(1000), request)
        .await
        .expect("cancelled request should settle promptly");
    assert_eq!(outcome.unwrap_err(), TransportError::Cancelled);
}

#[tokio::test]
async fn refused_connection_is_a_network_failure() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let transport = Transport::new(&format!("http://{addr}/rpc"), None).unwrap();

    let request = transport.execute(rpc("echo", json!(null))).unwrap();
    assert_eq!(request.await.unwrap_err(), TransportError::NetworkFailure);
}

#[tokio::test]
async fn form_upload_uses_multipart_boundary() {
    let addr = start_server();
    let transport = Transport::new(&format!("http://{addr}/upload"), None).unwrap();

    let form = FormData::new()
        .text("title", "report")
        .file("data", "report.bin", "application/octet-stream", vec![7; 64]);
    let summary = transport
        .execute(RequestPayload::from(form))
        .unwrap()
        .await
        .unwrap();

    let content_type = summary["content_type"].as_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="), "{content_type}");
    assert_eq!(summary["parts"], 2);
}

#[tokio::test]
async fn hostile_field_names_cannot_inject_part_headers() {
    let addr = start_server();
    let transport = Transport::new(&format!("http://{addr}/upload"), None).unwrap();

    let form = FormData::new().file(
        "a\"; filename=\"evil.exe\r\nX-Injected: 1",
        "b\"\r\nX-Injected: 2",
        "application/octet-stream",
        vec![1, 2, 3],
    );
    let summary = transport
        .execute(RequestPayload::from(form))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(summary["parts"], 1);
    let headers: Vec<&str> = summary["part_headers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| line.as_str().unwrap())
        .collect();
    assert_eq!(headers.len(), 2, "{headers:?}");
    assert!(headers[0].starts_with("Content-Disposition: form-data; "), "{headers:?}");
    assert!(!headers[0].contains("filename=\"evil.exe\""), "{headers:?}");
    assert_eq!(headers[1], "Content-Type: application/octet-stream");
    assert!(headers.iter().all(|line| !line.starts_with("X-Injected")));
}
