//! End-to-end tests for CompletionClient against a local one-shot HTTP server.
//!
//! Each test binds a listener on 127.0.0.1, serves a single canned response
//! and records the raw request so the body can be inspected.

use chat_core::{CancelToken, Completion, CompletionError, CompletionRequest, Configuration};
use completion_client::{CompletionClient, CompletionConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve one HTTP response and hand back the request body.
async fn serve_once(
    status: &str,
    content_type: &str,
    body: String,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();
    let status = status.to_string();
    let content_type = content_type.to_string();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request_body = read_request(&mut socket).await;
        let _ = tx.send(request_body);

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });

    (format!("http://{}/v1", addr), rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf[header_end..]).to_string()
}

fn client(base_url: &str) -> CompletionClient {
    let config = CompletionConfig::builder()
        .api_key("test-key")
        .api_url(base_url)
        .system_prompt("Be helpful.")
        .build();
    CompletionClient::new(config).unwrap()
}

fn request(prompt: &str) -> CompletionRequest {
    CompletionRequest::new(prompt, Vec::new(), Configuration::default())
}

fn sse_chunk(content: &str) -> String {
    format!(
        "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}}}}]}}\n\n",
        serde_json::to_string(content).unwrap()
    )
}

#[tokio::test]
async fn test_complete_returns_first_choice() {
    let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Hi there!"}}],
        "usage":{"prompt_tokens":5,"completion_tokens":3,"total_tokens":8}}"#;
    let (url, request_rx) = serve_once("200 OK", "application/json", body.to_string()).await;

    let text = client(&url).complete(request("Hello")).await.unwrap();
    assert_eq!(text, "Hi there!");

    let sent: serde_json::Value = serde_json::from_str(&request_rx.await.unwrap()).unwrap();
    assert_eq!(sent["stream"], false);
    assert_eq!(sent["model"], "llama-3.3-70b-versatile");
    assert_eq!(sent["max_tokens"], 2048);
    assert_eq!(sent["messages"][0]["role"], "system");
    assert_eq!(sent["messages"][1]["content"], "Hello");
}

#[tokio::test]
async fn test_complete_non_success_is_transport_error() {
    let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
    let (url, _rx) = serve_once("401 Unauthorized", "application/json", body.to_string()).await;

    match client(&url).complete(request("Hello")).await {
        Err(CompletionError::Transport(msg)) => {
            assert!(msg.contains("401"));
            assert!(msg.contains("invalid_request_error"));
            assert!(msg.contains("Invalid API Key"));
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_complete_malformed_body_is_parse_error() {
    let (url, _rx) = serve_once("200 OK", "application/json", "{not json".to_string()).await;

    let result = client(&url).complete(request("Hello")).await;
    assert!(matches!(result, Err(CompletionError::Parse(_))));
}

#[tokio::test]
async fn test_stream_complete_delivers_cumulative_text() {
    let mut body = String::new();
    body.push_str(&sse_chunk("H"));
    body.push_str(": keep-alive\n\n");
    body.push_str(&sse_chunk("e"));
    body.push_str("data: {garbage\n\n");
    body.push_str(&sse_chunk("llo"));
    body.push_str("data: [DONE]\n\n");
    let (url, request_rx) = serve_once("200 OK", "text/event-stream", body).await;

    let mut seen = Vec::new();
    let text = client(&url)
        .stream_complete(request("Hi"), &CancelToken::new(), &mut |t: &str| {
            seen.push(t.to_string())
        })
        .await
        .unwrap();

    assert_eq!(text, "Hello");
    assert_eq!(seen, vec!["H", "He", "Hello"]);

    let sent: serde_json::Value = serde_json::from_str(&request_rx.await.unwrap()).unwrap();
    assert_eq!(sent["stream"], true);
}

#[tokio::test]
async fn test_stream_non_success_is_transport_error() {
    let (url, _rx) = serve_once("500 Internal Server Error", "text/plain", "boom".to_string()).await;

    let result = client(&url).stream(request("Hi")).await;
    match result {
        Err(CompletionError::Transport(msg)) => assert!(msg.contains("500")),
        Err(other) => panic!("expected transport error, got {:?}", other),
        Ok(_) => panic!("expected transport error, got a stream"),
    }
}

#[tokio::test]
async fn test_stream_api_error_body_is_reported() {
    let body = r#"{"error":{"message":"Rate limit reached","type":"tokens"}}"#;
    let (url, _rx) = serve_once("429 Too Many Requests", "application/json", body.to_string()).await;

    let result = client(&url)
        .stream_complete(request("Hi"), &CancelToken::new(), &mut |_: &str| {})
        .await;
    match result {
        Err(CompletionError::Transport(msg)) => {
            assert!(msg.contains("429"));
            assert!(msg.contains("tokens"));
            assert!(msg.contains("Rate limit reached"));
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_without_done_ends_with_body() {
    let mut body = String::new();
    body.push_str(&sse_chunk("Par"));
    body.push_str(&sse_chunk("tial"));
    let (url, _rx) = serve_once("200 OK", "text/event-stream", body).await;

    let mut seen = Vec::new();
    let text = client(&url)
        .stream_complete(request("Hi"), &CancelToken::new(), &mut |t: &str| {
            seen.push(t.to_string())
        })
        .await
        .unwrap();

    assert_eq!(text, "Partial");
    assert_eq!(seen, vec!["Par", "Partial"]);
}

#[tokio::test]
async fn test_stream_complete_cancelled_before_start_returns_empty() {
    let body = format!("{}data: [DONE]\n\n", sse_chunk("Hello"));
    let (url, _rx) = serve_once("200 OK", "text/event-stream", body).await;

    let cancel = CancelToken::new();
    cancel.cancel();
    let mut calls = 0;
    let text = client(&url)
        .stream_complete(request("Hi"), &cancel, &mut |_: &str| calls += 1)
        .await
        .unwrap();

    assert_eq!(text, "");
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client(&format!("http://{}/v1", addr))
        .complete(request("Hi"))
        .await;
    assert!(matches!(result, Err(CompletionError::Transport(_))));
}
