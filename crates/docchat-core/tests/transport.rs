//! End-to-end transport tests against a scripted HTTP/1.1 server.
use std::time::Duration;

use docchat_core::{ChatBackend, ChatClient, ChatClientConfig, ChatError, EventStatus, StreamEvent};
use futures::StreamExt as _;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// One write to the socket, optionally preceded by a pause.
struct Part {
    delay: Duration,
    bytes: Vec<u8>,
}

fn part(bytes: impl Into<Vec<u8>>) -> Part {
    Part {
        delay: Duration::ZERO,
        bytes: bytes.into(),
    }
}

fn delayed(delay: Duration, bytes: impl Into<Vec<u8>>) -> Part {
    Part {
        delay,
        bytes: bytes.into(),
    }
}

fn chunk(data: &str) -> String {
    format!("{:x}\r\n{data}\r\n", data.len())
}

const CHUNKED_HEAD: &str = "HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nSession-ID: session-2\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";

/// Serves a single connection and returns the raw request it received.
async fn serve_once(parts: Vec<Part>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base_url = format!("http://{}", listener.local_addr().expect("addr"));
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let request = read_request(&mut socket).await;
        for part in parts {
            if !part.delay.is_zero() {
                tokio::time::sleep(part.delay).await;
            }
            if socket.write_all(&part.bytes).await.is_err() {
                break;
            }
            let _ = socket.flush().await;
        }
        let _ = socket.shutdown().await;
        request
    });
    (base_url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0_u8; 1024];
    loop {
        let n = socket.read(&mut tmp).await.expect("read");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.trim()
                        .eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn client(base_url: &str) -> ChatClient {
    ChatClient::new(ChatClientConfig::new(base_url)).expect("client")
}

#[tokio::test]
async fn streams_events_split_across_chunks() {
    let parts = vec![
        part(CHUNKED_HEAD),
        part(chunk("{\"type\":\"reasoning\",\"status\":\"in_progress\"}\n{\"type\":\"out")),
        delayed(
            Duration::from_millis(20),
            chunk("put\",\"status\":\"in_progress\",\"delta\":\"Hel\"}\n{\"type\":\"bogus\",\"status\":\"completed\"}\n"),
        ),
        delayed(
            Duration::from_millis(20),
            chunk("{\"type\":\"output\",\"status\":\"completed\",\"delta\":\"lo\"}"),
        ),
        part("0\r\n\r\n"),
    ];
    let (base_url, server) = serve_once(parts).await;

    let result = client(&base_url)
        .generate_response("hi", "session-1", "https://docs.example.com/a", Duration::from_secs(5))
        .await
        .expect("response");
    assert_eq!(result.session_id, "session-2");

    let events: Vec<_> = result.stream.collect().await;
    assert_eq!(
        events,
        vec![
            Ok(StreamEvent::Reasoning {
                status: EventStatus::InProgress
            }),
            Ok(StreamEvent::Output {
                status: EventStatus::InProgress,
                delta: "Hel".into()
            }),
            Ok(StreamEvent::Output {
                status: EventStatus::Completed,
                delta: "lo".into()
            }),
        ]
    );

    let request = server.await.expect("server");
    let lower = request.to_ascii_lowercase();
    assert!(request.starts_with("POST /chat "), "{request}");
    assert!(lower.contains("session-id: session-1"), "{request}");
    let body = &request[request.find("\r\n\r\n").expect("body") + 4..];
    let body: serde_json::Value = serde_json::from_str(body).expect("json body");
    assert_eq!(
        body,
        serde_json::json!({"content":"hi","current_url":"https://docs.example.com/a","stream":true})
    );
}

#[tokio::test]
async fn missing_session_header_keeps_sent_id() {
    let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
    let parts = vec![
        part(head),
        part(chunk("{\"type\":\"output\",\"status\":\"completed\",\"delta\":\"x\"}\n")),
        part("0\r\n\r\n"),
    ];
    let (base_url, _server) = serve_once(parts).await;
    let result = client(&base_url)
        .generate_response("hi", "kept", "", Duration::from_secs(5))
        .await
        .expect("response");
    assert_eq!(result.session_id, "kept");
}

#[tokio::test]
async fn rate_limit_carries_retry_hint() {
    let parts = vec![part(
        "HTTP/1.1 429 Too Many Requests\r\nRetry-After: 7\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )];
    let (base_url, _server) = serve_once(parts).await;
    let err = client(&base_url)
        .generate_response("hi", "", "", Duration::from_secs(5))
        .await
        .expect_err("rate limited");
    assert_eq!(
        err,
        ChatError::RateLimited {
            retry_after_secs: Some(7)
        }
    );
    assert!(err.to_string().contains("7 seconds"));
}

#[tokio::test]
async fn server_error_is_unreachable() {
    let parts = vec![part(
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\ndown",
    )];
    let (base_url, _server) = serve_once(parts).await;
    let err = client(&base_url)
        .generate_response("hi", "", "", Duration::from_secs(5))
        .await
        .expect_err("unreachable");
    assert_eq!(err, ChatError::Unreachable { status: Some(503) });
}

#[tokio::test]
async fn success_without_body_is_unreachable() {
    let cases = [
        ("HTTP/1.1 204 No Content\r\nSession-ID: s\r\nConnection: close\r\n\r\n", 204),
        ("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", 200),
    ];
    for (head, status) in cases {
        let (base_url, _server) = serve_once(vec![part(head)]).await;
        let err = client(&base_url)
            .generate_response("hi", "", "", Duration::from_secs(5))
            .await
            .expect_err("no body");
        assert_eq!(err, ChatError::Unreachable { status: Some(status) });
    }
}

#[tokio::test]
async fn timeout_before_headers_is_timed_out() {
    let parts = vec![delayed(Duration::from_secs(5), CHUNKED_HEAD)];
    let (base_url, _server) = serve_once(parts).await;
    let err = client(&base_url)
        .generate_response("hi", "", "", Duration::from_millis(200))
        .await
        .expect_err("timeout");
    assert_eq!(err, ChatError::TimedOut);
}

#[tokio::test]
async fn timeout_mid_stream_ends_with_timed_out() {
    let parts = vec![
        part(CHUNKED_HEAD),
        part(chunk("{\"type\":\"output\",\"status\":\"in_progress\",\"delta\":\"partial\"}\n")),
        delayed(Duration::from_secs(5), "0\r\n\r\n"),
    ];
    let (base_url, _server) = serve_once(parts).await;
    let result = client(&base_url)
        .generate_response("hi", "", "", Duration::from_millis(300))
        .await
        .expect("headers arrive before the timeout");

    let events: Vec<_> = result.stream.collect().await;
    assert_eq!(events.len(), 2, "{events:?}");
    assert!(matches!(&events[0], Ok(StreamEvent::Output { delta, .. }) if delta == "partial"));
    assert_eq!(events[1], Err(ChatError::TimedOut));
}

#[tokio::test]
async fn clear_history_reports_success() {
    let parts = vec![part(
        "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )];
    let (base_url, server) = serve_once(parts).await;
    assert!(
        client(&base_url)
            .clear_history("session-9", Duration::from_secs(5))
            .await
    );
    let request = server.await.expect("server");
    assert!(request.starts_with("POST /clear "), "{request}");
    assert!(request.to_ascii_lowercase().contains("session-id: session-9"));
}

#[tokio::test]
async fn clear_history_swallows_failures() {
    let parts = vec![part(
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )];
    let (base_url, _server) = serve_once(parts).await;
    assert!(!client(&base_url).clear_history("s", Duration::from_secs(5)).await);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let closed = format!("http://{}", listener.local_addr().expect("addr"));
    drop(listener);
    assert!(!client(&closed).clear_history("s", Duration::from_secs(1)).await);
}
