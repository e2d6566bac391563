// crates/network/tests/network_tests.rs
//! Integration tests for the network crate against a loopback HTTP server

use hymnal_network::{
    Client, ClientConfig, ConnectivityChecker, DownloadManager, Method, NetworkError,
    NetworkMonitor, RetryPolicy,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one canned response per connection, in order, and records the
/// request line of each request received.
async fn serve(responses: Vec<(u16, Vec<u8>)>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };

            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break None;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break Some(pos + 4);
                }
            };
            let Some(header_end) = header_end else {
                continue;
            };

            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length")
                        .then(|| v.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            while buf.len() < header_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let request_line = head.lines().next().unwrap_or_default().to_string();
            let request_body = String::from_utf8_lossy(&buf[header_end..]).to_string();
            log.lock()
                .unwrap()
                .push(format!("{} {}", request_line, request_body).trim().to_string());

            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), seen)
}

fn fast_client(attempts: usize) -> Client {
    Client::with_config(ClientConfig {
        timeout: Duration::from_secs(5),
        retry_policy: Some(
            RetryPolicy::new(attempts)
                .with_initial_delay(Duration::from_millis(1))
                .with_jitter(false),
        ),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_get_json() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (base, seen) = serve(vec![(200, br#"{"hymns": 3}"#.to_vec())]).await;

    let value: Value = fast_client(1).get_json(&format!("{}/stats", base)).await.unwrap();
    assert_eq!(value, json!({"hymns": 3}));
    assert_eq!(seen.lock().unwrap()[0], "GET /stats HTTP/1.1");
}

#[tokio::test]
async fn test_send_json_puts_body() {
    let (base, seen) = serve(vec![(200, br#"{"ok": true}"#.to_vec())]).await;

    let reply: Value = fast_client(1)
        .send_json(Method::PUT, &format!("{}/doc", base), &json!({"a": 1}))
        .await
        .unwrap();

    assert_eq!(reply["ok"], json!(true));
    assert_eq!(seen.lock().unwrap()[0], r#"PUT /doc HTTP/1.1 {"a":1}"#);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let (base, seen) = serve(vec![
        (503, Vec::new()),
        (200, br#"[1, 2]"#.to_vec()),
    ])
    .await;

    let value: Vec<u32> = fast_client(3).get_json(&format!("{}/x", base)).await.unwrap();
    assert_eq!(value, vec![1, 2]);
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let (base, seen) = serve(vec![(404, Vec::new()), (200, b"{}".to_vec())]).await;

    let err = fast_client(3)
        .get_json::<Value>(&format!("{}/missing", base))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_atomic_download_lands_in_place() {
    let (base, _) = serve(vec![(200, b"ID3 tune bytes".to_vec())]).await;
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("hymn_1.mp3");

    let manager = DownloadManager::new(fast_client(1));
    let bytes = manager
        .download_file_atomic(&format!("{}/1.mp3", base), &dest)
        .await
        .unwrap();

    assert_eq!(bytes, 14);
    assert_eq!(std::fs::read(&dest).unwrap(), b"ID3 tune bytes");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_failed_download_leaves_nothing_behind() {
    let (base, _) = serve(vec![(404, Vec::new()), (200, Vec::new())]).await;
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("hymn_2.mp3");
    let manager = DownloadManager::new(fast_client(1));

    let err = manager
        .download_file_atomic(&format!("{}/2.mp3", base), &dest)
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkError::Status { code: 404, .. }));

    let err = manager
        .download_file_atomic(&format!("{}/2.mp3", base), &dest)
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkError::DownloadFailed(_)));

    assert!(!dest.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_connectivity_against_loopback() {
    let (base, _) = serve(vec![(200, Vec::new())]).await;
    let checker = ConnectivityChecker::with_urls(fast_client(1), vec![base]);
    assert!(checker.is_online().await);
}
