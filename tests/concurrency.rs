//! Runs the real server on an ephemeral port and checks that slow handlers
//! interleave instead of queueing.


use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{json, Value};
use switchyard::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

async fn post(addr: SocketAddr, path: &str, body: &str) -> (u16, Value) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let raw = format!(
        "POST {path} HTTP/1.1\r\nhost: {addr}\r\ncontent-type: application/json\r\n\
         content-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let (head, payload) = response.split_once("\r\n\r\n").unwrap();
    let status = head.split(' ').nth(1).unwrap().parse().unwrap();
    (status, serde_json::from_str(payload).unwrap_or(Value::Null))
}

#[tokio::test(flavor = "current_thread")]
async fn slow_requests_interleave_on_one_thread() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::bind(addr)
            .handler_timeout(Some(Duration::from_secs(10)))
            .serve_listener(listener, integration_app::app(50), async {
                let _ = stopped.await;
            }),
    );

    let requests = (0..10).map(|_| post(addr, "/long-running", r#"{"hello":"world"}"#));
    let results = spawn_all(requests).await;

    let starts: Vec<u64> = results.iter().map(|(_, body)| body["handle_start"].as_u64().unwrap()).collect();
    let spread = starts.iter().max().unwrap() - starts.iter().min().unwrap();
    assert!(spread < 1000, "handlers started {spread} ms apart");

    for (status, body) in &results {
        assert_eq!(*status, 200);
        assert_eq!(body["request"], json!({"hello": "world"}));
        let elapsed = body["handle_end"].as_u64().unwrap() - body["handle_start"].as_u64().unwrap();
        assert!((1000..2000).contains(&elapsed), "handler ran for {elapsed} ms");
    }

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn expired_handlers_answer_500() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::bind(addr)
            .handler_timeout(Some(Duration::from_millis(100)))
            .serve_listener(listener, integration_app::app(50), async {
                let _ = stopped.await;
            }),
    );

    let (status, _) = post(addr, "/long-running", "{}").await;
    assert_eq!(status, 500);

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

/// Spawns every future on the current runtime and awaits them in order.
async fn spawn_all<F>(futures: impl Iterator<Item = F>) -> Vec<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handles: Vec<_> = futures.map(tokio::spawn).collect();
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}
