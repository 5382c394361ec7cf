//! Hand-rolled HTTP server for tests that need long-lived SSE connections.
#![allow(dead_code)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Raw SSE frames written right after the response head.
    pub frames: Vec<String>,
    /// Keep the stream open with heartbeats until the client hangs up.
    pub hold_open: bool,
    /// Reply to `POST /api/analyze-full`: status, JSON body, delay.
    pub analyze: Option<(u16, String, Duration)>,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicUsize,
    open: AtomicUsize,
}

pub struct TestServer {
    pub base_url: String,
    counters: Arc<Counters>,
}

impl TestServer {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let counters = Arc::new(Counters::default());
        let script = Arc::new(script);

        let shared = Arc::clone(&counters);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, Arc::clone(&script), Arc::clone(&shared)));
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            counters,
        }
    }

    pub fn streams_accepted(&self) -> usize {
        self.counters.accepted.load(Ordering::SeqCst)
    }

    pub fn streams_open(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Polls `check` for up to three seconds.
    pub async fn wait_until(&self, check: impl Fn(&Self) -> bool) -> bool {
        for _ in 0..300 {
            if check(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check(self)
    }
}

async fn serve(mut socket: TcpStream, script: Arc<Script>, counters: Arc<Counters>) {
    let Some(request_line) = read_head(&mut socket).await else {
        return;
    };
    if request_line.starts_with("GET /api/log-stream") {
        counters.accepted.fetch_add(1, Ordering::SeqCst);
        counters.open.fetch_add(1, Ordering::SeqCst);
        stream_events(&mut socket, &script).await;
        counters.open.fetch_sub(1, Ordering::SeqCst);
    } else if request_line.starts_with("POST /api/analyze-full") {
        match &script.analyze {
            Some((status, body, delay)) => {
                tokio::time::sleep(*delay).await;
                respond(&mut socket, *status, body).await;
            }
            None => respond(&mut socket, 404, r#"{"error":"not scripted"}"#).await,
        }
    } else {
        respond(&mut socket, 404, r#"{"error":"not found"}"#).await;
    }
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|window| window == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    head.lines().next().map(str::to_owned)
}

async fn respond(socket: &mut TcpStream, status: u16, body: &str) {
    let head = format!(
        "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        body.len()
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(body.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn stream_events(socket: &mut TcpStream, script: &Script) {
    let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncache-control: no-cache\r\nconnection: close\r\n\r\n";
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    for frame in &script.frames {
        if socket.write_all(frame.as_bytes()).await.is_err() {
            return;
        }
    }
    let _ = socket.flush().await;

    if script.hold_open {
        let mut scratch = [0u8; 64];
        let mut ticker = tokio::time::interval(Duration::from_millis(25));
        loop {
            tokio::select! {
                read = socket.read(&mut scratch) => match read {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                },
                _ = ticker.tick() => {
                    let beat = b"data: {\"type\":\"heartbeat\"}\n\n";
                    if socket.write_all(beat).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
    let _ = socket.shutdown().await;
}
