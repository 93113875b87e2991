//! Scripted streaming endpoint for integration tests
//!
//! Listens on a random local port. Each accepted connection gets the next
//! [`Reply`] from the script; once the script runs out, connections get a
//! 200 that never sends data and never closes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const STREAM_HEAD: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n";

/// How the endpoint answers one connection
pub enum Reply {
    /// Read the request, then close without answering
    Drop,
    /// Read the request, then keep the socket open without answering
    Silent,
    /// Answer with this status and an empty body, then close
    Status(u16),
    /// 200, write these chunks, then close (stream death)
    Lines(Vec<String>),
    /// 200, write these chunks, then keep the socket open
    LinesThenHold(Vec<String>),
    /// 200, write chunks as they arrive; close when the sender is dropped
    Feed(mpsc::UnboundedReceiver<String>),
}

impl Reply {
    /// [`Reply::Lines`] from string slices
    pub fn lines(chunks: &[&str]) -> Self {
        Self::Lines(chunks.iter().map(ToString::to_string).collect())
    }

    /// [`Reply::LinesThenHold`] from string slices
    pub fn hold(chunks: &[&str]) -> Self {
        Self::LinesThenHold(chunks.iter().map(ToString::to_string).collect())
    }

    /// A [`Reply::Feed`] and the sender that drives it
    pub fn feed() -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::Feed(rx), tx)
    }
}

/// A request as the endpoint saw it
#[derive(Clone, Debug)]
pub struct CapturedRequest {
    /// Position of the connection it arrived on (0-based)
    pub index: usize,
    pub method: String,
    pub path: String,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
    pub at: Instant,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Running fake endpoint
pub struct FakeEndpoint {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    task: JoinHandle<()>,
}

impl FakeEndpoint {
    pub async fn start(script: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let accepted = Arc::clone(&accepted);
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                let mut script = script.into_iter();
                loop {
                    let Ok((socket, _)) = listener.accept().await else {
                        break;
                    };
                    let index = accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(handle(
                        socket,
                        index,
                        script.next(),
                        Arc::clone(&requests),
                    ));
                }
            })
        };

        Self {
            addr,
            accepted,
            requests,
            task,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// TCP connections accepted so far
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Requests received so far, in connection order
    pub fn requests(&self) -> Vec<CapturedRequest> {
        let mut requests = self.requests.lock().clone();
        requests.sort_by_key(|r| r.index);
        requests
    }

    /// Wait until at least `count` requests arrived
    pub async fn wait_for_requests(&self, count: usize, limit: Duration) -> Vec<CapturedRequest> {
        let deadline = Instant::now() + limit;
        loop {
            let requests = self.requests();
            if requests.len() >= count {
                return requests;
            }
            assert!(
                Instant::now() < deadline,
                "expected {count} requests, got {}",
                requests.len()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for FakeEndpoint {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(
    mut socket: TcpStream,
    index: usize,
    reply: Option<Reply>,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
) {
    let Some(request) = read_request(&mut socket, index).await else {
        return;
    };
    requests.lock().push(request);

    match reply {
        Some(Reply::Drop) => {}
        Some(Reply::Silent) => hold(socket).await,
        Some(Reply::Status(code)) => {
            let head = format!(
                "HTTP/1.1 {code} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        Some(Reply::Lines(chunks)) => {
            if write_stream(&mut socket, &chunks).await {
                let _ = socket.shutdown().await;
            }
        }
        Some(Reply::LinesThenHold(chunks)) => {
            if write_stream(&mut socket, &chunks).await {
                hold(socket).await;
            }
        }
        Some(Reply::Feed(mut rx)) => {
            if socket.write_all(STREAM_HEAD.as_bytes()).await.is_err() {
                return;
            }
            while let Some(chunk) = rx.recv().await {
                if socket.write_all(chunk.as_bytes()).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
            let _ = socket.shutdown().await;
        }
        None => {
            if write_stream(&mut socket, &[]).await {
                hold(socket).await;
            }
        }
    }
}

async fn write_stream(socket: &mut TcpStream, chunks: &[String]) -> bool {
    if socket.write_all(STREAM_HEAD.as_bytes()).await.is_err() {
        return false;
    }
    for chunk in chunks {
        if socket.write_all(chunk.as_bytes()).await.is_err() {
            return false;
        }
    }
    socket.flush().await.is_ok()
}

/// Keep the socket open until the peer goes away
async fn hold(mut socket: TcpStream) {
    let mut buf = [0u8; 64];
    while let Ok(n) = socket.read(&mut buf).await {
        if n == 0 {
            break;
        }
    }
}

async fn read_request(socket: &mut TcpStream, index: usize) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    let at = Instant::now();

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[head_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(CapturedRequest {
        index,
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
        at,
    })
}
