//! Minimal HTTP/1.1 server for transport tests.
//!
//! Answers every request with one canned response. Can omit Content-Length,
//! stream without end, or stall before answering. Records each request head
//! so tests can check the Host header and count hits.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct MockResponse {
    pub(crate) status: &'static str,
    pub(crate) headers: Vec<(&'static str, String)>,
    pub(crate) body: Vec<u8>,
    /// Send `Content-Length: body.len()` (otherwise the body ends at close).
    pub(crate) content_length: bool,
    /// After the body, keep writing `body` until the client hangs up.
    pub(crate) endless: bool,
    /// Sleep before writing anything.
    pub(crate) stall: Option<Duration>,
}

impl MockResponse {
    pub(crate) fn image(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: "200 OK",
            headers: vec![("Content-Type", content_type.to_string())],
            body,
            content_length: true,
            endless: false,
            stall: None,
        }
    }

    pub(crate) fn status(status: &'static str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            content_length: true,
            endless: false,
            stall: None,
        }
    }

    pub(crate) fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }
}

pub(crate) struct MockServer {
    pub(crate) port: u16,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Request heads received so far.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts a server on 127.0.0.1 in a background thread. Runs until the process exits.
pub(crate) fn start(response: MockResponse) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    let response = Arc::new(response);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let response = Arc::clone(&response);
            let seen = Arc::clone(&seen);
            thread::spawn(move || handle(stream, &response, &seen));
        }
    });
    MockServer { port, requests }
}

/// A port with nothing listening on it.
pub(crate) fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().unwrap().port()
}

fn handle(mut stream: TcpStream, response: &MockResponse, seen: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    seen.lock()
        .unwrap()
        .push(String::from_utf8_lossy(&buf[..n]).into_owned());

    if let Some(d) = response.stall {
        thread::sleep(d);
    }

    let mut head = format!("HTTP/1.1 {}\r\n", response.status);
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    if response.content_length && !response.endless {
        head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    }
    head.push_str("Connection: close\r\n\r\n");
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    if stream.write_all(&response.body).is_err() {
        return;
    }
    if response.endless && !response.body.is_empty() {
        while stream.write_all(&response.body).is_ok() {}
    }
}
