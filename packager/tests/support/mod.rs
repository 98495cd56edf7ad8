//! Test support utilities for pkgsmith behavioural tests.
//!
//! Provides UTF-8 temporary directories, package tree fixtures and a minimal
//! HTTP server standing in for a node's control endpoint.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A temporary directory with its UTF-8 path.
pub struct Sandbox {
    _temp: TempDir,
    /// Root of the sandbox.
    pub root: Utf8PathBuf,
}

impl Sandbox {
    /// Create an empty sandbox.
    pub fn new() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 temp dir");
        Self { _temp: temp, root }
    }
}

/// Write a package directory `<root>/<dir>` with metadata and a `pkg/`.
pub fn write_package(root: &Utf8Path, dir: &str, package: &str, publisher: &str) -> Utf8PathBuf {
    let pkg = root.join(dir);
    std::fs::create_dir_all(pkg.join("pkg")).expect("mkdir pkg");
    std::fs::write(
        pkg.join("metadata.json"),
        format!(r#"{{"package": "{package}", "publisher": "{publisher}"}}"#),
    )
    .expect("write metadata");
    pkg
}

/// One request received by [`StubNode`].
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    /// Request method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Request body.
    pub body: String,
}

/// Minimal HTTP/1.1 server answering each request with a scripted status.
pub struct StubNode {
    /// Base URL, e.g. `http://127.0.0.1:40123`.
    pub base_url: String,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl StubNode {
    /// Start a server answering requests with `statuses`, in order.
    ///
    /// Requests beyond the scripted list are answered with 500. Redirect
    /// statuses point at `/elsewhere`.
    pub fn start(statuses: &[u16]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub node");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let received = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(Mutex::new(statuses.iter().copied().collect::<VecDeque<_>>()));

        let sink = Arc::clone(&received);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let status = script.lock().expect("script lock").pop_front().unwrap_or(500);
                let _ = serve(stream, status, &sink);
            }
        });

        Self { base_url, received }
    }

    /// Requests received so far, in arrival order.
    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().expect("received lock").clone()
    }
}

/// Read one request, record it, then answer with `status`.
///
/// Recording happens before the response is written so a client that has
/// seen the response always finds its request in the log.
fn serve(stream: TcpStream, status: u16, sink: &Mutex<Vec<ReceivedRequest>>) -> Option<()> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_owned();
    let path = parts.next()?.to_owned();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().ok()?;
            }
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).ok()?;
    sink.lock().expect("sink lock").push(ReceivedRequest {
        method,
        path,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let mut stream = stream;
    let location = if (300..400).contains(&status) {
        "Location: /elsewhere\r\n"
    } else {
        ""
    };
    let response = format!(
        "HTTP/1.1 {status} Scripted\r\n{location}Content-Length: 0\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(response.as_bytes()).ok()?;
    stream.flush().ok()
}

/// DOS `(date, time)` pairs from every local file header, in archive order.
pub fn local_header_timestamps(bytes: &[u8]) -> Vec<(u16, u16)> {
    let read_u16 = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
    let read_u32 = |at: usize| {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    };

    let mut stamps = Vec::new();
    let mut offset = 0;
    while offset + 30 <= bytes.len() && read_u32(offset) == 0x0403_4b50 {
        let compressed = read_u32(offset + 18) as usize;
        let name_len = read_u16(offset + 26) as usize;
        let extra_len = read_u16(offset + 28) as usize;
        stamps.push((read_u16(offset + 12), read_u16(offset + 10)));
        offset += 30 + name_len + extra_len + compressed;
    }
    stamps
}

/// DOS encoding of 2023-06-19.
pub const CANONICAL_DOS_DATE: u16 = ((2023 - 1980) << 9) | (6 << 5) | 19;
