//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves a single static body, one request per connection. Can block HEAD,
//! ignore Range, hide the length, fail the first requests for a range start
//! with a given status, and trickle bodies out slowly.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, HEAD omits Content-Length and GET bodies are close-delimited.
    pub send_length: bool,
    /// Range start offset -> (status, times): the first `times` GETs for
    /// that start are answered with `status`.
    pub fail_starts: HashMap<u64, (u16, usize)>,
    /// Write bodies in 1 KiB pieces with this pause between them.
    pub trickle: Option<Duration>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            send_length: true,
            fail_starts: HashMap::new(),
            trickle: None,
        }
    }
}

/// A running server; it lives until the process exits.
#[derive(Clone)]
pub struct RangeServer {
    pub url: String,
    gets: Arc<AtomicUsize>,
    ranged_gets: Arc<AtomicUsize>,
}

impl RangeServer {
    /// GET requests received so far.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// GET requests that carried a Range header.
    pub fn ranged_gets(&self) -> usize {
        self.ranged_gets.load(Ordering::SeqCst)
    }
}

struct State {
    body: Vec<u8>,
    opts: RangeServerOptions,
    remaining_failures: Mutex<HashMap<u64, (u16, usize)>>,
    gets: Arc<AtomicUsize>,
    ranged_gets: Arc<AtomicUsize>,
}

/// Starts a server in a background thread serving `body`.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

/// Like `start` but allows customizing server behavior.
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let gets = Arc::new(AtomicUsize::new(0));
    let ranged_gets = Arc::new(AtomicUsize::new(0));
    let state = Arc::new(State {
        body,
        remaining_failures: Mutex::new(opts.fail_starts.clone()),
        opts,
        gets: Arc::clone(&gets),
        ranged_gets: Arc::clone(&ranged_gets),
    });
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&state);
            thread::spawn(move || handle(stream, &state));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/file.bin", port),
        gets,
        ranged_gets,
    }
}

fn status_only(stream: &mut std::net::TcpStream, status: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status
    );
    let _ = stream.write_all(response.as_bytes());
}

fn reason(code: u16) -> &'static str {
    match code {
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

fn handle(mut stream: std::net::TcpStream, state: &State) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let body = &state.body;
    let opts = &state.opts;
    let total = body.len() as u64;
    let accept_ranges = if opts.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            status_only(&mut stream, "405 Method Not Allowed");
            return;
        }
        let length = if opts.send_length {
            format!("Content-Length: {}\r\n", total)
        } else {
            String::new()
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\n{}{}Connection: close\r\n\r\n",
            length, accept_ranges
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        status_only(&mut stream, "405 Method Not Allowed");
        return;
    }

    state.gets.fetch_add(1, Ordering::SeqCst);
    if range.is_some() {
        state.ranged_gets.fetch_add(1, Ordering::SeqCst);
    }
    let start_key = range.map(|(s, _)| s).unwrap_or(0);
    let injected = {
        let mut failures = state.remaining_failures.lock().unwrap();
        match failures.get_mut(&start_key) {
            Some((code, times)) if *times > 0 => {
                *times -= 1;
                Some(*code)
            }
            _ => None,
        }
    };
    if let Some(code) = injected {
        status_only(&mut stream, &format!("{} {}", code, reason(code)));
        return;
    }

    let (status, content_range, slice) = match range {
        Some((start, end_incl)) if opts.support_ranges => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start >= total || start > end_incl {
                let response = format!(
                    "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    total
                );
                let _ = stream.write_all(response.as_bytes());
                return;
            }
            let slice = &body[start as usize..=end_incl as usize];
            (
                "206 Partial Content",
                Some(format!("Content-Range: bytes {}-{}/{}\r\n", start, end_incl, total)),
                slice,
            )
        }
        _ => ("200 OK", None, &body[..]),
    };
    let length = if opts.send_length {
        format!("Content-Length: {}\r\n", slice.len())
    } else {
        String::new()
    };
    let response = format!(
        "HTTP/1.1 {}\r\n{}{}{}Connection: close\r\n\r\n",
        status,
        length,
        content_range.unwrap_or_default(),
        accept_ranges
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    match opts.trickle {
        None => {
            let _ = stream.write_all(slice);
        }
        Some(pause) => {
            for piece in slice.chunks(1024) {
                if stream.write_all(piece).is_err() {
                    return;
                }
                let _ = stream.flush();
                thread::sleep(pause);
            }
        }
    }
}

/// Request method plus `(start, end_inclusive)` from `Range: bytes=X-Y`.
/// An open-ended `bytes=X-` yields `u64::MAX` as the end.
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut lines = request.split("\r\n");
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let range = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .and_then(|(_, value)| {
            let (a, b) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
            let start = a.trim().parse().ok()?;
            let end = match b.trim() {
                "" => u64::MAX,
                e => e.parse().ok()?,
            };
            Some((start, end))
        });
    (method, range)
}
