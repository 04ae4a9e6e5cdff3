#![allow(dead_code)]

use http::Method;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use trellis::middleware::{handler, BoxHandler};
use trellis::{HandlerResponse, RequestContext, Server};

/// Ensures May coroutines are configured only once
static MAY_INIT: Once = Once::new();

pub fn setup_may_runtime() {
    MAY_INIT.call_once(|| {
        may::config().set_stack_size(0x8000);
    });
}

pub fn request(method: Method, uri: &str) -> http::Request<Vec<u8>> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Vec::new())
        .unwrap()
}

/// Build a dispatcher from `app` and run one request through it
pub fn dispatch(app: Server, method: Method, uri: &str) -> HandlerResponse {
    app.into_dispatcher().dispatch(request(method, uri), None)
}

/// Shared event log for ordering assertions
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Middleware logging `enter` before and `leave` after the continuation
    pub fn layer(
        &self,
        enter: &'static str,
        leave: &'static str,
    ) -> impl Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static {
        let trace = self.clone();
        move |next: BoxHandler| {
            let trace = trace.clone();
            handler(move |ctx: &mut RequestContext| {
                trace.push(enter);
                next.call(ctx);
                trace.push(leave);
            })
        }
    }

    /// Handler that only records `name`
    pub fn terminal(
        &self,
        name: &'static str,
    ) -> impl Fn(&mut RequestContext) + Send + Sync + 'static {
        let trace = self.clone();
        move |_ctx: &mut RequestContext| trace.push(name)
    }
}

/// A port nothing is listening on right now
pub fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Write a raw request and read one response (headers plus Content-Length body)
pub fn send_request(addr: &SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(raw.as_bytes()).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_millis(1000)))
        .unwrap();

    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
        match stream.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                break
            }
            Err(e) => panic!("read error: {e:?}"),
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// `(status, lowercase header lines, body)`
pub fn parse_response(resp: &str) -> (u16, Vec<String>, String) {
    let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let headers = lines.map(str::to_ascii_lowercase).collect();
    (status, headers, body.to_string())
}
