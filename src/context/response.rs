use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use std::mem;
use tracing::warn;

use crate::dispatcher::HandlerResponse;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// Buffered response
///
/// Status, headers and body accumulate here while the chain runs; the
/// dispatcher takes them exactly once with [`ResponseWriter::finish`] and
/// hands them to the transport. Anything written after that is logged and
/// dropped.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    status_committed: bool,
    headers: HeaderMap,
    body: Vec<u8>,
    flushed: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            status_committed: false,
            headers: HeaderMap::new(),
            body: Vec::new(),
            flushed: false,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether user code set the status explicitly
    #[must_use]
    pub fn is_status_committed(&self) -> bool {
        self.status_committed
    }

    /// Set the status; the last call before the flush wins
    pub fn set_status(&mut self, status: StatusCode) {
        if self.dropped("status") {
            return;
        }
        self.status = status;
        self.status_committed = true;
    }

    /// Framework default status that user code may still override
    pub(crate) fn set_default_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Replace a header; invalid names or values are logged and ignored
    pub fn set_header(&mut self, name: &str, value: &str) {
        if self.dropped("header") {
            return;
        }
        if let Some((name, value)) = parse_header(name, value) {
            self.headers.insert(name, value);
        }
    }

    /// Add a header value without replacing existing ones
    pub fn append_header(&mut self, name: &str, value: &str) {
        if self.dropped("header") {
            return;
        }
        if let Some((name, value)) = parse_header(name, value) {
            self.headers.append(name, value);
        }
    }

    /// Set `Content-Type` unless user code already chose one
    pub fn set_default_content_type(&mut self, content_type: &'static str) {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }

    /// Append to the body buffer
    pub fn write(&mut self, bytes: &[u8]) {
        if self.dropped("body") {
            return;
        }
        self.body.extend_from_slice(bytes);
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Discard headers and body written so far and install a plain-text error
    pub(crate) fn reset_for_error(&mut self, status: StatusCode, message: &str) {
        self.headers.clear();
        self.body.clear();
        self.status = status;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        self.body.extend_from_slice(message.as_bytes());
    }

    /// Take the buffered response; `None` if it was already taken
    pub(crate) fn finish(&mut self) -> Option<HandlerResponse> {
        if self.flushed {
            warn!("Response already flushed; second flush ignored");
            return None;
        }
        self.flushed = true;
        Some(HandlerResponse {
            status: self.status,
            headers: mem::take(&mut self.headers),
            body: mem::take(&mut self.body),
        })
    }

    fn dropped(&self, what: &'static str) -> bool {
        if self.flushed {
            warn!(write = what, "Write after response flush dropped");
        }
        self.flushed
    }
}

fn parse_header(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    let parsed_name = match HeaderName::from_bytes(name.as_bytes()) {
        Ok(n) => n,
        Err(e) => {
            warn!(header = %name, error = %e, "Invalid header name ignored");
            return None;
        }
    };
    match HeaderValue::from_str(value) {
        Ok(v) => Some((parsed_name, v)),
        Err(e) => {
            warn!(header = %name, error = %e, "Invalid header value ignored");
            None
        }
    }
}
