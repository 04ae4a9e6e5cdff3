use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use serde::Serialize;
use std::io::{self, Cursor};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use super::cancel::CancellationToken;
use super::logger::Logger;
use super::response::{ResponseWriter, APPLICATION_JSON, TEXT_HTML, TEXT_PLAIN};
use super::values::UserValues;
use crate::ids::RequestId;
use crate::router::ParamBag;
use crate::server::parse_cookies;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Per-request state carried through the middleware chain
///
/// Created by the dispatcher for every request and dropped once the response
/// has been flushed. Stages only ever borrow it, so nothing can hold on to
/// it past the end of the chain; background work must copy what it needs.
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    body: Vec<u8>,
    params: ParamBag,
    matched_pattern: Option<Arc<str>>,
    user_values: UserValues,
    logger: Logger,
    response: ResponseWriter,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Build a context from a parsed request
    ///
    /// The request id is taken from `x-request-id` when it holds a valid
    /// ULID, otherwise a new one is generated.
    #[must_use]
    pub fn new(request: http::Request<Vec<u8>>, remote_addr: Option<SocketAddr>) -> Self {
        let (parts, body) = request.into_parts();
        let request_id = RequestId::from_headers(&parts.headers);
        let logger = Logger::for_request(request_id, &parts.method, parts.uri.path());
        Self {
            request_id,
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            remote_addr,
            body,
            params: ParamBag::new(),
            matched_pattern: None,
            user_values: UserValues::new(),
            logger,
            response: ResponseWriter::new(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub(crate) fn bind_route(&mut self, pattern: Arc<str>, params: ParamBag) {
        self.matched_pattern = Some(pattern);
        self.params = params;
    }

    pub(crate) fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    // ----- request side -----

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path as received, before percent-decoding
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request header value, if present and valid UTF-8
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as a reader
    #[must_use]
    pub fn body_reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.body)
    }

    /// Move the body out, leaving it empty
    pub fn take_body(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.body)
    }

    /// Captured path parameter; `"*"` returns the wildcard tail
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    #[must_use]
    pub fn params(&self) -> &ParamBag {
        &self.params
    }

    /// Pattern of the matched route; `None` for 404 and 405 chains
    #[must_use]
    pub fn matched_pattern(&self) -> Option<&str> {
        self.matched_pattern.as_deref()
    }

    /// Query string value; with repeated keys the last occurrence wins
    #[must_use]
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .filter(|(k, _)| k == name)
            .last()
            .map(|(_, v)| v.into_owned())
    }

    /// All decoded query pairs in order
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Form field from an urlencoded body, falling back to the query string
    #[must_use]
    pub fn form_value(&self, name: &str) -> Option<String> {
        if self.is_form_body() {
            let from_body = url::form_urlencoded::parse(&self.body)
                .filter(|(k, _)| k == name)
                .last()
                .map(|(_, v)| v.into_owned());
            if from_body.is_some() {
                return from_body;
            }
        }
        self.query(name)
    }

    fn is_form_body(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(FORM_URLENCODED))
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        parse_cookies(&self.headers)
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    // ----- response side -----

    /// Set the response status; the last call before the flush wins.
    /// Codes outside 100..=999 are logged and ignored.
    pub fn status(&mut self, code: u16) -> &mut Self {
        match StatusCode::from_u16(code) {
            Ok(status) => self.response.set_status(status),
            Err(_) => self.logger.warn(format_args!("invalid status code {code} ignored")),
        }
        self
    }

    /// Set a response header, replacing previous values
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.response.set_header(name, value);
        self
    }

    /// Write plain text, `text/plain; charset=utf-8` unless a content type is set
    pub fn write_string(&mut self, body: &str) -> &mut Self {
        self.response.set_default_content_type(TEXT_PLAIN);
        self.response.write(body.as_bytes());
        self
    }

    /// Write HTML, `text/html; charset=utf-8` unless a content type is set
    pub fn write_html(&mut self, body: &str) -> &mut Self {
        self.response.set_default_content_type(TEXT_HTML);
        self.response.write(body.as_bytes());
        self
    }

    /// Write raw bytes without touching the content type
    pub fn write_bytes(&mut self, body: &[u8]) -> &mut Self {
        self.response.write(body);
        self
    }

    /// Serialize `value` as JSON
    ///
    /// A serialization failure is logged and turns the response into a 500.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> &mut Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.response.set_default_content_type(APPLICATION_JSON);
                self.response.write(&bytes);
            }
            Err(e) => {
                error!(
                    request_id = %self.request_id,
                    error = %e,
                    "JSON serialization failed"
                );
                self.response
                    .reset_for_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
                self.response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
        self
    }

    /// Send a file from disk with a content type derived from its extension
    ///
    /// A missing file becomes a 404, any other I/O error a 500.
    pub fn file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(bytes) => {
                debug!(
                    request_id = %self.request_id,
                    file = %path.display(),
                    bytes = bytes.len(),
                    "Serving file"
                );
                self.response.set_default_content_type(content_type_for(path));
                self.response.write(&bytes);
            }
            Err(e) => {
                let status = if e.kind() == io::ErrorKind::NotFound {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                warn!(
                    request_id = %self.request_id,
                    file = %path.display(),
                    error = %e,
                    status = status.as_u16(),
                    "File could not be served"
                );
                self.response
                    .reset_for_error(status, status.canonical_reason().unwrap_or("Error"));
                self.response.set_status(status);
            }
        }
        self
    }

    #[must_use]
    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    // ----- shared state -----

    #[must_use]
    pub fn user_values(&self) -> &UserValues {
        &self.user_values
    }

    pub fn user_values_mut(&mut self) -> &mut UserValues {
        &mut self.user_values
    }

    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Replace the logger for the rest of the chain
    ///
    /// Outer stages see the replacement too once the inner ones return;
    /// restore the previous logger on the way out to scope a change.
    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    // ----- cancellation -----

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// True once the server is stopping or the deadline has passed
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Install a deadline; an earlier existing deadline is kept
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    #[must_use]
    pub fn time_remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    #[cfg(test)]
    pub(crate) fn for_test(method: Method, uri: &str) -> Self {
        let request = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Vec::new())
            .unwrap_or_default();
        Self::new(request, None)
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("matched_pattern", &self.matched_pattern)
            .field("params", &self.params)
            .field("user_values", &self.user_values)
            .field("status", &self.response.status())
            .finish()
    }
}

/// Content type for a file extension
#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
        .as_str()
    {
        "html" | "htm" => TEXT_HTML,
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "json" => APPLICATION_JSON,
        "txt" => TEXT_PLAIN,
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
