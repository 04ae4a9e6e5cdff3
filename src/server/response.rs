use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use http::header::{CONTENT_LENGTH, DATE, SERVER};
use may_minihttp::Response;
use once_cell::sync::Lazy;
use std::io;
use tracing::{debug, warn};

use crate::dispatcher::{HandlerResponse, ResponseSink};

/// `may_minihttp` keeps a fixed array of response headers; leave room for the
/// ones it writes itself.
pub const MAX_RESPONSE_HEADERS: usize = 14;

/// Distinct header lines cached for the process lifetime
const INTERN_LIMIT: usize = 4096;

type LineTable = DashMap<String, &'static str>;

/// `may_minihttp` only takes `&'static str` header lines, so each distinct
/// `Name: value` line is leaked once and reused afterwards.
static HEADER_LINES: Lazy<LineTable> = Lazy::new(DashMap::new);

/// Leak `line` once and cache it while `table` holds fewer than `limit`
/// lines; past that each line is leaked uncached and still returned.
fn intern_in(table: &LineTable, limit: usize, line: String) -> &'static str {
    if let Some(existing) = table.get(&line) {
        return *existing;
    }
    if table.len() >= limit {
        debug!(limit, "Header intern table full; leaking line uncached");
        return Box::leak(line.into_boxed_str());
    }
    match table.entry(line) {
        Entry::Occupied(entry) => *entry.get(),
        Entry::Vacant(entry) => {
            let leaked: &'static str = Box::leak(entry.key().clone().into_boxed_str());
            entry.insert(leaked);
            leaked
        }
    }
}

/// Header lines to emit for `response`, in order, capped at
/// [`MAX_RESPONSE_HEADERS`]
fn header_lines(table: &LineTable, limit: usize, response: &HandlerResponse) -> Vec<&'static str> {
    let mut lines = Vec::with_capacity(response.headers.len());
    for (name, value) in &response.headers {
        // framing headers are produced by the transport
        if name == CONTENT_LENGTH || name == DATE || name == SERVER {
            continue;
        }
        if lines.len() == MAX_RESPONSE_HEADERS {
            warn!(
                header = %name,
                limit = MAX_RESPONSE_HEADERS,
                "Response header limit reached; header dropped"
            );
            continue;
        }
        let Ok(value) = value.to_str() else {
            warn!(header = %name, "Non-ASCII header value dropped");
            continue;
        };
        let line = format!("{}: {}", canonical_name(name.as_str()), value);
        lines.push(intern_in(table, limit, line));
    }
    lines
}

/// Write a flushed response into a `may_minihttp` response
pub fn write_response(res: &mut Response, response: HandlerResponse) {
    let status = response.status;
    res.status_code(
        usize::from(status.as_u16()),
        status.canonical_reason().unwrap_or("Unknown"),
    );
    for line in header_lines(&HEADER_LINES, INTERN_LIMIT, &response) {
        res.header(line);
    }
    res.body_vec(response.body);
}

/// `content-type` -> `Content-Type`
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// [`ResponseSink`] over a `may_minihttp` response
pub struct MaySink<'r, 'a>(pub &'r mut Response<'a>);

impl ResponseSink for MaySink<'_, '_> {
    fn send(&mut self, response: HandlerResponse) -> io::Result<()> {
        write_response(self.0, response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("content-type"), "Content-Type");
        assert_eq!(canonical_name("x-request-id"), "X-Request-Id");
        assert_eq!(canonical_name("allow"), "Allow");
    }

    #[test]
    fn test_intern_reuses_lines() {
        let table = LineTable::new();
        let a = intern_in(&table, 8, "X-Test-Intern: 1".to_string());
        let b = intern_in(&table, 8, "X-Test-Intern: 1".to_string());
        assert!(std::ptr::eq(a, b));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_full_table_still_emits_every_header() {
        let table = LineTable::new();
        for i in 0..4 {
            intern_in(&table, 4, format!("X-Request-Id: filler-{i}"));
        }

        let mut headers = http::HeaderMap::new();
        headers.insert("x-request-id", "01JABCDEFGHJKMNPQRSTVWXYZ0".parse().unwrap());
        headers.insert("set-cookie", "session=abc; Path=/".parse().unwrap());
        headers.insert("content-length", "12".parse().unwrap());
        let response = HandlerResponse {
            status: http::StatusCode::OK,
            headers,
            body: Vec::new(),
        };

        let lines = header_lines(&table, 4, &response);
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"X-Request-Id: 01JABCDEFGHJKMNPQRSTVWXYZ0"));
        assert!(lines.contains(&"Set-Cookie: session=abc; Path=/"));
        assert_eq!(table.len(), 4);
    }
}
