use http::{HeaderMap, Method, Uri, Version};
use may_minihttp::Request;
use std::io::{self, Read};
use tracing::debug;

fn invalid(what: &'static str, e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("{what}: {e}"))
}

/// Convert a `may_minihttp` request into an `http::Request` with the body read
/// into memory.
///
/// # Errors
///
/// `InvalidData` for an unparseable method, target or header, or any error
/// raised while reading the body.
pub fn to_http_request(req: Request) -> io::Result<http::Request<Vec<u8>>> {
    let method = Method::from_bytes(req.method().as_bytes()).map_err(|e| invalid("method", e))?;
    let uri: Uri = req.path().parse().map_err(|e| invalid("request target", e))?;
    let version = match req.version() {
        0 => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut builder = http::Request::builder()
        .method(method)
        .uri(uri)
        .version(version);
    let mut header_count = 0usize;
    for h in req.headers() {
        builder = builder.header(h.name, h.value);
        header_count += 1;
    }

    let mut body = Vec::new();
    req.body().read_to_end(&mut body)?;

    let request = builder.body(body).map_err(|e| invalid("header", e))?;
    debug!(
        method = %request.method(),
        path = %request.uri().path(),
        http_version = ?request.version(),
        header_count,
        body_bytes = request.body().len(),
        "HTTP request parsed"
    );
    Ok(request)
}

/// Cookies from every `Cookie` header, in order of appearance
#[must_use]
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_parse_cookies() {
        let mut h = HeaderMap::new();
        h.append("cookie", HeaderValue::from_static("a=b; c=\"d\""));
        h.append("cookie", HeaderValue::from_static("e=f;;novalue; =x"));
        assert_eq!(
            parse_cookies(&h),
            vec![
                ("a".to_string(), "b".to_string()),
                ("c".to_string(), "d".to_string()),
                ("e".to_string(), "f".to_string()),
            ]
        );
    }
}
