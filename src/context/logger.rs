use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, trace, warn, Span};

use crate::ids::RequestId;

type Fields = Vec<(Cow<'static, str>, String)>;

/// Request-scoped logger handed down the chain
///
/// Every event is emitted inside the request span, so subscriber output
/// carries the request id, method and path. Middlewares enrich the logger for
/// the rest of the chain with [`Logger::with_field`] and
/// [`RequestContext::set_logger`](crate::RequestContext::set_logger); the
/// extra fields are rendered as one `fields` value on each event.
#[derive(Clone)]
pub struct Logger {
    span: Span,
    fields: Arc<Fields>,
}

impl Logger {
    /// Logger for one request, opening the `request` span
    #[must_use]
    pub fn for_request(request_id: RequestId, method: &http::Method, path: &str) -> Self {
        Self {
            span: info_span!("request", request_id = %request_id, method = %method, path = %path),
            fields: Arc::default(),
        }
    }

    /// Logger that is not attached to any request span
    #[must_use]
    pub fn detached() -> Self {
        Self {
            span: Span::none(),
            fields: Arc::default(),
        }
    }

    /// A derived logger with one more field; an existing key is overwritten
    #[must_use]
    pub fn with_field(&self, key: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Self {
        let key = key.into();
        let mut fields: Fields = self
            .fields
            .iter()
            .filter(|(k, _)| *k != key)
            .cloned()
            .collect();
        fields.push((key, value.to_string()));
        Self {
            span: self.span.clone(),
            fields: Arc::new(fields),
        }
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn trace(&self, message: impl fmt::Display) {
        trace!(parent: &self.span, fields = %FieldList(&self.fields), "{}", message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        debug!(parent: &self.span, fields = %FieldList(&self.fields), "{}", message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        info!(parent: &self.span, fields = %FieldList(&self.fields), "{}", message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        warn!(parent: &self.span, fields = %FieldList(&self.fields), "{}", message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        error!(parent: &self.span, fields = %FieldList(&self.fields), "{}", message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::detached()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("span", &self.span.metadata().map(|m| m.name()))
            .field("fields", &FieldList(&self.fields).to_string())
            .finish()
    }
}

struct FieldList<'a>(&'a Fields);

impl fmt::Display for FieldList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_field_derives_without_touching_parent() {
        let base = Logger::detached().with_field("tenant", "acme");
        let derived = base.with_field("user", 42).with_field("tenant", "other");
        assert_eq!(base.field("user"), None);
        assert_eq!(derived.field("user"), Some("42"));
        assert_eq!(derived.field("tenant"), Some("other"));
        assert_eq!(FieldList(&derived.fields).to_string(), "user=42 tenant=other");
    }
}
