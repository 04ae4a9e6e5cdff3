use std::fmt;

/// Registration-time error
///
/// Returned synchronously from route and middleware registration. Any of these
/// should stop the server from starting: a table that failed to register is
/// never published to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The pattern string does not follow the segment grammar
    PatternSyntax {
        /// The offending pattern as written
        pattern: String,
        /// Human readable reason
        reason: String,
    },
    /// Two patterns would terminate on the same trie node
    ///
    /// The first registration stays in place; `attempted` was rejected.
    RouteConflict {
        /// Method of the trie the conflict happened in
        method: String,
        /// Pattern already owning the terminal
        existing: String,
        /// Pattern whose registration was rejected
        attempted: String,
    },
    /// A node already holds a parameter child with another name, or a pattern
    /// binds the same parameter name twice
    DuplicateParam {
        /// Pattern whose registration was rejected
        pattern: String,
        /// Parameter name already in place
        existing: String,
        /// Parameter name that was attempted
        attempted: String,
    },
    /// Segments follow a `*` wildcard
    WildcardNotLast {
        /// The offending pattern
        pattern: String,
    },
    /// The method has no trie (only GET, POST, PUT, DELETE, PATCH, HEAD and OPTIONS do)
    UnsupportedMethod {
        /// The method as given
        method: String,
    },
}

impl RouteError {
    pub(crate) fn syntax(pattern: &str, reason: impl Into<String>) -> Self {
        RouteError::PatternSyntax {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }

    /// Tag a conflict raised by a method-agnostic trie with the method it was
    /// registered under.
    pub(crate) fn with_method(self, method: &http::Method) -> Self {
        match self {
            RouteError::RouteConflict {
                existing,
                attempted,
                ..
            } => RouteError::RouteConflict {
                method: method.to_string(),
                existing,
                attempted,
            },
            other => other,
        }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::PatternSyntax { pattern, reason } => {
                write!(f, "invalid route pattern '{}': {}", pattern, reason)
            }
            RouteError::RouteConflict {
                method,
                existing,
                attempted,
            } => {
                if method.is_empty() {
                    write!(
                        f,
                        "route conflict: '{}' resolves to the same route as '{}'",
                        attempted, existing
                    )
                } else {
                    write!(
                        f,
                        "route conflict: {} '{}' resolves to the same route as {} '{}'",
                        method, attempted, method, existing
                    )
                }
            }
            RouteError::DuplicateParam {
                pattern,
                existing,
                attempted,
            } => {
                write!(
                    f,
                    "duplicate parameter in '{}': ':{}' clashes with ':{}' at the same position",
                    pattern, attempted, existing
                )
            }
            RouteError::WildcardNotLast { pattern } => {
                write!(
                    f,
                    "invalid route pattern '{}': '*' must be the last segment",
                    pattern
                )
            }
            RouteError::UnsupportedMethod { method } => {
                write!(
                    f,
                    "unsupported method '{}': expected one of GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS",
                    method
                )
            }
        }
    }
}

impl std::error::Error for RouteError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_both_patterns() {
        let err = RouteError::RouteConflict {
            method: String::new(),
            existing: "/users/:id".to_string(),
            attempted: "/users/:id/".to_string(),
        }
        .with_method(&http::Method::GET);
        let msg = err.to_string();
        assert!(msg.contains("GET '/users/:id/'"));
        assert!(msg.contains("GET '/users/:id'"));
    }
}
