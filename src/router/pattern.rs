//! Route pattern parsing.
//!
//! A pattern is a leading `/` followed by `/`-separated segments:
//!
//! | Syntax          | Segment                                  |
//! |-----------------|------------------------------------------|
//! | `users`         | static, matched octet by octet           |
//! | `:id`           | named parameter, any non-empty segment   |
//! | `:id(\d+)`      | named parameter constrained by a regex   |
//! | `*`             | wildcard, last position only             |
//!
//! A trailing slash is ignored, so `/users/` and `/users` are the same route.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

use crate::error::RouteError;

static PARAM_NAME: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("parameter name regex is valid")
});

/// One typed unit of a [`Pattern`]
#[derive(Clone)]
pub enum Segment {
    /// Literal text
    Static(String),
    /// `:name`
    Param(Arc<str>),
    /// `:name(expr)`, with `expr` anchored to the whole segment
    Regex {
        name: Arc<str>,
        /// The expression as written between the parentheses
        source: Arc<str>,
        regex: Regex,
    },
    /// `*`
    Wildcard,
}

impl Segment {
    /// Parameter name bound by this segment, if any
    #[must_use]
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Param(name) | Segment::Regex { name, .. } => Some(name),
            Segment::Static(_) | Segment::Wildcard => None,
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Static(s) => write!(f, "Static({s:?})"),
            Segment::Param(name) => write!(f, "Param({name})"),
            Segment::Regex { name, source, .. } => write!(f, "Regex({name}, {source:?})"),
            Segment::Wildcard => write!(f, "Wildcard"),
        }
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Segment::Static(a), Segment::Static(b)) => a == b,
            (Segment::Param(a), Segment::Param(b)) => a == b,
            (
                Segment::Regex {
                    name: a, source: sa, ..
                },
                Segment::Regex {
                    name: b, source: sb, ..
                },
            ) => a == b && sa == sb,
            (Segment::Wildcard, Segment::Wildcard) => true,
            _ => false,
        }
    }
}

/// A parsed route pattern
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    raw: Arc<str>,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse and validate a pattern.
    ///
    /// # Errors
    ///
    /// * [`RouteError::PatternSyntax`] for a missing leading slash, empty segments,
    ///   bad parameter names, unbalanced parentheses or an invalid regex
    /// * [`RouteError::WildcardNotLast`] when anything follows `*`
    /// * [`RouteError::DuplicateParam`] when the same name is bound twice
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        if !raw.starts_with('/') {
            return Err(RouteError::syntax(raw, "pattern must start with '/'"));
        }
        let body = &raw[1..];
        if body.starts_with('/') {
            return Err(RouteError::syntax(raw, "empty segment"));
        }
        let body = body.strip_suffix('/').unwrap_or(body);

        let mut segments = Vec::new();
        if !body.is_empty() {
            let pieces = split_segments(raw, body)?;
            let last = pieces.len() - 1;
            for (idx, piece) in pieces.into_iter().enumerate() {
                let segment = parse_segment(raw, piece)?;
                if matches!(segment, Segment::Wildcard) && idx != last {
                    return Err(RouteError::WildcardNotLast {
                        pattern: raw.to_string(),
                    });
                }
                segments.push(segment);
            }
        }

        let mut seen: Vec<&str> = Vec::new();
        for name in segments.iter().filter_map(Segment::param_name) {
            if seen.contains(&name) {
                return Err(RouteError::DuplicateParam {
                    pattern: raw.to_string(),
                    existing: name.to_string(),
                    attempted: name.to_string(),
                });
            }
            seen.push(name);
        }

        Ok(Self {
            raw: Arc::from(raw),
            segments,
        })
    }

    /// The pattern as it was registered
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn raw(&self) -> &Arc<str> {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of all parameters in declaration order, `*` included
    #[must_use]
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Wildcard => Some(super::params::WILDCARD_KEY),
                other => other.param_name(),
            })
            .collect()
    }

    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split on `/` outside of parentheses so a regex may contain slashes.
fn split_segments<'a>(raw: &str, body: &'a str) -> Result<Vec<&'a str>, RouteError> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (idx, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| RouteError::syntax(raw, "unbalanced ')'"))?;
            }
            '/' if depth == 0 => {
                pieces.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(RouteError::syntax(raw, "unbalanced '('"));
    }
    pieces.push(&body[start..]);
    Ok(pieces)
}

fn parse_segment(raw: &str, piece: &str) -> Result<Segment, RouteError> {
    if piece.is_empty() {
        return Err(RouteError::syntax(raw, "empty segment"));
    }
    if piece == "*" {
        return Ok(Segment::Wildcard);
    }
    if let Some(rest) = piece.strip_prefix(':') {
        let (name, expr) = match rest.find('(') {
            Some(open) => {
                let expr = rest[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| RouteError::syntax(raw, format!("'{piece}' must end with ')'")))?;
                (&rest[..open], Some(expr))
            }
            None => (rest, None),
        };
        if !PARAM_NAME.is_match(name) {
            return Err(RouteError::syntax(
                raw,
                format!("invalid parameter name '{name}'"),
            ));
        }
        let name: Arc<str> = Arc::from(name);
        return match expr {
            None => Ok(Segment::Param(name)),
            Some("") => Err(RouteError::syntax(raw, "empty regex")),
            Some(expr) => {
                let regex = Regex::new(&format!("^(?:{expr})$"))
                    .map_err(|e| RouteError::syntax(raw, format!("invalid regex: {e}")))?;
                Ok(Segment::Regex {
                    name,
                    source: Arc::from(expr),
                    regex,
                })
            }
        };
    }
    if piece.contains(['*', ':', '(', ')']) {
        return Err(RouteError::syntax(
            raw,
            format!("unexpected segment '{piece}'"),
        ));
    }
    Ok(Segment::Static(piece.to_string()))
}
