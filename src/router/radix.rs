//! Segment trie for route matching
//!
//! Each node of the trie represents one path segment. A node can have:
//! - static children keyed by their literal text,
//! - regex children kept in insertion order,
//! - at most one parameter child,
//! - at most one wildcard child (always a terminal),
//! - a terminal payload together with the pattern that owns it.
//!
//! ## Matching
//!
//! Lookup walks the request segments depth first and at every node tries, in
//! this order: the static child, the regex children (first full match wins),
//! the parameter child (any non-empty segment), then the wildcard. A branch
//! that runs out of path on a non-terminal node fails and the walk backtracks
//! to the next alternative, discarding the parameters that branch captured.
//!
//! Because the preference is applied per segment, a more specific segment
//! early in the path commits before a less specific sibling is looked at:
//!
//! ```rust
//! use trellis::router::{split_path, Pattern, RouteTrie};
//!
//! let mut trie = RouteTrie::new();
//! trie.insert(&Pattern::parse("/users/:id").unwrap(), "by_id").unwrap();
//! trie.insert(&Pattern::parse("/users/me").unwrap(), "me").unwrap();
//!
//! let hit = trie.lookup(&split_path("/users/me")).unwrap();
//! assert_eq!(*hit.value, "me");
//!
//! let hit = trie.lookup(&split_path("/users/42")).unwrap();
//! assert_eq!(*hit.value, "by_id");
//! assert_eq!(hit.params.get("id"), Some("42"));
//! ```
//!
//! The trie is generic over its payload so the same engine serves route
//! handlers and pattern-scoped middleware filters.

use smallvec::SmallVec;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use super::params::{ParamBag, WILDCARD_KEY};
use super::pattern::{Pattern, Segment};
use crate::error::RouteError;

/// Split request paths up to this many segments without touching the heap
pub const MAX_INLINE_SEGMENTS: usize = 16;

/// Percent-decoded request path segments
pub type PathSegments<'p> = SmallVec<[Cow<'p, str>; MAX_INLINE_SEGMENTS]>;

/// Split a request path into percent-decoded segments.
///
/// A single trailing slash is ignored, `/` yields no segments, and a segment
/// that does not decode to UTF-8 is kept as written.
#[must_use]
pub fn split_path(path: &str) -> PathSegments<'_> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return PathSegments::new();
    }
    trimmed
        .split('/')
        .map(|s| urlencoding::decode(s).unwrap_or(Cow::Borrowed(s)))
        .collect()
}

/// Payload stored on a terminal node
#[derive(Debug, Clone)]
struct Terminal<T> {
    pattern: Arc<str>,
    value: T,
}

#[derive(Debug, Clone)]
struct ParamChild<T> {
    name: Arc<str>,
    node: Box<TrieNode<T>>,
}

#[derive(Debug, Clone)]
struct RegexChild<T> {
    name: Arc<str>,
    source: Arc<str>,
    regex: regex::Regex,
    node: TrieNode<T>,
}

#[derive(Debug, Clone)]
struct TrieNode<T> {
    statics: HashMap<String, TrieNode<T>>,
    regexes: Vec<RegexChild<T>>,
    param: Option<ParamChild<T>>,
    wildcard: Option<Box<TrieNode<T>>>,
    terminal: Option<Terminal<T>>,
}

impl<T> Default for TrieNode<T> {
    fn default() -> Self {
        Self {
            statics: HashMap::new(),
            regexes: Vec::new(),
            param: None,
            wildcard: None,
            terminal: None,
        }
    }
}

impl<T> TrieNode<T> {
    /// Find or create the child for `segment`.
    ///
    /// Conflicts can only be raised on nodes that already existed, so a
    /// failed insert never leaves freshly created nodes behind.
    fn child_for(
        &mut self,
        pattern: &Pattern,
        segment: &Segment,
    ) -> Result<&mut TrieNode<T>, RouteError> {
        match segment {
            Segment::Static(text) => Ok(self.statics.entry(text.clone()).or_default()),
            Segment::Param(name) => {
                if let Some(existing) = &self.param {
                    if existing.name != *name {
                        return Err(RouteError::DuplicateParam {
                            pattern: pattern.as_str().to_string(),
                            existing: existing.name.to_string(),
                            attempted: name.to_string(),
                        });
                    }
                }
                let child = self.param.get_or_insert_with(|| ParamChild {
                    name: Arc::clone(name),
                    node: Box::default(),
                });
                Ok(&mut *child.node)
            }
            Segment::Regex {
                name,
                source,
                regex,
            } => {
                let idx = match self.regexes.iter().position(|c| c.source == *source) {
                    Some(idx) => {
                        let existing = &self.regexes[idx];
                        if existing.name != *name {
                            return Err(RouteError::DuplicateParam {
                                pattern: pattern.as_str().to_string(),
                                existing: existing.name.to_string(),
                                attempted: name.to_string(),
                            });
                        }
                        idx
                    }
                    None => {
                        self.regexes.push(RegexChild {
                            name: Arc::clone(name),
                            source: Arc::clone(source),
                            regex: regex.clone(),
                            node: TrieNode::default(),
                        });
                        self.regexes.len() - 1
                    }
                };
                Ok(&mut self.regexes[idx].node)
            }
            Segment::Wildcard => Ok(&mut **self.wildcard.get_or_insert_with(Box::default)),
        }
    }

    /// Structural walk used to find an existing terminal by pattern
    fn find(&self, segment: &Segment) -> Option<&TrieNode<T>> {
        match segment {
            Segment::Static(text) => self.statics.get(text),
            Segment::Param(name) => self
                .param
                .as_ref()
                .filter(|p| p.name == *name)
                .map(|p| p.node.as_ref()),
            Segment::Regex { name, source, .. } => self
                .regexes
                .iter()
                .find(|c| c.source == *source && c.name == *name)
                .map(|c| &c.node),
            Segment::Wildcard => self.wildcard.as_deref(),
        }
    }

    fn find_mut(&mut self, segment: &Segment) -> Option<&mut TrieNode<T>> {
        match segment {
            Segment::Static(text) => self.statics.get_mut(text),
            Segment::Param(name) => self
                .param
                .as_mut()
                .filter(|p| p.name == *name)
                .map(|p| p.node.as_mut()),
            Segment::Regex { name, source, .. } => self
                .regexes
                .iter_mut()
                .find(|c| c.source == *source && c.name == *name)
                .map(|c| &mut c.node),
            Segment::Wildcard => self.wildcard.as_deref_mut(),
        }
    }

    fn search<'a>(&'a self, segments: &[Cow<'_, str>], params: &mut ParamBag) -> Option<&'a Terminal<T>> {
        let Some((first, rest)) = segments.split_first() else {
            if let Some(terminal) = &self.terminal {
                return Some(terminal);
            }
            // A wildcard also matches when nothing is left to consume
            let terminal = self.wildcard.as_ref()?.terminal.as_ref()?;
            params.push(Arc::from(WILDCARD_KEY), String::new());
            return Some(terminal);
        };

        if let Some(child) = self.statics.get::<str>(first) {
            if let Some(terminal) = child.search(rest, params) {
                return Some(terminal);
            }
        }

        for child in &self.regexes {
            if child.regex.is_match(first) {
                let mark = params.len();
                params.push(Arc::clone(&child.name), first.to_string());
                if let Some(terminal) = child.node.search(rest, params) {
                    return Some(terminal);
                }
                params.truncate(mark);
            }
        }

        if !first.is_empty() {
            if let Some(child) = &self.param {
                let mark = params.len();
                params.push(Arc::clone(&child.name), first.to_string());
                if let Some(terminal) = child.node.search(rest, params) {
                    return Some(terminal);
                }
                params.truncate(mark);
            }
        }

        let terminal = self.wildcard.as_ref()?.terminal.as_ref()?;
        params.push(Arc::from(WILDCARD_KEY), segments.join("/"));
        Some(terminal)
    }

    fn collect<'a>(&'a self, out: &mut Vec<(&'a Arc<str>, &'a T)>) {
        if let Some(t) = &self.terminal {
            out.push((&t.pattern, &t.value));
        }
        let mut keys: Vec<&String> = self.statics.keys().collect();
        keys.sort();
        for key in keys {
            if let Some(child) = self.statics.get(key) {
                child.collect(out);
            }
        }
        for child in &self.regexes {
            child.node.collect(out);
        }
        if let Some(child) = &self.param {
            child.node.collect(out);
        }
        if let Some(child) = &self.wildcard {
            child.collect(out);
        }
    }
}

/// A successful trie lookup
#[derive(Debug)]
pub struct TrieMatch<'a, T> {
    /// Pattern that owns the terminal, as registered
    pub pattern: &'a Arc<str>,
    /// Terminal payload
    pub value: &'a T,
    /// Parameters captured on the way down
    pub params: ParamBag,
}

/// Segment trie holding one payload per distinct pattern
#[derive(Debug, Clone)]
pub struct RouteTrie<T> {
    root: TrieNode<T>,
    len: usize,
}

impl<T> Default for RouteTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RouteTrie<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: TrieNode::default(),
            len: 0,
        }
    }

    /// Insert a pattern, returning the stored payload.
    ///
    /// # Errors
    ///
    /// * [`RouteError::RouteConflict`] when an existing pattern already ends on
    ///   the same node (`/a/:x` and `/a/:x/` for instance); the existing entry
    ///   is left untouched. The `method` field is left empty for the caller
    ///   to fill in.
    /// * [`RouteError::DuplicateParam`] when a node already has a parameter
    ///   child of another name at the same position.
    pub fn insert(&mut self, pattern: &Pattern, value: T) -> Result<&mut T, RouteError> {
        let mut node = &mut self.root;
        for segment in pattern.segments() {
            node = node.child_for(pattern, segment)?;
        }
        if let Some(existing) = &node.terminal {
            return Err(RouteError::RouteConflict {
                method: String::new(),
                existing: existing.pattern.to_string(),
                attempted: pattern.as_str().to_string(),
            });
        }
        self.len += 1;
        let terminal = node.terminal.insert(Terminal {
            pattern: Arc::clone(pattern.raw()),
            value,
        });
        Ok(&mut terminal.value)
    }

    /// Match already split request segments against the trie
    #[must_use]
    pub fn lookup<'a>(&'a self, segments: &[Cow<'_, str>]) -> Option<TrieMatch<'a, T>> {
        let mut params = ParamBag::new();
        let terminal = self.root.search(segments, &mut params)?;
        Some(TrieMatch {
            pattern: &terminal.pattern,
            value: &terminal.value,
            params,
        })
    }

    /// Whether any pattern matches the segments
    #[must_use]
    pub fn matches(&self, segments: &[Cow<'_, str>]) -> bool {
        let mut params = ParamBag::new();
        self.root.search(segments, &mut params).is_some()
    }

    /// Payload registered for exactly this pattern (structural, not a match)
    #[must_use]
    pub fn get(&self, pattern: &Pattern) -> Option<&T> {
        let mut node = &self.root;
        for segment in pattern.segments() {
            node = node.find(segment)?;
        }
        node.terminal.as_ref().map(|t| &t.value)
    }

    pub fn get_mut(&mut self, pattern: &Pattern) -> Option<&mut T> {
        let mut node = &mut self.root;
        for segment in pattern.segments() {
            node = node.find_mut(segment)?;
        }
        node.terminal.as_mut().map(|t| &mut t.value)
    }

    /// All terminals in precedence order (static keys sorted)
    #[must_use]
    pub fn entries(&self) -> Vec<(&Arc<str>, &T)> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut out);
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(patterns: &[&'static str]) -> RouteTrie<&'static str> {
        let mut trie = RouteTrie::new();
        for p in patterns {
            trie.insert(&Pattern::parse(p).unwrap(), *p).unwrap();
        }
        trie
    }

    fn hit(trie: &RouteTrie<&'static str>, path: &str) -> Option<(&'static str, ParamBag)> {
        trie.lookup(&split_path(path)).map(|m| (*m.value, m.params))
    }

    #[test]
    fn test_split_path() {
        assert!(split_path("/").is_empty());
        assert_eq!(split_path("/a/b/").as_slice(), ["a", "b"]);
        assert_eq!(split_path("/a%20b/c%2Fd").as_slice(), ["a b", "c/d"]);
        assert_eq!(split_path("/a//b").as_slice(), ["a", "", "b"]);
    }

    #[test]
    fn test_static_beats_regex_beats_param_beats_wildcard() {
        let t = trie(&["/n/*", "/n/:any", r"/n/:num(\d+)", "/n/7"]);
        assert_eq!(hit(&t, "/n/7").unwrap().0, "/n/7");
        assert_eq!(hit(&t, "/n/8").unwrap().0, r"/n/:num(\d+)");
        assert_eq!(hit(&t, "/n/x").unwrap().0, "/n/:any");
        assert_eq!(hit(&t, "/n/x/y").unwrap().0, "/n/*");
    }

    #[test]
    fn test_regex_children_keep_declaration_order() {
        let t = trie(&[r"/r/:digits(\d+)", r"/r/:word(\w+)"]);
        let (pattern, params) = hit(&t, "/r/123").unwrap();
        assert_eq!(pattern, r"/r/:digits(\d+)");
        assert_eq!(params.get("digits"), Some("123"));
        assert_eq!(hit(&t, "/r/abc").unwrap().0, r"/r/:word(\w+)");
    }

    #[test]
    fn test_backtracking_discards_failed_captures() {
        let t = trie(&["/a/:x/c", "/a/b/d"]);
        // static `b` is tried first, fails on `c`, then the param branch wins
        let (pattern, params) = hit(&t, "/a/b/c").unwrap();
        assert_eq!(pattern, "/a/:x/c");
        assert_eq!(params.get("x"), Some("b"));

        let t = trie(&["/p/:x/q", "/p/*"]);
        let (pattern, params) = hit(&t, "/p/1/z").unwrap();
        assert_eq!(pattern, "/p/*");
        assert!(params.get("x").is_none());
        assert_eq!(params.wildcard(), Some("1/z"));
    }

    #[test]
    fn test_wildcard_consumes_empty_tail() {
        let t = trie(&["/files/*"]);
        assert_eq!(hit(&t, "/files/").unwrap().1.wildcard(), Some(""));
        assert_eq!(hit(&t, "/files").unwrap().1.wildcard(), Some(""));
        assert_eq!(hit(&t, "/files/a/b/c").unwrap().1.wildcard(), Some("a/b/c"));
    }

    #[test]
    fn test_exact_terminal_beats_empty_wildcard() {
        let t = trie(&["/files", "/files/*"]);
        assert_eq!(hit(&t, "/files").unwrap().0, "/files");
        assert_eq!(hit(&t, "/files/x").unwrap().0, "/files/*");
    }

    #[test]
    fn test_param_does_not_match_empty_segment() {
        let t = trie(&["/a/:x/b"]);
        assert!(hit(&t, "/a//b").is_none());
    }

    #[test]
    fn test_path_ending_on_inner_node_is_not_found() {
        let t = trie(&["/a/b/c"]);
        assert!(hit(&t, "/a/b").is_none());
        assert!(hit(&t, "/a/b/c/d").is_none());
    }

    #[test]
    fn test_conflicts() {
        let mut t = trie(&["/users/:id"]);
        let err = t
            .insert(&Pattern::parse("/users/:id/").unwrap(), "dup")
            .unwrap_err();
        assert!(matches!(err, RouteError::RouteConflict { .. }));

        let err = t
            .insert(&Pattern::parse("/users/:name/posts").unwrap(), "other")
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateParam { .. }));

        // first registration intact
        assert_eq!(hit(&t, "/users/9").unwrap().0, "/users/:id");
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_get_mut_finds_terminal_structurally() {
        let mut t = trie(&[r"/x/:id(\d+)", "/x/:id/y"]);
        let p = Pattern::parse(r"/x/:id(\d+)").unwrap();
        *t.get_mut(&p).unwrap() = "changed";
        assert_eq!(hit(&t, "/x/5").unwrap().0, "changed");
        assert!(t.get(&Pattern::parse("/x/:id").unwrap()).is_none());
    }

    #[test]
    fn test_entries_lists_every_terminal() {
        let t = trie(&["/b", "/a", "/a/:id", "/a/*"]);
        let patterns: Vec<&str> = t.entries().into_iter().map(|(p, _)| p.as_ref()).collect();
        assert_eq!(patterns, vec!["/a", "/a/:id", "/a/*", "/b"]);
    }
}
