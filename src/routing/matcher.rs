//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile glob patterns with a trailing `**` wildcard
//! - Match exact patterns against identical paths only
//! - Combine a route's patterns with OR semantics
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `**` is only allowed as a suffix, so matching stays a prefix compare
//! - No regex in the hot path

use std::fmt;

/// Trait for matching request paths.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches only the identical path.
    Exact(String),
    /// `/prefix/**`: the prefix itself or anything below it.
    Subtree(String),
    /// `/prefix**`: any path starting with the literal prefix.
    Prefix(String),
}

impl PathPattern {
    /// Compile a configured pattern.
    pub fn parse(pattern: &str) -> Self {
        if let Some(base) = pattern.strip_suffix("/**") {
            PathPattern::Subtree(base.to_string())
        } else if let Some(prefix) = pattern.strip_suffix("**") {
            PathPattern::Prefix(prefix.to_string())
        } else {
            PathPattern::Exact(pattern.to_string())
        }
    }
}

impl Matcher for PathPattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => path == p,
            PathPattern::Subtree(base) => match path.strip_prefix(base.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Exact(p) => write!(f, "{}", p),
            PathPattern::Subtree(base) => write!(f, "{}/**", base),
            PathPattern::Prefix(prefix) => write!(f, "{}**", prefix),
        }
    }
}

/// Combines several patterns; any one matching is enough.
#[derive(Debug, Clone)]
pub struct AnyMatcher {
    patterns: Vec<PathPattern>,
}

impl AnyMatcher {
    pub fn new(patterns: Vec<PathPattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, path: &str) -> bool {
        // Declaration order, first hit wins
        self.patterns.iter().any(|p| p.matches(path))
    }
}
