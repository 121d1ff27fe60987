//! Shared types for sluice
//!
//! This crate provides the identity types used across the sluice crates:
//! scope tokens naming isolation boundaries, scope paths locating a
//! boundary inside the component tree, and channel names.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Opaque name of one isolation boundary
///
/// Tokens are either drawn from a scope generator (and then unique) or
/// supplied by the caller, in which case two components may deliberately
/// share a boundary by using the same token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeToken(pub String);

impl ScopeToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ScopeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScopeToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for ScopeToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Position of an isolation boundary in the component tree
///
/// A path is the ordered list of scope segments from the root boundary
/// down to a nested one. Narrowing a source appends segments; tagging a
/// sink value prepends them as the value travels up to its parents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopePath(Vec<String>);

impl ScopePath {
    /// The unscoped root of a channel's data space
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from explicit segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Split a scope token into path segments
    ///
    /// Empty segments are dropped, so `"y..x"` and `"y.x"` parse to the
    /// same path and an empty token parses to the root.
    pub fn parse(token: &ScopeToken, separator: char) -> Self {
        Self(
            token
                .as_str()
                .split(separator)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Append `other` below this path
    pub fn join(&self, other: &ScopePath) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    pub fn starts_with(&self, prefix: &ScopePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.0 {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// Name of a source/sink channel such as `DOM` or `HTTP`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelName(pub String);

impl ChannelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ChannelName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ChannelName {
    fn from(name: String) -> Self {
        Self(name)
    }
}
