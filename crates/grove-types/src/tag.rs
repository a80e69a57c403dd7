//! Branch-head names.
//!
//! A tag is the one mutable handle grove exposes. Its name travels on
//! the wire, shows up in log lines, and a persistent backend may lay it
//! out as a filesystem path, so the accepted grammar is deliberately
//! narrow: one or more non-empty `/`-separated segments. Within a
//! segment, control characters and whitespace are refused (NUL
//! included), as are the characters git reserves for revision syntax,
//! the `..` and `@{` sequences, a leading or trailing `.`, and the
//! `.lock` suffix. Leading, trailing, and doubled slashes all reduce to
//! an empty segment and are refused on those grounds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A validated name for a mutable branch head.
///
/// Construction via [`TagName::new`] enforces the grammar described at
/// the module level; a `TagName` in hand is always well-formed, so the
/// codec and the stores never re-check. Names order lexicographically,
/// and the `/`-separated hierarchy doubles as the path namespace for
/// database watches.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    /// Validate and wrap a candidate name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self(name))
    }

    /// The raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this name extends `prefix` in the `/`-separated
    /// hierarchy (or equals it). An empty prefix matches every tag.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Debug for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagName({:?})", self.0)
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TagName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, TypeError> {
        Self::new(s)
    }
}

impl From<TagName> for String {
    fn from(t: TagName) -> String {
        t.0
    }
}

fn check_name(name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(refuse(name, "empty name"));
    }
    for segment in name.split('/') {
        check_segment(name, segment)?;
    }
    Ok(())
}

/// Validate one `/`-separated segment in a single character pass.
fn check_segment(name: &str, segment: &str) -> Result<(), TypeError> {
    if segment.is_empty() {
        return Err(refuse(name, "empty path segment"));
    }
    if segment.ends_with(".lock") {
        return Err(refuse(name, "segment carries the reserved '.lock' suffix"));
    }
    if segment.starts_with('.') || segment.ends_with('.') {
        return Err(refuse(name, "segment begins or ends with '.'"));
    }

    let mut prev = None;
    for ch in segment.chars() {
        let fault = match ch {
            c if c.is_control() => Some("control character"),
            c if c.is_whitespace() => Some("whitespace"),
            '~' | '^' | ':' | '?' | '*' | '[' | '\\' => Some("revision-syntax character"),
            _ => None,
        };
        if let Some(fault) = fault {
            return Err(refuse(name, format!("{fault} in segment {segment:?}")));
        }
        match (prev, ch) {
            (Some('.'), '.') => return Err(refuse(name, "'..' sequence")),
            (Some('@'), '{') => return Err(refuse(name, "'@{' sequence")),
            _ => {}
        }
        prev = Some(ch);
    }
    Ok(())
}

fn refuse(name: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidTagName {
        name: name.to_string(),
        reason: reason.into(),
    }
}
