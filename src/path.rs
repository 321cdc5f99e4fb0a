//! Locations of values inside nested input.
//!
//! A [`Location`] is an ordered list of [`LocItem`] segments: string keys for
//! model fields and mapping entries, integers for sequence indexes. Every
//! [`ErrorRecord`](crate::ErrorRecord) carries one.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// One segment of a [`Location`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocItem {
    /// A field name, mapping key, or union member label.
    Key(String),
    /// A sequence index.
    Index(i64),
}

impl LocItem {
    /// Returns the key if this is a key segment.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            LocItem::Key(k) => Some(k),
            LocItem::Index(_) => None,
        }
    }
}

impl From<&str> for LocItem {
    fn from(key: &str) -> Self {
        LocItem::Key(key.to_string())
    }
}

impl From<String> for LocItem {
    fn from(key: String) -> Self {
        LocItem::Key(key)
    }
}

impl From<i64> for LocItem {
    fn from(index: i64) -> Self {
        LocItem::Index(index)
    }
}

impl From<usize> for LocItem {
    fn from(index: usize) -> Self {
        LocItem::Index(index as i64)
    }
}

impl From<i32> for LocItem {
    fn from(index: i32) -> Self {
        LocItem::Index(index as i64)
    }
}

impl Display for LocItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocItem::Key(k) => write!(f, "{}", k),
            LocItem::Index(i) => write!(f, "{}", i),
        }
    }
}

/// A path to a value in nested input.
///
/// Paths are immutable: `push` and `join` return new paths so sibling
/// branches can share a common prefix.
///
/// # Example
///
/// ```rust
/// use schemata::Location;
///
/// let loc = Location::root().push("users").push(0).push("email");
/// assert_eq!(loc.to_string(), "users.0.email");
/// assert_eq!(loc.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location {
    items: Vec<LocItem>,
}

impl Location {
    /// Creates an empty path representing the validated value itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a path from any sequence of segments.
    pub fn from_items<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<LocItem>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a new path with one segment appended.
    pub fn push(&self, item: impl Into<LocItem>) -> Self {
        let mut items = self.items.clone();
        items.push(item.into());
        Self { items }
    }

    /// Returns a new path with every segment of `tail` appended.
    pub fn join(&self, tail: &[LocItem]) -> Self {
        let mut items = self.items.clone();
        items.extend_from_slice(tail);
        Self { items }
    }

    /// Returns true if this is the root path.
    pub fn is_root(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if this path has no segments.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the segments as a slice.
    pub fn items(&self) -> &[LocItem] {
        &self.items
    }

    /// Returns the last segment, or None at the root.
    pub fn last(&self) -> Option<&LocItem> {
        self.items.last()
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_empty() {
        let loc = Location::root();
        assert!(loc.is_root());
        assert_eq!(loc.len(), 0);
        assert_eq!(loc.to_string(), "");
    }

    #[test]
    fn test_mixed_segments() {
        let loc = Location::root().push("items").push(2usize).push("name");
        assert_eq!(loc.to_string(), "items.2.name");
        assert_eq!(
            loc.items(),
            &[
                LocItem::Key("items".into()),
                LocItem::Index(2),
                LocItem::Key("name".into())
            ]
        );
    }

    #[test]
    fn test_push_does_not_mutate() {
        let base = Location::root().push("users");
        let a = base.push(0);
        let b = base.push(1);
        assert_eq!(base.len(), 1);
        assert_eq!(a.last(), Some(&LocItem::Index(0)));
        assert_eq!(b.last(), Some(&LocItem::Index(1)));
    }

    #[test]
    fn test_join() {
        let loc = Location::root()
            .push("a")
            .join(&[LocItem::Index(0), LocItem::Key("b".into())]);
        assert_eq!(loc.to_string(), "a.0.b");
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let loc = Location::from_items([LocItem::from("pets"), LocItem::from(3)]);
        assert_eq!(
            serde_json::to_value(&loc).unwrap(),
            serde_json::json!(["pets", 3])
        );
    }
}
