//! Member paths for addressing values within object graphs
//!
//! Provides [`MemberPath`], used to report where in a graph a difference or an
//! error was found.

use crate::value::Key;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// One step from a value to a nested value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Record member
    Member(Arc<str>),

    /// Array, list or set position
    Index(usize),

    /// Map key
    Key(Key),

    /// Any item of a collection
    Item,
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Key(key) => write!(f, "[{key}]"),
            Self::Item => f.write_str("[*]"),
        }
    }
}

/// Path from a root value
///
/// # Examples
/// - `next.next.value`
/// - `items[2].name`
/// - `lookup["a"]`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MemberPath(Vec<PathSegment>);

impl MemberPath {
    /// Empty path (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path segments from root to leaf
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is the root
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a segment, returning new path
    #[must_use]
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut new = self.clone();
        new.0.push(segment);
        new
    }

    /// Append a member segment
    #[inline]
    #[must_use]
    pub fn member(&self, name: impl Into<Arc<str>>) -> Self {
        self.child(PathSegment::Member(name.into()))
    }

    /// Append an index segment
    #[inline]
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.child(PathSegment::Index(index))
    }

    /// Append a key segment
    #[inline]
    #[must_use]
    pub fn key(&self, key: Key) -> Self {
        self.child(PathSegment::Key(key))
    }

    /// Push a segment in place
    #[inline]
    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    /// Pop the last segment in place
    #[inline]
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// Parent path (if not root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    /// Last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Check if this path is a prefix of another
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl Display for MemberPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(root)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 && matches!(segment, PathSegment::Member(_)) {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<Vec<PathSegment>> for MemberPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mixes_members_and_indices() {
        let path = MemberPath::root().member("items").index(2).member("name");
        assert_eq!(path.to_string(), "items[2].name");
        assert_eq!(MemberPath::root().to_string(), "(root)");
        assert_eq!(MemberPath::root().member("lookup").key(Key::from("a")).to_string(), "lookup[\"a\"]");
    }

    #[test]
    fn parent_and_prefix() {
        let path = MemberPath::root().member("a").member("b");
        let parent = path.parent().unwrap();
        assert_eq!(parent.to_string(), "a");
        assert!(parent.is_prefix_of(&path));
        assert!(!path.is_prefix_of(&parent));
        assert!(MemberPath::root().parent().is_none());
    }

    #[test]
    fn push_pop() {
        let mut path = MemberPath::root();
        path.push(PathSegment::Index(1));
        assert_eq!(path.len(), 1);
        assert_eq!(path.pop(), Some(PathSegment::Index(1)));
        assert!(path.is_empty());
    }
}
