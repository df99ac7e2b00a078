//! Difference trees
//!
//! A [`ValueDiff`] exists only where two values differ: internal nodes are
//! differing members, indices or keys, leaves carry the two differing values.

use stategraph_model::{Key, MemberPath, PathSegment, Value};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Difference between two values
///
/// `None` on a side means the element is missing, e.g. past the end of the
/// shorter sequence or a key present on one side only.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDiff {
    x: Option<Value>,
    y: Option<Value>,
    diffs: Vec<SubDiff>,
}

/// Nested difference at a member, index or key
#[derive(Debug, Clone, PartialEq)]
pub enum SubDiff {
    /// Record member
    Member {
        /// Member name
        name: Arc<str>,
        /// Difference of the member values
        diff: ValueDiff,
    },

    /// Array or list index
    Index {
        /// Position
        index: usize,
        /// Difference of the items
        diff: ValueDiff,
    },

    /// Map key
    Key {
        /// Key
        key: Key,
        /// Difference of the entry values
        diff: ValueDiff,
    },
}

impl SubDiff {
    /// Path segment this difference sits at
    #[must_use]
    pub fn segment(&self) -> PathSegment {
        match self {
            Self::Member { name, .. } => PathSegment::Member(name.clone()),
            Self::Index { index, .. } => PathSegment::Index(*index),
            Self::Key { key, .. } => PathSegment::Key(key.clone()),
        }
    }

    /// Nested difference
    #[inline]
    #[must_use]
    pub fn diff(&self) -> &ValueDiff {
        match self {
            Self::Member { diff, .. } | Self::Index { diff, .. } | Self::Key { diff, .. } => diff,
        }
    }

    fn matches(&self, segment: &PathSegment) -> bool {
        match (self, segment) {
            (Self::Member { name, .. }, PathSegment::Member(other)) => name == other,
            (Self::Index { index, .. }, PathSegment::Index(other)) => index == other,
            (Self::Key { key, .. }, PathSegment::Key(other)) => key == other,
            _ => false,
        }
    }
}

impl ValueDiff {
    /// Leaf difference between two values
    #[inline]
    #[must_use]
    pub fn leaf(x: Option<Value>, y: Option<Value>) -> Self {
        Self {
            x,
            y,
            diffs: Vec::new(),
        }
    }

    /// Node with nested differences
    #[inline]
    #[must_use]
    pub fn node(x: Value, y: Value, diffs: Vec<SubDiff>) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            diffs,
        }
    }

    /// Left value
    #[inline]
    #[must_use]
    pub fn x(&self) -> Option<&Value> {
        self.x.as_ref()
    }

    /// Right value
    #[inline]
    #[must_use]
    pub fn y(&self) -> Option<&Value> {
        self.y.as_ref()
    }

    /// Nested differences
    #[inline]
    #[must_use]
    pub fn diffs(&self) -> &[SubDiff] {
        &self.diffs
    }

    /// Check if this difference has no nested differences
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Nested difference at a path
    #[must_use]
    pub fn find(&self, path: &MemberPath) -> Option<&ValueDiff> {
        path.segments().iter().try_fold(self, |diff, segment| {
            diff.diffs
                .iter()
                .find(|d| d.matches(segment))
                .map(SubDiff::diff)
        })
    }

    /// All leaves with their paths, depth first
    #[must_use]
    pub fn flatten(&self) -> Vec<(MemberPath, &ValueDiff)> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut MemberPath::root(), &mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, path: &mut MemberPath, leaves: &mut Vec<(MemberPath, &'a ValueDiff)>) {
        if self.is_leaf() {
            leaves.push((path.clone(), self));
            return;
        }
        for sub in &self.diffs {
            path.push(sub.segment());
            sub.diff().collect_leaves(path, leaves);
            path.pop();
        }
    }

    fn write_tree(&self, f: &mut Formatter<'_>, label: &str, depth: usize) -> fmt::Result {
        let side = |v: &Option<Value>| v.as_ref().map_or_else(|| "missing".to_string(), Value::to_string);
        writeln!(
            f,
            "{:indent$}{label} x: {} y: {}",
            "",
            side(&self.x),
            side(&self.y),
            indent = depth * 2
        )?;
        for sub in &self.diffs {
            sub.diff().write_tree(f, &sub.segment().to_string(), depth + 1)?;
        }
        Ok(())
    }
}

impl Display for ValueDiff {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_tree(f, "(root)", 0)
    }
}
