//! Reference-pair bookkeeping for cycle-safe traversals

use stategraph_model::{ObjectId, ObjectRef};
use std::collections::HashSet;

/// Pairs currently being walked, scoped to one traversal
///
/// Membership is by identity. Pairs are entered before recursing into a
/// complex value or collection and left afterwards; meeting an entered pair
/// again means the graph loops back on itself.
#[derive(Debug, Default)]
pub struct ReferencePairs {
    active: HashSet<(ObjectId, ObjectId)>,
}

impl ReferencePairs {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a pair; returns `false` if it is already being walked
    pub fn enter(&mut self, x: &ObjectRef, y: &ObjectRef) -> bool {
        self.active.insert((x.id(), y.id()))
    }

    /// Leave a pair
    pub fn leave(&mut self, x: &ObjectRef, y: &ObjectRef) {
        self.active.remove(&(x.id(), y.id()));
    }

    /// Check if a pair is being walked
    #[inline]
    #[must_use]
    pub fn contains(&self, x: &ObjectRef, y: &ObjectRef) -> bool {
        self.active.contains(&(x.id(), y.id()))
    }

    /// Number of pairs being walked
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Check if no pair is being walked
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stategraph_model::TypeRef;

    #[test]
    fn stack_discipline() {
        let a = ObjectRef::list(TypeRef::INT, vec![]);
        let b = ObjectRef::list(TypeRef::INT, vec![]);
        let mut pairs = ReferencePairs::new();

        assert!(pairs.enter(&a, &b));
        assert!(!pairs.enter(&a, &b));
        assert!(pairs.enter(&b, &a));
        assert!(pairs.contains(&a, &b));

        pairs.leave(&a, &b);
        pairs.leave(&b, &a);
        assert!(pairs.is_empty());
    }
}
