//! State shared by the recursive traversals

use crate::error::OpsError;
use crate::pairs::ReferencePairs;
use stategraph_model::{MemberPath, ModelError, ObjectRef, PathSegment, Value};
use stategraph_strategy::{Settings, Strategy, StrategyCache, StrategyRef};

/// One traversal: settings, strategy source, cycle bookkeeping and current path
pub(crate) struct Walk<'a> {
    pub(crate) settings: &'a Settings,
    pub(crate) cache: &'a StrategyCache,
    pub(crate) pairs: Option<ReferencePairs>,
    pub(crate) path: MemberPath,
}

impl<'a> Walk<'a> {
    pub(crate) fn new(settings: &'a Settings, cache: &'a StrategyCache) -> Self {
        Self {
            settings,
            cache,
            pairs: settings
                .reference_handling()
                .tracks_loops()
                .then(ReferencePairs::new),
            path: MemberPath::root(),
        }
    }

    /// Strategy for an object reached through a slot of `declared` type
    pub(crate) fn resolve(&self, object: &ObjectRef, declared: &StrategyRef) -> StrategyRef {
        if object.type_ref() == declared.ty() {
            declared.clone()
        } else {
            self.cache.member(object.type_ref(), self.settings)
        }
    }

    /// Run `f` one segment deeper
    pub(crate) fn nested<R>(&mut self, segment: PathSegment, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(segment);
        let result = f(self);
        self.path.pop();
        result
    }

    /// Enter a pair; `false` when loop bookkeeping says it is already being walked
    pub(crate) fn enter(&mut self, x: &ObjectRef, y: &ObjectRef) -> bool {
        self.pairs.as_mut().map_or(true, |pairs| pairs.enter(x, y))
    }

    pub(crate) fn leave(&mut self, x: &ObjectRef, y: &ObjectRef) {
        if let Some(pairs) = self.pairs.as_mut() {
            pairs.leave(x, y);
        }
    }

    pub(crate) fn model_error(&self, error: ModelError) -> OpsError {
        OpsError::Model {
            path: self.path.clone(),
            error,
        }
    }

    pub(crate) fn get(&self, object: &ObjectRef, member: &str) -> Result<Value, OpsError> {
        object.get(member).map_err(|e| self.model_error(e))
    }
}

/// Equality of two objects under a leaf strategy
pub(crate) fn leaf_equals(strategy: &Strategy, x: &ObjectRef, y: &ObjectRef) -> bool {
    match strategy {
        Strategy::Equatable(e) => e
            .equality()
            .map_or_else(|| x.ptr_eq(y), |equality| equality.equals(x, y)),
        _ => x.ptr_eq(y),
    }
}
