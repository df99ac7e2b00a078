//! Structural differences

use crate::diff_tree::{SubDiff, ValueDiff};
use crate::error::OpsError;
use crate::walk::{leaf_equals, Walk};
use indexmap::IndexSet;
use stategraph_model::{Key, ObjectRef, PathSegment, Value};
use stategraph_strategy::{
    verify, ComplexStrategy, ReferenceHandling, Settings, Strategy, StrategyCache, StrategyRef,
};

/// Difference between two values, `None` when they are equal
///
/// Runs the same traversal as [`equals`](crate::equals) but keeps walking
/// past the first difference. A pair met again under reference-loop
/// handling contributes no difference.
///
/// # Errors
/// Returns error if a reached type is unsupported or reference handling is ambiguous
pub fn diff(
    x: &Value,
    y: &Value,
    settings: &Settings,
    cache: &StrategyCache,
) -> Result<Option<ValueDiff>, OpsError> {
    let Some(ty) = x.as_object().map(|o| o.type_ref().clone()) else {
        return Walk::new(settings, cache).value_diff_untyped(x, y);
    };
    let strategy = cache.root(&ty, settings);
    if settings.reference_handling() == ReferenceHandling::Throw {
        verify(&strategy)?;
    }
    diff_with(x, y, &strategy, settings, cache)
}

/// Difference between two values with a known strategy for their declared type
///
/// # Errors
/// Returns error if a reached type is unsupported or reference handling is ambiguous
pub fn diff_with(
    x: &Value,
    y: &Value,
    strategy: &StrategyRef,
    settings: &Settings,
    cache: &StrategyCache,
) -> Result<Option<ValueDiff>, OpsError> {
    Walk::new(settings, cache).value_diff(x, y, strategy)
}

impl Walk<'_> {
    fn value_diff_untyped(&mut self, x: &Value, y: &Value) -> Result<Option<ValueDiff>, OpsError> {
        Ok((x != y).then(|| ValueDiff::leaf(Some(x.clone()), Some(y.clone()))))
    }

    pub(crate) fn value_diff(
        &mut self,
        x: &Value,
        y: &Value,
        declared: &StrategyRef,
    ) -> Result<Option<ValueDiff>, OpsError> {
        let (xo, yo) = match (x, y) {
            (Value::Object(xo), Value::Object(yo)) if xo.type_ref() == yo.type_ref() => (xo, yo),
            _ => return self.value_diff_untyped(x, y),
        };

        let strategy = self.resolve(xo, declared);
        let leaf = || Some(ValueDiff::leaf(Some(x.clone()), Some(y.clone())));
        match strategy.get() {
            Strategy::Error(error) => Err(error.to_error(self.path.clone()).into()),
            s @ (Strategy::Equatable(_) | Strategy::Reference(_)) => {
                Ok(if leaf_equals(s, xo, yo) { None } else { leaf() })
            }
            _ if xo.ptr_eq(yo) => Ok(None),
            Strategy::Set(items) => {
                let item = items.item().clone();
                if !self.enter(xo, yo) {
                    return Ok(None);
                }
                let equal = self.set_equals(xo, yo, &item);
                self.leave(xo, yo);
                Ok(if equal? { None } else { leaf() })
            }
            walked => {
                if !self.enter(xo, yo) {
                    return Ok(None);
                }
                let diffs = self.walked_diffs(walked, xo, yo);
                self.leave(xo, yo);
                let diffs = diffs?;
                Ok((!diffs.is_empty()).then(|| ValueDiff::node(x.clone(), y.clone(), diffs)))
            }
        }
    }

    fn walked_diffs(
        &mut self,
        strategy: &Strategy,
        x: &ObjectRef,
        y: &ObjectRef,
    ) -> Result<Vec<SubDiff>, OpsError> {
        match strategy {
            Strategy::Complex(complex) => self.complex_diffs(complex, x, y),
            Strategy::Array(items) | Strategy::Sequence(items) => {
                let xs = x.items();
                let ys = y.items();
                let mut diffs = Vec::new();
                for index in 0..xs.len().max(ys.len()) {
                    let diff = match (xs.get(index), ys.get(index)) {
                        (Some(xv), Some(yv)) => self.nested(PathSegment::Index(index), |w| {
                            w.value_diff(xv, yv, items.item())
                        })?,
                        (xv, yv) => Some(ValueDiff::leaf(xv.cloned(), yv.cloned())),
                    };
                    if let Some(diff) = diff {
                        diffs.push(SubDiff::Index { index, diff });
                    }
                }
                Ok(diffs)
            }
            Strategy::Mapping(mapping) => {
                let keys: IndexSet<Key> = x.keys().into_iter().chain(y.keys()).collect();
                let mut diffs = Vec::new();
                for key in keys {
                    let diff = match (x.entry(&key), y.entry(&key)) {
                        (Some(xv), Some(yv)) => self.nested(PathSegment::Key(key.clone()), |w| {
                            w.value_diff(&xv, &yv, mapping.value())
                        })?,
                        (xv, yv) => Some(ValueDiff::leaf(xv, yv)),
                    };
                    if let Some(diff) = diff {
                        diffs.push(SubDiff::Key { key, diff });
                    }
                }
                Ok(diffs)
            }
            Strategy::Error(error) => Err(error.to_error(self.path.clone()).into()),
            Strategy::Equatable(_) | Strategy::Reference(_) | Strategy::Set(_) => Ok(Vec::new()),
        }
    }

    fn complex_diffs(
        &mut self,
        complex: &ComplexStrategy,
        x: &ObjectRef,
        y: &ObjectRef,
    ) -> Result<Vec<SubDiff>, OpsError> {
        let mut diffs = Vec::new();
        for member in complex.members() {
            let Some(strategy) = member.strategy() else {
                continue;
            };
            let xv = self.get(x, member.name())?;
            let yv = self.get(y, member.name())?;
            let diff = self.nested(PathSegment::Member(member.name().clone()), |w| {
                w.value_diff(&xv, &yv, strategy)
            })?;
            if let Some(diff) = diff {
                diffs.push(SubDiff::Member {
                    name: member.name().clone(),
                    diff,
                });
            }
        }
        Ok(diffs)
    }
}
