//! Structural equality

use crate::error::OpsError;
use crate::walk::{leaf_equals, Walk};
use stategraph_model::{ObjectRef, PathSegment, Value};
use stategraph_strategy::{
    verify, ComplexStrategy, ReferenceHandling, Settings, Strategy, StrategyCache, StrategyRef,
};

/// Compare two values
///
/// Both `Null` is equal, one `Null` is not, different runtime types are not.
/// Under [`ReferenceHandling::Throw`] the whole type graph is verified before
/// any value is compared.
///
/// # Errors
/// Returns error if a reached type is unsupported or reference handling is ambiguous
pub fn equals(
    x: &Value,
    y: &Value,
    settings: &Settings,
    cache: &StrategyCache,
) -> Result<bool, OpsError> {
    let (xo, yo) = match (x, y) {
        (Value::Object(xo), Value::Object(yo)) => (xo, yo),
        _ => return Ok(x == y),
    };
    if xo.type_ref() != yo.type_ref() {
        return Ok(false);
    }

    let strategy = cache.root(xo.type_ref(), settings);
    if settings.reference_handling() == ReferenceHandling::Throw {
        verify(&strategy)?;
    }
    equals_with(x, y, &strategy, settings, cache)
}

/// Compare two values with a known strategy for their declared type
///
/// # Errors
/// Returns error if a reached type is unsupported or reference handling is ambiguous
pub fn equals_with(
    x: &Value,
    y: &Value,
    strategy: &StrategyRef,
    settings: &Settings,
    cache: &StrategyCache,
) -> Result<bool, OpsError> {
    Walk::new(settings, cache).value_equals(x, y, strategy)
}

impl Walk<'_> {
    pub(crate) fn value_equals(
        &mut self,
        x: &Value,
        y: &Value,
        declared: &StrategyRef,
    ) -> Result<bool, OpsError> {
        let (xo, yo) = match (x, y) {
            (Value::Object(xo), Value::Object(yo)) => (xo, yo),
            _ => return Ok(x == y),
        };
        if xo.type_ref() != yo.type_ref() {
            return Ok(false);
        }

        let strategy = self.resolve(xo, declared);
        match strategy.get() {
            Strategy::Error(error) => Err(error.to_error(self.path.clone()).into()),
            leaf @ (Strategy::Equatable(_) | Strategy::Reference(_)) => {
                Ok(leaf_equals(leaf, xo, yo))
            }
            _ if xo.ptr_eq(yo) => Ok(true),
            walked => {
                if !self.enter(xo, yo) {
                    return Ok(true);
                }
                let result = self.walked_equals(walked, xo, yo);
                self.leave(xo, yo);
                result
            }
        }
    }

    fn walked_equals(
        &mut self,
        strategy: &Strategy,
        x: &ObjectRef,
        y: &ObjectRef,
    ) -> Result<bool, OpsError> {
        match strategy {
            Strategy::Complex(complex) => self.complex_equals(complex, x, y),
            Strategy::Array(items) | Strategy::Sequence(items) => {
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (index, (xv, yv)) in x.items().iter().zip(y.items().iter()).enumerate() {
                    let equal =
                        self.nested(PathSegment::Index(index), |w| w.value_equals(xv, yv, items.item()))?;
                    if !equal {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Strategy::Set(items) => self.set_equals(x, y, items.item()),
            Strategy::Mapping(mapping) => {
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (key, xv) in x.entries() {
                    let Some(yv) = y.entry(&key) else {
                        return Ok(false);
                    };
                    let equal =
                        self.nested(PathSegment::Key(key), |w| w.value_equals(&xv, &yv, mapping.value()))?;
                    if !equal {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Strategy::Equatable(_) | Strategy::Reference(_) => Ok(leaf_equals(strategy, x, y)),
            Strategy::Error(error) => Err(error.to_error(self.path.clone()).into()),
        }
    }

    fn complex_equals(
        &mut self,
        complex: &ComplexStrategy,
        x: &ObjectRef,
        y: &ObjectRef,
    ) -> Result<bool, OpsError> {
        for member in complex.members() {
            let Some(strategy) = member.strategy() else {
                continue;
            };
            let xv = self.get(x, member.name())?;
            let yv = self.get(y, member.name())?;
            let equal = self.nested(PathSegment::Member(member.name().clone()), |w| {
                w.value_equals(&xv, &yv, strategy)
            })?;
            if !equal {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Order-independent: each item must match a distinct equal item
    pub(crate) fn set_equals(
        &mut self,
        x: &ObjectRef,
        y: &ObjectRef,
        item: &StrategyRef,
    ) -> Result<bool, OpsError> {
        let xs = x.items();
        let ys = y.items();
        if xs.len() != ys.len() {
            return Ok(false);
        }

        let mut matched = vec![false; ys.len()];
        'items: for xv in &xs {
            for (j, yv) in ys.iter().enumerate() {
                if !matched[j] && self.nested(PathSegment::Item, |w| w.value_equals(xv, yv, item))? {
                    matched[j] = true;
                    continue 'items;
                }
            }
            return Ok(false);
        }
        Ok(true)
    }
}
