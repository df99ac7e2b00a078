//! Deep copy onto an existing target
//!
//! Copying runs twice over the source: a dry run that only reads and reports
//! the first error, then the pass that writes. A copy that fails leaves the
//! target untouched.

use crate::error::OpsError;
use crate::walk::{leaf_equals, Walk};
use stategraph_model::{MemberPath, ModelError, ObjectId, ObjectRef, PathSegment, Value};
use stategraph_strategy::{
    verify, ComplexStrategy, ItemsStrategy, MappingStrategy, ReferenceHandling, Settings,
    Strategy, StrategyCache, StrategyRef,
};
use std::collections::HashMap;

/// Copy the selected members of `source` onto `target`
///
/// Values compared by value or identity are assigned. Mutable values are
/// copied into the target's existing instance of the same type, or into a new
/// instance when there is none.
///
/// # Errors
/// Returns error if the roots have different types, the root is not
/// copyable, a fixed-size collection differs in length, a readonly member
/// would have to change, or an instance cannot be created
pub fn copy(
    source: &ObjectRef,
    target: &ObjectRef,
    settings: &Settings,
    cache: &StrategyCache,
) -> Result<(), OpsError> {
    let strategy = root_strategy(source, target, settings, cache)?;
    if source.ptr_eq(target) {
        return Ok(());
    }

    Copier::new(settings, cache).plan_into(source, Some(target), strategy.get())?;
    Copier::new(settings, cache).copy_into(source, target, strategy.get(), false)?;
    tracing::debug!("Copied {} onto {}", source, target);
    Ok(())
}

/// Check that [`copy`] would succeed, without writing anything
///
/// # Errors
/// See [`copy`]
pub fn check_copy(
    source: &ObjectRef,
    target: &ObjectRef,
    settings: &Settings,
    cache: &StrategyCache,
) -> Result<(), OpsError> {
    let strategy = root_strategy(source, target, settings, cache)?;
    if source.ptr_eq(target) {
        return Ok(());
    }
    Copier::new(settings, cache).plan_into(source, Some(target), strategy.get())
}

fn root_strategy(
    source: &ObjectRef,
    target: &ObjectRef,
    settings: &Settings,
    cache: &StrategyCache,
) -> Result<StrategyRef, OpsError> {
    if source.type_ref() != target.type_ref() {
        return Err(OpsError::TypeMismatch {
            x: source.type_ref().clone(),
            y: target.type_ref().clone(),
        });
    }

    let strategy = cache.root(source.type_ref(), settings);
    if settings.reference_handling() == ReferenceHandling::Throw {
        verify(&strategy)?;
    }
    match strategy.get() {
        Strategy::Equatable(_) | Strategy::Reference(_) => {
            Err(OpsError::NotCopyable(source.type_ref().clone()))
        }
        Strategy::Error(error) => Err(error.to_error(MemberPath::root()).into()),
        _ => Ok(strategy),
    }
}

/// How a source value lands in its target slot
enum Landing {
    /// Slot keeps its current value
    Keep,
    /// Slot gets the source value itself
    Assign,
    /// Source is copied into the slot's existing instance
    InPlace(ObjectRef, StrategyRef),
    /// Slot gets an instance already copied earlier in this pass
    Copied(Option<ObjectRef>),
    /// Slot gets a new instance
    Fresh(StrategyRef),
}

struct Copier<'a> {
    walk: Walk<'a>,
    /// Source object to its copy, kept when reference loops are tracked
    copies: Option<HashMap<ObjectId, Option<ObjectRef>>>,
}

impl<'a> Copier<'a> {
    fn new(settings: &'a Settings, cache: &'a StrategyCache) -> Self {
        Self {
            walk: Walk::new(settings, cache),
            copies: settings
                .reference_handling()
                .tracks_loops()
                .then(HashMap::new),
        }
    }

    fn nested<R>(
        &mut self,
        segment: PathSegment,
        f: impl FnOnce(&mut Self) -> Result<R, OpsError>,
    ) -> Result<R, OpsError> {
        self.walk.path.push(segment);
        let result = f(self);
        self.walk.path.pop();
        result
    }

    fn remember(&mut self, source: &ObjectRef, copy: Option<&ObjectRef>) {
        if let Some(copies) = self.copies.as_mut() {
            copies.insert(source.id(), copy.cloned());
        }
    }

    /// Decide how `source` lands on `target`; `None` target is a slot of a new instance
    fn land(
        &mut self,
        source: &Value,
        target: Option<&Value>,
        declared: &StrategyRef,
    ) -> Result<Landing, OpsError> {
        let Value::Object(so) = source else {
            let keep = target.is_some_and(|tv| tv == source);
            return Ok(if keep { Landing::Keep } else { Landing::Assign });
        };
        let to = target.and_then(Value::as_object);
        if to.is_some_and(|to| to.ptr_eq(so)) {
            return Ok(Landing::Keep);
        }

        let strategy = self.walk.resolve(so, declared);
        let value_like = match strategy.get() {
            Strategy::Error(error) => return Err(error.to_error(self.walk.path.clone()).into()),
            s @ (Strategy::Equatable(_) | Strategy::Reference(_)) => {
                let keep = to.is_some_and(|to| to.type_ref() == so.type_ref() && leaf_equals(s, so, to));
                return Ok(if keep { Landing::Keep } else { Landing::Assign });
            }
            Strategy::Complex(complex) => complex.is_immutable(),
            _ => false,
        };
        if value_like {
            let keep = match target {
                Some(tv) => self.walk.value_equals(source, tv, &strategy)?,
                None => false,
            };
            return Ok(if keep { Landing::Keep } else { Landing::Assign });
        }

        if let Some(copied) = self.copies.as_ref().and_then(|c| c.get(&so.id())) {
            let copied = copied.clone();
            let keep = matches!((&copied, to), (Some(c), Some(to)) if c.ptr_eq(to));
            return Ok(if keep { Landing::Keep } else { Landing::Copied(copied) });
        }
        match to {
            Some(to) if to.type_ref() == so.type_ref() => Ok(Landing::InPlace(to.clone(), strategy)),
            _ => Ok(Landing::Fresh(strategy)),
        }
    }

    /// Dry run of [`Copier::copy_value`]; returns whether the slot would be written
    fn plan_value(
        &mut self,
        source: &Value,
        target: Option<&Value>,
        declared: &StrategyRef,
    ) -> Result<bool, OpsError> {
        match (self.land(source, target, declared)?, source.as_object()) {
            (Landing::InPlace(to, strategy), Some(so)) => {
                self.plan_into(so, Some(&to), strategy.get())?;
                Ok(false)
            }
            (Landing::Fresh(strategy), Some(so)) => {
                if !self.walk.settings.can_create(so.type_ref()) {
                    return Err(self
                        .walk
                        .model_error(ModelError::NotConstructible(so.type_ref().clone())));
                }
                self.plan_into(so, None, strategy.get())?;
                Ok(true)
            }
            (Landing::Keep, _) => Ok(false),
            _ => Ok(true),
        }
    }

    fn plan_into(
        &mut self,
        source: &ObjectRef,
        target: Option<&ObjectRef>,
        strategy: &Strategy,
    ) -> Result<(), OpsError> {
        self.remember(source, target);
        match strategy {
            Strategy::Complex(complex) => self.plan_members(complex, source, target),
            Strategy::Array(items) => {
                if let Some(to) = target {
                    if to.len() != source.len() {
                        return Err(OpsError::FixedSizeCollectionMismatch {
                            ty: source.type_ref().clone(),
                            path: self.walk.path.clone(),
                            source_len: source.len(),
                            target_len: to.len(),
                        });
                    }
                }
                self.plan_items(items, source, target)
            }
            Strategy::Sequence(items) => self.plan_items(items, source, target),
            Strategy::Set(items) => {
                if let Some(to) = target {
                    if self.walk.set_equals(source, to, items.item())? {
                        return Ok(());
                    }
                }
                for item in source.items() {
                    self.nested(PathSegment::Item, |c| c.plan_value(&item, None, items.item()))?;
                }
                Ok(())
            }
            Strategy::Mapping(mapping) => {
                for (key, value) in source.entries() {
                    let existing = target.and_then(|to| to.entry(&key));
                    self.nested(PathSegment::Key(key), |c| {
                        c.plan_value(&value, existing.as_ref(), mapping.value())
                    })?;
                }
                Ok(())
            }
            Strategy::Error(error) => Err(error.to_error(self.walk.path.clone()).into()),
            Strategy::Equatable(_) | Strategy::Reference(_) => Ok(()),
        }
    }

    fn plan_members(
        &mut self,
        complex: &ComplexStrategy,
        source: &ObjectRef,
        target: Option<&ObjectRef>,
    ) -> Result<(), OpsError> {
        for member in complex.members() {
            let Some(strategy) = member.strategy() else {
                continue;
            };
            let sv = self.walk.get(source, member.name())?;
            let tv = target.map(|to| self.walk.get(to, member.name())).transpose()?;
            let writes = self.nested(PathSegment::Member(member.name().clone()), |c| {
                c.plan_value(&sv, tv.as_ref(), strategy)
            })?;
            if writes && target.is_some() && member.member().is_readonly() {
                return Err(OpsError::ReadonlyMemberDiffers {
                    ty: source.type_ref().clone(),
                    member: member.name().clone(),
                    path: self.walk.path.clone(),
                });
            }
        }
        Ok(())
    }

    fn plan_items(
        &mut self,
        items: &ItemsStrategy,
        source: &ObjectRef,
        target: Option<&ObjectRef>,
    ) -> Result<(), OpsError> {
        for (index, item) in source.items().iter().enumerate() {
            let existing = target.and_then(|to| to.item(index).ok());
            self.nested(PathSegment::Index(index), |c| {
                c.plan_value(item, existing.as_ref(), items.item())
            })?;
        }
        Ok(())
    }

    /// Value the target slot ends up holding
    fn copy_value(
        &mut self,
        source: &Value,
        target: &Value,
        declared: &StrategyRef,
    ) -> Result<Value, OpsError> {
        match (self.land(source, Some(target), declared)?, source.as_object()) {
            (Landing::Keep, _) => Ok(target.clone()),
            (Landing::InPlace(to, strategy), Some(so)) => {
                self.copy_into(so, &to, strategy.get(), false)?;
                Ok(target.clone())
            }
            (Landing::Fresh(strategy), Some(so)) => {
                let created = self
                    .walk
                    .settings
                    .create_instance(so.type_ref(), so.len())
                    .map_err(|e| self.walk.model_error(e))?;
                self.copy_into(so, &created, strategy.get(), true)?;
                Ok(created.into())
            }
            (Landing::Copied(Some(copy)), _) => Ok(copy.into()),
            _ => Ok(source.clone()),
        }
    }

    /// Copy into `target`; `fresh` targets were created by this pass
    fn copy_into(
        &mut self,
        source: &ObjectRef,
        target: &ObjectRef,
        strategy: &Strategy,
        fresh: bool,
    ) -> Result<(), OpsError> {
        self.remember(source, Some(target));
        match strategy {
            Strategy::Complex(complex) => self.copy_members(complex, source, target, fresh),
            Strategy::Array(items) => {
                for (index, item) in source.items().iter().enumerate() {
                    let existing = target.item(index).map_err(|e| self.walk.model_error(e))?;
                    let value = self.nested(PathSegment::Index(index), |c| {
                        c.copy_value(item, &existing, items.item())
                    })?;
                    if value != existing {
                        target.replace(index, value).map_err(|e| self.walk.model_error(e))?;
                    }
                }
                Ok(())
            }
            Strategy::Sequence(items) => self.copy_sequence(items, source, target),
            Strategy::Set(items) => {
                if !fresh && self.walk.set_equals(source, target, items.item())? {
                    return Ok(());
                }
                let mut values = Vec::new();
                for item in source.items() {
                    values.push(self.nested(PathSegment::Item, |c| {
                        c.copy_value(&item, &Value::Null, items.item())
                    })?);
                }
                target.clear().map_err(|e| self.walk.model_error(e))?;
                for value in values {
                    target.set_add(value).map_err(|e| self.walk.model_error(e))?;
                }
                Ok(())
            }
            Strategy::Mapping(mapping) => self.copy_entries(mapping, source, target),
            Strategy::Error(error) => Err(error.to_error(self.walk.path.clone()).into()),
            Strategy::Equatable(_) | Strategy::Reference(_) => Ok(()),
        }
    }

    fn copy_members(
        &mut self,
        complex: &ComplexStrategy,
        source: &ObjectRef,
        target: &ObjectRef,
        fresh: bool,
    ) -> Result<(), OpsError> {
        for member in complex.members() {
            let Some(strategy) = member.strategy() else {
                continue;
            };
            let name = member.name();
            let sv = self.walk.get(source, name)?;
            let tv = self.walk.get(target, name)?;
            let value = self.nested(PathSegment::Member(name.clone()), |c| {
                c.copy_value(&sv, &tv, strategy)
            })?;
            if value == tv {
                continue;
            }
            let written = if fresh || member.member().is_readonly() {
                target.initialize(name, value)
            } else {
                target.set(name, value).map(drop)
            };
            written.map_err(|e| self.walk.model_error(e))?;
        }
        Ok(())
    }

    fn copy_sequence(
        &mut self,
        items: &ItemsStrategy,
        source: &ObjectRef,
        target: &ObjectRef,
    ) -> Result<(), OpsError> {
        let values = source.items();
        for (index, item) in values.iter().enumerate() {
            let existing = target.item(index).unwrap_or_default();
            let value = self.nested(PathSegment::Index(index), |c| {
                c.copy_value(item, &existing, items.item())
            })?;
            let written = if index >= target.len() {
                target.push(value)
            } else if value != existing {
                target.replace(index, value).map(drop)
            } else {
                Ok(())
            };
            written.map_err(|e| self.walk.model_error(e))?;
        }
        while target.len() > values.len() {
            target
                .remove_at(target.len() - 1)
                .map_err(|e| self.walk.model_error(e))?;
        }
        Ok(())
    }

    fn copy_entries(
        &mut self,
        mapping: &MappingStrategy,
        source: &ObjectRef,
        target: &ObjectRef,
    ) -> Result<(), OpsError> {
        for key in target.keys() {
            if source.entry(&key).is_none() {
                target.remove_entry(&key).map_err(|e| self.walk.model_error(e))?;
            }
        }
        for (key, item) in source.entries() {
            let existing = target.entry(&key);
            let current = existing.clone().unwrap_or_default();
            let value = self.nested(PathSegment::Key(key.clone()), |c| {
                c.copy_value(&item, &current, mapping.value())
            })?;
            if existing.is_none() || value != current {
                target
                    .insert_entry(key, value)
                    .map_err(|e| self.walk.model_error(e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equals::equals;
    use pretty_assertions::assert_eq;
    use stategraph_model::TypeRef;
    use stategraph_strategy::StrategyError;
    use stategraph_test_utils as stubs;

    fn structural(source: &ObjectRef, target: &ObjectRef) -> Result<(), OpsError> {
        copy(source, target, &Settings::default(), StrategyCache::global())
    }

    fn assert_equal(x: &ObjectRef, y: &ObjectRef) {
        assert!(equals(&x.into(), &y.into(), &Settings::default(), StrategyCache::global()).unwrap());
    }

    #[test]
    fn copies_simple_members() {
        let source = stubs::with_simple(1, "a");
        let target = stubs::with_simple(2, "b");
        structural(&source, &target).unwrap();
        assert_equal(&source, &target);
    }

    #[test]
    fn nested_copied_into_existing_instance() {
        let source = stubs::with_complex("s", Some(stubs::with_simple(1, "a")));
        let nested = stubs::with_simple(2, "b");
        let target = stubs::with_complex("t", Some(nested.clone()));
        structural(&source, &target).unwrap();

        assert!(stubs::object(&target, "complex").ptr_eq(&nested));
        assert_equal(&source, &target);
    }

    #[test]
    fn nested_created_when_target_is_null() {
        let inner = stubs::with_simple(1, "a");
        let source = stubs::with_complex("s", Some(inner.clone()));
        let target = stubs::with_complex("t", None);
        structural(&source, &target).unwrap();

        let copied = stubs::object(&target, "complex");
        assert!(!copied.ptr_eq(&inner));
        assert_equal(&source, &target);
    }

    #[test]
    fn references_assign_nested_instances() {
        let inner = stubs::with_simple(1, "a");
        let source = stubs::with_complex("s", Some(inner.clone()));
        let target = stubs::with_complex("t", Some(stubs::with_simple(2, "b")));
        let settings = Settings::properties(ReferenceHandling::References);
        copy(&source, &target, &settings, StrategyCache::global()).unwrap();
        assert!(stubs::object(&target, "complex").ptr_eq(&inner));
    }

    #[test]
    fn immutable_assigned_by_reference() {
        let source = stubs::with_immutable("s", Some(1));
        let target = stubs::with_immutable("t", Some(2));
        structural(&source, &target).unwrap();
        assert!(stubs::object(&target, "immutable").ptr_eq(&stubs::object(&source, "immutable")));
    }

    #[test]
    fn lists_grow_and_shrink() {
        let source = stubs::with_list(
            "s",
            vec![stubs::with_simple(1, "a"), stubs::with_simple(2, "b")],
        );
        let target = stubs::with_list("t", vec![stubs::with_simple(5, "x")]);
        structural(&source, &target).unwrap();
        assert_equal(&source, &target);

        let shorter = stubs::with_list("s", vec![]);
        structural(&shorter, &target).unwrap();
        assert_eq!(stubs::object(&target, "items").len(), 0);
    }

    #[test]
    fn sets_and_maps() {
        let source = stubs::with_set(&[1, 2, 3]);
        let target = stubs::with_set(&[4]);
        structural(&source, &target).unwrap();
        assert_equal(&source, &target);

        let source = stubs::with_map(vec![("a", stubs::with_simple(1, "a"))]);
        let target = stubs::with_map(vec![("b", stubs::with_simple(2, "b"))]);
        structural(&source, &target).unwrap();
        assert_equal(&source, &target);
    }

    #[test]
    fn fixed_size_mismatch_leaves_target_untouched() {
        let source = stubs::with_array(&[1, 2, 3]);
        let target = stubs::with_array(&[9, 9]);
        let error = structural(&source, &target).unwrap_err();
        assert_eq!(
            error,
            OpsError::FixedSizeCollectionMismatch {
                ty: TypeRef::array(TypeRef::INT),
                path: MemberPath::root().member("ints"),
                source_len: 3,
                target_len: 2,
            }
        );
        assert_eq!(
            stubs::object(&target, "ints").items(),
            vec![Value::Int(9), Value::Int(9)]
        );
    }

    #[test]
    fn readonly_member_differs() {
        let source = stubs::with_readonly(1, 10);
        let target = stubs::with_readonly(2, 20);
        let error = structural(&source, &target).unwrap_err();
        assert!(matches!(error, OpsError::ReadonlyMemberDiffers { ref member, .. } if &**member == "id"));
        assert_eq!(target.get("value").unwrap(), Value::Int(20));

        let same_id = stubs::with_readonly(1, 30);
        structural(&source, &same_id).unwrap();
        assert_eq!(same_id.get("value").unwrap(), Value::Int(10));
    }

    #[test]
    fn root_checks() {
        let error = structural(&stubs::with_simple(1, "a"), &stubs::level(1)).unwrap_err();
        assert!(matches!(error, OpsError::TypeMismatch { .. }));

        let error = structural(&stubs::money(1, "SEK"), &stubs::money(2, "SEK")).unwrap_err();
        assert!(matches!(error, OpsError::NotCopyable(_)));

        let settings = Settings::properties(ReferenceHandling::Throw);
        let error = copy(
            &stubs::with_complex("s", None),
            &stubs::with_complex("t", None),
            &settings,
            StrategyCache::global(),
        )
        .unwrap_err();
        assert!(matches!(
            error,
            OpsError::Strategy(StrategyError::AmbiguousReferenceHandling { .. })
        ));
    }

    #[test]
    fn sealed_member_cannot_be_created() {
        let source = stubs::new(stubs::WITH_SEALED);
        source
            .set("sealed", ObjectRef::named(stubs::SEALED).unwrap())
            .unwrap();
        let target = stubs::new(stubs::WITH_SEALED);
        let error = structural(&source, &target).unwrap_err();
        assert!(matches!(
            error,
            OpsError::Model { error: ModelError::NotConstructible(_), .. }
        ));
        assert!(target.get("sealed").unwrap().is_null());
    }

    #[test]
    fn loops_keep_topology() {
        let source = stubs::level(1);
        source.set("next", &source).unwrap();
        let target = stubs::level(2);
        let settings = Settings::properties(ReferenceHandling::StructuralWithReferenceLoops);
        copy(&source, &target, &settings, StrategyCache::global()).unwrap();

        assert_eq!(target.get("value").unwrap(), Value::Int(1));
        assert!(stubs::object(&target, "next").ptr_eq(&target));
    }

    #[test]
    fn check_copy_does_not_write() {
        let source = stubs::with_simple(1, "a");
        let target = stubs::with_simple(2, "b");
        check_copy(&source, &target, &Settings::default(), StrategyCache::global()).unwrap();
        assert_eq!(target.get("int_value").unwrap(), Value::Int(2));
    }
}
