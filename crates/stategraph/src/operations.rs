//! Structural operations and pre-flight checks

use crate::error::StateError;
use stategraph_model::{ObjectRef, TypeRef, Value};
use stategraph_ops::{OpsError, ValueDiff};
use stategraph_strategy::{verify, Settings, Strategy, StrategyCache, StrategyRef};
use stategraph_track::TrackError;
use std::collections::HashSet;

/// Check if two values are structurally equal under `settings`
///
/// # Errors
/// Returns error if a reached type is unsupported or `Throw` reference
/// handling meets a nested complex value
///
/// # Examples
///
/// ```rust,ignore
/// assert!(stategraph::equals(&x, &y, &Settings::default())?);
/// ```
pub fn equals(
    x: impl Into<Value>,
    y: impl Into<Value>,
    settings: &Settings,
) -> Result<bool, StateError> {
    Ok(stategraph_ops::equals(
        &x.into(),
        &y.into(),
        settings,
        StrategyCache::global(),
    )?)
}

/// Every difference between two values, `None` when they are equal
///
/// # Errors
/// Same as [`equals`]
pub fn diff(
    x: impl Into<Value>,
    y: impl Into<Value>,
    settings: &Settings,
) -> Result<Option<ValueDiff>, StateError> {
    Ok(stategraph_ops::diff(
        &x.into(),
        &y.into(),
        settings,
        StrategyCache::global(),
    )?)
}

/// Make `target` structurally equal to `source`
///
/// Nothing is written unless the whole copy can succeed.
///
/// # Errors
/// Returns error if the types differ, a fixed-size collection has another
/// length, a differing readonly member would have to be written, or an
/// instance cannot be created
pub fn copy(source: &ObjectRef, target: &ObjectRef, settings: &Settings) -> Result<(), StateError> {
    Ok(stategraph_ops::copy(
        source,
        target,
        settings,
        StrategyCache::global(),
    )?)
}

fn checked_root(ty: &TypeRef, settings: &Settings) -> Result<StrategyRef, StateError> {
    let strategy = StrategyCache::global().root(ty, settings);
    verify(&strategy)?;
    Ok(strategy)
}

/// Check up front that values of `ty` can be compared
///
/// # Errors
/// Returns the first unsupported or ambiguous member with its path
pub fn verify_can_equal(ty: &TypeRef, settings: &Settings) -> Result<(), StateError> {
    checked_root(ty, settings).map(drop)
}

/// Check up front that values of `ty` can be copied onto
///
/// # Errors
/// Same as [`verify_can_equal`], and values compared by equality or identity
/// are not copyable
pub fn verify_can_copy(ty: &TypeRef, settings: &Settings) -> Result<(), StateError> {
    let strategy = checked_root(ty, settings)?;
    if strategy.get().is_leaf() {
        return Err(OpsError::NotCopyable(ty.clone()).into());
    }
    Ok(())
}

/// Check up front that values of `ty` can be tracked
///
/// # Errors
/// Same as [`verify_can_equal`], and the root must be a mutable record or
/// collection whose tracked records all notify
pub fn verify_can_track(ty: &TypeRef, settings: &Settings) -> Result<(), StateError> {
    let strategy = checked_root(ty, settings)?;
    if !strategy.get().is_trackable() {
        return Err(TrackError::NotTrackable(ty.clone()).into());
    }
    let mut visited = HashSet::new();
    check_notifies(&strategy, &mut visited)?;
    Ok(())
}

fn check_notifies(
    strategy: &StrategyRef,
    visited: &mut HashSet<TypeRef>,
) -> Result<(), TrackError> {
    if !strategy.get().is_trackable() || !visited.insert(strategy.ty().clone()) {
        return Ok(());
    }
    match strategy.get() {
        Strategy::Complex(complex) => {
            if !complex.descriptor().notifies() {
                return Err(TrackError::NotNotifying(strategy.ty().clone()));
            }
            for member in complex.members() {
                if let Some(nested) = member.strategy() {
                    check_notifies(nested, visited)?;
                }
            }
            Ok(())
        }
        Strategy::Array(items) | Strategy::Sequence(items) | Strategy::Set(items) => {
            check_notifies(items.item(), visited)
        }
        Strategy::Mapping(mapping) => check_notifies(mapping.value(), visited),
        Strategy::Equatable(_) | Strategy::Reference(_) | Strategy::Error(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stategraph_strategy::ReferenceHandling;
    use stategraph_test_utils as stubs;

    fn named(name: &str) -> TypeRef {
        stubs::register_stubs();
        TypeRef::named(name)
    }

    #[test]
    fn verify_reports_unsupported_member() {
        let settings = Settings::default();
        assert!(verify_can_equal(&named(stubs::WITH_SIMPLE), &settings).is_ok());
        let error = verify_can_equal(&named(stubs::WITH_BAG), &settings).unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::UnsupportedType);
    }

    #[test]
    fn verify_throw_is_ambiguous() {
        let settings = Settings::properties(ReferenceHandling::Throw);
        let error = verify_can_copy(&named(stubs::WITH_COMPLEX), &settings).unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::AmbiguousReferenceHandling);
    }

    #[test]
    fn verify_copy_rejects_value_types() {
        let settings = Settings::default();
        assert!(verify_can_copy(&named(stubs::LEVEL), &settings).is_ok());
        assert!(matches!(
            verify_can_copy(&named(stubs::MONEY), &settings),
            Err(StateError::Ops(OpsError::NotCopyable(_)))
        ));
    }

    #[test]
    fn verify_track_checks_notification() {
        let settings = Settings::default();
        assert!(verify_can_track(&named(stubs::LEVEL), &settings).is_ok());
        assert!(matches!(
            verify_can_track(&named(stubs::NOT_NOTIFYING), &settings),
            Err(StateError::Track(TrackError::NotNotifying(_)))
        ));
        assert!(matches!(
            verify_can_track(&named(stubs::IMMUTABLE), &settings),
            Err(StateError::Track(TrackError::NotTrackable(_)))
        ));
    }
}
