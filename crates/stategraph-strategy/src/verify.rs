//! Pre-flight verification
//!
//! Walks a strategy graph before an operation touches any value, so deferred
//! errors surface up front instead of halfway through a copy.

use crate::error::StrategyError;
use crate::strategy::{Strategy, StrategyRef};
use stategraph_model::{MemberPath, PathSegment};
use std::collections::HashSet;

/// Return the first deferred error reachable from a strategy
///
/// Ignored members are skipped. Each slot is visited once, so cyclic types terminate.
///
/// # Errors
/// Returns the error with the path where it was found
pub fn verify(strategy: &StrategyRef) -> Result<(), StrategyError> {
    let mut visited = HashSet::new();
    let mut path = MemberPath::root();
    walk(strategy, &mut path, &mut visited)
}

fn walk(
    strategy: &StrategyRef,
    path: &mut MemberPath,
    visited: &mut HashSet<usize>,
) -> Result<(), StrategyError> {
    if !visited.insert(strategy.slot_id()) {
        return Ok(());
    }

    match strategy.get() {
        Strategy::Equatable(_) | Strategy::Reference(_) => Ok(()),
        Strategy::Error(error) => Err(error.to_error(path.clone())),
        Strategy::Array(items) | Strategy::Sequence(items) | Strategy::Set(items) => {
            nested(items.item(), PathSegment::Item, path, visited)
        }
        Strategy::Mapping(mapping) => nested(mapping.value(), PathSegment::Item, path, visited),
        Strategy::Complex(complex) => {
            for member in complex.members() {
                if let Some(strategy) = member.strategy() {
                    nested(
                        strategy,
                        PathSegment::Member(member.name().clone()),
                        path,
                        visited,
                    )?;
                }
            }
            Ok(())
        }
    }
}

fn nested(
    strategy: &StrategyRef,
    segment: PathSegment,
    path: &mut MemberPath,
    visited: &mut HashSet<usize>,
) -> Result<(), StrategyError> {
    path.push(segment);
    let result = walk(strategy, path, visited);
    path.pop();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StrategyCache;
    use crate::settings::{ReferenceHandling, Settings};
    use once_cell::sync::Lazy;
    use stategraph_model::{TypeDescriptor, TypeRef};

    static REGISTERED: Lazy<()> = Lazy::new(|| {
        TypeDescriptor::record("VerifyLevel")
            .property("value", TypeRef::INT)
            .property("next", TypeRef::named("VerifyLevel"))
            .register()
            .unwrap();
        TypeDescriptor::record("VerifyHolder")
            .property("name", TypeRef::STR)
            .property("bad", TypeRef::list(TypeRef::named("VerifyMissing")))
            .register()
            .unwrap();
    });

    fn strategy(name: &str, settings: &Settings) -> StrategyRef {
        Lazy::force(&REGISTERED);
        StrategyCache::global().root(&TypeRef::named(name), settings)
    }

    #[test]
    fn cyclic_type_verifies() {
        let settings = Settings::builder().build();
        assert!(verify(&strategy("VerifyLevel", &settings)).is_ok());
    }

    #[test]
    fn reports_path_of_unsupported_item() {
        let settings = Settings::builder().build();
        let error = verify(&strategy("VerifyHolder", &settings)).unwrap_err();
        assert!(matches!(error, StrategyError::UnsupportedType { .. }));
        assert_eq!(error.path().to_string(), "bad[*]");
    }

    #[test]
    fn ignored_member_is_not_verified() {
        let settings = Settings::builder().ignore_member("VerifyHolder", "bad").build();
        assert!(verify(&strategy("VerifyHolder", &settings)).is_ok());
    }

    #[test]
    fn throw_reports_first_nested_complex() {
        let settings = Settings::builder()
            .reference_handling(ReferenceHandling::Throw)
            .build();
        let error = verify(&strategy("VerifyLevel", &settings)).unwrap_err();
        assert!(matches!(
            error,
            StrategyError::AmbiguousReferenceHandling { .. }
        ));
        assert_eq!(error.path().to_string(), "next");
    }
}
