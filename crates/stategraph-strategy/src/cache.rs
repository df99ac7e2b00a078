//! Strategy cache
//!
//! Maps `(type, settings, role)` to a lazily built [`StrategyRef`]. Each key is
//! built at most once: the first caller inserts an empty slot and builds it;
//! concurrent callers get the same slot and wait on it.

use crate::classify::{classify, TypeClassification};
use crate::settings::{ReferenceHandling, Settings, SettingsId};
use crate::strategy::{
    ComplexStrategy, EquatableStrategy, ErrorKind, ErrorStrategy, ItemsStrategy, MappingStrategy,
    MemberStrategy, Strategy, StrategyRef,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use stategraph_model::{MemberDescriptor, TypeDescriptor, TypeRef, TypeRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static GLOBAL: Lazy<StrategyCache> = Lazy::new(StrategyCache::new);

/// Position a type is walked from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Operation root
    Root,

    /// Member, item or entry value
    Member,
}

type CacheKey = (TypeRef, SettingsId, Role);

/// Cache of built strategies
///
/// Entries are never evicted.
#[derive(Debug, Default)]
pub struct StrategyCache {
    slots: DashMap<CacheKey, StrategyRef>,
    classes: DashMap<(TypeRef, SettingsId), TypeClassification>,
    builds: AtomicUsize,
    classified: AtomicUsize,
}

/// Fills its slot with an error if the build never completes
struct BuildGuard<'a> {
    slot: &'a StrategyRef,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.slot.is_built() {
            return;
        }
        tracing::error!("Strategy build for '{}' did not complete", self.slot.ty());
        self.slot.fill(Strategy::Error(ErrorStrategy {
            ty: self.slot.ty().clone(),
            kind: ErrorKind::Unsupported("strategy build failed".into()),
        }));
    }
}

impl StrategyCache {
    /// Create isolated cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            classes: DashMap::new(),
            builds: AtomicUsize::new(0),
            classified: AtomicUsize::new(0),
        }
    }

    /// The process-wide cache
    #[inline]
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Strategy for an operation root
    #[inline]
    pub fn root(&self, ty: &TypeRef, settings: &Settings) -> StrategyRef {
        self.get(ty, settings, Role::Root)
    }

    /// Strategy for a member, item or entry value of a declared type
    #[inline]
    pub fn member(&self, ty: &TypeRef, settings: &Settings) -> StrategyRef {
        self.get(ty, settings, Role::Member)
    }

    /// Strategy for a key, building it on first request
    pub fn get(&self, ty: &TypeRef, settings: &Settings, role: Role) -> StrategyRef {
        let role = match role {
            Role::Member if !self.member_needs_own(ty, settings) => Role::Root,
            role => role,
        };

        let key = (ty.clone(), settings.id(), role);
        if let Some(slot) = self.slots.get(&key) {
            return slot.value().clone();
        }

        let slot = match self.slots.entry(key) {
            Entry::Occupied(e) => return e.get().clone(),
            Entry::Vacant(e) => {
                let slot = StrategyRef::placeholder(ty.clone());
                e.insert(slot.clone());
                slot
            }
        };

        let guard = BuildGuard { slot: &slot };
        let strategy = self.build(ty, settings, role);
        tracing::debug!(
            "Built {} strategy for '{}' ({:?}, {})",
            strategy.kind_name(),
            ty,
            role,
            settings.reference_handling()
        );
        self.builds.fetch_add(1, Ordering::Relaxed);
        slot.fill(strategy);
        drop(guard);
        slot
    }

    /// Number of strategies actually built
    #[inline]
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Number of types actually classified
    #[inline]
    #[must_use]
    pub fn classification_count(&self) -> usize {
        self.classified.load(Ordering::Relaxed)
    }

    /// Number of cached keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if nothing is cached
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn build(&self, ty: &TypeRef, settings: &Settings, role: Role) -> Strategy {
        if role == Role::Member {
            return match settings.reference_handling() {
                ReferenceHandling::References => Strategy::Reference(ty.clone()),
                _ => Strategy::Error(ErrorStrategy {
                    ty: ty.clone(),
                    kind: ErrorKind::AmbiguousReferenceHandling,
                }),
            };
        }

        match self.classify(ty, settings) {
            TypeClassification::Equatable => Strategy::Equatable(EquatableStrategy {
                ty: ty.clone(),
                equality: TypeRegistry::global()
                    .resolve(ty)
                    .and_then(|d| d.equality().cloned()),
            }),
            TypeClassification::Immutable {
                descriptor,
                members,
            } => Strategy::Complex(self.complex(ty, descriptor, members, true, settings)),
            TypeClassification::Complex {
                descriptor,
                members,
            } => Strategy::Complex(self.complex(ty, descriptor, members, false, settings)),
            TypeClassification::Array { item } => Strategy::Array(self.items(ty, &item, settings)),
            TypeClassification::Sequence { item } => {
                Strategy::Sequence(self.items(ty, &item, settings))
            }
            TypeClassification::Set { item } => Strategy::Set(self.items(ty, &item, settings)),
            TypeClassification::Mapping { key, value } => Strategy::Mapping(MappingStrategy {
                ty: ty.clone(),
                key,
                value: self.member(&value, settings),
            }),
            TypeClassification::Unsupported { reason } => Strategy::Error(ErrorStrategy {
                ty: ty.clone(),
                kind: ErrorKind::Unsupported(reason),
            }),
        }
    }

    fn classify(&self, ty: &TypeRef, settings: &Settings) -> TypeClassification {
        let key = (ty.clone(), settings.id());
        if let Some(class) = self.classes.get(&key) {
            return class.value().clone();
        }
        let class = classify(ty, settings);
        self.classified.fetch_add(1, Ordering::Relaxed);
        self.classes.entry(key).or_insert(class).value().clone()
    }

    /// Check if a member value of this type is walked differently from a root
    fn member_needs_own(&self, ty: &TypeRef, settings: &Settings) -> bool {
        match settings.reference_handling() {
            ReferenceHandling::References | ReferenceHandling::Throw => matches!(
                self.classify(ty, settings),
                TypeClassification::Complex { .. }
                    | TypeClassification::Array { .. }
                    | TypeClassification::Sequence { .. }
                    | TypeClassification::Set { .. }
                    | TypeClassification::Mapping { .. }
            ),
            ReferenceHandling::Structural | ReferenceHandling::StructuralWithReferenceLoops => false,
        }
    }

    fn items(&self, ty: &TypeRef, item: &TypeRef, settings: &Settings) -> ItemsStrategy {
        ItemsStrategy {
            ty: ty.clone(),
            item: self.member(item, settings),
        }
    }

    fn complex(
        &self,
        ty: &TypeRef,
        descriptor: Arc<TypeDescriptor>,
        members: Vec<MemberDescriptor>,
        immutable: bool,
        settings: &Settings,
    ) -> ComplexStrategy {
        let members = members
            .into_iter()
            .map(|member| {
                let strategy = (!settings.is_ignored_member(descriptor.name(), &member))
                    .then(|| self.member(member.ty(), settings));
                MemberStrategy { member, strategy }
            })
            .collect();

        ComplexStrategy {
            ty: ty.clone(),
            descriptor,
            immutable,
            members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static REGISTERED: Lazy<()> = Lazy::new(|| {
        TypeDescriptor::record("CacheLevel")
            .property("value", TypeRef::INT)
            .property("next", TypeRef::named("CacheLevel"))
            .property("items", TypeRef::list(TypeRef::named("CacheLevel")))
            .register()
            .unwrap();
        TypeDescriptor::record("CacheWithMissing")
            .property("value", TypeRef::INT)
            .property("missing", TypeRef::named("CacheNeverRegistered"))
            .register()
            .unwrap();
    });

    fn level() -> TypeRef {
        Lazy::force(&REGISTERED);
        TypeRef::named("CacheLevel")
    }

    #[test]
    fn builds_once_per_key() {
        let cache = StrategyCache::new();
        let settings = Settings::builder().build();

        let a = cache.root(&TypeRef::INT, &settings);
        let b = cache.root(&TypeRef::INT, &settings);
        assert!(a.ptr_eq(&b));
        assert_eq!(cache.build_count(), 1);

        let other = Settings::builder().build();
        let c = cache.root(&TypeRef::INT, &other);
        assert!(!a.ptr_eq(&c));
        assert_eq!(cache.build_count(), 2);
    }

    #[test]
    fn self_reference_resolves_to_placeholder() {
        let cache = StrategyCache::new();
        let settings = Settings::builder().build();
        let root = cache.root(&level(), &settings);

        let Strategy::Complex(complex) = root.get() else {
            panic!("expected complex");
        };
        let next = complex.member("next").unwrap().strategy().unwrap();
        assert!(next.ptr_eq(&root));

        let Strategy::Sequence(items) = complex.member("items").unwrap().strategy().unwrap().get()
        else {
            panic!("expected sequence");
        };
        assert!(items.item().ptr_eq(&root));
    }

    #[test]
    fn references_walk_members_by_identity() {
        let cache = StrategyCache::new();
        let settings = Settings::builder()
            .reference_handling(ReferenceHandling::References)
            .build();
        let root = cache.root(&level(), &settings);
        let Strategy::Complex(complex) = root.get() else {
            panic!("expected complex");
        };

        assert!(matches!(
            complex.member("next").unwrap().strategy().unwrap().get(),
            Strategy::Reference(_)
        ));
        assert!(matches!(
            complex.member("value").unwrap().strategy().unwrap().get(),
            Strategy::Equatable(_)
        ));
    }

    #[test]
    fn throw_defers_ambiguity_to_members() {
        let cache = StrategyCache::new();
        let settings = Settings::builder()
            .reference_handling(ReferenceHandling::Throw)
            .build();
        let root = cache.root(&level(), &settings);
        let Strategy::Complex(complex) = root.get() else {
            panic!("expected complex");
        };
        let Strategy::Error(error) = complex.member("next").unwrap().strategy().unwrap().get() else {
            panic!("expected error");
        };
        assert_eq!(error.kind(), &ErrorKind::AmbiguousReferenceHandling);
    }

    #[test]
    fn unsupported_member_is_deferred() {
        Lazy::force(&REGISTERED);
        let cache = StrategyCache::new();
        let settings = Settings::builder().build();
        let root = cache.root(&TypeRef::named("CacheWithMissing"), &settings);
        let Strategy::Complex(complex) = root.get() else {
            panic!("expected complex");
        };
        assert!(matches!(
            complex.member("missing").unwrap().strategy().unwrap().get(),
            Strategy::Error(_)
        ));
    }

    #[test]
    fn ignored_members_have_no_strategy() {
        let cache = StrategyCache::new();
        let settings = Settings::builder()
            .ignore_member("CacheLevel", "next")
            .build();
        let root = cache.root(&level(), &settings);
        let Strategy::Complex(complex) = root.get() else {
            panic!("expected complex");
        };
        assert!(complex.member("next").unwrap().is_ignored());
        assert!(!complex.member("value").unwrap().is_ignored());
    }

    #[test]
    fn classifies_each_type_once() {
        let cache = StrategyCache::new();
        let settings = Settings::builder()
            .reference_handling(ReferenceHandling::References)
            .build();

        let _ = cache.root(&level(), &settings);
        let after_build = cache.classification_count();
        for _ in 0..10 {
            let _ = cache.member(&level(), &settings);
            let _ = cache.member(&TypeRef::INT, &settings);
        }
        assert_eq!(cache.classification_count(), after_build);
    }

    #[test]
    fn interrupted_build_leaves_error_instead_of_empty_slot() {
        let slot = StrategyRef::placeholder(level());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = BuildGuard { slot: &slot };
            panic!("build failed");
        }));
        assert!(result.is_err());
        assert!(slot.is_built());
        let Strategy::Error(error) = slot.get() else {
            panic!("expected error");
        };
        assert!(matches!(error.kind(), ErrorKind::Unsupported(_)));
    }

    #[test]
    fn completed_build_is_kept_by_guard() {
        let slot = StrategyRef::placeholder(TypeRef::INT);
        {
            let _guard = BuildGuard { slot: &slot };
            slot.fill(Strategy::Reference(TypeRef::INT));
        }
        assert!(matches!(slot.get(), Strategy::Reference(_)));
    }

    #[test]
    fn concurrent_first_requests_agree() {
        let cache = Arc::new(StrategyCache::new());
        let settings = Settings::builder().build();
        let ty = level();

        let slots: Vec<StrategyRef> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let cache = cache.clone();
                    let settings = settings.clone();
                    let ty = ty.clone();
                    scope.spawn(move || {
                        let slot = cache.root(&ty, &settings);
                        let _ = slot.get();
                        slot
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(slots.windows(2).all(|w| w[0].ptr_eq(&w[1])));
        let root_builds = cache.len();
        assert_eq!(cache.build_count(), root_builds);
    }
}
