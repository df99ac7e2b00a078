//! Settings consumed by classification and strategy construction
//!
//! Provides [`Settings`], the read-only policy bundle every operation takes:
//! member selection, reference handling, ignore lists, immutability overrides
//! and the instantiation policy used by copy.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use stategraph_model::{
    MemberDescriptor, MemberKind, ModelError, ObjectRef, TypeDescriptor, TypeRef, Visibility,
};
use std::collections::HashSet;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How nested complex values and collections are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceHandling {
    /// Refuse to guess: nested complex values are an error
    Throw,

    /// Compare and copy nested complex values by identity
    References,

    /// Walk nested values recursively, assuming no cycles
    #[default]
    Structural,

    /// Walk nested values recursively, tolerating cycles
    StructuralWithReferenceLoops,
}

impl ReferenceHandling {
    /// Check if traversals must keep reference-pair bookkeeping
    #[inline]
    #[must_use]
    pub fn tracks_loops(self) -> bool {
        matches!(self, Self::StructuralWithReferenceLoops)
    }

    /// Check if nested values are walked
    #[inline]
    #[must_use]
    pub fn is_structural(self) -> bool {
        matches!(self, Self::Structural | Self::StructuralWithReferenceLoops)
    }
}

impl Display for ReferenceHandling {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Throw => "throw",
            Self::References => "references",
            Self::Structural => "structural",
            Self::StructuralWithReferenceLoops => "structural_with_reference_loops",
        })
    }
}

/// Which member kind counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKinds {
    /// Properties only
    #[default]
    Properties,

    /// Fields only
    Fields,
}

/// Member-selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemberSelection {
    kinds: MemberKinds,
    include_non_public: bool,
}

impl MemberSelection {
    /// Public properties
    #[inline]
    #[must_use]
    pub fn properties() -> Self {
        Self {
            kinds: MemberKinds::Properties,
            include_non_public: false,
        }
    }

    /// Public fields
    #[inline]
    #[must_use]
    pub fn fields() -> Self {
        Self {
            kinds: MemberKinds::Fields,
            include_non_public: false,
        }
    }

    /// Also select non-public members
    #[inline]
    #[must_use]
    pub fn with_non_public(mut self) -> Self {
        self.include_non_public = true;
        self
    }

    /// Selected member kind
    #[inline]
    #[must_use]
    pub fn kinds(&self) -> MemberKinds {
        self.kinds
    }

    /// Check if non-public members are selected
    #[inline]
    #[must_use]
    pub fn includes_non_public(&self) -> bool {
        self.include_non_public
    }

    /// Check if a member is selected
    #[must_use]
    pub fn selects(&self, member: &MemberDescriptor) -> bool {
        let kind_matches = match self.kinds {
            MemberKinds::Properties => member.kind() == MemberKind::Property,
            MemberKinds::Fields => member.kind() == MemberKind::Field,
        };
        kind_matches && (self.include_non_public || member.visibility() == Visibility::Public)
    }
}

/// Custom instantiation policy
///
/// Returning `None` falls back to the default policy.
#[derive(Clone)]
pub struct Constructor(Arc<dyn Fn(&TypeRef) -> Option<ObjectRef> + Send + Sync>);

impl Constructor {
    /// Wrap a constructor function
    #[inline]
    #[must_use]
    pub fn new(f: impl Fn(&TypeRef) -> Option<ObjectRef> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl Debug for Constructor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Constructor(..)")
    }
}

/// Process-unique settings identity, used as part of strategy cache keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SettingsId(u64);

static NEXT_SETTINGS_ID: AtomicU64 = AtomicU64::new(1);

impl SettingsId {
    fn next() -> Self {
        Self(NEXT_SETTINGS_ID.fetch_add(1, Ordering::Relaxed))
    }
}

static DEFAULTS: Lazy<DashMap<(MemberKinds, ReferenceHandling), Arc<Settings>>> =
    Lazy::new(DashMap::new);

/// Immutable operation settings
///
/// # Invariants
/// - Never mutated after `build`; share as `Arc<Settings>`
/// - `id` is unique for the lifetime of the process
#[derive(Debug)]
pub struct Settings {
    id: SettingsId,
    reference_handling: ReferenceHandling,
    selection: MemberSelection,
    ignored_types: HashSet<TypeRef>,
    ignored_members: HashSet<(Arc<str>, Arc<str>)>,
    immutable_types: HashSet<TypeRef>,
    constructor: Option<Constructor>,
}

impl Settings {
    /// Start building settings
    #[inline]
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// Cached settings selecting public properties
    #[must_use]
    pub fn properties(reference_handling: ReferenceHandling) -> Arc<Self> {
        Self::cached(MemberKinds::Properties, reference_handling)
    }

    /// Cached settings selecting public fields
    #[must_use]
    pub fn fields(reference_handling: ReferenceHandling) -> Arc<Self> {
        Self::cached(MemberKinds::Fields, reference_handling)
    }

    fn cached(kinds: MemberKinds, reference_handling: ReferenceHandling) -> Arc<Self> {
        DEFAULTS
            .entry((kinds, reference_handling))
            .or_insert_with(|| {
                let selection = match kinds {
                    MemberKinds::Properties => MemberSelection::properties(),
                    MemberKinds::Fields => MemberSelection::fields(),
                };
                Settings::builder()
                    .reference_handling(reference_handling)
                    .member_selection(selection)
                    .build()
            })
            .value()
            .clone()
    }

    /// Cache identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> SettingsId {
        self.id
    }

    /// Reference handling
    #[inline]
    #[must_use]
    pub fn reference_handling(&self) -> ReferenceHandling {
        self.reference_handling
    }

    /// Member-selection policy
    #[inline]
    #[must_use]
    pub fn selection(&self) -> MemberSelection {
        self.selection
    }

    /// Selected members of a type in declaration order
    pub fn selected_members<'a>(
        &'a self,
        descriptor: &'a TypeDescriptor,
    ) -> impl Iterator<Item = &'a MemberDescriptor> + 'a {
        descriptor
            .members()
            .iter()
            .filter(move |m| self.selection.selects(m))
    }

    /// Check if values of a type are skipped
    #[inline]
    #[must_use]
    pub fn is_ignored_type(&self, ty: &TypeRef) -> bool {
        self.ignored_types.contains(ty)
    }

    /// Check if a member is skipped, by name or by its declared type
    #[must_use]
    pub fn is_ignored_member(&self, owner: &str, member: &MemberDescriptor) -> bool {
        self.is_ignored_type(member.ty())
            || self
                .ignored_members
                .iter()
                .any(|(t, m)| &**t == owner && m == member.name())
    }

    /// Check if a type is declared immutable by configuration
    #[inline]
    #[must_use]
    pub fn is_immutable_override(&self, ty: &TypeRef) -> bool {
        self.immutable_types.contains(ty)
    }

    /// Create an instance for copy
    ///
    /// Tries the custom constructor first, then the default policy.
    ///
    /// # Errors
    /// Returns error if neither policy can create the type
    pub fn create_instance(&self, ty: &TypeRef, len: usize) -> Result<ObjectRef, ModelError> {
        if let Some(created) = self.constructor.as_ref().and_then(|c| (c.0)(ty)) {
            return Ok(created);
        }
        ObjectRef::instantiate(ty, len)
    }

    /// Check if [`Settings::create_instance`] would succeed, without creating anything
    #[must_use]
    pub fn can_create(&self, ty: &TypeRef) -> bool {
        if self.constructor.is_some() {
            return true;
        }
        match ty {
            TypeRef::Scalar(_) => false,
            TypeRef::Named(name) => stategraph_model::TypeRegistry::global()
                .get(name)
                .is_some_and(|d| {
                    d.constructible() && matches!(d.shape(), stategraph_model::Shape::Record(_))
                }),
            _ => true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        SettingsBuilder::new().into_settings()
    }
}

/// Builder for [`Settings`]
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    reference_handling: ReferenceHandling,
    selection: MemberSelection,
    ignored_types: HashSet<TypeRef>,
    ignored_members: HashSet<(Arc<str>, Arc<str>)>,
    immutable_types: HashSet<TypeRef>,
    constructor: Option<Constructor>,
}

impl SettingsBuilder {
    /// Create builder with defaults (public properties, structural)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set reference handling
    #[inline]
    #[must_use]
    pub fn reference_handling(mut self, reference_handling: ReferenceHandling) -> Self {
        self.reference_handling = reference_handling;
        self
    }

    /// Set member selection
    #[inline]
    #[must_use]
    pub fn member_selection(mut self, selection: MemberSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Skip values of a type
    #[inline]
    #[must_use]
    pub fn ignore_type(mut self, ty: TypeRef) -> Self {
        self.ignored_types.insert(ty);
        self
    }

    /// Skip a member of a type
    #[inline]
    #[must_use]
    pub fn ignore_member(mut self, owner: &str, member: &str) -> Self {
        self.ignored_members.insert((owner.into(), member.into()));
        self
    }

    /// Treat a type as immutable
    #[inline]
    #[must_use]
    pub fn immutable(mut self, ty: TypeRef) -> Self {
        self.immutable_types.insert(ty);
        self
    }

    /// Use a custom instantiation policy
    #[inline]
    #[must_use]
    pub fn constructor(
        mut self,
        f: impl Fn(&TypeRef) -> Option<ObjectRef> + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Constructor::new(f));
        self
    }

    fn into_settings(self) -> Settings {
        Settings {
            id: SettingsId::next(),
            reference_handling: self.reference_handling,
            selection: self.selection,
            ignored_types: self.ignored_types,
            ignored_members: self.ignored_members,
            immutable_types: self.immutable_types,
            constructor: self.constructor,
        }
    }

    /// Build shared settings
    #[must_use]
    pub fn build(self) -> Arc<Settings> {
        Arc::new(self.into_settings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_structural_properties() {
        let settings = Settings::default();
        assert_eq!(settings.reference_handling(), ReferenceHandling::Structural);
        assert_eq!(settings.selection().kinds(), MemberKinds::Properties);
        assert!(!settings.selection().includes_non_public());
    }

    #[test]
    fn cached_defaults_are_shared() {
        let a = Settings::properties(ReferenceHandling::References);
        let b = Settings::properties(ReferenceHandling::References);
        let c = Settings::fields(ReferenceHandling::References);
        assert!(Arc::ptr_eq(&a, &b));
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn selection_filters_kind_and_visibility() {
        let prop = MemberDescriptor::property("p", TypeRef::INT);
        let hidden = MemberDescriptor::property("h", TypeRef::INT).non_public();
        let field = MemberDescriptor::field("f", TypeRef::INT);

        let props = MemberSelection::properties();
        assert!(props.selects(&prop));
        assert!(!props.selects(&hidden));
        assert!(!props.selects(&field));
        assert!(props.with_non_public().selects(&hidden));
        assert!(MemberSelection::fields().selects(&field));
    }

    #[test]
    fn ignored_members_by_name_and_type() {
        let settings = Settings::builder()
            .ignore_member("Owner", "skip")
            .ignore_type(TypeRef::FLOAT)
            .build();

        let skip = MemberDescriptor::property("skip", TypeRef::INT);
        let float = MemberDescriptor::property("ratio", TypeRef::FLOAT);
        let keep = MemberDescriptor::property("keep", TypeRef::INT);

        assert!(settings.is_ignored_member("Owner", &skip));
        assert!(!settings.is_ignored_member("Other", &skip));
        assert!(settings.is_ignored_member("Other", &float));
        assert!(!settings.is_ignored_member("Owner", &keep));
    }

    #[test]
    fn constructor_takes_precedence() {
        let settings = Settings::builder()
            .constructor(|ty| {
                matches!(ty, TypeRef::List(_)).then(|| ObjectRef::list(TypeRef::STR, vec!["seed".into()]))
            })
            .build();

        let list = settings.create_instance(&TypeRef::list(TypeRef::STR), 0).unwrap();
        assert_eq!(list.len(), 1);
        let set = settings.create_instance(&TypeRef::set(TypeRef::STR), 0).unwrap();
        assert!(set.is_empty());
        assert!(settings.can_create(&TypeRef::INT));
        assert!(!Settings::default().can_create(&TypeRef::INT));
    }

    #[test]
    fn reference_handling_names() {
        assert_eq!(ReferenceHandling::StructuralWithReferenceLoops.to_string(), "structural_with_reference_loops");
        assert!(ReferenceHandling::StructuralWithReferenceLoops.tracks_loops());
        assert!(!ReferenceHandling::References.is_structural());
    }
}
