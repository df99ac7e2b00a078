//! Type classification
//!
//! Decides, for a runtime type and settings, which kind of walk its instances get.

use crate::settings::Settings;
use stategraph_model::{
    MemberDescriptor, ScalarKind, Shape, TypeDescriptor, TypeRef, TypeRegistry,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Nesting bound for the immutability check
const MAX_IMMUTABLE_DEPTH: usize = 64;

/// Classification of a runtime type
#[derive(Debug, Clone)]
pub enum TypeClassification {
    /// Primitive or declares a value-equality contract
    Equatable,

    /// Record whose selected members are readonly and themselves immutable
    Immutable {
        /// Type descriptor
        descriptor: Arc<TypeDescriptor>,
        /// Selected members
        members: Vec<MemberDescriptor>,
    },

    /// Fixed-size indexable sequence
    Array {
        /// Item type
        item: TypeRef,
    },

    /// Resizable indexable sequence
    Sequence {
        /// Item type
        item: TypeRef,
    },

    /// Unique-membership collection
    Set {
        /// Item type
        item: TypeRef,
    },

    /// Key-to-value mapping
    Mapping {
        /// Key kind
        key: ScalarKind,
        /// Value type
        value: TypeRef,
    },

    /// Mutable record
    Complex {
        /// Type descriptor
        descriptor: Arc<TypeDescriptor>,
        /// Selected members
        members: Vec<MemberDescriptor>,
    },

    /// Nothing an operation can walk
    Unsupported {
        /// Why
        reason: Arc<str>,
    },
}

impl TypeClassification {
    /// Check if values compare by value without walking members
    #[inline]
    #[must_use]
    pub fn is_equatable(&self) -> bool {
        matches!(self, Self::Equatable)
    }

    /// Check if values never change after construction
    #[inline]
    #[must_use]
    pub fn is_value_like(&self) -> bool {
        matches!(self, Self::Equatable | Self::Immutable { .. })
    }

    /// Check if this is a collection
    #[inline]
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::Array { .. } | Self::Sequence { .. } | Self::Set { .. } | Self::Mapping { .. }
        )
    }
}

/// Classify a type
#[must_use]
pub fn classify(ty: &TypeRef, settings: &Settings) -> TypeClassification {
    match ty {
        TypeRef::Scalar(_) => TypeClassification::Equatable,
        TypeRef::Array(item) => TypeClassification::Array {
            item: (**item).clone(),
        },
        TypeRef::List(item) => TypeClassification::Sequence {
            item: (**item).clone(),
        },
        TypeRef::Set(item) => TypeClassification::Set {
            item: (**item).clone(),
        },
        TypeRef::Map(key, value) => TypeClassification::Mapping {
            key: *key,
            value: (**value).clone(),
        },
        TypeRef::Named(name) => {
            let Some(descriptor) = TypeRegistry::global().get(name) else {
                return TypeClassification::Unsupported {
                    reason: format!("type '{name}' is not registered").into(),
                };
            };
            classify_named(ty, descriptor, settings)
        }
    }
}

fn classify_named(
    ty: &TypeRef,
    descriptor: Arc<TypeDescriptor>,
    settings: &Settings,
) -> TypeClassification {
    if descriptor.equality().is_some() {
        return TypeClassification::Equatable;
    }
    if matches!(descriptor.shape(), Shape::Opaque) {
        return TypeClassification::Unsupported {
            reason: format!("'{ty}' is enumerable but has no recognized collection shape").into(),
        };
    }

    let members: Vec<MemberDescriptor> = settings.selected_members(&descriptor).cloned().collect();
    if is_immutable(ty, settings) {
        TypeClassification::Immutable {
            descriptor,
            members,
        }
    } else {
        TypeClassification::Complex {
            descriptor,
            members,
        }
    }
}

/// Check if instances of a type never change after construction
///
/// Never assumes a type immutable while deciding whether it is; a type that
/// reaches itself through its members is mutable unless configured otherwise.
#[must_use]
pub fn is_immutable(ty: &TypeRef, settings: &Settings) -> bool {
    let mut visiting = HashSet::new();
    immutable_within(ty, settings, &mut visiting)
}

fn immutable_within(ty: &TypeRef, settings: &Settings, visiting: &mut HashSet<TypeRef>) -> bool {
    if settings.is_immutable_override(ty) {
        return true;
    }
    let name = match ty {
        TypeRef::Scalar(_) => return true,
        TypeRef::Named(name) => name,
        _ => return false,
    };
    let Some(descriptor) = TypeRegistry::global().get(name) else {
        return false;
    };
    if descriptor.equality().is_some() {
        return true;
    }
    if matches!(descriptor.shape(), Shape::Opaque)
        || visiting.len() >= MAX_IMMUTABLE_DEPTH
        || !visiting.insert(ty.clone())
    {
        return false;
    }

    let immutable = settings
        .selected_members(&descriptor)
        .filter(|m| !settings.is_ignored_member(name, m))
        .all(|m| m.is_readonly() && immutable_within(m.ty(), settings, visiting));

    visiting.remove(ty);
    immutable
}
