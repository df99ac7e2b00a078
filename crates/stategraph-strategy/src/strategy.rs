//! Traversal strategies
//!
//! A [`Strategy`] says how instances of one type are compared, diffed, copied
//! and tracked. Strategies are immutable once built and shared through
//! [`StrategyRef`] slots, which is how self-referential types point back at
//! themselves.

use crate::error::StrategyError;
use once_cell::sync::OnceCell;
use stategraph_model::{
    Equality, MemberDescriptor, MemberPath, ScalarKind, TypeDescriptor, TypeRef,
};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// How instances of a type are walked
#[derive(Debug)]
pub enum Strategy {
    /// Compare by value
    Equatable(EquatableStrategy),

    /// Compare and copy by identity
    Reference(TypeRef),

    /// Fixed-size sequence
    Array(ItemsStrategy),

    /// Resizable sequence
    Sequence(ItemsStrategy),

    /// Unique-membership collection
    Set(ItemsStrategy),

    /// Key-to-value mapping
    Mapping(MappingStrategy),

    /// Record walked member by member
    Complex(ComplexStrategy),

    /// Deferred error, raised when reached
    Error(ErrorStrategy),
}

impl Strategy {
    /// Type this strategy walks
    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        match self {
            Self::Equatable(s) => &s.ty,
            Self::Reference(ty) => ty,
            Self::Array(s) | Self::Sequence(s) | Self::Set(s) => &s.ty,
            Self::Mapping(s) => &s.ty,
            Self::Complex(s) => &s.ty,
            Self::Error(s) => &s.ty,
        }
    }

    /// Check if values are compared without walking
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Equatable(_) | Self::Reference(_))
    }

    /// Check if instances can change and be observed
    #[must_use]
    pub fn is_trackable(&self) -> bool {
        match self {
            Self::Complex(c) => !c.immutable,
            Self::Array(_) | Self::Sequence(_) | Self::Set(_) | Self::Mapping(_) => true,
            _ => false,
        }
    }

    /// Kind name for logs
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Equatable(_) => "equatable",
            Self::Reference(_) => "reference",
            Self::Array(_) => "array",
            Self::Sequence(_) => "sequence",
            Self::Set(_) => "set",
            Self::Mapping(_) => "mapping",
            Self::Complex(c) if c.immutable => "immutable",
            Self::Complex(_) => "complex",
            Self::Error(_) => "error",
        }
    }
}

/// Value comparison
#[derive(Debug)]
pub struct EquatableStrategy {
    pub(crate) ty: TypeRef,
    pub(crate) equality: Option<Equality>,
}

impl EquatableStrategy {
    /// Custom equality contract (none for scalars)
    #[inline]
    #[must_use]
    pub fn equality(&self) -> Option<&Equality> {
        self.equality.as_ref()
    }
}

/// Items of an array, sequence or set
#[derive(Debug)]
pub struct ItemsStrategy {
    pub(crate) ty: TypeRef,
    pub(crate) item: StrategyRef,
}

impl ItemsStrategy {
    /// Collection type
    #[inline]
    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Strategy for item values
    #[inline]
    #[must_use]
    pub fn item(&self) -> &StrategyRef {
        &self.item
    }
}

/// Values of a mapping
#[derive(Debug)]
pub struct MappingStrategy {
    pub(crate) ty: TypeRef,
    pub(crate) key: ScalarKind,
    pub(crate) value: StrategyRef,
}

impl MappingStrategy {
    /// Mapping type
    #[inline]
    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Key kind
    #[inline]
    #[must_use]
    pub fn key(&self) -> ScalarKind {
        self.key
    }

    /// Strategy for entry values
    #[inline]
    #[must_use]
    pub fn value(&self) -> &StrategyRef {
        &self.value
    }
}

/// Record walked member by member
#[derive(Debug)]
pub struct ComplexStrategy {
    pub(crate) ty: TypeRef,
    pub(crate) descriptor: Arc<TypeDescriptor>,
    pub(crate) immutable: bool,
    pub(crate) members: Vec<MemberStrategy>,
}

impl ComplexStrategy {
    /// Record type
    #[inline]
    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Type descriptor
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Check if instances never change; copy assigns them by reference
    #[inline]
    #[must_use]
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Selected members in declaration order
    #[inline]
    #[must_use]
    pub fn members(&self) -> &[MemberStrategy] {
        &self.members
    }

    /// Lookup a selected member by name
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&MemberStrategy> {
        self.members.iter().find(|m| &**m.member.name() == name)
    }
}

/// One member of a [`ComplexStrategy`]
#[derive(Debug)]
pub struct MemberStrategy {
    pub(crate) member: MemberDescriptor,
    pub(crate) strategy: Option<StrategyRef>,
}

impl MemberStrategy {
    /// Member descriptor
    #[inline]
    #[must_use]
    pub fn member(&self) -> &MemberDescriptor {
        &self.member
    }

    /// Member name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        self.member.name()
    }

    /// Strategy for the member value (`None` when ignored)
    #[inline]
    #[must_use]
    pub fn strategy(&self) -> Option<&StrategyRef> {
        self.strategy.as_ref()
    }

    /// Check if the member is skipped by settings
    #[inline]
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.strategy.is_none()
    }
}

/// Why a deferred error exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No way to walk the type
    Unsupported(Arc<str>),

    /// `Throw` reached a nested complex value or collection
    AmbiguousReferenceHandling,
}

/// Deferred error
#[derive(Debug)]
pub struct ErrorStrategy {
    pub(crate) ty: TypeRef,
    pub(crate) kind: ErrorKind,
}

impl ErrorStrategy {
    /// Why
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Raise at a path
    #[must_use]
    pub fn to_error(&self, path: MemberPath) -> StrategyError {
        match &self.kind {
            ErrorKind::Unsupported(reason) => StrategyError::UnsupportedType {
                ty: self.ty.clone(),
                reason: reason.clone(),
                path,
            },
            ErrorKind::AmbiguousReferenceHandling => StrategyError::AmbiguousReferenceHandling {
                ty: self.ty.clone(),
                path,
            },
        }
    }
}

struct StrategySlot {
    ty: TypeRef,
    cell: OnceCell<Strategy>,
}

/// Shared, fill-once handle to a strategy
///
/// A slot is registered before its strategy is built, so cyclic types resolve
/// to the slot under construction.
#[derive(Clone)]
pub struct StrategyRef(Arc<StrategySlot>);

impl StrategyRef {
    pub(crate) fn placeholder(ty: TypeRef) -> Self {
        Self(Arc::new(StrategySlot {
            ty,
            cell: OnceCell::new(),
        }))
    }

    pub(crate) fn fill(&self, strategy: Strategy) {
        // Filled once by the cache; a second value is dropped.
        let _ = self.0.cell.set(strategy);
    }

    /// Type of the slot
    #[inline]
    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        &self.0.ty
    }

    /// The strategy, blocking while another thread builds it
    #[inline]
    #[must_use]
    pub fn get(&self) -> &Strategy {
        self.0.cell.wait()
    }

    /// Check if the slot is filled
    #[inline]
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.0.cell.get().is_some()
    }

    /// Check if both handles share a slot
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn slot_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl Debug for StrategyRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "StrategyRef({})", self.0.ty)
    }
}
