//! Errors raised by the object model

use crate::types::TypeRef;
use std::sync::Arc;

/// Errors from type registration and object access
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Member is not declared by the type
    #[error("type '{ty}' has no member '{member}'")]
    UnknownMember { ty: TypeRef, member: Arc<str> },

    /// Member cannot be written after construction
    #[error("member '{ty}.{member}' is readonly")]
    ReadonlyMember { ty: TypeRef, member: Arc<str> },

    /// Operation is not supported by this kind of object
    #[error("'{operation}' is not supported on '{ty}'")]
    UnsupportedOperation {
        ty: TypeRef,
        operation: &'static str,
    },

    /// Index outside the collection bounds
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Value kind does not fit the collection
    #[error("value does not fit '{ty}': {reason}")]
    InvalidValue { ty: TypeRef, reason: &'static str },

    /// Name already registered
    #[error("type '{0}' is already registered")]
    DuplicateType(Arc<str>),

    /// Two members share a name
    #[error("type '{ty}' declares member '{member}' twice")]
    DuplicateMember { ty: Arc<str>, member: Arc<str> },

    /// Name not registered
    #[error("type '{0}' is not registered")]
    UnknownType(Arc<str>),

    /// Default instantiation policy cannot create the type
    #[error("cannot create an instance of '{0}'")]
    NotConstructible(TypeRef),

    /// Type name does not parse
    #[error("invalid type name '{0}'")]
    InvalidTypeName(String),
}
