//! Strategy errors

use stategraph_model::{MemberPath, TypeRef};
use std::sync::Arc;

/// Deferred classification errors, raised when an operation reaches the type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    /// No way to compare or copy the type
    #[error("type '{ty}' at '{path}' is not supported: {reason}")]
    UnsupportedType {
        /// Offending type
        ty: TypeRef,
        /// Why
        reason: Arc<str>,
        /// Where it was reached
        path: MemberPath,
    },

    /// `Throw` reference handling reached a nested complex value or collection
    #[error(
        "type '{ty}' at '{path}' requires a reference handling; use structural or references"
    )]
    AmbiguousReferenceHandling {
        /// Offending type
        ty: TypeRef,
        /// Where it was reached
        path: MemberPath,
    },
}

impl StrategyError {
    /// Path where the error was found
    #[inline]
    #[must_use]
    pub fn path(&self) -> &MemberPath {
        match self {
            Self::UnsupportedType { path, .. } | Self::AmbiguousReferenceHandling { path, .. } => {
                path
            }
        }
    }
}
