//! Operation errors

use stategraph_model::{MemberPath, ModelError, TypeRef};
use stategraph_strategy::StrategyError;
use std::sync::Arc;

/// Errors from equality, diff and copy
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OpsError {
    /// Deferred classification error reached by the operation
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Fixed-size target cannot take the source's items
    #[error(
        "cannot copy '{ty}' at '{path}': source has {source_len} items, target has {target_len}"
    )]
    FixedSizeCollectionMismatch {
        /// Collection type
        ty: TypeRef,
        /// Where
        path: MemberPath,
        /// Source length
        source_len: usize,
        /// Target length
        target_len: usize,
    },

    /// Copy would have to write a readonly member
    #[error("readonly member '{member}' of '{ty}' differs at '{path}'")]
    ReadonlyMemberDiffers {
        /// Owner type
        ty: TypeRef,
        /// Member name
        member: Arc<str>,
        /// Where
        path: MemberPath,
    },

    /// Roots have different runtime types
    #[error("expected values of the same type, got '{x}' and '{y}'")]
    TypeMismatch {
        /// Left or source type
        x: TypeRef,
        /// Right or target type
        y: TypeRef,
    },

    /// Root is compared by value or identity, so there is nothing to copy into
    #[error("'{0}' cannot be copied onto; it is compared by value or by reference")]
    NotCopyable(TypeRef),

    /// Instance could not be created or accessed
    #[error("at '{path}': {error}")]
    Model {
        /// Where
        path: MemberPath,
        /// Cause
        #[source]
        error: ModelError,
    },
}
