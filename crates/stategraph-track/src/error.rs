//! Tracking errors

use stategraph_model::TypeRef;
use stategraph_ops::OpsError;
use stategraph_strategy::StrategyError;

/// Errors raised when a tracker is created
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackError {
    /// Root is compared by value or identity, so it has nothing to observe
    #[error("'{0}' cannot be tracked; only mutable records and collections can")]
    NotTrackable(TypeRef),

    /// A value to observe does not raise change notifications
    #[error("'{0}' does not notify about changes")]
    NotNotifying(TypeRef),

    /// Dirty tracking needs two values of the same type
    #[error("cannot track '{x}' against '{y}'")]
    TypeMismatch {
        /// Left type
        x: TypeRef,
        /// Right type
        y: TypeRef,
    },

    /// Deferred classification error reached while attaching
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Diff or copy failed while attaching
    #[error(transparent)]
    Ops(#[from] OpsError),
}
