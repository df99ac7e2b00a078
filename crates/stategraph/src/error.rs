//! Unified error type
//!
//! Every crate of the workspace raises its own error enum; [`StateError`]
//! wraps them so callers of the top-level functions match on one type.

use stategraph_model::ModelError;
use stategraph_ops::OpsError;
use stategraph_strategy::{ConfigError, StrategyError};
use stategraph_track::TrackError;

/// Any error raised by stategraph
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Object model access failed
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Settings could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Type cannot be handled with the given settings
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Equality, diff or copy failed
    #[error(transparent)]
    Ops(#[from] OpsError),

    /// Tracker could not be created
    #[error(transparent)]
    Track(#[from] TrackError),
}

/// Coarse classification of a [`StateError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No value-equality contract and no structural fallback
    UnsupportedType,
    /// `Throw` reference handling reached a nested complex value or collection
    AmbiguousReferenceHandling,
    /// Copy target cannot be resized to the source length
    FixedSizeCollectionMismatch,
    /// Copy would have to write a readonly member that differs
    ReadonlyMemberDiffers,
    /// Anything else
    Other,
}

impl StateError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Strategy(error) => strategy_kind(error),
            Self::Ops(error) => ops_kind(error),
            Self::Track(TrackError::Strategy(error)) => strategy_kind(error),
            Self::Track(TrackError::Ops(error)) => ops_kind(error),
            Self::Model(_) | Self::Config(_) | Self::Track(_) => ErrorKind::Other,
        }
    }
}

fn strategy_kind(error: &StrategyError) -> ErrorKind {
    match error {
        StrategyError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
        StrategyError::AmbiguousReferenceHandling { .. } => ErrorKind::AmbiguousReferenceHandling,
    }
}

fn ops_kind(error: &OpsError) -> ErrorKind {
    match error {
        OpsError::Strategy(error) => strategy_kind(error),
        OpsError::FixedSizeCollectionMismatch { .. } => ErrorKind::FixedSizeCollectionMismatch,
        OpsError::ReadonlyMemberDiffers { .. } => ErrorKind::ReadonlyMemberDiffers,
        OpsError::TypeMismatch { .. } | OpsError::NotCopyable(_) | OpsError::Model { .. } => {
            ErrorKind::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stategraph_model::{MemberPath, TypeRef};

    #[test]
    fn nested_errors_keep_their_kind() {
        let ambiguous = StrategyError::AmbiguousReferenceHandling {
            ty: TypeRef::named("Level"),
            path: MemberPath::root().member("next"),
        };
        let error = StateError::from(TrackError::Ops(OpsError::Strategy(ambiguous)));
        assert_eq!(error.kind(), ErrorKind::AmbiguousReferenceHandling);

        let mismatch = OpsError::FixedSizeCollectionMismatch {
            ty: TypeRef::array(TypeRef::INT),
            path: MemberPath::root().member("ints"),
            source_len: 3,
            target_len: 2,
        };
        assert_eq!(
            StateError::from(mismatch).kind(),
            ErrorKind::FixedSizeCollectionMismatch
        );
        assert_eq!(
            StateError::from(TrackError::NotNotifying(TypeRef::named("X"))).kind(),
            ErrorKind::Other
        );
    }

    #[test]
    fn display_is_transparent() {
        let error = StrategyError::UnsupportedType {
            ty: TypeRef::named("Bag"),
            reason: "opaque".into(),
            path: MemberPath::root().member("bag"),
        };
        let expected = error.to_string();
        assert_eq!(StateError::from(error).to_string(), expected);
    }
}
