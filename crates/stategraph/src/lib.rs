//! Stategraph
//!
//! Structural equality, differences, deep copy and live change tracking for
//! graphs of runtime objects.
//!
//! # Core Concepts
//!
//! - [`Settings`]: Which members count and how nested references are handled
//! - [`equals`] / [`diff`] / [`copy`]: One-shot walks over two graphs
//! - [`track_changes`]: Counts changes anywhere in a graph
//! - [`track_dirty`]: Keeps the difference between two graphs current
//! - [`synchronize`]: Mirrors one graph onto another as it changes
//!
//! Strategies describing how each type is walked are built once per type and
//! settings, then shared by every operation and tracker.
//!
//! # Example
//!
//! ```rust,ignore
//! use stategraph::prelude::*;
//!
//! let settings = Settings::properties(ReferenceHandling::Structural);
//! copy(&source, &target, &settings)?;
//! assert!(equals(&source, &target, &settings)?);
//!
//! let tracker = track_dirty(&source, &target, settings)?;
//! source.set("name", "changed")?;
//! assert!(tracker.is_dirty());
//! ```

#![warn(unreachable_pub)]

mod error;
mod operations;
mod tracking;

// Re-exports
pub use error::{ErrorKind, StateError};
pub use operations::{
    copy, diff, equals, verify_can_copy, verify_can_equal, verify_can_track,
};
pub use tracking::{synchronize, track_changes, track_dirty};

pub use stategraph_model::{
    Key, MemberPath, ObjectEvent, ObjectRef, PathSegment, Subscription, TypeDescriptor, TypeRef,
    Value,
};
pub use stategraph_ops::{SubDiff, ValueDiff};
pub use stategraph_strategy::{ReferenceHandling, Settings, SettingsBuilder, SettingsConfig};
pub use stategraph_track::{
    ChangeTracker, DirtyProperty, DirtyTracker, GraphChange, Synchronizer, CHANGES_PROPERTY,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with stategraph
    pub use crate::{
        copy, diff, equals, synchronize, track_changes, track_dirty, ChangeTracker, DirtyTracker,
        ErrorKind, ObjectRef, ReferenceHandling, Settings, StateError, Value, ValueDiff,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
