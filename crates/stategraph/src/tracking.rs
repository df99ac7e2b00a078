//! Live tracking entry points

use crate::error::StateError;
use stategraph_model::ObjectRef;
use stategraph_strategy::Settings;
use stategraph_track::{ChangeTracker, DirtyTracker, Synchronizer};
use std::sync::Arc;

/// Count changes anywhere below `root`
///
/// # Errors
/// Returns error if `root` is not a mutable record or collection, or an
/// observed value does not notify
pub fn track_changes(root: &ObjectRef, settings: Arc<Settings>) -> Result<ChangeTracker, StateError> {
    Ok(ChangeTracker::new(root, settings)?)
}

/// Keep the difference between `x` and `y` current
///
/// # Errors
/// Same as [`track_changes`], and both values must have the same type
pub fn track_dirty(
    x: &ObjectRef,
    y: &ObjectRef,
    settings: Arc<Settings>,
) -> Result<DirtyTracker, StateError> {
    Ok(DirtyTracker::new(x, y, settings)?)
}

/// Copy `source` onto `target` now and after every change to `source`
///
/// # Errors
/// Returns error if the first copy fails or `source` cannot be tracked
pub fn synchronize(
    source: &ObjectRef,
    target: &ObjectRef,
    settings: Arc<Settings>,
) -> Result<Synchronizer, StateError> {
    Ok(Synchronizer::new(source, target, settings)?)
}
