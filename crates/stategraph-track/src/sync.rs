//! One-way synchronization

use crate::change::ChangeTracker;
use crate::error::TrackError;
use stategraph_model::{ObjectRef, Subscription};
use stategraph_ops::copy;
use stategraph_strategy::{Settings, StrategyCache};
use std::sync::Arc;

/// Copies a source graph onto a target after every change to the source
///
/// The target is brought up to date once when the synchronizer is created.
pub struct Synchronizer {
    tracker: ChangeTracker,
    subscription: Option<Subscription>,
}

impl Synchronizer {
    /// Copy `source` onto `target` and keep copying on change
    ///
    /// # Errors
    /// Returns error if the initial copy fails or `source` cannot be tracked
    pub fn new(
        source: &ObjectRef,
        target: &ObjectRef,
        settings: Arc<Settings>,
    ) -> Result<Self, TrackError> {
        copy(source, target, &settings, StrategyCache::global())?;
        let tracker = ChangeTracker::new(source, settings.clone())?;

        let weak_source = source.downgrade();
        let weak_target = target.downgrade();
        let subscription = tracker.on_changed(move |_| {
            let (Some(source), Some(target)) = (weak_source.upgrade(), weak_target.upgrade())
            else {
                return;
            };
            if let Err(error) = copy(&source, &target, &settings, StrategyCache::global()) {
                tracing::error!("Failed to synchronize {} onto {}: {}", source, target, error);
            }
        });
        tracing::debug!("Synchronizing {} onto {}", source, target);

        Ok(Self {
            tracker,
            subscription: Some(subscription),
        })
    }

    /// Check if the synchronizer was disposed
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.tracker.is_disposed()
    }

    /// Stop synchronizing; the target keeps its current state
    pub fn dispose(&mut self) {
        self.subscription = None;
        self.tracker.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stategraph_model::Value;
    use stategraph_ops::equals;
    use stategraph_strategy::ReferenceHandling;
    use stategraph_test_utils as stubs;

    fn settings() -> Arc<Settings> {
        Settings::properties(ReferenceHandling::Structural)
    }

    fn same(x: &ObjectRef, y: &ObjectRef) -> bool {
        equals(&x.into(), &y.into(), &settings(), StrategyCache::global()).unwrap()
    }

    #[test]
    fn initial_copy_then_follows_changes() {
        let source = stubs::with_complex("s", Some(stubs::with_simple(1, "a")));
        let target = stubs::with_complex("t", None);
        let _sync = Synchronizer::new(&source, &target, settings()).unwrap();
        assert!(same(&source, &target));

        stubs::object(&source, "complex").set("int_value", 5).unwrap();
        assert_eq!(stubs::object(&target, "complex").get("int_value").unwrap(), Value::from(5));

        source.set("name", "renamed").unwrap();
        assert!(same(&source, &target));
    }

    #[test]
    fn list_changes_are_copied() {
        let source = stubs::with_list("s", vec![stubs::with_simple(1, "a")]);
        let target = stubs::with_list("t", Vec::new());
        let _sync = Synchronizer::new(&source, &target, settings()).unwrap();

        let items = stubs::object(&source, "items");
        items.push(stubs::with_simple(2, "b")).unwrap();
        items.remove_at(0).unwrap();
        assert_eq!(stubs::object(&target, "items").len(), 1);
        assert!(same(&source, &target));
    }

    #[test]
    fn dispose_stops_copying() {
        let source = stubs::with_simple(1, "a");
        let target = stubs::with_simple(0, "");
        let mut sync = Synchronizer::new(&source, &target, settings()).unwrap();
        sync.dispose();
        assert!(sync.is_disposed());
        assert_eq!(source.observer_count(), 0);

        source.set("int_value", 9).unwrap();
        assert_eq!(target.get("int_value").unwrap(), Value::from(1));
    }

    #[test]
    fn failed_initial_copy_is_reported() {
        let source = stubs::with_array(&[1, 2]);
        let target = stubs::with_array(&[1]);
        assert!(matches!(
            Synchronizer::new(&source, &target, settings()),
            Err(TrackError::Ops(_))
        ));
    }
}
