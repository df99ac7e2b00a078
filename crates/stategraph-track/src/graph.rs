//! Pieces shared by change and dirty node graphs

use crate::error::TrackError;
use stategraph_model::{MemberPath, ObjectEvent, ObjectRef, PathSegment};
use stategraph_strategy::{
    verify, ReferenceHandling, Settings, Strategy, StrategyCache, StrategyRef,
};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// One change travelling up the node graph
///
/// Every node raises a given change at most once, so cycles terminate and a
/// node reached along two paths counts once.
#[derive(Clone)]
pub struct GraphChange {
    source: ObjectRef,
    event: ObjectEvent,
    visited: Rc<RefCell<HashSet<usize>>>,
}

impl GraphChange {
    pub(crate) fn new(source: ObjectRef, event: ObjectEvent) -> Self {
        Self {
            source,
            event,
            visited: Rc::default(),
        }
    }

    /// Object that raised the notification
    #[inline]
    #[must_use]
    pub fn source(&self) -> &ObjectRef {
        &self.source
    }

    /// Notification raised by [`GraphChange::source`]
    #[inline]
    #[must_use]
    pub fn event(&self) -> &ObjectEvent {
        &self.event
    }

    /// Mark `node` as reached; `false` if it already was
    pub(crate) fn visit<N>(&self, node: &N) -> bool {
        let address = node as *const N as usize;
        self.visited.borrow_mut().insert(address)
    }
}

impl fmt::Debug for GraphChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphChange")
            .field("source", &self.source)
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Settings and strategy source shared by the nodes of one tracker
pub(crate) struct Scope {
    pub(crate) settings: Arc<Settings>,
    pub(crate) strategies: &'static StrategyCache,
}

impl Scope {
    pub(crate) fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            strategies: StrategyCache::global(),
        }
    }

    /// Strategy for an object held in a slot of `declared` type
    pub(crate) fn resolve(&self, object: &ObjectRef, declared: &StrategyRef) -> StrategyRef {
        if object.type_ref() == declared.ty() {
            declared.clone()
        } else {
            self.strategies.member(object.type_ref(), &self.settings)
        }
    }

    /// Check that an object under `strategy` gets a node; errors for deferred failures
    pub(crate) fn trackable(
        &self,
        strategy: &StrategyRef,
        segment: &PathSegment,
    ) -> Result<bool, TrackError> {
        match strategy.get() {
            Strategy::Error(error) => {
                Err(error.to_error(MemberPath::root().child(segment.clone())).into())
            }
            s => Ok(s.is_trackable()),
        }
    }
}

/// Root strategy of a tracker, checked for trackability
pub(crate) fn root_strategy(scope: &Scope, root: &ObjectRef) -> Result<StrategyRef, TrackError> {
    let strategy = scope.strategies.root(root.type_ref(), &scope.settings);
    if scope.settings.reference_handling() == ReferenceHandling::Throw {
        verify(&strategy)?;
    }
    let trackable = match strategy.get() {
        Strategy::Error(error) => return Err(error.to_error(MemberPath::root()).into()),
        s => s.is_trackable(),
    };
    if trackable {
        Ok(strategy)
    } else {
        Err(TrackError::NotTrackable(root.type_ref().clone()))
    }
}
