//! Change tracking
//!
//! A [`ChangeTracker`] mirrors the trackable part of a graph with one node per
//! observed object. Nodes follow the graph as references change and raise
//! every change upwards to the tracker.

use crate::error::TrackError;
use crate::graph::{root_strategy, GraphChange, Scope};
use crate::node_cache::{Counted, Dispose, NodeCache};
use stategraph_model::{
    EventSource, Key, ObjectEvent, ObjectId, ObjectRef, PathSegment, Subscription, Value,
};
use stategraph_strategy::{MemberStrategy, Settings, Strategy, StrategyRef};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::mem;
use std::rc::Rc;
use std::sync::Arc;

/// Name raised through [`ChangeTracker::on_property_changed`]
pub const CHANGES_PROPERTY: &str = "changes";

type ChangeHandle = Counted<ObjectId, ChangeNode>;

struct ChangeGraph {
    scope: Scope,
    nodes: NodeCache<ObjectId, ChangeNode>,
}

impl ChangeGraph {
    fn sweep(&self) {
        self.nodes.sweep(ChangeNode::children);
    }
}

/// Link to the node of a nested value
struct Link {
    _bubble: Subscription,
    node: ChangeHandle,
}

#[derive(Default)]
enum Links {
    #[default]
    Empty,
    Members(HashMap<Arc<str>, Link>),
    Items(Vec<Option<Link>>),
    Entries(HashMap<Key, Link>),
}

impl Links {
    fn keys(&self) -> Vec<ObjectId> {
        match self {
            Self::Empty => Vec::new(),
            Self::Members(links) => links.values().map(|link| *link.node.key()).collect(),
            Self::Items(links) => links.iter().flatten().map(|link| *link.node.key()).collect(),
            Self::Entries(links) => links.values().map(|link| *link.node.key()).collect(),
        }
    }

    fn into_links(self) -> Vec<Link> {
        match self {
            Self::Empty => Vec::new(),
            Self::Members(links) => links.into_values().collect(),
            Self::Items(links) => links.into_iter().flatten().collect(),
            Self::Entries(links) => links.into_values().collect(),
        }
    }
}

pub(crate) struct ChangeNode {
    subject: ObjectRef,
    strategy: StrategyRef,
    graph: Rc<ChangeGraph>,
    subscription: RefCell<Option<Subscription>>,
    links: RefCell<Links>,
    changed: EventSource<GraphChange>,
    disposed: Cell<bool>,
}

impl ChangeNode {
    /// Shared node for `subject`; a `strict` attach fails on any nested error
    fn acquire(
        graph: &Rc<ChangeGraph>,
        subject: &ObjectRef,
        strategy: StrategyRef,
        strict: bool,
    ) -> Result<ChangeHandle, TrackError> {
        if !subject.notifies() {
            return Err(TrackError::NotNotifying(subject.type_ref().clone()));
        }
        let (handle, created) = graph.nodes.acquire(subject.id(), || Self {
            subject: subject.clone(),
            strategy,
            graph: graph.clone(),
            subscription: RefCell::default(),
            links: RefCell::default(),
            changed: EventSource::new(),
            disposed: Cell::new(false),
        });
        if created {
            handle.rc().attach(strict)?;
        }
        Ok(handle)
    }

    fn attach(self: &Rc<Self>, strict: bool) -> Result<(), TrackError> {
        let node = Rc::downgrade(self);
        let subscription = self.subject.subscribe(move |event| {
            if let Some(node) = node.upgrade() {
                node.on_event(event);
            }
        });
        *self.subscription.borrow_mut() = Some(subscription);

        let links = self.build_links(strict)?;
        *self.links.borrow_mut() = links;
        tracing::trace!("Attached change node for {}", self.subject);
        Ok(())
    }

    fn build_links(self: &Rc<Self>, strict: bool) -> Result<Links, TrackError> {
        let links = match self.strategy.get() {
            Strategy::Complex(complex) => {
                let mut links = HashMap::new();
                for member in complex.members() {
                    let Some(declared) = member.strategy() else {
                        continue;
                    };
                    let value = self.subject.get(member.name()).unwrap_or_default();
                    let segment = PathSegment::Member(member.name().clone());
                    if let Some(link) = self.link(&value, declared, segment, strict)? {
                        links.insert(member.name().clone(), link);
                    }
                }
                Links::Members(links)
            }
            Strategy::Array(items) | Strategy::Sequence(items) | Strategy::Set(items) => {
                let mut links = Vec::new();
                for (index, value) in self.subject.items().iter().enumerate() {
                    links.push(self.link(value, items.item(), PathSegment::Index(index), strict)?);
                }
                Links::Items(links)
            }
            Strategy::Mapping(mapping) => {
                let mut links = HashMap::new();
                for (key, value) in self.subject.entries() {
                    let segment = PathSegment::Key(key.clone());
                    if let Some(link) = self.link(&value, mapping.value(), segment, strict)? {
                        links.insert(key, link);
                    }
                }
                Links::Entries(links)
            }
            Strategy::Equatable(_) | Strategy::Reference(_) | Strategy::Error(_) => Links::Empty,
        };
        Ok(links)
    }

    /// Node link for a nested value; errors are logged and skipped unless `strict`
    fn link(
        self: &Rc<Self>,
        value: &Value,
        declared: &StrategyRef,
        segment: PathSegment,
        strict: bool,
    ) -> Result<Option<Link>, TrackError> {
        let Value::Object(object) = value else {
            return Ok(None);
        };
        match self.try_link(object, declared, &segment) {
            Err(error) if !strict => {
                tracing::warn!("Stopped tracking {} at '{}': {}", self.subject, segment, error);
                Ok(None)
            }
            result => result,
        }
    }

    fn try_link(
        self: &Rc<Self>,
        object: &ObjectRef,
        declared: &StrategyRef,
        segment: &PathSegment,
    ) -> Result<Option<Link>, TrackError> {
        let scope = &self.graph.scope;
        let strategy = scope.resolve(object, declared);
        if !scope.trackable(&strategy, segment)? {
            return Ok(None);
        }

        let node = Self::acquire(&self.graph, object, strategy, false)?;
        let parent = Rc::downgrade(self);
        let bubble = node.changed.subscribe(move |change| {
            if let Some(parent) = parent.upgrade() {
                parent.raise(change);
            }
        });
        Ok(Some(Link {
            _bubble: bubble,
            node,
        }))
    }

    fn lenient(
        self: &Rc<Self>,
        value: &Value,
        declared: &StrategyRef,
        segment: PathSegment,
    ) -> Option<Link> {
        self.link(value, declared, segment, false).ok().flatten()
    }

    fn children(&self) -> Vec<ObjectId> {
        self.links.borrow().keys()
    }

    /// Drop replaced links, then reclaim nodes they left detached
    fn release(&self, stale: impl IntoIterator<Item = Link>) {
        let mut released = false;
        for link in stale {
            drop(link);
            released = true;
        }
        if released {
            self.graph.sweep();
        }
    }

    fn raise(&self, change: &GraphChange) {
        if self.disposed.get() || !change.visit(self) {
            return;
        }
        self.changed.emit(change);
    }

    fn on_event(self: &Rc<Self>, event: &ObjectEvent) {
        if self.disposed.get() {
            return;
        }
        let counts = match event {
            ObjectEvent::PropertyChanged(Some(name)) => self.refresh_member(name),
            ObjectEvent::PropertyChanged(None) | ObjectEvent::Reset => {
                self.rebuild();
                true
            }
            ObjectEvent::Add { index } => {
                self.insert_item(*index);
                true
            }
            ObjectEvent::Remove { index } => {
                self.remove_item(*index);
                true
            }
            ObjectEvent::Replace { index } => {
                self.replace_item(*index);
                true
            }
            ObjectEvent::Move { from, to } => {
                self.move_item(*from, *to);
                true
            }
            ObjectEvent::EntryChanged { key } => {
                self.refresh_entry(key);
                true
            }
        };
        if counts {
            self.raise(&GraphChange::new(self.subject.clone(), event.clone()));
        }
    }

    /// Relink one member; `false` if the member is not tracked
    fn refresh_member(self: &Rc<Self>, name: &Arc<str>) -> bool {
        let Strategy::Complex(complex) = self.strategy.get() else {
            return false;
        };
        let Some(declared) = complex.member(name).and_then(MemberStrategy::strategy) else {
            return false;
        };
        let value = self.subject.get(name).unwrap_or_default();
        let link = self.lenient(&value, declared, PathSegment::Member(name.clone()));

        let stale = match &mut *self.links.borrow_mut() {
            Links::Members(members) => match link {
                Some(link) => members.insert(name.clone(), link),
                None => members.remove(name),
            },
            _ => link,
        };
        self.release(stale);
        true
    }

    fn rebuild(self: &Rc<Self>) {
        let links = self.build_links(false).unwrap_or_default();
        let stale = mem::replace(&mut *self.links.borrow_mut(), links);
        self.release(stale.into_links());
    }

    fn item_link(self: &Rc<Self>, index: usize) -> Option<Link> {
        let (Strategy::Array(items) | Strategy::Sequence(items) | Strategy::Set(items)) =
            self.strategy.get()
        else {
            return None;
        };
        let value = self.subject.item(index).ok()?;
        self.lenient(&value, items.item(), PathSegment::Index(index))
    }

    fn insert_item(self: &Rc<Self>, index: usize) {
        let link = self.item_link(index);
        let rejected = match &mut *self.links.borrow_mut() {
            Links::Items(items) => {
                items.insert(index.min(items.len()), link);
                None
            }
            _ => link,
        };
        self.release(rejected);
    }

    fn remove_item(&self, index: usize) {
        let stale = match &mut *self.links.borrow_mut() {
            Links::Items(items) if index < items.len() => items.remove(index),
            _ => None,
        };
        self.release(stale);
    }

    fn replace_item(self: &Rc<Self>, index: usize) {
        let link = self.item_link(index);
        let stale = match &mut *self.links.borrow_mut() {
            Links::Items(items) if index < items.len() => mem::replace(&mut items[index], link),
            _ => link,
        };
        self.release(stale);
    }

    fn move_item(&self, from: usize, to: usize) {
        if let Links::Items(items) = &mut *self.links.borrow_mut() {
            if from < items.len() {
                let link = items.remove(from);
                items.insert(to.min(items.len()), link);
            }
        }
    }

    fn refresh_entry(self: &Rc<Self>, key: &Key) {
        let Strategy::Mapping(mapping) = self.strategy.get() else {
            return;
        };
        let link = self
            .subject
            .entry(key)
            .and_then(|value| self.lenient(&value, mapping.value(), PathSegment::Key(key.clone())));

        let stale = match &mut *self.links.borrow_mut() {
            Links::Entries(entries) => match link {
                Some(link) => entries.insert(key.clone(), link),
                None => entries.remove(key),
            },
            _ => link,
        };
        self.release(stale);
    }
}

impl Dispose for ChangeNode {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let subscription = self.subscription.borrow_mut().take();
        drop(subscription);
        let links = mem::take(&mut *self.links.borrow_mut());
        drop(links);
        tracing::trace!("Disposed change node for {}", self.subject);
    }
}

struct TrackerState {
    changes: Cell<usize>,
    changed: EventSource<GraphChange>,
    property_changed: EventSource<&'static str>,
}

impl TrackerState {
    fn record(&self, change: &GraphChange) {
        self.changes.set(self.changes.get() + 1);
        self.changed.emit(change);
        self.property_changed.emit(&CHANGES_PROPERTY);
    }
}

/// Counts changes anywhere in a graph
///
/// Changes of selected, non-ignored members and structural changes of
/// collections count. A nested value that cannot be tracked is logged and
/// skipped; the rest of the graph stays tracked.
///
/// # Examples
///
/// ```rust,ignore
/// let tracker = ChangeTracker::new(&root, Settings::properties(ReferenceHandling::Structural))?;
/// let _changed = tracker.on_changed(|change| println!("{:?}", change.event()));
/// items.push(&item)?;
/// assert_eq!(tracker.changes(), 1);
/// ```
pub struct ChangeTracker {
    graph: Rc<ChangeGraph>,
    root: RefCell<Option<ChangeHandle>>,
    subscription: RefCell<Option<Subscription>>,
    state: Rc<TrackerState>,
    disposed: Cell<bool>,
}

impl ChangeTracker {
    /// Create new tracker observing `root` and everything trackable below it
    ///
    /// # Errors
    /// Returns error if the root is not a mutable record or collection, an
    /// observed value does not notify, or a reached type is unsupported
    pub fn new(root: &ObjectRef, settings: Arc<Settings>) -> Result<Self, TrackError> {
        let scope = Scope::new(settings);
        let strategy = root_strategy(&scope, root)?;
        let graph = Rc::new(ChangeGraph {
            scope,
            nodes: NodeCache::new(),
        });
        let handle = ChangeNode::acquire(&graph, root, strategy, true).map_err(|error| {
            graph.nodes.dispose_all();
            error
        })?;
        graph.nodes.set_root(root.id());

        let state = Rc::new(TrackerState {
            changes: Cell::new(0),
            changed: EventSource::new(),
            property_changed: EventSource::new(),
        });
        let weak = Rc::downgrade(&state);
        let subscription = handle.changed.subscribe(move |change| {
            if let Some(state) = weak.upgrade() {
                state.record(change);
            }
        });
        tracing::debug!("Tracking changes of {} with {} nodes", root, graph.nodes.len());

        Ok(Self {
            graph,
            root: RefCell::new(Some(handle)),
            subscription: RefCell::new(Some(subscription)),
            state,
            disposed: Cell::new(false),
        })
    }

    /// Number of changes seen so far
    #[inline]
    #[must_use]
    pub fn changes(&self) -> usize {
        self.state.changes.get()
    }

    /// Register a handler called once per change
    pub fn on_changed(&self, handler: impl Fn(&GraphChange) + 'static) -> Subscription {
        self.state.changed.subscribe(handler)
    }

    /// Register a handler called with [`CHANGES_PROPERTY`] when the count changes
    pub fn on_property_changed(&self, handler: impl Fn(&str) + 'static) -> Subscription {
        self.state
            .property_changed
            .subscribe(move |name: &&'static str| handler(name))
    }

    /// Check if the tracker was disposed
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Stop tracking and remove every subscription on the graph
    ///
    /// Calling this more than once has no further effect.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let subscription = self.subscription.borrow_mut().take();
        drop(subscription);
        let root = self.root.borrow_mut().take();
        drop(root);
        self.graph.nodes.dispose_all();
        tracing::debug!("Stopped tracking changes after {}", self.changes());
    }

    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize {
        self.graph.nodes.len()
    }
}

impl Drop for ChangeTracker {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stategraph_strategy::ReferenceHandling;
    use stategraph_test_utils as stubs;

    fn track(root: &ObjectRef) -> ChangeTracker {
        ChangeTracker::new(root, Settings::properties(ReferenceHandling::Structural)).unwrap()
    }

    fn counter(tracker: &ChangeTracker) -> (Rc<Cell<usize>>, Subscription) {
        let count = Rc::new(Cell::new(0));
        let handler_count = count.clone();
        let subscription = tracker.on_changed(move |_| handler_count.set(handler_count.get() + 1));
        (count, subscription)
    }

    #[test]
    fn added_item_is_tracked_until_removed() {
        let root = stubs::with_list("root", vec![]);
        let items = stubs::object(&root, "items");
        let tracker = track(&root);
        let (events, _subscription) = counter(&tracker);

        let item = stubs::with_simple(1, "a");
        items.push(&item).unwrap();
        assert_eq!(tracker.changes(), 1);
        assert_eq!(events.get(), 1);

        item.set("int_value", 2).unwrap();
        assert_eq!(tracker.changes(), 2);

        items.remove_at(0).unwrap();
        assert_eq!(tracker.changes(), 3);
        item.set("int_value", 3).unwrap();
        assert_eq!(tracker.changes(), 3);
        assert_eq!(item.observer_count(), 0);
    }

    #[test]
    fn shared_item_subscribed_once() {
        let shared = stubs::with_simple(1, "a");
        let root = stubs::with_list("root", vec![shared.clone(), shared.clone()]);
        let items = stubs::object(&root, "items");
        let tracker = track(&root);
        assert_eq!(shared.observer_count(), 1);

        shared.set("int_value", 2).unwrap();
        assert_eq!(tracker.changes(), 1);

        items.remove_at(0).unwrap();
        assert_eq!(shared.observer_count(), 1);
        shared.set("int_value", 3).unwrap();
        assert_eq!(tracker.changes(), 3);

        items.remove_at(0).unwrap();
        assert_eq!(shared.observer_count(), 0);
    }

    #[test]
    fn moved_links_follow_items() {
        let a = stubs::with_simple(1, "a");
        let b = stubs::with_simple(2, "b");
        let root = stubs::with_list("root", vec![a.clone(), b.clone()]);
        let items = stubs::object(&root, "items");
        let tracker = track(&root);

        items.move_item(0, 1).unwrap();
        items.remove_at(1).unwrap();
        assert_eq!(tracker.changes(), 2);
        assert_eq!(a.observer_count(), 0);

        b.set("int_value", 5).unwrap();
        assert_eq!(tracker.changes(), 3);
    }

    #[test]
    fn replaced_member_is_relinked() {
        let old = stubs::with_simple(1, "a");
        let root = stubs::with_complex("root", Some(old.clone()));
        let tracker = track(&root);

        let new = stubs::with_simple(2, "b");
        root.set("complex", &new).unwrap();
        assert_eq!(tracker.changes(), 1);
        assert_eq!(old.observer_count(), 0);

        old.set("int_value", 9).unwrap();
        new.set("int_value", 9).unwrap();
        assert_eq!(tracker.changes(), 2);
    }

    #[test]
    fn self_reference_counts_once() {
        let level = stubs::level(1);
        level.set("next", &level).unwrap();
        let tracker = track(&level);

        level.set("value", 2).unwrap();
        assert_eq!(tracker.changes(), 1);

        tracker.dispose();
        assert_eq!(level.observer_count(), 0);
        assert_eq!(tracker.node_count(), 0);
    }

    #[test]
    fn detached_cycle_is_released() {
        let root = stubs::level(1);
        let looped = stubs::level(2);
        looped.set("next", &looped).unwrap();
        root.set("next", &looped).unwrap();
        let tracker = track(&root);
        assert_eq!(tracker.node_count(), 4);

        root.set("next", Value::Null).unwrap();
        assert_eq!(tracker.changes(), 1);
        assert_eq!(looped.observer_count(), 0);
        assert_eq!(tracker.node_count(), 2);

        looped.set("value", 3).unwrap();
        assert_eq!(tracker.changes(), 1);
    }

    #[test]
    fn shared_cycle_survives_losing_one_owner() {
        let looped = stubs::level(2);
        looped.set("next", &looped).unwrap();
        let root = stubs::level(1);
        root.set("next", &looped).unwrap();
        stubs::object(&root, "levels").push(&looped).unwrap();
        let tracker = track(&root);

        root.set("next", Value::Null).unwrap();
        assert_eq!(looped.observer_count(), 1);
        looped.set("value", 3).unwrap();
        assert_eq!(tracker.changes(), 2);
    }

    #[test]
    fn nested_unsupported_member_keeps_its_owner_tracked() {
        stubs::init_tracing();
        let root = stubs::new(stubs::HOLDER);
        let tracker = track(&root);

        let inner = stubs::with_bag(1);
        root.set("inner", &inner).unwrap();
        assert_eq!(tracker.changes(), 1);
        assert_eq!(inner.observer_count(), 1);

        inner.set("value", 2).unwrap();
        assert_eq!(tracker.changes(), 2);
    }

    #[test]
    fn ignored_member_does_not_count() {
        let root = stubs::with_simple(1, "a");
        let settings = Settings::builder()
            .ignore_member(stubs::WITH_SIMPLE, "string_value")
            .build();
        let tracker = ChangeTracker::new(&root, settings).unwrap();

        root.set("string_value", "b").unwrap();
        assert_eq!(tracker.changes(), 0);
        root.set("int_value", 2).unwrap();
        assert_eq!(tracker.changes(), 1);
    }

    #[test]
    fn map_entries_are_tracked() {
        let value = stubs::with_simple(1, "a");
        let root = stubs::with_map(vec![("a", value.clone())]);
        let lookup = stubs::object(&root, "lookup");
        let tracker = track(&root);

        value.set("int_value", 2).unwrap();
        assert_eq!(tracker.changes(), 1);
        lookup.remove_entry(&Key::from("a")).unwrap();
        assert_eq!(tracker.changes(), 2);
        value.set("int_value", 3).unwrap();
        assert_eq!(tracker.changes(), 2);
    }

    #[test]
    fn unsupported_value_stops_that_branch_only() {
        stubs::init_tracing();
        let root = stubs::new(stubs::WITH_BAG);
        let tracker = track(&root);

        root.set("bag", stubs::new(stubs::BAG)).unwrap();
        assert_eq!(tracker.changes(), 1);
        root.set("value", 2).unwrap();
        assert_eq!(tracker.changes(), 2);
    }

    #[test]
    fn property_changed_names_the_counter() {
        let root = stubs::with_simple(1, "a");
        let tracker = track(&root);
        let names = Rc::new(RefCell::new(Vec::new()));
        let seen = names.clone();
        let _subscription = tracker.on_property_changed(move |name| seen.borrow_mut().push(name.to_string()));

        root.set("int_value", 2).unwrap();
        assert_eq!(*names.borrow(), vec![CHANGES_PROPERTY.to_string()]);
    }

    #[test]
    fn root_checks() {
        let settings = Settings::properties(ReferenceHandling::Structural);
        let not_notifying = stubs::new(stubs::NOT_NOTIFYING);
        assert!(matches!(
            ChangeTracker::new(&not_notifying, settings.clone()),
            Err(TrackError::NotNotifying(_))
        ));
        assert!(matches!(
            ChangeTracker::new(&stubs::money(1, "SEK"), settings.clone()),
            Err(TrackError::NotTrackable(_))
        ));
        assert!(matches!(
            ChangeTracker::new(&stubs::immutable(1), settings),
            Err(TrackError::NotTrackable(_))
        ));
    }

    #[test]
    fn drop_removes_subscriptions() {
        let nested = stubs::with_simple(1, "a");
        let root = stubs::with_complex("root", Some(nested.clone()));
        let tracker = track(&root);
        assert_eq!(root.observer_count(), 1);
        assert_eq!(nested.observer_count(), 1);

        drop(tracker);
        assert_eq!(root.observer_count(), 0);
        assert_eq!(nested.observer_count(), 0);
    }
}
