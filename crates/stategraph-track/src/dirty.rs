//! Dirty tracking
//!
//! A [`DirtyTracker`] observes two graphs of the same type and keeps their
//! difference current. Pairs of mutable values get a node each; every other
//! position keeps its last computed difference, so a notification only
//! recomputes the positions it touches.
//!
//! Sets are compared whole. Their object items are watched in place, and a
//! change to one recomputes the set it belongs to.

use crate::error::TrackError;
use crate::graph::{root_strategy, GraphChange, Scope};
use crate::node_cache::{Counted, Dispose, NodeCache};
use stategraph_model::{
    EventSource, Key, ObjectEvent, ObjectId, ObjectRef, PathSegment, Subscription, Value,
};
use stategraph_ops::{diff_with, SubDiff, ValueDiff};
use stategraph_strategy::{Settings, Strategy, StrategyRef};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{self, Display, Formatter};
use std::iter;
use std::mem;
use std::rc::Rc;
use std::sync::Arc;

type PairKey = (ObjectId, ObjectId);
type DirtyHandle = Counted<PairKey, DirtyNode>;

struct DirtyGraph {
    scope: Scope,
    nodes: NodeCache<PairKey, DirtyNode>,
    /// Leaf differences held by live nodes
    leaves: Cell<usize>,
}

impl DirtyGraph {
    fn is_dirty(&self) -> bool {
        self.leaves.get() > 0
    }

    fn count_leaves(&self, added: usize, removed: usize) {
        self.leaves.set((self.leaves.get() + added).saturating_sub(removed));
    }

    fn sweep(&self) {
        self.nodes.sweep(DirtyNode::children);
    }
}

/// Position of a nested difference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    /// Member by declaration position
    Member(usize),
    Index(usize),
    Key(Key),
    /// The whole value, for sets
    Whole,
    /// Set item observed for in-place changes
    Watch(ObjectId),
}

enum SlotState {
    Leaf(ValueDiff),
    Linked(DirtyLink),
}

struct DirtyLink {
    _bubble: Subscription,
    node: DirtyHandle,
}

#[derive(Clone, Copy)]
enum Side {
    X,
    Y,
}

pub(crate) struct DirtyNode {
    x: ObjectRef,
    y: ObjectRef,
    strategy: StrategyRef,
    graph: Rc<DirtyGraph>,
    subscriptions: RefCell<Vec<Subscription>>,
    slots: RefCell<BTreeMap<Slot, SlotState>>,
    changed: EventSource<GraphChange>,
    disposed: Cell<bool>,
}

impl DirtyNode {
    /// Shared node for a pair; a `strict` attach fails on any nested error
    fn acquire(
        graph: &Rc<DirtyGraph>,
        x: &ObjectRef,
        y: &ObjectRef,
        strategy: StrategyRef,
        strict: bool,
    ) -> Result<DirtyHandle, TrackError> {
        for subject in [x, y] {
            if !subject.notifies() {
                return Err(TrackError::NotNotifying(subject.type_ref().clone()));
            }
        }
        let (handle, created) = graph.nodes.acquire((x.id(), y.id()), || Self {
            x: x.clone(),
            y: y.clone(),
            strategy,
            graph: graph.clone(),
            subscriptions: RefCell::default(),
            slots: RefCell::default(),
            changed: EventSource::new(),
            disposed: Cell::new(false),
        });
        if created {
            handle.rc().attach(strict)?;
        }
        Ok(handle)
    }

    fn key(&self) -> PairKey {
        (self.x.id(), self.y.id())
    }

    fn attach(self: &Rc<Self>, strict: bool) -> Result<(), TrackError> {
        let mut subscriptions = vec![self.subscribe(Side::X)];
        if !self.is_self_pair() {
            subscriptions.push(self.subscribe(Side::Y));
        }
        *self.subscriptions.borrow_mut() = subscriptions;

        for slot in self.all_slots() {
            if strict {
                let state = self.compute(&slot)?;
                self.store(slot, state);
            } else {
                self.refresh(slot);
            }
        }
        tracing::trace!("Attached dirty node for {} and {}", self.x, self.y);
        Ok(())
    }

    /// Both sides are one object, watched for changes below it
    fn is_self_pair(&self) -> bool {
        self.x.ptr_eq(&self.y)
    }

    fn subscribe(self: &Rc<Self>, side: Side) -> Subscription {
        let node = Rc::downgrade(self);
        let subject = match side {
            Side::X => &self.x,
            Side::Y => &self.y,
        };
        subject.subscribe(move |event| {
            if let Some(node) = node.upgrade() {
                node.on_event(side, event);
            }
        })
    }

    fn all_slots(&self) -> Vec<Slot> {
        match self.strategy.get() {
            Strategy::Complex(complex) => complex
                .members()
                .iter()
                .enumerate()
                .filter(|(_, member)| !member.is_ignored())
                .map(|(position, _)| Slot::Member(position))
                .collect(),
            Strategy::Array(_) | Strategy::Sequence(_) => {
                (0..self.x.len().max(self.y.len())).map(Slot::Index).collect()
            }
            Strategy::Mapping(_) => {
                let mut keys = self.x.keys();
                for key in self.y.keys() {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
                keys.into_iter().map(Slot::Key).collect()
            }
            Strategy::Set(_) => {
                let watched: BTreeSet<ObjectId> = self
                    .x
                    .items()
                    .iter()
                    .chain(self.y.items().iter())
                    .filter_map(|item| item.as_object().map(ObjectRef::id))
                    .collect();
                iter::once(Slot::Whole)
                    .chain(watched.into_iter().map(Slot::Watch))
                    .collect()
            }
            Strategy::Equatable(_) | Strategy::Reference(_) | Strategy::Error(_) => Vec::new(),
        }
    }

    fn member_slot(&self, name: &str) -> Option<Slot> {
        let Strategy::Complex(complex) = self.strategy.get() else {
            return None;
        };
        complex
            .members()
            .iter()
            .position(|member| &**member.name() == name && !member.is_ignored())
            .map(Slot::Member)
    }

    /// Index slots from `start` up to the longer side or the last known index
    fn index_slots(&self, start: usize) -> Vec<Slot> {
        let known = self
            .slots
            .borrow()
            .keys()
            .filter_map(|slot| match slot {
                Slot::Index(index) => Some(index + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        let end = self.x.len().max(self.y.len()).max(known);
        (start..end).map(Slot::Index).collect()
    }

    fn segment(&self, slot: &Slot) -> PathSegment {
        match (slot, self.strategy.get()) {
            (Slot::Member(position), Strategy::Complex(complex)) => complex
                .members()
                .get(*position)
                .map_or(PathSegment::Item, |member| PathSegment::Member(member.name().clone())),
            (Slot::Index(index), _) => PathSegment::Index(*index),
            (Slot::Key(key), _) => PathSegment::Key(key.clone()),
            _ => PathSegment::Item,
        }
    }

    /// Both sides at a slot with the declared strategy of that position
    fn values(&self, slot: &Slot) -> Option<(Option<Value>, Option<Value>, StrategyRef)> {
        match (slot, self.strategy.get()) {
            (Slot::Member(position), Strategy::Complex(complex)) => {
                let member = complex.members().get(*position)?;
                let declared = member.strategy()?.clone();
                Some((
                    self.x.get(member.name()).ok(),
                    self.y.get(member.name()).ok(),
                    declared,
                ))
            }
            (Slot::Index(index), Strategy::Array(items) | Strategy::Sequence(items)) => Some((
                self.x.item(*index).ok(),
                self.y.item(*index).ok(),
                items.item().clone(),
            )),
            (Slot::Key(key), Strategy::Mapping(mapping)) => Some((
                self.x.entry(key),
                self.y.entry(key),
                mapping.value().clone(),
            )),
            _ => None,
        }
    }

    fn compute(self: &Rc<Self>, slot: &Slot) -> Result<Option<SlotState>, TrackError> {
        let scope = &self.graph.scope;
        if *slot == Slot::Whole {
            let diff = diff_with(
                &self.x.clone().into(),
                &self.y.clone().into(),
                &self.strategy,
                &scope.settings,
                scope.strategies,
            )?;
            return Ok(diff.map(SlotState::Leaf));
        }
        if let Slot::Watch(id) = slot {
            return self.watch(*id);
        }

        let Some((xv, yv, declared)) = self.values(slot) else {
            return Ok(None);
        };
        let (xv, yv) = match (xv, yv) {
            (Some(xv), Some(yv)) => (xv, yv),
            (None, None) => return Ok(None),
            (xv, yv) => return Ok(Some(SlotState::Leaf(ValueDiff::leaf(xv, yv)))),
        };

        if let (Value::Object(xo), Value::Object(yo)) = (&xv, &yv) {
            if xo.type_ref() == yo.type_ref() && (!xo.ptr_eq(yo) || self.is_self_pair()) {
                let strategy = scope.resolve(xo, &declared);
                if scope.trackable(&strategy, &self.segment(slot))? {
                    return Ok(Some(SlotState::Linked(self.link(xo, yo, strategy)?)));
                }
            }
        }
        let diff = diff_with(&xv, &yv, &declared, &scope.settings, scope.strategies)?;
        Ok(diff.map(SlotState::Leaf))
    }

    /// Link a set item to a node comparing it with itself
    fn watch(self: &Rc<Self>, id: ObjectId) -> Result<Option<SlotState>, TrackError> {
        let Strategy::Set(items) = self.strategy.get() else {
            return Ok(None);
        };
        let item = self
            .x
            .items()
            .into_iter()
            .chain(self.y.items())
            .find_map(|item| match item {
                Value::Object(object) if object.id() == id => Some(object),
                _ => None,
            });
        let Some(item) = item else {
            return Ok(None);
        };

        let scope = &self.graph.scope;
        let strategy = scope.resolve(&item, items.item());
        if !scope.trackable(&strategy, &PathSegment::Item)? {
            return Ok(None);
        }
        Ok(Some(SlotState::Linked(self.link(&item, &item, strategy)?)))
    }

    fn link(
        self: &Rc<Self>,
        x: &ObjectRef,
        y: &ObjectRef,
        strategy: StrategyRef,
    ) -> Result<DirtyLink, TrackError> {
        let node = Self::acquire(&self.graph, x, y, strategy, false)?;
        let parent = Rc::downgrade(self);
        let bubble = node.changed.subscribe(move |change| {
            if let Some(parent) = parent.upgrade() {
                parent.on_nested_change(change);
            }
        });
        Ok(DirtyLink {
            _bubble: bubble,
            node,
        })
    }

    fn children(&self) -> Vec<PairKey> {
        self.slots
            .borrow()
            .values()
            .filter_map(|state| match state {
                SlotState::Linked(link) => Some(*link.node.key()),
                SlotState::Leaf(_) => None,
            })
            .collect()
    }

    fn store(&self, slot: Slot, state: Option<SlotState>) {
        let added = usize::from(matches!(state, Some(SlotState::Leaf(_))));
        let stale = {
            let mut slots = self.slots.borrow_mut();
            match state {
                Some(state) => slots.insert(slot, state),
                None => slots.remove(&slot),
            }
        };
        self.release(added, stale);
    }

    /// Count leaves in and out, then reclaim nodes the stale links left detached
    fn release(&self, added: usize, stale: impl IntoIterator<Item = SlotState>) {
        let mut removed = 0;
        let mut links = Vec::new();
        for state in stale {
            match state {
                SlotState::Leaf(_) => removed += 1,
                SlotState::Linked(link) => links.push(link),
            }
        }
        self.graph.count_leaves(added, removed);
        if !links.is_empty() {
            drop(links);
            self.graph.sweep();
        }
    }

    /// Recompute every slot, dropping positions that no longer exist
    fn refresh_all(self: &Rc<Self>) {
        let stale = mem::take(&mut *self.slots.borrow_mut());
        for slot in self.all_slots() {
            self.refresh(slot);
        }
        self.release(0, stale.into_values());
    }

    fn refresh(self: &Rc<Self>, slot: Slot) {
        let state = self.compute(&slot).unwrap_or_else(|error| {
            tracing::warn!(
                "Stopped tracking {} against {} at '{}': {}",
                self.x,
                self.y,
                self.segment(&slot),
                error
            );
            None
        });
        self.store(slot, state);
    }

    fn raise(&self, change: &GraphChange) {
        if self.disposed.get() || !change.visit(self) {
            return;
        }
        self.changed.emit(change);
    }

    fn on_nested_change(self: &Rc<Self>, change: &GraphChange) {
        if self.disposed.get() || !change.visit(self) {
            return;
        }
        if matches!(self.strategy.get(), Strategy::Set(_)) {
            self.refresh(Slot::Whole);
        }
        self.changed.emit(change);
    }

    fn on_event(self: &Rc<Self>, side: Side, event: &ObjectEvent) {
        if self.disposed.get() {
            return;
        }
        let is_set = matches!(self.strategy.get(), Strategy::Set(_));
        // `None` recomputes every slot
        let affected = match event {
            _ if is_set => None,
            ObjectEvent::PropertyChanged(Some(name)) => match self.member_slot(name) {
                Some(slot) => Some(vec![slot]),
                None => return,
            },
            ObjectEvent::PropertyChanged(None) | ObjectEvent::Reset => None,
            ObjectEvent::Add { index } | ObjectEvent::Remove { index } => {
                Some(self.index_slots(*index))
            }
            ObjectEvent::Replace { index } => Some(vec![Slot::Index(*index)]),
            ObjectEvent::Move { from, to } => {
                Some(((*from).min(*to)..=(*from).max(*to)).map(Slot::Index).collect())
            }
            ObjectEvent::EntryChanged { key } => Some(vec![Slot::Key(key.clone())]),
        };
        match affected {
            Some(slots) => {
                for slot in slots {
                    self.refresh(slot);
                }
            }
            None => self.refresh_all(),
        }

        let source = match side {
            Side::X => self.x.clone(),
            Side::Y => self.y.clone(),
        };
        self.raise(&GraphChange::new(source, event.clone()));
    }

    /// Current difference; pairs already on the path contribute nothing
    fn diff(&self, visiting: &mut HashSet<PairKey>) -> Option<ValueDiff> {
        if !visiting.insert(self.key()) {
            return None;
        }
        let diff = self.assemble(visiting);
        visiting.remove(&self.key());
        diff
    }

    fn assemble(&self, visiting: &mut HashSet<PairKey>) -> Option<ValueDiff> {
        let slots = self.slots.borrow();
        if let Some(SlotState::Leaf(whole)) = slots.get(&Slot::Whole) {
            return Some(whole.clone());
        }

        let mut diffs = Vec::new();
        for (slot, state) in slots.iter() {
            let diff = match state {
                SlotState::Leaf(diff) => Some(diff.clone()),
                SlotState::Linked(link) => link.node.diff(visiting),
            };
            if let Some(diff) = diff {
                diffs.extend(self.sub_diff(slot, diff));
            }
        }
        (!diffs.is_empty())
            .then(|| ValueDiff::node(self.x.clone().into(), self.y.clone().into(), diffs))
    }

    fn sub_diff(&self, slot: &Slot, diff: ValueDiff) -> Option<SubDiff> {
        match self.segment(slot) {
            PathSegment::Member(name) => Some(SubDiff::Member { name, diff }),
            PathSegment::Index(index) => Some(SubDiff::Index { index, diff }),
            PathSegment::Key(key) => Some(SubDiff::Key { key, diff }),
            PathSegment::Item => None,
        }
    }
}

impl Dispose for DirtyNode {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let subscriptions = mem::take(&mut *self.subscriptions.borrow_mut());
        drop(subscriptions);
        let slots = mem::take(&mut *self.slots.borrow_mut());
        let leaves = slots
            .values()
            .filter(|state| matches!(state, SlotState::Leaf(_)))
            .count();
        self.graph.count_leaves(0, leaves);
        drop(slots);
        tracing::trace!("Disposed dirty node for {} and {}", self.x, self.y);
    }
}

/// Property raised through [`DirtyTracker::on_property_changed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirtyProperty {
    /// The difference was recomputed
    Diff,
    /// [`DirtyTracker::is_dirty`] flipped
    IsDirty,
}

impl Display for DirtyProperty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diff => f.write_str("diff"),
            Self::IsDirty => f.write_str("is_dirty"),
        }
    }
}

struct DirtyState {
    dirty: Cell<bool>,
    changed: EventSource<GraphChange>,
    property_changed: EventSource<DirtyProperty>,
}

impl DirtyState {
    fn record(&self, dirty: bool, change: &GraphChange) {
        let flipped = self.dirty.replace(dirty) != dirty;
        self.changed.emit(change);
        self.property_changed.emit(&DirtyProperty::Diff);
        if flipped {
            self.property_changed.emit(&DirtyProperty::IsDirty);
        }
    }
}

/// Keeps the difference between two graphs current as either changes
///
/// # Examples
///
/// ```rust,ignore
/// let tracker = DirtyTracker::new(&x, &y, Settings::properties(ReferenceHandling::Structural))?;
/// x.set("value", 2)?;
/// assert!(tracker.is_dirty());
/// println!("{}", tracker.diff().unwrap());
/// ```
pub struct DirtyTracker {
    graph: Rc<DirtyGraph>,
    root: RefCell<Option<DirtyHandle>>,
    subscription: RefCell<Option<Subscription>>,
    state: Rc<DirtyState>,
    disposed: Cell<bool>,
}

impl DirtyTracker {
    /// Create new tracker comparing `x` against `y`
    ///
    /// # Errors
    /// Returns error if the types differ, the root is not a mutable record or
    /// collection, an observed value does not notify, or a reached type is
    /// unsupported
    pub fn new(x: &ObjectRef, y: &ObjectRef, settings: Arc<Settings>) -> Result<Self, TrackError> {
        if x.type_ref() != y.type_ref() {
            return Err(TrackError::TypeMismatch {
                x: x.type_ref().clone(),
                y: y.type_ref().clone(),
            });
        }
        let scope = Scope::new(settings);
        let strategy = root_strategy(&scope, x)?;
        let graph = Rc::new(DirtyGraph {
            scope,
            nodes: NodeCache::new(),
            leaves: Cell::new(0),
        });
        let handle = DirtyNode::acquire(&graph, x, y, strategy, true).map_err(|error| {
            graph.nodes.dispose_all();
            error
        })?;
        graph.nodes.set_root((x.id(), y.id()));

        let state = Rc::new(DirtyState {
            dirty: Cell::new(graph.is_dirty()),
            changed: EventSource::new(),
            property_changed: EventSource::new(),
        });
        let weak_state = Rc::downgrade(&state);
        let weak_graph = Rc::downgrade(&graph);
        let subscription = handle.changed.subscribe(move |change| {
            if let (Some(state), Some(graph)) = (weak_state.upgrade(), weak_graph.upgrade()) {
                state.record(graph.is_dirty(), change);
            }
        });
        tracing::debug!(
            "Tracking {} against {} with {} nodes",
            x,
            y,
            graph.nodes.len()
        );

        Ok(Self {
            graph,
            root: RefCell::new(Some(handle)),
            subscription: RefCell::new(Some(subscription)),
            state,
            disposed: Cell::new(false),
        })
    }

    /// Check if the two graphs currently differ
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.dirty.get()
    }

    /// Current difference, `None` when equal or disposed
    #[must_use]
    pub fn diff(&self) -> Option<ValueDiff> {
        self.root
            .borrow()
            .as_ref()
            .and_then(|root| root.diff(&mut HashSet::new()))
    }

    /// Register a handler called once per change on either side
    pub fn on_changed(&self, handler: impl Fn(&GraphChange) + 'static) -> Subscription {
        self.state.changed.subscribe(handler)
    }

    /// Register a handler for [`DirtyProperty`] changes
    ///
    /// [`DirtyProperty::IsDirty`] is raised only when the state flips.
    pub fn on_property_changed(&self, handler: impl Fn(DirtyProperty) + 'static) -> Subscription {
        self.state
            .property_changed
            .subscribe(move |property| handler(*property))
    }

    /// Check if the tracker was disposed
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Stop tracking and remove every subscription on both graphs
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
        tracing::debug!("Stopped dirty tracking");
    }
}

impl Drop for DirtyTracker {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stategraph_model::MemberPath;
    use stategraph_strategy::ReferenceHandling;
    use stategraph_test_utils as stubs;

    fn track(x: &ObjectRef, y: &ObjectRef) -> DirtyTracker {
        DirtyTracker::new(x, y, Settings::properties(ReferenceHandling::Structural)).unwrap()
    }

    fn paths(tracker: &DirtyTracker) -> Vec<String> {
        tracker.diff().map_or_else(Vec::new, |diff| {
            diff.flatten().iter().map(|(path, _)| path.to_string()).collect()
        })
    }

    fn properties(tracker: &DirtyTracker) -> (Rc<RefCell<Vec<DirtyProperty>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = tracker.on_property_changed(move |p| sink.borrow_mut().push(p));
        (seen, subscription)
    }

    #[test]
    fn member_changes_flip_dirty() {
        let x = stubs::with_simple(1, "a");
        let y = stubs::with_simple(1, "a");
        let tracker = track(&x, &y);
        let (seen, _subscription) = properties(&tracker);
        assert!(!tracker.is_dirty());

        x.set("int_value", 2).unwrap();
        assert!(tracker.is_dirty());
        assert_eq!(paths(&tracker), vec!["int_value"]);

        y.set("int_value", 2).unwrap();
        assert!(!tracker.is_dirty());
        assert!(tracker.diff().is_none());
        assert_eq!(
            *seen.borrow(),
            vec![
                DirtyProperty::Diff,
                DirtyProperty::IsDirty,
                DirtyProperty::Diff,
                DirtyProperty::IsDirty
            ]
        );
    }

    #[test]
    fn is_dirty_raised_only_on_flip() {
        let x = stubs::with_simple(1, "a");
        let y = stubs::with_simple(1, "a");
        let tracker = track(&x, &y);
        let (seen, _subscription) = properties(&tracker);

        x.set("int_value", 2).unwrap();
        x.set("int_value", 3).unwrap();
        let flips = seen
            .borrow()
            .iter()
            .filter(|p| **p == DirtyProperty::IsDirty)
            .count();
        assert_eq!(flips, 1);
    }

    #[test]
    fn nested_difference_and_replacement() {
        let x = stubs::with_complex("n", Some(stubs::with_simple(1, "a")));
        let y = stubs::with_complex("n", Some(stubs::with_simple(1, "a")));
        let tracker = track(&x, &y);

        stubs::object(&x, "complex").set("string_value", "b").unwrap();
        assert_eq!(paths(&tracker), vec!["complex.string_value"]);
        let leaf = tracker
            .diff()
            .unwrap()
            .find(&MemberPath::root().member("complex").member("string_value"))
            .cloned()
            .unwrap();
        assert_eq!(leaf.x(), Some(&Value::from("b")));

        x.set("complex", stubs::with_simple(1, "a")).unwrap();
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn list_items_tracked_by_index() {
        let x = stubs::with_list("l", vec![stubs::with_simple(1, "a")]);
        let y = stubs::with_list("l", vec![stubs::with_simple(1, "a")]);
        let tracker = track(&x, &y);
        let xs = stubs::object(&x, "items");
        let ys = stubs::object(&y, "items");

        xs.push(stubs::with_simple(2, "b")).unwrap();
        assert_eq!(paths(&tracker), vec!["items[1]"]);

        ys.push(stubs::with_simple(2, "b")).unwrap();
        assert!(!tracker.is_dirty());

        let item = xs.item(0).unwrap().as_object().unwrap().clone();
        item.set("int_value", 7).unwrap();
        assert_eq!(paths(&tracker), vec!["items[0].int_value"]);

        xs.remove_at(0).unwrap();
        assert_eq!(
            paths(&tracker),
            vec!["items[0].int_value", "items[0].string_value", "items[1]"]
        );
    }

    #[test]
    fn map_entries() {
        let x = stubs::with_map(vec![("a", stubs::with_simple(1, "a"))]);
        let y = stubs::with_map(vec![("a", stubs::with_simple(1, "a"))]);
        let tracker = track(&x, &y);

        stubs::object(&x, "lookup")
            .insert_entry("b", stubs::with_simple(2, "b"))
            .unwrap();
        assert_eq!(paths(&tracker), vec!["lookup[\"b\"]"]);

        stubs::object(&x, "lookup").remove_entry(&Key::from("b")).unwrap();
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn sets_are_compared_whole() {
        let x = stubs::with_set(&[1, 2]);
        let y = stubs::with_set(&[1, 2]);
        let tracker = track(&x, &y);

        stubs::object(&x, "ints").set_add(3).unwrap();
        assert_eq!(paths(&tracker), vec!["ints"]);
        stubs::object(&y, "ints").set_add(3).unwrap();
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn set_items_are_watched_in_place() {
        let record = stubs::with_simple(1, "a");
        let x = stubs::with_simple_set(vec![record.clone()]);
        let y = stubs::with_simple_set(vec![stubs::with_simple(1, "a")]);
        let tracker = track(&x, &y);
        assert!(!tracker.is_dirty());
        assert_eq!(record.observer_count(), 1);

        record.set("int_value", 2).unwrap();
        assert!(tracker.is_dirty());
        assert_eq!(paths(&tracker), vec!["records"]);

        record.set("int_value", 1).unwrap();
        assert!(!tracker.is_dirty());

        stubs::object(&x, "records")
            .set_remove(&Value::from(&record))
            .unwrap();
        assert!(tracker.is_dirty());
        assert_eq!(record.observer_count(), 0);
    }

    #[test]
    fn detached_cycle_releases_its_difference() {
        let looped = |value: i64| {
            let level = stubs::level(value);
            level.set("next", &level).unwrap();
            level
        };
        let x = stubs::level(1);
        let detached = looped(5);
        x.set("next", &detached).unwrap();
        let y = stubs::level(1);
        let kept = looped(1);
        y.set("next", &kept).unwrap();
        let settings = Settings::properties(ReferenceHandling::StructuralWithReferenceLoops);
        let tracker = DirtyTracker::new(&x, &y, settings).unwrap();
        assert_eq!(paths(&tracker), vec!["next.value"]);

        x.set("next", looped(1)).unwrap();
        assert!(!tracker.is_dirty());
        assert!(tracker.diff().is_none());
        assert_eq!(detached.observer_count(), 0);
        assert_eq!(kept.observer_count(), 1);
    }

    #[test]
    fn nested_unsupported_member_keeps_its_owner_tracked() {
        stubs::init_tracing();
        let x = stubs::new(stubs::HOLDER);
        let y = stubs::new(stubs::HOLDER);
        let tracker = track(&x, &y);

        let inner = stubs::with_bag(1);
        x.set("inner", &inner).unwrap();
        y.set("inner", stubs::with_bag(1)).unwrap();
        assert!(!tracker.is_dirty());

        inner.set("value", 2).unwrap();
        assert_eq!(paths(&tracker), vec!["inner.value"]);
    }

    #[test]
    fn self_references_terminate() {
        let x = stubs::level(1);
        x.set("next", &x).unwrap();
        let y = stubs::level(1);
        y.set("next", &y).unwrap();
        let settings = Settings::properties(ReferenceHandling::StructuralWithReferenceLoops);
        let tracker = DirtyTracker::new(&x, &y, settings).unwrap();

        x.set("value", 2).unwrap();
        assert_eq!(paths(&tracker), vec!["value"]);

        tracker.dispose();
        assert_eq!(x.observer_count(), 0);
        assert_eq!(y.observer_count(), 0);
    }

    #[test]
    fn root_checks() {
        let settings = Settings::properties(ReferenceHandling::Structural);
        assert!(matches!(
            DirtyTracker::new(&stubs::with_simple(1, "a"), &stubs::level(1), settings.clone()),
            Err(TrackError::TypeMismatch { .. })
        ));
        assert!(matches!(
            DirtyTracker::new(&stubs::money(1, "SEK"), &stubs::money(1, "SEK"), settings),
            Err(TrackError::NotTrackable(_))
        ));
    }

    #[test]
    fn drop_removes_subscriptions() {
        let x = stubs::with_complex("x", Some(stubs::with_simple(1, "a")));
        let y = stubs::with_complex("y", Some(stubs::with_simple(1, "a")));
        let nested = stubs::object(&x, "complex");
        let tracker = track(&x, &y);
        assert!(tracker.is_dirty());
        assert_eq!(nested.observer_count(), 1);

        drop(tracker);
        assert_eq!(x.observer_count(), 0);
        assert_eq!(nested.observer_count(), 0);
    }
}
