//! Reference-counted node sharing
//!
//! A subject reachable along several paths gets one node. Each owner holds a
//! [`Counted`] handle; the node is disposed when the last handle drops.
//! Nodes that only hold each other are reclaimed by [`NodeCache::sweep`].

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::mem;
use std::ops::Deref;
use std::rc::{Rc, Weak};

/// Node with resources to release once nobody holds it
pub(crate) trait Dispose {
    fn dispose(&self);
}

struct Slot<N> {
    node: Rc<N>,
    count: usize,
}

struct Entries<K, N> {
    slots: HashMap<K, Slot<N>>,
    /// Keys that lost a handle but stayed cached since the last sweep
    released: Vec<K>,
}

type Slots<K, N> = RefCell<Entries<K, N>>;

/// Nodes of one tracker by subject key
pub(crate) struct NodeCache<K, N> {
    slots: Rc<Slots<K, N>>,
    root: RefCell<Option<K>>,
}

impl<K, N> NodeCache<K, N>
where
    K: Eq + Hash + Clone,
    N: Dispose,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Entries {
                slots: HashMap::new(),
                released: Vec::new(),
            })),
            root: RefCell::new(None),
        }
    }

    /// Key every live node must be reachable from
    pub(crate) fn set_root(&self, key: K) {
        *self.root.borrow_mut() = Some(key);
    }

    /// Handle to the node for `key`, built with `create` on first request
    ///
    /// Returns `true` alongside a new node. The node is already in the cache,
    /// so the caller attaches it afterwards and cycles resolve to it.
    pub(crate) fn acquire(&self, key: K, create: impl FnOnce() -> N) -> (Counted<K, N>, bool) {
        let (node, created) = {
            let mut entries = self.slots.borrow_mut();
            let slots = &mut entries.slots;
            match slots.get_mut(&key) {
                Some(slot) => {
                    slot.count += 1;
                    (slot.node.clone(), false)
                }
                None => {
                    let node = Rc::new(create());
                    slots.insert(
                        key.clone(),
                        Slot {
                            node: node.clone(),
                            count: 1,
                        },
                    );
                    (node, true)
                }
            }
        };
        let handle = Counted {
            key,
            node,
            slots: Rc::downgrade(&self.slots),
        };
        (handle, created)
    }

    /// Number of live handles for `key`
    pub(crate) fn count(&self, key: &K) -> usize {
        self.slots.borrow().slots.get(key).map_or(0, |slot| slot.count)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().slots.len()
    }

    /// Dispose nodes no longer reachable from the root through `children`
    ///
    /// Does nothing unless a handle was released since the last sweep and its
    /// node stayed cached, which is the only way a detached cycle forms.
    pub(crate) fn sweep(&self, children: impl Fn(&N) -> Vec<K>) {
        let unreachable: Vec<Rc<N>> = {
            let mut entries = self.slots.borrow_mut();
            let released = mem::take(&mut entries.released);
            if !released.iter().any(|key| entries.slots.contains_key(key)) {
                return;
            }
            let Some(root) = self.root.borrow().clone() else {
                return;
            };

            let mut reachable = HashSet::new();
            let mut pending = vec![root];
            while let Some(key) = pending.pop() {
                if reachable.contains(&key) {
                    continue;
                }
                let Some(slot) = entries.slots.get(&key) else {
                    continue;
                };
                pending.extend(children(slot.node.as_ref()));
                reachable.insert(key);
            }
            let detached: Vec<K> = entries
                .slots
                .keys()
                .filter(|key| !reachable.contains(*key))
                .cloned()
                .collect();
            let nodes: Vec<Rc<N>> = detached
                .iter()
                .filter_map(|key| entries.slots.remove(key))
                .map(|slot| slot.node)
                .collect();
            nodes
        };
        if unreachable.is_empty() {
            return;
        }
        tracing::trace!("Sweeping {} detached nodes", unreachable.len());
        for node in &unreachable {
            node.dispose();
        }
        self.slots.borrow_mut().released.clear();
    }

    /// Dispose every remaining node whatever its count
    ///
    /// Handles still alive afterwards release nothing.
    pub(crate) fn dispose_all(&self) {
        self.root.borrow_mut().take();
        let nodes: Vec<Rc<N>> = {
            let mut entries = self.slots.borrow_mut();
            entries.released.clear();
            entries.slots.drain().map(|(_, slot)| slot.node).collect()
        };
        for node in nodes {
            node.dispose();
        }
    }
}

/// Counted handle to a cached node
pub(crate) struct Counted<K, N>
where
    K: Eq + Hash + Clone,
    N: Dispose,
{
    key: K,
    node: Rc<N>,
    slots: Weak<Slots<K, N>>,
}

impl<K, N> Counted<K, N>
where
    K: Eq + Hash + Clone,
    N: Dispose,
{
    pub(crate) fn rc(&self) -> &Rc<N> {
        &self.node
    }

    pub(crate) fn key(&self) -> &K {
        &self.key
    }
}

impl<K, N> Deref for Counted<K, N>
where
    K: Eq + Hash + Clone,
    N: Dispose,
{
    type Target = N;

    fn deref(&self) -> &N {
        &self.node
    }
}

impl<K, N> Drop for Counted<K, N>
where
    K: Eq + Hash + Clone,
    N: Dispose,
{
    fn drop(&mut self) {
        let Some(slots) = self.slots.upgrade() else {
            return;
        };
        let released = {
            let mut entries = slots.borrow_mut();
            match entries.slots.get_mut(&self.key) {
                Some(slot) if Rc::ptr_eq(&slot.node, &self.node) => {
                    slot.count -= 1;
                    if slot.count == 0 {
                        entries.slots.remove(&self.key).map(|slot| slot.node)
                    } else {
                        entries.released.push(self.key.clone());
                        None
                    }
                }
                _ => None,
            }
        };
        if let Some(node) = released {
            node.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Disposals {
        disposed: Cell<usize>,
    }

    impl Dispose for Disposals {
        fn dispose(&self) {
            self.disposed.set(self.disposed.get() + 1);
        }
    }

    #[test]
    fn shared_until_last_release() {
        let cache: NodeCache<u32, Disposals> = NodeCache::new();
        let (a, created) = cache.acquire(1, Disposals::default);
        assert!(created);
        let (b, created) = cache.acquire(1, Disposals::default);
        assert!(!created);
        assert!(Rc::ptr_eq(a.rc(), b.rc()));
        assert_eq!(cache.count(&1), 2);

        let node = a.rc().clone();
        drop(a);
        assert_eq!(node.disposed.get(), 0);
        drop(b);
        assert_eq!(node.disposed.get(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn dispose_all_ignores_counts() {
        let cache: NodeCache<u32, Disposals> = NodeCache::new();
        let (a, _) = cache.acquire(1, Disposals::default);
        let node = a.rc().clone();
        cache.dispose_all();
        assert_eq!(node.disposed.get(), 1);

        drop(a);
        assert_eq!(node.disposed.get(), 1);
    }

    #[test]
    fn stale_handle_does_not_release_new_node() {
        let cache: NodeCache<u32, Disposals> = NodeCache::new();
        let (old, _) = cache.acquire(1, Disposals::default);
        cache.dispose_all();
        let (fresh, created) = cache.acquire(1, Disposals::default);
        assert!(created);

        drop(old);
        assert_eq!(cache.count(&1), 1);
        assert_eq!(fresh.disposed.get(), 0);
    }

    #[derive(Default)]
    struct Linked {
        links: RefCell<Vec<Counted<u32, Linked>>>,
        disposed: Cell<bool>,
    }

    impl Dispose for Linked {
        fn dispose(&self) {
            self.disposed.set(true);
            let links = mem::take(&mut *self.links.borrow_mut());
            drop(links);
        }
    }

    fn keys(node: &Linked) -> Vec<u32> {
        node.links.borrow().iter().map(|link| *link.key()).collect()
    }

    #[test]
    fn sweep_reclaims_detached_cycle() {
        let cache: NodeCache<u32, Linked> = NodeCache::new();
        let (root, _) = cache.acquire(1, Linked::default);
        cache.set_root(1);
        let (child, _) = cache.acquire(2, Linked::default);
        let (itself, _) = cache.acquire(2, Linked::default);
        child.links.borrow_mut().push(itself);
        root.links.borrow_mut().push(child);
        assert_eq!(cache.len(), 2);

        let detached = root.links.borrow_mut().pop().unwrap();
        let node = detached.rc().clone();
        drop(detached);
        assert_eq!(cache.count(&2), 1);

        cache.sweep(keys);
        assert!(node.disposed.get());
        assert_eq!(cache.len(), 1);
        assert!(!root.disposed.get());
    }

    #[test]
    fn sweep_keeps_shared_nodes() {
        let cache: NodeCache<u32, Linked> = NodeCache::new();
        let (root, _) = cache.acquire(1, Linked::default);
        cache.set_root(1);
        for _ in 0..2 {
            let (shared, _) = cache.acquire(2, Linked::default);
            root.links.borrow_mut().push(shared);
        }

        drop(root.links.borrow_mut().pop());
        cache.sweep(keys);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.count(&2), 1);
    }
}
