//! Change notification primitives
//!
//! - [`EventSource`]: an explicit observer list raising events synchronously
//! - [`Subscription`]: RAII guard that unsubscribes exactly once
//! - [`ObjectEvent`]: the notification shapes raised by objects
//!
//! Handlers run on the thread that raises the event. Emission works on a
//! snapshot of the handler list, so handlers may subscribe, unsubscribe or
//! mutate the graph reentrantly; a handler unsubscribed during an emission is
//! not called afterwards in that emission.

use crate::value::Key;
use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Notification raised by an object after a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectEvent {
    /// Member changed; `None` means all members may have changed
    PropertyChanged(Option<Arc<str>>),

    /// Item inserted at index
    Add { index: usize },

    /// Item removed from index
    Remove { index: usize },

    /// Item at index replaced
    Replace { index: usize },

    /// Item moved between indices
    Move { from: usize, to: usize },

    /// Collection changed wholesale
    Reset,

    /// Map entry inserted, replaced or removed
    EntryChanged { key: Key },
}

impl ObjectEvent {
    /// Property change for a named member
    #[inline]
    #[must_use]
    pub fn property(name: impl Into<Arc<str>>) -> Self {
        Self::PropertyChanged(Some(name.into()))
    }

    /// Check if this is a structural collection change
    #[inline]
    #[must_use]
    pub fn is_collection_change(&self) -> bool {
        !matches!(self, Self::PropertyChanged(_))
    }
}

struct HandlerEntry<T> {
    id: u64,
    alive: Cell<bool>,
    callback: Box<dyn Fn(&T)>,
}

struct Handlers<T> {
    next_id: u64,
    entries: Vec<Rc<HandlerEntry<T>>>,
}

/// Observer list for events of type `T`
pub struct EventSource<T> {
    handlers: Rc<RefCell<Handlers<T>>>,
}

impl<T: 'static> EventSource<T> {
    /// Create source without handlers
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Rc::new(RefCell::new(Handlers {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a handler
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let entry = {
            let mut handlers = self.handlers.borrow_mut();
            let id = handlers.next_id;
            handlers.next_id += 1;
            let entry = Rc::new(HandlerEntry {
                id,
                alive: Cell::new(true),
                callback: Box::new(callback),
            });
            handlers.entries.push(entry.clone());
            entry
        };

        let handlers: Weak<RefCell<Handlers<T>>> = Rc::downgrade(&self.handlers);
        Subscription::new(move || {
            entry.alive.set(false);
            if let Some(handlers) = handlers.upgrade() {
                handlers.borrow_mut().entries.retain(|e| e.id != entry.id);
            }
        })
    }

    /// Raise an event to all live handlers
    pub fn emit(&self, args: &T) {
        let snapshot: Vec<Rc<HandlerEntry<T>>> = self.handlers.borrow().entries.clone();
        for entry in snapshot {
            if entry.alive.get() {
                (entry.callback)(args);
            }
        }
    }

    /// Number of registered handlers
    #[inline]
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().entries.len()
    }
}

impl<T: 'static> Default for EventSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for EventSource<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("handlers", &self.handlers.borrow().entries.len())
            .finish()
    }
}

/// Registration guard
///
/// Unsubscribes exactly once: on [`Subscription::unsubscribe`] or on drop,
/// whichever comes first.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap an unsubscribe action
    #[inline]
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Subscription that does nothing
    #[inline]
    pub fn empty() -> Self {
        Self { unsubscribe: None }
    }

    /// Check if the unsubscribe action is still pending
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }

    /// Unsubscribe now
    #[inline]
    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
