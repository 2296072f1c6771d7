#![forbid(unsafe_code)]

//! Event bus with named events, one-shot listeners and bulk removal.
//!
//! An [`Emitter`] maps event names to ordered listener lists. It backs both
//! the per-instance event bus and the change observer of a view-model.
//!
//! # Invariants
//!
//! 1. Listeners fire in registration order.
//! 2. `emit` snapshots the listener list before invoking anything, so
//!    listeners added during an emit do not fire for it, and listeners
//!    removed during an emit still fire for it.
//! 3. A `once` listener is detached before it runs and never fires twice.
//! 4. No `RefCell` borrow is held while a listener runs; listeners may
//!    freely call back into the same emitter.
//!
//! # Failure Modes
//!
//! - `off` for an unknown event or listener id is a no-op returning `0`.
//! - `emit` with no listeners returns `0`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use serde_json::Value;

/// Global counter for unique listener ids.
static LISTENER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an installed listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(LISTENER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Listener callback. Receives the full argument list of the emit.
pub type Handler = Rc<dyn Fn(&[Value])>;

#[derive(Clone)]
struct Entry {
    id: ListenerId,
    once: bool,
    handler: Handler,
}

/// Shared, clonable event bus handle.
#[derive(Clone, Default)]
pub struct Emitter {
    events: Rc<RefCell<AHashMap<String, Vec<Entry>>>>,
}

impl Emitter {
    /// Create an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    pub fn on(&self, event: &str, handler: impl Fn(&[Value]) + 'static) -> ListenerId {
        self.insert(event, Rc::new(handler), false)
    }

    /// Register an already shared handler for `event`.
    pub fn on_shared(&self, event: &str, handler: Handler) -> ListenerId {
        self.insert(event, handler, false)
    }

    /// Register `handler` for the next `event` only.
    pub fn once(&self, event: &str, handler: impl Fn(&[Value]) + 'static) -> ListenerId {
        self.insert(event, Rc::new(handler), true)
    }

    /// Remove listeners for `event`.
    ///
    /// With `Some(id)` only that listener is removed; with `None` every
    /// listener for the event is. Returns the number removed.
    pub fn off(&self, event: &str, listener: Option<ListenerId>) -> usize {
        let mut events = self.events.borrow_mut();
        let Some(entries) = events.get_mut(event) else {
            return 0;
        };
        let before = entries.len();
        match listener {
            Some(id) => entries.retain(|e| e.id != id),
            None => entries.clear(),
        }
        let removed = before - entries.len();
        if entries.is_empty() {
            events.remove(event);
        }
        removed
    }

    /// Remove every listener for every event.
    pub fn off_all(&self) -> usize {
        let mut events = self.events.borrow_mut();
        let removed = events.values().map(Vec::len).sum();
        events.clear();
        removed
    }

    /// Invoke every listener for `event` with `args`.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event: &str, args: &[Value]) -> usize {
        let snapshot = {
            let mut events = self.events.borrow_mut();
            let Some(entries) = events.get_mut(event) else {
                return 0;
            };
            let snapshot = entries.clone();
            entries.retain(|e| !e.once);
            if entries.is_empty() {
                events.remove(event);
            }
            snapshot
        };
        for entry in &snapshot {
            (entry.handler)(args);
        }
        snapshot.len()
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.events.borrow().get(event).map_or(0, Vec::len)
    }

    /// Whether any listener is registered for `event`.
    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    /// Whether the given listener is still registered for `event`.
    #[must_use]
    pub fn contains(&self, event: &str, listener: ListenerId) -> bool {
        self.events
            .borrow()
            .get(event)
            .is_some_and(|entries| entries.iter().any(|e| e.id == listener))
    }

    /// Whether two handles share the same listener table.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.events, &other.events)
    }

    fn insert(&self, event: &str, handler: Handler, once: bool) -> ListenerId {
        let id = ListenerId::next();
        self.events
            .borrow_mut()
            .entry(event.to_owned())
            .or_default()
            .push(Entry { id, once, handler });
        id
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events = self.events.borrow();
        f.debug_struct("Emitter")
            .field("events", &events.len())
            .field("listeners", &events.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
