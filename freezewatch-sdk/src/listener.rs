//! Event loop hook points.
//!
//! A host GUI loop reports four transitions to its listeners. The monitor
//! only depends on these traits, never on a concrete toolkit.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Receives event loop transitions. Called on the GUI thread; implementations
/// must not block.
pub trait EventLoopListener: Send + Sync {
    /// The loop is about to dispatch an event.
    fn on_dispatch_begin(&self);

    /// The loop finished dispatching an event.
    fn on_dispatch_end(&self);

    /// The loop is about to sleep waiting for events.
    fn on_enter_idle(&self);

    /// The loop woke up from sleeping.
    fn on_exit_idle(&self);
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// The host event loop's registration surface.
pub trait EventDispatcher: Send + Sync {
    fn add_listener(&self, listener: Arc<dyn EventLoopListener>) -> ListenerId;

    /// Returns `true` if the listener was registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// A ready-made [`EventDispatcher`] a host loop can embed and fire from.
///
/// # Example
///
/// ```rust
/// use freezewatch_sdk::ListenerSet;
///
/// let listeners = ListenerSet::new();
///
/// // inside the host loop:
/// listeners.fire_dispatch_begin();
/// // ... handle the event ...
/// listeners.fire_dispatch_end();
/// ```
#[derive(Default)]
pub struct ListenerSet {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn EventLoopListener>)>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    fn for_each(&self, f: impl Fn(&dyn EventLoopListener)) {
        for (_, listener) in self.listeners.read().iter() {
            f(listener.as_ref());
        }
    }

    pub fn fire_dispatch_begin(&self) {
        self.for_each(|l| l.on_dispatch_begin());
    }

    pub fn fire_dispatch_end(&self) {
        self.for_each(|l| l.on_dispatch_end());
    }

    pub fn fire_enter_idle(&self) {
        self.for_each(|l| l.on_enter_idle());
    }

    pub fn fire_exit_idle(&self) {
        self.for_each(|l| l.on_exit_idle());
    }
}

impl EventDispatcher for ListenerSet {
    fn add_listener(&self, listener: Arc<dyn EventLoopListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}
