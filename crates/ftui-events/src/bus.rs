#![forbid(unsafe_code)]

//! Topic-based event bus with namespace release.
//!
//! # Design
//!
//! [`EventBus<E>`] maps dotted topic strings (`"atoms.todo.update"`) to
//! ordered listener lists. Every listener receives `&E` when its topic is
//! triggered. The bus is a cheap handle: cloning it shares the same topic
//! table, so producers and consumers can each hold one.
//!
//! Topics are matched exactly. A *namespace* is a topic prefix ending at a
//! segment boundary: the namespace `"atoms.todo"` covers `"atoms.todo"` and
//! `"atoms.todo.update.partial.title"`, but not `"atoms.todos.update"`.
//!
//! # Failure Modes
//!
//! - **Unsubscribe during trigger**: the listener list is snapshotted before
//!   callbacks run. Each listener also carries an `active` flag that is
//!   cleared on unsubscribe, so a listener released mid-trigger (by itself,
//!   by a sibling, or through [`EventBus::unsubscribe_namespace`]) is skipped
//!   for the rest of that trigger.
//! - **Subscribe during trigger**: new listeners take effect on the next
//!   trigger of the topic.
//! - **Bus dropped before subscription**: [`Subscription::unsubscribe`] still
//!   marks the listener inactive and is otherwise a no-op.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

type Callback<E> = Rc<dyn Fn(&E)>;

struct Listener<E> {
    id: u64,
    active: Rc<Cell<bool>>,
    callback: Callback<E>,
}

struct BusInner<E> {
    topics: HashMap<String, Vec<Listener<E>>>,
    next_id: u64,
}

impl<E> BusInner<E> {
    fn detach(&mut self, topic: &str, id: u64) -> Option<Listener<E>> {
        let listeners = self.topics.get_mut(topic)?;
        let pos = listeners.iter().position(|l| l.id == id)?;
        let listener = listeners.remove(pos);
        if listeners.is_empty() {
            self.topics.remove(topic);
        }
        Some(listener)
    }
}

/// A shared, single-threaded publish/subscribe bus.
///
/// # Invariants
///
/// 1. Listeners on one topic fire in subscription order.
/// 2. A released listener is never invoked again, including later in a
///    trigger that is already in progress.
/// 3. Topics with no listeners are removed from the table.
pub struct EventBus<E> {
    inner: Rc<RefCell<BusInner<E>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let listeners: usize = inner.topics.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("topics", &inner.topics.len())
            .field("listeners", &listeners)
            .finish()
    }
}

impl<E: 'static> EventBus<E> {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(BusInner {
                topics: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Register `callback` for `topic`.
    ///
    /// The returned [`Subscription`] is the only way to release the listener
    /// individually; dropping it leaves the listener registered.
    pub fn subscribe(&self, topic: impl Into<String>, callback: impl Fn(&E) + 'static) -> Subscription {
        let topic = topic.into();
        let active = Rc::new(Cell::new(true));
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.topics.entry(topic.clone()).or_default().push(Listener {
                id,
                active: Rc::clone(&active),
                callback: Rc::new(callback),
            });
            id
        };
        trace!(topic = topic.as_str(), id, "listener subscribed");

        let weak: Weak<RefCell<BusInner<E>>> = Rc::downgrade(&self.inner);
        let detach_topic = topic.clone();
        let detach: Box<dyn FnOnce()> = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                let removed = inner.borrow_mut().detach(&detach_topic, id);
                drop(removed);
            }
        });
        Subscription {
            topic,
            active,
            detach: RefCell::new(Some(detach)),
        }
    }

    /// Invoke every active listener of `topic` with `event`.
    ///
    /// Returns the number of listeners invoked.
    pub fn trigger(&self, topic: &str, event: &E) -> usize {
        let snapshot: Vec<(Rc<Cell<bool>>, Callback<E>)> = {
            let inner = self.inner.borrow();
            let Some(listeners) = inner.topics.get(topic) else {
                return 0;
            };
            listeners
                .iter()
                .map(|l| (Rc::clone(&l.active), Rc::clone(&l.callback)))
                .collect()
        };

        let mut delivered = 0;
        for (active, callback) in &snapshot {
            if active.get() {
                callback(event);
                delivered += 1;
            }
        }
        trace!(topic, delivered, "topic triggered");
        delivered
    }

    /// Release every listener whose topic lies in the `prefix` namespace.
    ///
    /// Returns the number of listeners released.
    pub fn unsubscribe_namespace(&self, prefix: &str) -> usize {
        let released: Vec<Listener<E>> = {
            let mut inner = self.inner.borrow_mut();
            let doomed: Vec<String> = inner
                .topics
                .keys()
                .filter(|topic| in_namespace(topic, prefix))
                .cloned()
                .collect();
            doomed
                .iter()
                .filter_map(|topic| inner.topics.remove(topic))
                .flatten()
                .collect()
        };
        for listener in &released {
            listener.active.set(false);
        }
        debug!(namespace = prefix, released = released.len(), "namespace released");
        // Callbacks are dropped here, after the table borrow ends.
        released.len()
    }

    /// Number of listeners registered for exactly `topic`.
    #[must_use]
    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner.borrow().topics.get(topic).map_or(0, Vec::len)
    }

    /// Number of listeners registered anywhere in the `prefix` namespace.
    #[must_use]
    pub fn namespace_listener_count(&self, prefix: &str) -> usize {
        self.inner
            .borrow()
            .topics
            .iter()
            .filter(|(topic, _)| in_namespace(topic, prefix))
            .map(|(_, listeners)| listeners.len())
            .sum()
    }

    /// Number of topics with at least one listener.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.inner.borrow().topics.len()
    }

    /// Whether no listener is registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().topics.is_empty()
    }
}

/// Whether `topic` equals `prefix` or continues it past a `.` boundary.
#[must_use]
pub fn in_namespace(topic: &str, prefix: &str) -> bool {
    match topic.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

/// Handle to one registered listener.
///
/// Unlike a guard, dropping a `Subscription` does **not** release the
/// listener. Call [`unsubscribe`](Self::unsubscribe), or convert it with
/// [`into_guard`](Self::into_guard) to tie the listener to a scope.
pub struct Subscription {
    topic: String,
    active: Rc<Cell<bool>>,
    detach: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    /// Release the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        self.active.set(false);
        let detach = self.detach.borrow_mut().take();
        if let Some(detach) = detach {
            detach();
        }
    }

    /// Whether the listener can still be invoked.
    ///
    /// Becomes `false` after [`unsubscribe`](Self::unsubscribe) or once the
    /// listener's namespace has been released.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Convert into a guard that unsubscribes when dropped.
    #[must_use]
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { subscription: self }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("active", &self.active.get())
            .finish_non_exhaustive()
    }
}

/// RAII guard that releases its listener on drop.
#[derive(Debug)]
pub struct SubscriptionGuard {
    subscription: Subscription,
}

impl SubscriptionGuard {
    /// Whether the guarded listener can still be invoked.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
