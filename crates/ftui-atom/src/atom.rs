#![forbid(unsafe_code)]

//! Keyed observable value cells.
//!
//! # Design
//!
//! An [`Atom`] is a cheap handle (`Rc`) to one keyed value. Every write goes
//! through a single pipeline:
//!
//! 1. resolve the next value (literal or `update_with` closure),
//! 2. skip if it equals the current value,
//! 3. run the `before_update` hook, skip again if the result is unchanged,
//! 4. store it (readers see it immediately),
//! 5. notify: the whole-value `update` event first, then one `partial`
//!    event per changed leaf for object and array atoms.
//!
//! With a debounced [`CommitPolicy`] step 5 is deferred to the owning
//! store's tick and coalesced across the burst.
//!
//! # Failure Modes
//!
//! - **Re-entrant hooks**: a `before_update` hook that writes to its own atom
//!   produces an unspecified interleaving of values and events.
//! - **Use after destroy**: reads keep working, writes store silently and no
//!   events are delivered. Callers should drop destroyed handles.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use ftui_events::{EventBus, Subscription};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::action::Action;
use crate::diff::diff;
use crate::error::{AtomError, Result};
use crate::event::{self, AtomEvent};
use crate::path;
use crate::scheduler::{CommitAction, CommitDebouncer, CommitPolicy};
use crate::store::{AtomStore, StoreInner};

/// Normalizes or validates a value before it is stored.
///
/// Receives `(next, current, atom)` and returns the value to store.
pub type BeforeUpdate = Rc<dyn Fn(Value, &Value, &Atom) -> Value>;

/// Computes reads instead of the default dot-path lookup.
///
/// Receives `(path, fallback, current)`.
pub type Getter = Rc<dyn Fn(&str, Value, &Value) -> Value>;

/// Whole-value change callback: `(new, old, atom)`.
pub type OnUpdate = Rc<dyn Fn(&Value, &Value, &Atom)>;

/// Shape of an atom's default value, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomKind {
    /// Anything that is not an object or an array.
    Scalar,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl AtomKind {
    /// Classify `value`.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
            _ => Self::Scalar,
        }
    }

    /// Whether values of this kind are diffed path by path.
    #[must_use]
    pub const fn is_composite(self) -> bool {
        !matches!(self, Self::Scalar)
    }
}

impl fmt::Display for AtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scalar => "scalar",
            Self::Array => "array",
            Self::Object => "object",
        })
    }
}

/// Behavior shared by an atom and every clone made from it.
#[derive(Clone, Default)]
pub(crate) struct AtomHooks {
    pub(crate) before_update: Option<BeforeUpdate>,
    pub(crate) getter: Option<Getter>,
    pub(crate) on_update: Option<OnUpdate>,
    pub(crate) actions: BTreeMap<String, Action>,
    pub(crate) commit: Option<CommitPolicy>,
}

/// Everything needed to create an atom.
///
/// ```ignore
/// let todos = store.atom(
///     AtomOptions::new("todos", json!([]))
///         .before_update(|next, _old, _atom| dedupe(next))
///         .commit(CommitPolicy::next_tick()),
/// )?;
/// ```
#[derive(Clone)]
pub struct AtomOptions {
    pub(crate) key: String,
    pub(crate) default: Value,
    pub(crate) hooks: AtomHooks,
}

impl fmt::Debug for AtomOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomOptions")
            .field("key", &self.key)
            .field("default", &self.default)
            .field("before_update", &self.hooks.before_update.is_some())
            .field("getter", &self.hooks.getter.is_some())
            .field("on_update", &self.hooks.on_update.is_some())
            .field("actions", &self.hooks.actions.keys().collect::<Vec<_>>())
            .field("commit", &self.hooks.commit)
            .finish()
    }
}

impl AtomOptions {
    /// Options for an atom named `key` starting at `default`.
    pub fn new(key: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            default: default.into(),
            hooks: AtomHooks::default(),
        }
    }

    /// Transform every value before it is stored.
    #[must_use]
    pub fn before_update(mut self, hook: impl Fn(Value, &Value, &Atom) -> Value + 'static) -> Self {
        self.hooks.before_update = Some(Rc::new(hook));
        self
    }

    /// Replace dot-path reads with a computed getter.
    #[must_use]
    pub fn getter(mut self, getter: impl Fn(&str, Value, &Value) -> Value + 'static) -> Self {
        self.hooks.getter = Some(Rc::new(getter));
        self
    }

    /// Listen to whole-value changes for the atom's whole life.
    #[must_use]
    pub fn on_update(mut self, callback: impl Fn(&Value, &Value, &Atom) + 'static) -> Self {
        self.hooks.on_update = Some(Rc::new(callback));
        self
    }

    /// Bind a named action; the atom is passed as its receiver.
    #[must_use]
    pub fn action(
        mut self,
        name: impl Into<String>,
        action: impl Fn(&Atom, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.hooks.actions.insert(name.into(), Rc::new(action));
        self
    }

    /// Override the store's commit policy for this atom.
    #[must_use]
    pub fn commit(mut self, policy: CommitPolicy) -> Self {
        self.hooks.commit = Some(policy);
        self
    }

    /// Key the atom will be registered under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

struct AtomState {
    value: Value,
    debouncer: Option<CommitDebouncer>,
    destroyed: bool,
}

pub(crate) struct AtomInner {
    key: String,
    kind: AtomKind,
    default: Value,
    commit: CommitPolicy,
    state: RefCell<AtomState>,
    pub(crate) hooks: AtomHooks,
    // Keeps the `on_update` hook's listener so a displaced atom can drop it.
    hook: RefCell<Option<Subscription>>,
    bus: EventBus<AtomEvent>,
    store: Weak<StoreInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Notify,
    Silent,
}

/// A keyed, observable value.
///
/// Cloning an `Atom` creates another handle to the **same** cell; use
/// [`clone_atom`](Self::clone_atom) for an independent copy.
///
/// # Invariants
///
/// 1. Writing a value equal to the current one emits nothing.
/// 2. The whole-value event of a write precedes its partial events.
/// 3. Watchers of one path fire in registration order.
/// 4. After [`destroy`](Self::destroy) no listener registered on the atom is
///    invoked again.
#[derive(Clone)]
pub struct Atom {
    inner: Rc<AtomInner>,
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Atom")
            .field("key", &self.inner.key)
            .field("kind", &self.inner.kind)
            .field("value", &state.value)
            .field("pending_commit", &state.debouncer.as_ref().is_some_and(CommitDebouncer::is_pending))
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

impl Atom {
    pub(crate) fn new(
        options: AtomOptions,
        store_commit: CommitPolicy,
        bus: EventBus<AtomEvent>,
        store: Weak<StoreInner>,
    ) -> Self {
        let AtomOptions {
            key,
            default,
            hooks,
        } = options;
        let commit = hooks.commit.unwrap_or(store_commit);
        let atom = Self {
            inner: Rc::new(AtomInner {
                kind: AtomKind::of(&default),
                state: RefCell::new(AtomState {
                    value: default.clone(),
                    debouncer: commit.debouncer(),
                    destroyed: false,
                }),
                key,
                default,
                commit,
                hooks,
                hook: RefCell::new(None),
                bus,
                store,
            }),
        };
        if let Some(callback) = atom.inner.hooks.on_update.clone() {
            let subscription = atom.on_change(move |new, old, atom| callback(new, old, atom));
            *atom.inner.hook.borrow_mut() = Some(subscription);
        }
        atom
    }

    /// Registry key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Shape of the default value.
    #[must_use]
    pub fn kind(&self) -> AtomKind {
        self.inner.kind
    }

    /// Snapshot of the default value taken at creation.
    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.inner.default
    }

    /// Clone of the current value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.inner.state.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this atom.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.inner.state.borrow().value)
    }

    /// Effective commit policy.
    #[must_use]
    pub fn commit_policy(&self) -> CommitPolicy {
        self.inner.commit
    }

    /// Whether [`destroy`](Self::destroy) has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.state.borrow().destroyed
    }

    /// Whether both handles refer to the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Atom) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -- writes -------------------------------------------------------------

    /// Replace the value and notify.
    pub fn update(&self, next: impl Into<Value>) {
        self.write(next.into(), Delivery::Notify);
    }

    /// Compute the next value from `(current, atom)` and notify.
    pub fn update_with(&self, f: impl FnOnce(&Value, &Atom) -> Value) {
        let current = self.value();
        let next = f(&current, self);
        self.write(next, Delivery::Notify);
    }

    /// Replace the value without emitting update or partial events.
    ///
    /// On a debounced atom with a pending commit, the silent write lands in
    /// that burst: the deferred `update` reports the value current at commit
    /// time against the value the burst started from.
    pub fn silent_update(&self, next: impl Into<Value>) {
        self.write(next.into(), Delivery::Silent);
    }

    /// Silent counterpart of [`update_with`](Self::update_with).
    ///
    /// Folds into a pending debounced burst like
    /// [`silent_update`](Self::silent_update).
    pub fn silent_update_with(&self, f: impl FnOnce(&Value, &Atom) -> Value) {
        let current = self.value();
        let next = f(&current, self);
        self.write(next, Delivery::Silent);
    }

    /// Set `value` at the dot-path `path` and update with the result.
    ///
    /// # Errors
    ///
    /// [`AtomError::InvalidOperationKind`] on scalar atoms.
    pub fn change(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_composite("change")?;
        let mut next = self.value();
        path::set(&mut next, path, value.into());
        self.update(next);
        Ok(())
    }

    /// Shallow-merge `partial` into an object value.
    ///
    /// # Errors
    ///
    /// [`AtomError::InvalidOperationKind`] unless the atom is an object atom
    /// currently holding an object.
    pub fn merge(&self, partial: Map<String, Value>) -> Result<()> {
        self.ensure_kind(AtomKind::Object, "merge")?;
        let mut next = match self.value() {
            Value::Object(map) => map,
            other => return Err(self.shape_mismatch("merge", &other)),
        };
        next.extend(partial);
        self.update(Value::Object(next));
        Ok(())
    }

    /// Restore the default value, then emit `reset`.
    ///
    /// The `reset` event fires even when the value already was the default.
    pub fn reset(&self) {
        self.write(self.inner.default.clone(), Delivery::Notify);
        self.emit_reset();
    }

    /// Restore the default value without update events; `reset` still fires.
    pub fn silent_reset(&self) {
        self.write(self.inner.default.clone(), Delivery::Silent);
        self.emit_reset();
    }

    fn write(&self, next: Value, delivery: Delivery) {
        let old = self.value();
        if next == old {
            return;
        }
        let next = match &self.inner.hooks.before_update {
            Some(hook) => hook(next, &old, self),
            None => next,
        };
        if next == old {
            return;
        }

        let (deferred, destroyed) = {
            let mut state = self.inner.state.borrow_mut();
            state.value = next.clone();
            let destroyed = state.destroyed;
            let deferred = match (delivery, state.debouncer.as_mut()) {
                (Delivery::Notify, Some(debouncer)) if !destroyed => {
                    debouncer.schedule_at(&old, Instant::now());
                    true
                }
                _ => false,
            };
            (deferred, destroyed)
        };
        trace!(key = self.key(), ?delivery, deferred, "atom write");

        // A successor may already own this key's namespace.
        if delivery == Delivery::Notify && !deferred && !destroyed {
            self.emit_update(&next, &old);
        }
    }

    fn emit_update(&self, new: &Value, old: &Value) {
        let key = self.key();
        let bus = &self.inner.bus;
        bus.trigger(
            &event::update_topic(key),
            &AtomEvent::Update {
                atom: self.clone(),
                new: new.clone(),
                old: old.clone(),
            },
        );

        if !self.inner.kind.is_composite()
            || bus.namespace_listener_count(&event::partial_namespace(key)) == 0
        {
            return;
        }
        for change in diff(old, new) {
            let topic = event::partial_topic(key, &change.path);
            bus.trigger(
                &topic,
                &AtomEvent::Partial {
                    atom: self.clone(),
                    change,
                },
            );
        }
    }

    fn emit_reset(&self) {
        if self.is_destroyed() {
            return;
        }
        self.inner.bus.trigger(
            &event::reset_topic(self.key()),
            &AtomEvent::Reset { atom: self.clone() },
        );
    }

    // -- commits ------------------------------------------------------------

    /// Whether a deferred notification is waiting for the next tick.
    #[must_use]
    pub fn has_pending_commit(&self) -> bool {
        self.inner
            .state
            .borrow()
            .debouncer
            .as_ref()
            .is_some_and(CommitDebouncer::is_pending)
    }

    /// Deliver a pending deferred notification now.
    ///
    /// Returns `true` if events were emitted.
    pub fn flush(&self) -> bool {
        self.commit_at(Instant::now(), true)
    }

    pub(crate) fn commit_at(&self, now: Instant, force: bool) -> bool {
        let action = {
            let mut state = self.inner.state.borrow_mut();
            match state.debouncer.as_mut() {
                Some(debouncer) if force => debouncer.flush_at(now),
                Some(debouncer) => debouncer.tick_at(now),
                None => CommitAction::None,
            }
        };
        let CommitAction::Commit { base, elapsed } = action else {
            return false;
        };
        let current = self.value();
        if current == base {
            trace!(key = self.key(), "burst settled on its starting value");
            return false;
        }
        debug!(
            key = self.key(),
            debounce_ms = elapsed.as_millis() as u64,
            "deferred commit delivered"
        );
        self.emit_update(&current, &base);
        true
    }

    pub(crate) fn time_until_commit(&self, now: Instant) -> Option<Duration> {
        self.inner
            .state
            .borrow()
            .debouncer
            .as_ref()
            .and_then(|d| d.time_until_commit(now))
    }

    // -- reads --------------------------------------------------------------

    /// Read the value at `path`, or `null` when absent.
    #[must_use]
    pub fn get(&self, path: &str) -> Value {
        self.get_or(path, Value::Null)
    }

    /// Read the value at `path`, or `fallback` when absent.
    ///
    /// A custom getter, when configured, decides instead.
    #[must_use]
    pub fn get_or(&self, path: &str, fallback: Value) -> Value {
        if let Some(getter) = self.inner.hooks.getter.clone() {
            let current = self.value();
            return getter(path, fallback, &current);
        }
        self.with(|value| path::get(value, path).cloned())
            .unwrap_or(fallback)
    }

    /// Read and deserialize the value at `path`.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        serde_json::from_value(self.get(path)).ok()
    }

    // -- subscriptions ------------------------------------------------------

    /// Listen to whole-value changes: `(new, old, atom)`.
    pub fn on_change(&self, callback: impl Fn(&Value, &Value, &Atom) + 'static) -> Subscription {
        self.inner
            .bus
            .subscribe(event::update_topic(self.key()), move |event| {
                if let AtomEvent::Update { atom, new, old } = event {
                    callback(new, old, atom);
                }
            })
    }

    /// Listen to changes of the leaf at `path`: `(new, old)`.
    ///
    /// `new` is `None` when the path was removed and `old` is `None` when it
    /// was added. Watchers on scalar atoms never fire.
    pub fn watch(
        &self,
        path: &str,
        callback: impl Fn(Option<&Value>, Option<&Value>) + 'static,
    ) -> Subscription {
        self.inner
            .bus
            .subscribe(event::partial_topic(self.key(), path), move |event| {
                if let AtomEvent::Partial { change, .. } = event {
                    callback(change.new.as_ref(), change.old.as_ref());
                }
            })
    }

    /// Listen to resets, including silent ones.
    pub fn on_reset(&self, callback: impl Fn(&Atom) + 'static) -> Subscription {
        self.inner
            .bus
            .subscribe(event::reset_topic(self.key()), move |event| {
                callback(event.atom());
            })
    }

    /// Listen for destruction.
    pub fn on_destroy(&self, callback: impl Fn(&Atom) + 'static) -> Subscription {
        self.inner
            .bus
            .subscribe(event::delete_topic(self.key()), move |event| {
                callback(event.atom());
            })
    }

    /// Number of watchers registered on exactly `path`.
    #[must_use]
    pub fn watcher_count(&self, path: &str) -> usize {
        self.inner
            .bus
            .listener_count(&event::partial_topic(self.key(), path))
    }

    // -- lifecycle ----------------------------------------------------------

    /// Emit `delete`, release every listener in the atom's namespace, and
    /// unregister from the store.
    ///
    /// A pending deferred commit is dropped. Destroying twice is a no-op.
    /// An atom displaced under [`DuplicateKeyPolicy::Replace`] is already
    /// destroyed, so this does nothing to its replacement.
    ///
    /// [`DuplicateKeyPolicy::Replace`]: crate::DuplicateKeyPolicy::Replace
    pub fn destroy(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            if let Some(debouncer) = state.debouncer.as_mut() {
                debouncer.cancel();
            }
        }

        let key = self.key();
        drop(self.inner.hook.borrow_mut().take());
        self.inner.bus.trigger(
            &event::delete_topic(key),
            &AtomEvent::Delete { atom: self.clone() },
        );
        let released = self.inner.bus.unsubscribe_namespace(&event::namespace(key));
        if let Some(store) = self.inner.store.upgrade().map(AtomStore::from_inner) {
            store.unregister(self);
        }
        debug!(key, released, "atom destroyed");
    }

    /// Take this atom out of service after another atom replaced it under
    /// the same key.
    ///
    /// Marks it destroyed, drops a pending commit, and releases its
    /// `on_update` hook. The key's topics now belong to the replacement, so
    /// no `delete` is emitted and no other listener is touched.
    pub(crate) fn retire(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            if let Some(debouncer) = state.debouncer.as_mut() {
                debouncer.cancel();
            }
        }
        let hook = self.inner.hook.borrow_mut().take();
        if let Some(hook) = hook {
            hook.unsubscribe();
        }
        debug!(key = self.key(), "displaced atom retired");
    }

    /// Register an independent copy seeded from the current value.
    ///
    /// The copy gets a generated key, uses the current value as its default,
    /// and shares this atom's hooks, actions, and commit policy.
    ///
    /// # Errors
    ///
    /// [`AtomError::Detached`] if the owning store no longer exists.
    pub fn clone_atom(&self) -> Result<Atom> {
        let store = self
            .inner
            .store
            .upgrade()
            .ok_or_else(|| AtomError::Detached {
                key: self.key().to_owned(),
            })?;
        AtomStore::from_inner(store).fork(self)
    }

    pub(crate) fn hooks(&self) -> &AtomHooks {
        &self.inner.hooks
    }

    pub(crate) fn fork_options(&self, key: String) -> AtomOptions {
        let mut hooks = self.inner.hooks.clone();
        hooks.commit = Some(self.inner.commit);
        AtomOptions {
            key,
            default: self.value(),
            hooks,
        }
    }

    pub(crate) fn ensure_kind(&self, kind: AtomKind, operation: &'static str) -> Result<()> {
        if self.inner.kind == kind {
            Ok(())
        } else {
            Err(self.invalid_kind(operation))
        }
    }

    fn ensure_composite(&self, operation: &'static str) -> Result<()> {
        if self.inner.kind.is_composite() {
            Ok(())
        } else {
            Err(self.invalid_kind(operation))
        }
    }

    fn invalid_kind(&self, operation: &'static str) -> AtomError {
        AtomError::InvalidOperationKind {
            key: self.key().to_owned(),
            operation,
            kind: self.inner.kind,
        }
    }

    /// Error for an atom whose live value no longer has its creation shape.
    pub(crate) fn shape_mismatch(&self, operation: &'static str, value: &Value) -> AtomError {
        AtomError::InvalidOperationKind {
            key: self.key().to_owned(),
            operation,
            kind: AtomKind::of(value),
        }
    }
}
