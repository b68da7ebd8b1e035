//! Atom registry and commit driver.
//!
//! [`AtomStore`] is the explicit context object that owns every atom of an
//! application: the key registry, the shared event bus, and the deferred
//! commit queue. Hosts create one store and pass handles around; cloning a
//! store shares the same registry.
//!
//! # Driving deferred commits
//!
//! Atoms with a debounced [`CommitPolicy`](crate::CommitPolicy) only
//! notify when the host loop calls [`AtomStore::tick`]. Use
//! [`AtomStore::time_until_commit`] to bound the loop's poll timeout:
//!
//! ```ignore
//! loop {
//!     let timeout = store
//!         .time_until_commit(Instant::now())
//!         .map_or(poll_timeout, |t| t.min(poll_timeout));
//!     handle_input(timeout);
//!     store.tick();
//! }
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ftui_events::EventBus;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::atom::{Atom, AtomOptions};
use crate::config::{DuplicateKeyPolicy, StoreConfig};
use crate::error::{AtomError, Result};
use crate::event::AtomEvent;

#[derive(Default)]
struct Registry {
    atoms: HashMap<String, Atom>,
    /// Keys in registration order.
    order: Vec<String>,
}

pub(crate) struct StoreInner {
    config: StoreConfig,
    bus: EventBus<AtomEvent>,
    registry: RefCell<Registry>,
    clone_seq: Cell<u64>,
}

/// Registry of live atoms.
///
/// # Invariants
///
/// 1. At most one atom is registered per key.
/// 2. Listing order is registration order.
/// 3. A destroyed atom is never returned by a lookup.
#[derive(Clone)]
pub struct AtomStore {
    inner: Rc<StoreInner>,
}

impl Default for AtomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AtomStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomStore")
            .field("config", &self.inner.config)
            .field("atoms", &self.keys())
            .field("bus", &self.inner.bus)
            .finish()
    }
}

impl AtomStore {
    /// Create a store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store with `config`.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                config,
                bus: EventBus::new(),
                registry: RefCell::new(Registry::default()),
                clone_seq: Cell::new(0),
            }),
        }
    }

    /// Create a store configured from `FTUI_ATOM_*` environment variables.
    ///
    /// Invalid variables are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let parsed = StoreConfig::from_env_with_diagnostics();
        for error in &parsed.errors {
            warn!(%error, "ignoring invalid atom store setting");
        }
        Self::with_config(parsed.config)
    }

    pub(crate) fn from_inner(inner: Rc<StoreInner>) -> Self {
        Self { inner }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The bus every atom of this store publishes on.
    #[must_use]
    pub fn bus(&self) -> &EventBus<AtomEvent> {
        &self.inner.bus
    }

    // -- registry -----------------------------------------------------------

    /// Create and register an atom.
    ///
    /// # Errors
    ///
    /// - [`AtomError::InvalidKey`] if the key is empty or contains `.`.
    /// - [`AtomError::DuplicateKey`] if the key is taken and the store
    ///   rejects duplicates.
    ///
    /// Under [`DuplicateKeyPolicy::Replace`] the previous atom is retired:
    /// it reads as destroyed, its pending commit is dropped, its `on_update`
    /// hook is released, and its writes no longer notify.
    pub fn atom(&self, options: AtomOptions) -> Result<Atom> {
        validate_key(options.key())?;
        let key = options.key().to_owned();

        let replaced = self.inner.registry.borrow().atoms.contains_key(&key);
        if replaced && self.inner.config.duplicate_keys == DuplicateKeyPolicy::Reject {
            return Err(AtomError::DuplicateKey { key });
        }

        let atom = Atom::new(
            options,
            self.inner.config.commit,
            self.inner.bus.clone(),
            Rc::downgrade(&self.inner),
        );

        let displaced = {
            let mut registry = self.inner.registry.borrow_mut();
            let displaced = registry.atoms.insert(key.clone(), atom.clone());
            if displaced.is_none() {
                registry.order.push(key.clone());
            }
            displaced
        };
        if let Some(displaced) = displaced {
            displaced.retire();
        }
        debug!(
            key = key.as_str(),
            kind = %atom.kind(),
            replaced,
            "atom registered"
        );
        Ok(atom)
    }

    /// Look up an atom by key.
    #[must_use]
    pub fn get_atom(&self, key: &str) -> Option<Atom> {
        self.inner.registry.borrow().atoms.get(key).cloned()
    }

    /// Current value of the atom registered under `key`.
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<Value> {
        self.get_atom(key).map(|atom| atom.value())
    }

    /// Whether an atom is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.registry.borrow().atoms.contains_key(key)
    }

    /// Number of registered atoms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registry.borrow().atoms.len()
    }

    /// Whether no atom is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered keys in registration order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.registry.borrow().order.clone()
    }

    /// Registered atoms in registration order.
    #[must_use]
    pub fn atoms(&self) -> Vec<Atom> {
        let registry = self.inner.registry.borrow();
        registry
            .order
            .iter()
            .filter_map(|key| registry.atoms.get(key).cloned())
            .collect()
    }

    /// Every atom's current value, keyed by atom key.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.atoms()
            .into_iter()
            .map(|atom| (atom.key().to_owned(), atom.value()))
            .collect()
    }

    /// Destroy every registered atom.
    pub fn clear(&self) {
        let atoms = self.atoms();
        let count = atoms.len();
        for atom in atoms {
            atom.destroy();
        }
        debug!(count, "atom store cleared");
    }

    pub(crate) fn unregister(&self, atom: &Atom) {
        let mut registry = self.inner.registry.borrow_mut();
        let owned = registry
            .atoms
            .get(atom.key())
            .is_some_and(|registered| registered.ptr_eq(atom));
        if owned {
            registry.atoms.remove(atom.key());
            registry.order.retain(|key| key != atom.key());
        }
    }

    pub(crate) fn fork(&self, source: &Atom) -> Result<Atom> {
        let key = loop {
            let n = self.inner.clone_seq.get() + 1;
            self.inner.clone_seq.set(n);
            let candidate = format!("{}-clone-{n}", source.key());
            if !self.contains(&candidate) {
                break candidate;
            }
        };
        debug!(source = source.key(), key = key.as_str(), "cloning atom");
        self.atom(source.fork_options(key))
    }

    // -- commits ------------------------------------------------------------

    /// Deliver every deferred commit that is due now.
    ///
    /// Returns the number of atoms that emitted events.
    pub fn tick(&self) -> usize {
        self.tick_at(Instant::now())
    }

    /// Deliver every deferred commit that is due at `now`.
    pub fn tick_at(&self, now: Instant) -> usize {
        self.atoms()
            .iter()
            .filter(|atom| atom.commit_at(now, false))
            .count()
    }

    /// Deliver every deferred commit regardless of its deadline.
    pub fn flush(&self) -> usize {
        let now = Instant::now();
        self.atoms()
            .iter()
            .filter(|atom| atom.commit_at(now, true))
            .count()
    }

    /// Shortest wait until a deferred commit becomes due, if any is pending.
    #[must_use]
    pub fn time_until_commit(&self, now: Instant) -> Option<Duration> {
        self.atoms()
            .iter()
            .filter_map(|atom| atom.time_until_commit(now))
            .min()
    }

    /// Whether any registered atom has a deferred commit.
    #[must_use]
    pub fn has_pending_commits(&self) -> bool {
        self.atoms().iter().any(Atom::has_pending_commit)
    }
}

fn validate_key(key: &str) -> Result<()> {
    let reason = if key.is_empty() {
        "key must not be empty"
    } else if key.contains('.') {
        "key must not contain '.'"
    } else {
        return Ok(());
    };
    Err(AtomError::InvalidKey {
        key: key.to_owned(),
        reason,
    })
}
