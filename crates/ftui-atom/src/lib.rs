#![forbid(unsafe_code)]

//! Keyed observable state atoms for FrankenTUI.
//!
//! # Role in FrankenTUI
//! `ftui-atom` is the shared-state layer: a registry of uniquely keyed value
//! cells that notify subscribers when they change. View-binding code reads
//! an atom's value, subscribes to whole-value or single-path changes, and
//! pushes new values back in. Notifications travel over an
//! [`ftui_events::EventBus`] owned by the store.
//!
//! # Primary responsibilities
//! - **AtomStore**: explicit registry context; lookup, listing, teardown,
//!   and the tick that drives deferred commits.
//! - **Atom**: the update pipeline (no-op guard, `before_update` hook, store,
//!   notify), dot-path reads, watchers, reset, destroy, and cloning.
//! - **Partial diff**: leaf-level change detection so a watcher on
//!   `user.name` ignores edits to `user.age`.
//! - **Commit scheduler**: per-atom debounce that coalesces write bursts into
//!   one notification.
//! - **Facades**: array helpers, named actions, preset atoms, scoped clones.
//!
//! ```ignore
//! use ftui_atom::{AtomOptions, AtomStore};
//! use serde_json::json;
//!
//! let store = AtomStore::new();
//! let user = store.atom(AtomOptions::new("user", json!({"name": "", "age": 0})))?;
//! let _sub = user.watch("name", |new, _old| println!("name is now {new:?}"));
//! user.change("name", "Ada")?;   // fires the watcher
//! user.change("age", 36)?;       // does not
//! ```

pub mod action;
pub mod atom;
pub mod collection;
pub mod config;
pub mod diff;
pub mod error;
pub mod event;
pub mod path;
pub mod presets;
pub mod scheduler;
pub mod scope;
pub mod store;

pub use action::{Action, BoundAction, arg};
pub use atom::{Atom, AtomKind, AtomOptions, BeforeUpdate, Getter, OnUpdate};
pub use config::{ConfigError, ConfigParse, DuplicateKeyPolicy, StoreConfig};
pub use diff::{PathChange, diff};
pub use error::{AtomError, Result};
pub use event::AtomEvent;
pub use ftui_events::{EventBus, Subscription, SubscriptionGuard};
pub use presets::{fetching_atom, loading_atom, open_atom, portal_atom};
pub use scheduler::CommitPolicy;
pub use scope::AtomScope;
pub use store::AtomStore;
