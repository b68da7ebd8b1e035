//! Event payloads and topic names for atom notifications.
//!
//! Every atom owns the bus namespace `atoms.<key>`:
//!
//! | Topic | Payload |
//! |-------|---------|
//! | `atoms.<key>.update` | [`AtomEvent::Update`] |
//! | `atoms.<key>.update.partial.<path>` | [`AtomEvent::Partial`] |
//! | `atoms.<key>.reset` | [`AtomEvent::Reset`] |
//! | `atoms.<key>.delete` | [`AtomEvent::Delete`] |

use serde_json::Value;

use crate::atom::Atom;
use crate::diff::PathChange;

/// Payload delivered on an atom's topics.
#[derive(Debug, Clone)]
pub enum AtomEvent {
    /// The whole value changed.
    Update { atom: Atom, new: Value, old: Value },
    /// One leaf path changed.
    Partial { atom: Atom, change: PathChange },
    /// The atom was reset to its default.
    Reset { atom: Atom },
    /// The atom is being destroyed.
    Delete { atom: Atom },
}

impl AtomEvent {
    /// The atom that emitted the event.
    #[must_use]
    pub fn atom(&self) -> &Atom {
        match self {
            Self::Update { atom, .. }
            | Self::Partial { atom, .. }
            | Self::Reset { atom }
            | Self::Delete { atom } => atom,
        }
    }
}

/// `atoms.<key>`
#[must_use]
pub fn namespace(key: &str) -> String {
    format!("atoms.{key}")
}

/// `atoms.<key>.update`
#[must_use]
pub fn update_topic(key: &str) -> String {
    format!("atoms.{key}.update")
}

/// `atoms.<key>.update.partial`, the namespace of all path watchers.
#[must_use]
pub fn partial_namespace(key: &str) -> String {
    format!("atoms.{key}.update.partial")
}

/// `atoms.<key>.update.partial.<path>`
#[must_use]
pub fn partial_topic(key: &str, path: &str) -> String {
    format!("atoms.{key}.update.partial.{path}")
}

/// `atoms.<key>.reset`
#[must_use]
pub fn reset_topic(key: &str) -> String {
    format!("atoms.{key}.reset")
}

/// `atoms.<key>.delete`
#[must_use]
pub fn delete_topic(key: &str) -> String {
    format!("atoms.{key}.delete")
}
