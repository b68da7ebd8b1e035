//! Errors returned by atom and store operations.

use std::fmt;

use crate::atom::AtomKind;

/// Result alias for fallible atom operations.
pub type Result<T> = std::result::Result<T, AtomError>;

/// Errors from atom creation and mutation.
///
/// Value writes themselves (`update`, `reset`, the silent variants) never
/// fail; errors come from registry conflicts and from operations that do not
/// apply to the atom's [`AtomKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomError {
    /// Another atom is already registered under this key.
    DuplicateKey { key: String },
    /// The key cannot be used as an event namespace.
    InvalidKey { key: String, reason: &'static str },
    /// The operation requires a different value shape.
    InvalidOperationKind {
        key: String,
        operation: &'static str,
        kind: AtomKind,
    },
    /// An item index past the end of an array atom.
    IndexOutOfBounds { key: String, index: usize, len: usize },
    /// No action with this name was bound at creation.
    UnknownAction { key: String, action: String },
    /// The store that owned the atom has been dropped.
    Detached { key: String },
}

impl fmt::Display for AtomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { key } => write!(
                f,
                "an atom is already defined with the key '{key}', use another key for this atom"
            ),
            Self::InvalidKey { key, reason } => write!(f, "invalid atom key '{key}': {reason}"),
            Self::InvalidOperationKind {
                key,
                operation,
                kind,
            } => write!(f, "'{operation}' is not supported on {kind} atom '{key}'"),
            Self::IndexOutOfBounds { key, index, len } => {
                write!(f, "index {index} out of bounds for atom '{key}' of length {len}")
            }
            Self::UnknownAction { key, action } => {
                write!(f, "atom '{key}' has no action named '{action}'")
            }
            Self::Detached { key } => write!(f, "atom '{key}' is no longer attached to a store"),
        }
    }
}

impl std::error::Error for AtomError {}
