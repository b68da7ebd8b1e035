//! Scoped atom copies.
//!
//! An [`AtomScope`] gives one part of an application private copies of a
//! set of atoms, still addressed by the keys of the atoms they were cloned
//! from. Writes inside the scope never reach the source atoms.

use std::collections::HashMap;

use tracing::debug;

use crate::atom::Atom;
use crate::error::Result;
use crate::store::AtomStore;

/// Independent clones of a set of atoms, keyed by source key.
#[derive(Debug, Default)]
pub struct AtomScope {
    clones: HashMap<String, Atom>,
    /// Source keys in clone order.
    order: Vec<String>,
}

impl AtomScope {
    /// Clone every atom currently registered in `store`.
    ///
    /// # Errors
    ///
    /// Propagates [`Atom::clone_atom`] failures; clones made before the
    /// failure are destroyed again.
    pub fn from_store(store: &AtomStore) -> Result<Self> {
        Self::from_atoms(&store.atoms())
    }

    /// Clone each of `atoms`.
    ///
    /// # Errors
    ///
    /// As [`from_store`](Self::from_store).
    pub fn from_atoms(atoms: &[Atom]) -> Result<Self> {
        let mut scope = Self::default();
        for atom in atoms {
            match atom.clone_atom() {
                Ok(copy) => scope.insert(atom.key().to_owned(), copy),
                Err(err) => {
                    scope.destroy();
                    return Err(err);
                }
            }
        }
        debug!(atoms = scope.len(), "atom scope created");
        Ok(scope)
    }

    fn insert(&mut self, key: String, atom: Atom) {
        if self.clones.insert(key.clone(), atom).is_none() {
            self.order.push(key);
        }
    }

    /// The scoped copy of the atom originally registered as `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Atom> {
        self.clones.get(key)
    }

    /// Source keys in clone order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    /// Number of scoped copies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clones.len()
    }

    /// Whether the scope holds no copies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clones.is_empty()
    }

    /// Destroy every scoped copy and empty the scope.
    pub fn destroy(&mut self) {
        for key in self.order.drain(..) {
            if let Some(atom) = self.clones.remove(&key) {
                atom.destroy();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AtomError, AtomOptions};
    use serde_json::json;

    #[test]
    fn scope_copies_are_independent() {
        let store = AtomStore::new();
        let theme = store.atom(AtomOptions::new("theme", "dark")).unwrap();
        store.atom(AtomOptions::new("user", json!({"id": 1}))).unwrap();

        let scope = AtomScope::from_store(&store).unwrap();
        assert_eq!(scope.keys(), ["theme".to_string(), "user".to_string()]);

        let scoped = scope.get("theme").unwrap();
        assert_ne!(scoped.key(), "theme");
        scoped.update("light");
        assert_eq!(theme.value(), json!("dark"));
        assert_eq!(scope.get("user").unwrap().get("id"), json!(1));
    }

    #[test]
    fn destroy_unregisters_copies_only() {
        let store = AtomStore::new();
        store.atom(AtomOptions::new("a", 1)).unwrap();
        let mut scope = AtomScope::from_store(&store).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(scope.len(), 1);
        assert!(!scope.is_empty());

        scope.destroy();
        assert!(scope.is_empty());
        assert_eq!(store.keys(), vec!["a".to_string()]);
    }

    #[test]
    fn detached_atom_fails_the_whole_scope() {
        let store = AtomStore::new();
        let live = store.atom(AtomOptions::new("live", 1)).unwrap();
        let orphan = {
            let other = AtomStore::new();
            other.atom(AtomOptions::new("orphan", 1)).unwrap()
        };

        let err = AtomScope::from_atoms(&[live, orphan]).unwrap_err();
        assert!(matches!(err, AtomError::Detached { .. }));
        assert_eq!(store.keys(), vec!["live".to_string()]);
    }
}
