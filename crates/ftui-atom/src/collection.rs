//! Array convenience operations.
//!
//! Every operation here reads the current array, builds a new one, and
//! writes it back with [`Atom::update`], so all notification and scheduling
//! rules of the write pipeline apply unchanged. Operations on atoms that are
//! not [`AtomKind::Array`] fail with
//! [`AtomError::InvalidOperationKind`](crate::AtomError::InvalidOperationKind),
//! as do operations on an array atom currently holding a non-array value.
//!
//! Removals that match nothing return early without writing, so they never
//! notify.

use serde_json::Value;

use crate::atom::{Atom, AtomKind};
use crate::error::{AtomError, Result};

impl Atom {
    fn items_for(&self, operation: &'static str) -> Result<Vec<Value>> {
        self.with_items(operation, <[Value]>::to_vec)
    }

    /// Run `f` on the live items; an array atom updated to another shape is
    /// rejected rather than treated as empty.
    fn with_items<R>(&self, operation: &'static str, f: impl FnOnce(&[Value]) -> R) -> Result<R> {
        self.ensure_kind(AtomKind::Array, operation)?;
        self.with(|value| match value {
            Value::Array(items) => Ok(f(items)),
            other => Err(self.shape_mismatch(operation, other)),
        })
    }

    /// Clone of the current items.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn items(&self) -> Result<Vec<Value>> {
        self.items_for("items")
    }

    /// Number of items.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn item_count(&self) -> Result<usize> {
        self.with_items("item_count", <[Value]>::len)
    }

    /// Append `item`.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn add_item(&self, item: impl Into<Value>) -> Result<()> {
        let mut items = self.items_for("add_item")?;
        items.push(item.into());
        self.update(Value::Array(items));
        Ok(())
    }

    /// Insert `item` at the front.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn prepend_item(&self, item: impl Into<Value>) -> Result<()> {
        let mut items = self.items_for("prepend_item")?;
        items.insert(0, item.into());
        self.update(Value::Array(items));
        Ok(())
    }

    /// Remove the item at `index`; out of range is a no-op.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn remove_item(&self, index: usize) -> Result<()> {
        let mut items = self.items_for("remove_item")?;
        if index >= items.len() {
            return Ok(());
        }
        items.remove(index);
        self.update(Value::Array(items));
        Ok(())
    }

    /// Remove the first item matching `predicate(item, index)`.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn remove_item_where(&self, predicate: impl Fn(&Value, usize) -> bool) -> Result<()> {
        let mut items = self.items_for("remove_item")?;
        let Some(index) = position(&items, &predicate) else {
            return Ok(());
        };
        items.remove(index);
        self.update(Value::Array(items));
        Ok(())
    }

    /// Remove the items at `indexes`; indexes out of range are ignored.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn remove_items(&self, indexes: &[usize]) -> Result<()> {
        self.remove_items_matching("remove_items", |_, index| indexes.contains(&index))
    }

    /// Remove every item matching `predicate(item, index)`.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn remove_items_where(&self, predicate: impl Fn(&Value, usize) -> bool) -> Result<()> {
        self.remove_items_matching("remove_items", predicate)
    }

    fn remove_items_matching(
        &self,
        operation: &'static str,
        predicate: impl Fn(&Value, usize) -> bool,
    ) -> Result<()> {
        let items = self.items_for(operation)?;
        let before = items.len();
        let kept: Vec<Value> = items
            .into_iter()
            .enumerate()
            .filter(|(index, item)| !predicate(item, *index))
            .map(|(_, item)| item)
            .collect();
        if kept.len() == before {
            return Ok(());
        }
        self.update(Value::Array(kept));
        Ok(())
    }

    /// Item at `index`.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn get_item(&self, index: usize) -> Result<Option<Value>> {
        self.with_items("get_item", |items| items.get(index).cloned())
    }

    /// First item matching `predicate(item, index)`.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn get_item_where(&self, predicate: impl Fn(&Value, usize) -> bool) -> Result<Option<Value>> {
        let items = self.items_for("get_item")?;
        Ok(position(&items, &predicate).map(|index| items[index].clone()))
    }

    /// Index of the first item matching `predicate(item, index)`.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn get_item_index(&self, predicate: impl Fn(&Value, usize) -> bool) -> Result<Option<usize>> {
        self.with_items("get_item_index", |items| position(items, &predicate))
    }

    /// Replace the item at `index`.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms and with
    /// [`AtomError::IndexOutOfBounds`] past the end.
    pub fn replace_item(&self, index: usize, item: impl Into<Value>) -> Result<()> {
        let mut items = self.items_for("replace_item")?;
        let len = items.len();
        let Some(slot) = items.get_mut(index) else {
            return Err(AtomError::IndexOutOfBounds {
                key: self.key().to_owned(),
                index,
                len,
            });
        };
        *slot = item.into();
        self.update(Value::Array(items));
        Ok(())
    }

    /// Replace every item with `f(item, index)`.
    ///
    /// # Errors
    ///
    /// Fails on non-array atoms.
    pub fn map(&self, f: impl Fn(Value, usize) -> Value) -> Result<()> {
        let items = self.items_for("map")?;
        let mapped = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| f(item, index))
            .collect();
        self.update(Value::Array(mapped));
        Ok(())
    }
}

fn position(items: &[Value], predicate: &impl Fn(&Value, usize) -> bool) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .position(|(index, item)| predicate(item, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AtomOptions, AtomStore};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn list(store: &AtomStore, default: Value) -> (Atom, Rc<Cell<u32>>) {
        let atom = store.atom(AtomOptions::new("list", default)).unwrap();
        let updates = Rc::new(Cell::new(0u32));
        let u = Rc::clone(&updates);
        let _sub = atom.on_change(move |_, _, _| u.set(u.get() + 1));
        (atom, updates)
    }

    #[test]
    fn add_and_prepend() {
        let store = AtomStore::new();
        let (atom, updates) = list(&store, json!([2]));
        atom.add_item(3).unwrap();
        atom.prepend_item(1).unwrap();
        assert_eq!(atom.value(), json!([1, 2, 3]));
        assert_eq!(atom.item_count().unwrap(), 3);
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn remove_by_index() {
        let store = AtomStore::new();
        let (atom, updates) = list(&store, json!([1, 2, 3]));
        atom.remove_item(1).unwrap();
        assert_eq!(atom.value(), json!([1, 3]));

        atom.remove_item(99).unwrap();
        assert_eq!(atom.value(), json!([1, 3]));
        assert_eq!(updates.get(), 1);
    }

    #[test]
    fn remove_by_predicate_without_match_is_silent() {
        let store = AtomStore::new();
        let (atom, updates) = list(&store, json!([1, 2, 3]));
        atom.remove_item_where(|item, _| item == &json!(99)).unwrap();
        atom.remove_item_where(|_, index| index == 99).unwrap();
        assert_eq!(atom.value(), json!([1, 2, 3]));
        assert_eq!(updates.get(), 0);
    }

    #[test]
    fn remove_item_where_removes_first_match_only() {
        let store = AtomStore::new();
        let (atom, _) = list(&store, json!([1, 2, 1]));
        atom.remove_item_where(|item, _| item == &json!(1)).unwrap();
        assert_eq!(atom.value(), json!([2, 1]));
    }

    #[test]
    fn remove_many() {
        let store = AtomStore::new();
        let (atom, updates) = list(&store, json!([0, 1, 2, 3, 4]));
        atom.remove_items(&[0, 2, 40]).unwrap();
        assert_eq!(atom.value(), json!([1, 3, 4]));
        atom.remove_items_where(|item, _| item.as_i64().is_some_and(|n| n > 2)).unwrap();
        assert_eq!(atom.value(), json!([1]));
        atom.remove_items(&[7]).unwrap();
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn reads() {
        let store = AtomStore::new();
        let (atom, _) = list(&store, json!([{"id": 1}, {"id": 2}]));
        assert_eq!(atom.get_item(1).unwrap(), Some(json!({"id": 2})));
        assert_eq!(atom.get_item(5).unwrap(), None);
        assert_eq!(
            atom.get_item_where(|item, _| item["id"] == 1).unwrap(),
            Some(json!({"id": 1}))
        );
        assert_eq!(atom.get_item_index(|item, _| item["id"] == 2).unwrap(), Some(1));
        assert_eq!(atom.get_item_index(|item, _| item["id"] == 3).unwrap(), None);
    }

    #[test]
    fn replace_and_map() {
        let store = AtomStore::new();
        let (atom, _) = list(&store, json!([1, 2, 3]));
        atom.replace_item(0, 10).unwrap();
        assert_eq!(atom.value(), json!([10, 2, 3]));

        atom.map(|item, index| json!(item.as_i64().unwrap_or(0) + index as i64))
            .unwrap();
        assert_eq!(atom.value(), json!([10, 3, 5]));

        assert_eq!(
            atom.replace_item(3, 0),
            Err(AtomError::IndexOutOfBounds {
                key: "list".into(),
                index: 3,
                len: 3,
            })
        );
    }

    #[test]
    fn array_ops_fail_on_other_kinds() {
        let store = AtomStore::new();
        let scalar = store.atom(AtomOptions::new("flag", true)).unwrap();
        let object = store.atom(AtomOptions::new("obj", json!({}))).unwrap();
        for atom in [&scalar, &object] {
            assert!(matches!(
                atom.add_item(1),
                Err(AtomError::InvalidOperationKind { operation: "add_item", .. })
            ));
            assert!(atom.map(|v, _| v).is_err());
            assert!(atom.get_item(0).is_err());
        }
        assert_eq!(scalar.value(), json!(true));
    }

    #[test]
    fn array_ops_reject_a_live_value_of_another_shape() {
        let store = AtomStore::new();
        let (atom, updates) = list(&store, json!([1]));
        atom.update("x");
        assert_eq!(updates.get(), 1);

        assert!(matches!(
            atom.add_item(2),
            Err(AtomError::InvalidOperationKind {
                operation: "add_item",
                kind: AtomKind::Scalar,
                ..
            })
        ));
        assert!(atom.item_count().is_err());
        assert!(atom.get_item_index(|_, _| true).is_err());
        assert_eq!(atom.value(), json!("x"));
        assert_eq!(updates.get(), 1);
    }

    #[test]
    fn item_watchers_see_index_paths() {
        let store = AtomStore::new();
        let (atom, _) = list(&store, json!(["a", "b"]));
        let seen = Rc::new(Cell::new(false));
        let s = Rc::clone(&seen);
        let _w = atom.watch("1", move |new, old| {
            assert_eq!(new, Some(&json!("c")));
            assert_eq!(old, Some(&json!("b")));
            s.set(true);
        });
        atom.replace_item(1, "c").unwrap();
        assert!(seen.get());
    }
}
