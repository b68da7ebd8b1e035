//! Property-based invariant tests for the atom write pipeline.
//!
//! 1. Diff completeness: one partial notification per changed leaf path,
//!    none for unchanged paths.
//! 2. Writing the current value never emits.
//! 3. Reset restores the default after any write sequence.
//! 4. A debounced burst emits at most one update, carrying the final value.
//! 5. Dot-path set/get agree.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use ftui_atom::{AtomOptions, AtomStore, CommitPolicy, diff, path};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

// ── Strategies ────────────────────────────────────────────────────────────

fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-50i64..50).prop_map(|n| json!(n)),
        "[a-c]{0,2}".prop_map(Value::String),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-d]", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

fn object_strategy() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map("[a-d]", value_strategy(), 0..5)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

fn owned_leaves(value: &Value) -> BTreeMap<String, Value> {
    path::flatten(value)
        .into_iter()
        .map(|(path, leaf)| (path, leaf.clone()))
        .collect()
}

/// Paths whose leaf differs between the two flattened values.
fn changed_paths(old: &Value, new: &Value) -> BTreeSet<String> {
    let before = owned_leaves(old);
    let after = owned_leaves(new);
    before
        .keys()
        .chain(after.keys())
        .filter(|path| before.get(*path) != after.get(*path))
        .cloned()
        .collect()
}

// 1. Diff completeness

proptest! {
    #[test]
    fn diff_reports_exactly_the_changed_leaves(old in object_strategy(), new in object_strategy()) {
        let changes = diff(&old, &new);
        let reported: Vec<String> = changes.iter().map(|c| c.path.clone()).collect();
        let unique: BTreeSet<String> = reported.iter().cloned().collect();
        prop_assert_eq!(reported.len(), unique.len(), "duplicate paths in {:?}", reported);
        prop_assert_eq!(unique, changed_paths(&old, &new));

        for change in &changes {
            prop_assert!(change.new.is_some() || change.old.is_some());
            prop_assert_ne!(&change.new, &change.old);
        }
    }
}

proptest! {
    #[test]
    fn watchers_fire_once_per_changed_path(old in object_strategy(), new in object_strategy()) {
        let store = AtomStore::new();
        let atom = store.atom(AtomOptions::new("p", old.clone())).unwrap();

        let paths: BTreeSet<String> = owned_leaves(&old)
            .into_keys()
            .chain(owned_leaves(&new).into_keys())
            .collect();
        let fired: Rc<RefCell<Vec<String>>> = Rc::default();
        for path in &paths {
            let fired = Rc::clone(&fired);
            let path_owned = path.clone();
            let _ = atom.watch(path, move |_, _| fired.borrow_mut().push(path_owned.clone()));
        }

        atom.update(new.clone());
        let fired: BTreeSet<String> = fired.borrow().iter().cloned().collect();
        prop_assert_eq!(fired, changed_paths(&old, &new));
    }
}

// 2. No-op idempotence

proptest! {
    #[test]
    fn writing_current_value_never_emits(value in value_strategy()) {
        let store = AtomStore::new();
        let atom = store.atom(AtomOptions::new("same", value.clone())).unwrap();
        let hits = Rc::new(RefCell::new(0u32));
        let h = Rc::clone(&hits);
        let _sub = atom.on_change(move |_, _, _| *h.borrow_mut() += 1);

        atom.update(atom.value());
        atom.update(value.clone());
        prop_assert_eq!(*hits.borrow(), 0);
        prop_assert_eq!(atom.value(), value);
    }
}

// 3. Reset restores default

proptest! {
    #[test]
    fn reset_restores_default(
        default in object_strategy(),
        writes in proptest::collection::vec(("[a-d]", leaf_strategy()), 0..8),
    ) {
        let store = AtomStore::new();
        let atom = store.atom(AtomOptions::new("r", default.clone())).unwrap();
        for (key, leaf) in writes {
            atom.change(&key, leaf).unwrap();
        }
        atom.reset();
        prop_assert_eq!(atom.value(), default);
    }
}

// 4. Debounced bursts coalesce

proptest! {
    #[test]
    fn burst_emits_at_most_once(
        start in object_strategy(),
        writes in proptest::collection::vec(("[a-d]", leaf_strategy()), 1..8),
    ) {
        let store = AtomStore::new();
        let atom = store
            .atom(AtomOptions::new("b", start.clone()).commit(CommitPolicy::next_tick()))
            .unwrap();
        let seen: Rc<RefCell<Vec<(Value, Value)>>> = Rc::default();
        let s = Rc::clone(&seen);
        let _sub = atom.on_change(move |new, old, _| s.borrow_mut().push((new.clone(), old.clone())));

        for (key, leaf) in writes {
            atom.change(&key, leaf).unwrap();
        }
        let final_value = atom.value();
        store.flush();

        let seen = seen.borrow();
        if final_value == start {
            prop_assert!(seen.is_empty());
        } else {
            prop_assert_eq!(seen.len(), 1);
            prop_assert_eq!(&seen[0], &(final_value, start));
        }
    }
}

// 5. Dot-path set/get agree

proptest! {
    #[test]
    fn set_then_get_round_trips(
        mut target in object_strategy(),
        segments in proptest::collection::vec("[a-d]", 1..4),
        leaf in leaf_strategy(),
    ) {
        let dotted = segments.join(".");
        path::set(&mut target, &dotted, leaf.clone());
        prop_assert_eq!(path::get(&target, &dotted), Some(&leaf));
    }
}
