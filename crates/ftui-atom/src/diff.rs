//! Leaf-level diff between two values.
//!
//! Both sides are [flattened](crate::path::flatten) into `path -> leaf`
//! maps and compared path by path. A leaf compares equal only when it is
//! the same scalar (or the same empty container); there is no deep
//! comparison beyond that, because flattening already reduced both sides to
//! leaves.
//!
//! # Invariants
//!
//! 1. Every path whose leaf differs between `old` and `new` yields exactly
//!    one [`PathChange`]; every other path yields none.
//! 2. Removed paths carry `new: None`; added paths carry `old: None`.
//! 3. Output order: removed-or-changed paths in path order, then added
//!    paths in path order.

use serde_json::Value;

use crate::path::flatten;

/// One changed leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct PathChange {
    /// Dot-path of the leaf.
    pub path: String,
    /// Leaf after the write; `None` when the path was removed.
    pub new: Option<Value>,
    /// Leaf before the write; `None` when the path was added.
    pub old: Option<Value>,
}

impl PathChange {
    /// Whether the path did not exist before the write.
    #[must_use]
    pub fn is_addition(&self) -> bool {
        self.old.is_none()
    }

    /// Whether the path no longer exists after the write.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.new.is_none()
    }
}

/// Compute the changed leaves between `old` and `new`.
#[must_use]
pub fn diff(old: &Value, new: &Value) -> Vec<PathChange> {
    let before = flatten(old);
    let after = flatten(new);

    let mut changes = Vec::new();
    for (path, &old_leaf) in &before {
        match after.get(path) {
            None => changes.push(PathChange {
                path: path.clone(),
                new: None,
                old: Some(old_leaf.clone()),
            }),
            Some(&new_leaf) if new_leaf != old_leaf => changes.push(PathChange {
                path: path.clone(),
                new: Some(new_leaf.clone()),
                old: Some(old_leaf.clone()),
            }),
            Some(_) => {}
        }
    }
    for (path, &new_leaf) in &after {
        if !before.contains_key(path) {
            changes.push(PathChange {
                path: path.clone(),
                new: Some(new_leaf.clone()),
                old: None,
            });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(changes: &[PathChange]) -> Vec<&str> {
        changes.iter().map(|c| c.path.as_str()).collect()
    }

    #[test]
    fn identical_values_have_no_changes() {
        let v = json!({"a": {"b": [1, 2]}, "c": "x"});
        assert!(diff(&v, &v.clone()).is_empty());
    }

    #[test]
    fn changed_leaf_reports_both_sides() {
        let changes = diff(&json!({"count": 0, "name": "x"}), &json!({"count": 5, "name": "x"}));
        assert_eq!(
            changes,
            vec![PathChange {
                path: "count".into(),
                new: Some(json!(5)),
                old: Some(json!(0)),
            }]
        );
    }

    #[test]
    fn removal_and_addition() {
        let changes = diff(&json!({"a": 1, "b": 2}), &json!({"b": 2, "c": 3}));
        assert_eq!(paths(&changes), vec!["a", "c"]);
        assert!(changes[0].is_removal());
        assert_eq!(changes[0].old, Some(json!(1)));
        assert!(changes[1].is_addition());
        assert_eq!(changes[1].new, Some(json!(3)));
    }

    #[test]
    fn nested_paths() {
        let changes = diff(
            &json!({"user": {"name": "a", "tags": ["x"]}}),
            &json!({"user": {"name": "b", "tags": ["x", "y"]}}),
        );
        assert_eq!(paths(&changes), vec!["user.name", "user.tags.1"]);
    }

    #[test]
    fn clearing_subtree_reports_leaves_and_empty_container() {
        let changes = diff(&json!({"a": {"b": 1}}), &json!({"a": {}}));
        assert_eq!(paths(&changes), vec!["a.b", "a"]);
        assert_eq!(changes[1].new, Some(json!({})));
    }

    #[test]
    fn type_change_counts_as_change() {
        let changes = diff(&json!({"a": 1}), &json!({"a": "1"}));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn array_values_diff_by_index() {
        let changes = diff(&json!([1, 2, 3]), &json!([1, 3]));
        assert_eq!(paths(&changes), vec!["1", "2"]);
        assert_eq!(changes[1].new, None);
    }
}
