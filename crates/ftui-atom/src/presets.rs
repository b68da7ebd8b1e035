//! Ready-made atoms for common UI state.
//!
//! Each constructor registers a plain [`Atom`] with a fixed value shape and
//! a set of named actions, invoked through [`Atom::call`]:
//!
//! | Constructor | Value | Actions |
//! |---|---|---|
//! | [`open_atom`] | `bool` | `toggle`, `open`, `close` |
//! | [`loading_atom`] | `bool` | `start_loading`, `stop_loading`, `toggle_loading` |
//! | [`fetching_atom`] | `{is_loading, data, error, pagination}` | `start_loading`, `stop_loading`, `success`, `failed`, `append`, `prepend` |
//! | [`portal_atom`] | `{opened, data}` | `open`, `close`, `toggle` |

use serde_json::{Map, Value, json};

use crate::action::arg;
use crate::atom::{Atom, AtomOptions};
use crate::error::Result;
use crate::store::AtomStore;

/// Key suffix used by [`portal_atom`].
pub const PORTAL_SUFFIX: &str = "-portal";

fn flag(atom: &Atom) -> bool {
    atom.with(|v| v.as_bool().unwrap_or(false))
}

/// A boolean open/closed atom.
///
/// # Errors
///
/// Registration errors from [`AtomStore::atom`].
pub fn open_atom(store: &AtomStore, key: &str, opened: bool) -> Result<Atom> {
    store.atom(
        AtomOptions::new(key, opened)
            .action("toggle", |atom, _| {
                atom.update(!flag(atom));
                Ok(atom.value())
            })
            .action("open", |atom, _| {
                atom.update(true);
                Ok(Value::Bool(true))
            })
            .action("close", |atom, _| {
                atom.update(false);
                Ok(Value::Bool(false))
            }),
    )
}

/// A boolean loading flag.
///
/// # Errors
///
/// Registration errors from [`AtomStore::atom`].
pub fn loading_atom(store: &AtomStore, key: &str, loading: bool) -> Result<Atom> {
    store.atom(
        AtomOptions::new(key, loading)
            .action("start_loading", |atom, _| {
                atom.update(true);
                Ok(Value::Bool(true))
            })
            .action("stop_loading", |atom, _| {
                atom.update(false);
                Ok(Value::Bool(false))
            })
            .action("toggle_loading", |atom, _| {
                atom.update(!flag(atom));
                Ok(atom.value())
            }),
    )
}

/// Request state for data fetched from elsewhere.
///
/// The value is `{is_loading, data, error, pagination}` with `error` and
/// `pagination` starting as `null`. Every action except `start_loading`
/// clears `is_loading`.
///
/// - `success(data, pagination)`: store both.
/// - `failed(error)`: store the error, keep the data.
/// - `append(items)` / `prepend(items)`: concatenate onto an array `data`;
///   a `null` `data` counts as empty and a non-array `items` as one item.
///
/// # Errors
///
/// Registration errors from [`AtomStore::atom`].
pub fn fetching_atom(store: &AtomStore, key: &str, data: Value, fetching: bool) -> Result<Atom> {
    let default = json!({
        "is_loading": fetching,
        "data": data,
        "error": null,
        "pagination": null,
    });
    store.atom(
        AtomOptions::new(key, default)
            .action("start_loading", |atom, _| {
                atom.change("is_loading", true)?;
                Ok(Value::Null)
            })
            .action("stop_loading", |atom, _| {
                atom.change("is_loading", false)?;
                Ok(Value::Null)
            })
            .action("success", |atom, args| {
                atom.merge(fields([
                    ("is_loading", Value::Bool(false)),
                    ("data", arg(args, 0)),
                    ("pagination", arg(args, 1)),
                ]))?;
                Ok(Value::Null)
            })
            .action("failed", |atom, args| {
                atom.merge(fields([
                    ("is_loading", Value::Bool(false)),
                    ("error", arg(args, 0)),
                ]))?;
                Ok(Value::Null)
            })
            .action("append", |atom, args| {
                let mut data = as_items(atom.get("data"));
                data.extend(as_items(arg(args, 0)));
                atom.merge(fields([
                    ("is_loading", Value::Bool(false)),
                    ("data", Value::Array(data)),
                ]))?;
                Ok(Value::Null)
            })
            .action("prepend", |atom, args| {
                let mut data = as_items(arg(args, 0));
                data.extend(as_items(atom.get("data")));
                atom.merge(fields([
                    ("is_loading", Value::Bool(false)),
                    ("data", Value::Array(data)),
                ]))?;
                Ok(Value::Null)
            }),
    )
}

/// Visibility plus payload for a modal, popover, or dropdown.
///
/// Registered under `<name>-portal` with value `{opened, data}`. `open` and
/// `toggle` take the payload as their first argument; without one the
/// payload becomes `{}`.
///
/// # Errors
///
/// Registration errors from [`AtomStore::atom`].
pub fn portal_atom(store: &AtomStore, name: &str, opened: bool) -> Result<Atom> {
    store.atom(
        AtomOptions::new(
            format!("{name}{PORTAL_SUFFIX}"),
            json!({"opened": opened, "data": {}}),
        )
        .action("open", |atom, args| {
            open_portal(atom, args)?;
            Ok(Value::Bool(true))
        })
        .action("close", |atom, _| {
            atom.change("opened", false)?;
            Ok(Value::Bool(false))
        })
        .action("toggle", |atom, args| {
            if atom.get("opened").as_bool().unwrap_or(false) {
                atom.change("opened", false)?;
                return Ok(Value::Bool(false));
            }
            open_portal(atom, args)?;
            Ok(Value::Bool(true))
        }),
    )
}

fn open_portal(atom: &Atom, args: &[Value]) -> Result<()> {
    let data = match arg(args, 0) {
        Value::Null => Value::Object(Map::new()),
        data => data,
    };
    atom.merge(fields([("opened", Value::Bool(true)), ("data", data)]))
}

fn fields<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
}

fn as_items(value: Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    }
}
