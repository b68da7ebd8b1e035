//! Dot-path access into JSON-like values.
//!
//! A path is a sequence of segments joined by `.`: `"user.address.city"`.
//! Object members are addressed by name and array elements by decimal
//! index (`"items.0.title"`). The empty path addresses the value itself.
//!
//! Member names that themselves contain `.` cannot be addressed and flatten
//! into ambiguous paths.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

/// Furthest past the end of an array that [`set`] pads with `null`.
///
/// A numeric segment beyond this is treated as a member name instead, so the
/// array is replaced by an object.
pub const MAX_ARRAY_PADDING: usize = 1024;

/// Look up the value at `path`.
///
/// Returns `None` when a segment is missing, an array index is out of range
/// or not numeric, or a scalar is traversed.
#[must_use]
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |cursor, segment| match cursor {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `value` at `path`, creating intermediate containers as needed.
///
/// Missing or scalar intermediates become objects. A numeric segment into an
/// existing array indexes it, padding with `null` when past the end by at
/// most [`MAX_ARRAY_PADDING`] elements. Any other segment on an array,
/// including an index further out, replaces the array with an object.
pub fn set(target: &mut Value, path: &str, value: Value) {
    let mut cursor = target;
    if !path.is_empty() {
        for segment in path.split('.') {
            cursor = child_mut(cursor, segment);
        }
    }
    *cursor = value;
}

fn child_mut<'a>(cursor: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = match &*cursor {
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .filter(|&index| index <= items.len().saturating_add(MAX_ARRAY_PADDING)),
        _ => None,
    };
    match (cursor, index) {
        (Value::Array(items), Some(index)) => {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[index]
        }
        (cursor, _) => {
            if !cursor.is_object() {
                // Indexing `null` by name converts it into an empty object.
                *cursor = Value::Null;
            }
            &mut cursor[segment]
        }
    }
}

/// Flatten `value` into `path -> leaf` pairs.
///
/// Objects and arrays expand down to scalar leaves. Nested empty containers
/// are kept as leaves so that clearing a sub-tree is observable; a root-level
/// container contributes nothing of its own, and a scalar root is the single
/// leaf at the empty path.
#[must_use]
pub fn flatten(value: &Value) -> BTreeMap<String, &Value> {
    let mut out = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                flatten_into(child, name.clone(), &mut out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, index.to_string(), &mut out);
            }
        }
        leaf => {
            out.insert(String::new(), leaf);
        }
    }
    out
}

fn flatten_into<'a>(value: &'a Value, prefix: String, out: &mut BTreeMap<String, &'a Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (name, child) in map {
                flatten_into(child, format!("{prefix}.{name}"), out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, format!("{prefix}.{index}"), out);
            }
        }
        leaf => {
            if out.insert(prefix.clone(), leaf).is_some() {
                trace!(path = %prefix, "flattened path collides with a dotted member name");
            }
        }
    }
}
