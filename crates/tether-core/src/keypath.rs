#![forbid(unsafe_code)]

//! Dotted keypath access over JSON data.
//!
//! A keypath such as `"user.address.city"` addresses a nested value. Numeric
//! segments index into arrays (`"items.0.title"`).
//!
//! # Invariants
//!
//! 1. `get` never allocates and never mutates.
//! 2. `set` creates missing or `null` intermediates as empty objects.
//! 3. A `null` intermediate resolves the whole path to `null`, an absent one
//!    to `None`. Callers treat `None` as "undefined" and `Some(Null)` as a
//!    real value.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Empty path | `""` | `KeypathError::EmptyPath` |
//! | Empty segment | `"a..b"`, `"a."` | `KeypathError::EmptySegment` |
//! | Scalar intermediate | `"count.x"` where `count` is a number | `KeypathError::NotAContainer` |
//! | Array index gap | index past `len` | `KeypathError::NotAContainer` |

use serde_json::{Map, Value};

/// Errors from keypath writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeypathError {
    /// The keypath was the empty string.
    EmptyPath,
    /// The keypath contained an empty segment.
    EmptySegment { path: String },
    /// A segment could not be descended into or assigned.
    NotAContainer { path: String },
}

impl std::fmt::Display for KeypathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "keypath is empty"),
            Self::EmptySegment { path } => write!(f, "keypath '{path}' has an empty segment"),
            Self::NotAContainer { path } => {
                write!(f, "value at '{path}' is not an object or array")
            }
        }
    }
}

impl std::error::Error for KeypathError {}

/// Resolve `path` against `data`.
///
/// Returns `None` when any segment is absent.
#[must_use]
pub fn get<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(data, |node, segment| match node {
        Value::Null => Some(node),
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `value` at `path`, creating intermediate objects as needed.
pub fn set(data: &mut Value, path: &str, value: Value) -> Result<(), KeypathError> {
    if path.is_empty() {
        return Err(KeypathError::EmptyPath);
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(KeypathError::EmptySegment {
            path: path.to_owned(),
        });
    }
    let (last, parents) = segments.split_last().ok_or(KeypathError::EmptyPath)?;

    let mut node = data;
    for (depth, segment) in parents.iter().enumerate() {
        node = descend(node, segment).ok_or_else(|| KeypathError::NotAContainer {
            path: segments[..=depth].join("."),
        })?;
    }

    match node {
        Value::Object(map) => {
            map.insert((*last).to_owned(), value);
            Ok(())
        }
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => {
                items[i] = value;
                Ok(())
            }
            Ok(i) if i == items.len() => {
                items.push(value);
                Ok(())
            }
            _ => Err(KeypathError::NotAContainer {
                path: path.to_owned(),
            }),
        },
        _ => Err(KeypathError::NotAContainer {
            path: path.to_owned(),
        }),
    }
}

/// Whether `path` resolves to a value (including `null`).
#[must_use]
pub fn contains(data: &Value, path: &str) -> bool {
    get(data, path).is_some()
}

/// Proper ancestors of `path`, deepest first: `"a.b.c"` yields `"a.b"`, `"a"`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    let mut rest = path;
    std::iter::from_fn(move || {
        let idx = rest.rfind('.')?;
        rest = &rest[..idx];
        Some(rest)
    })
}

fn descend<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    let slot = match node {
        Value::Object(map) => map.entry(segment.to_owned()).or_insert(Value::Null),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i))?,
        _ => return None,
    };
    if slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    if !(slot.is_object() || slot.is_array()) {
        return None;
    }
    Some(slot)
}
