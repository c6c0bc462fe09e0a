//! Attribute path walking over untyped JSON
//!
//! Two flavours are provided:
//!
//! - [`take_items`] descends through a response page, iterating every list
//!   met on the way, and moves the items found at the end of the path into
//!   an output vector.
//! - [`lookup`] follows nested objects down to a single value, used to read
//!   grouping attributes out of one item.
//!
//! Both are bounded by the path length; neither follows references found in
//! the data itself.

use serde_json::Value;
use tracing::{debug, error, warn};

/// Move the items found at `path` inside `value` into `out`.
///
/// Each path element names an attribute of an object. When the attribute
/// holds a list every element is walked with the rest of the path, so
/// `["Reservations", "Instances"]` collects the instances of every
/// reservation. A single object where a list is expected is treated as a
/// one-element list; `null` contributes nothing.
///
/// A missing attribute stops that branch only. It is logged as an error
/// when `required` is set and as a warning otherwise; it never fails the
/// whole page.
///
/// Returns the number of items appended.
pub fn take_items<S: AsRef<str>>(
    value: Value,
    path: &[S],
    required: bool,
    out: &mut Vec<Value>,
) -> usize {
    let before = out.len();
    descend(value, path, required, out);
    out.len() - before
}

fn descend<S: AsRef<str>>(value: Value, path: &[S], required: bool, out: &mut Vec<Value>) {
    let Some((head, rest)) = path.split_first() else {
        out.push(value);
        return;
    };
    let attribute = head.as_ref();

    let child = match value {
        Value::Object(mut map) => map.remove(attribute),
        _ => None,
    };

    let Some(child) = child else {
        if required {
            error!("Attribute {} not found. It must exist.", attribute);
        } else {
            warn!("Attribute {} not found. It is optional.", attribute);
        }
        return;
    };

    match child {
        Value::Array(elements) => {
            debug!("Attribute {} holds {} elements", attribute, elements.len());
            for element in elements {
                descend(element, rest, required, out);
            }
        }
        Value::Null => debug!("Attribute {} is null", attribute),
        other => descend(other, rest, required, out),
    }
}

/// Follow `path` through nested objects and return the value at its end.
///
/// Returns `None` when any element is missing, when an intermediate value
/// is not an object, or when the final value is `null`. An empty path
/// returns `value` itself.
pub fn lookup<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        current = current.as_object()?.get(part.as_ref())?;
    }
    (!current.is_null()).then_some(current)
}

/// Truthiness of a JSON value: `null`, `false`, zero and empty
/// strings/lists/objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Render a grouping value as a metric-name label.
/// Booleans render as `True`/`False`.
pub fn label_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Uppercase the first character and lowercase the rest ("RUNNING" -> "Running")
pub fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
