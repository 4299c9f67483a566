//! Helpers for walking and comparing payload trees

use serde_json::{Map, Value};

/// Read the value at `path`
pub fn get<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

/// Mutable access to the value at `path`
pub fn get_mut<'a>(value: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    path.iter()
        .try_fold(value, |current, key| current.get_mut(key))
}

/// Write `new` at `path`, creating intermediate objects.
///
/// Returns false when an intermediate value exists but is not an object.
pub fn set(value: &mut Value, path: &[&str], new: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        *value = new;
        return true;
    };

    let mut current = value;
    for key in parents {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let Some(object) = current.as_object_mut() else {
            return false;
        };
        current = object
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current.as_object_mut() {
        Some(object) => {
            object.insert((*last).to_string(), new);
            true
        }
        None => false,
    }
}

/// Remove and return the value at `path`
pub fn remove(value: &mut Value, path: &[&str]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    get_mut(value, parents)?.as_object_mut()?.remove(*last)
}

/// Remove and return the value at a dotted path like `options.silenced`
pub fn remove_dotted(value: &mut Value, dotted: &str) -> Option<Value> {
    let path: Vec<&str> = dotted.split('.').collect();
    remove(value, &path)
}

/// Structural equality where numbers compare by value, so `1 == 1.0`
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_eq(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| loose_eq(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, l)| y.get(key).is_some_and(|r| loose_eq(l, r)))
        }
        _ => a == b,
    }
}

fn numbers_eq(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    if let (Some(l), Some(r)) = (x.as_i64(), y.as_i64()) {
        return l == r;
    }
    if let (Some(l), Some(r)) = (x.as_u64(), y.as_u64()) {
        return l == r;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

/// Stable content key for values that are compared as unordered collections
pub fn content_key(value: &Value) -> blake3::Hash {
    // serde_json objects are BTreeMap backed, so serialization is canonical
    blake3::hash(value.to_string().as_bytes())
}
