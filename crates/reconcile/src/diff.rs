//! Structural diff between normalized payload trees
//!
//! Entries describe how to get from `actual` to `expected`: `+` is a key only
//! `expected` has, `-` a key only `actual` has, `~` a changed value. Arrays are
//! compared position by position.

use crate::error::{Error, Result};
use crate::tree;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of a diff entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffOp {
    Add,
    Remove,
    Change,
}

impl DiffOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Remove => "-",
            Self::Change => "~",
        }
    }
}

impl fmt::Display for DiffOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One `(op, path, old, new)` tuple
///
/// `old` is `None` for additions and `new` is `None` for removals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub op: DiffOp,
    pub path: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl DiffEntry {
    fn add(path: String, new: &Value) -> Self {
        Self {
            op: DiffOp::Add,
            path,
            old: None,
            new: Some(new.clone()),
        }
    }

    fn remove(path: String, old: &Value) -> Self {
        Self {
            op: DiffOp::Remove,
            path,
            old: Some(old.clone()),
            new: None,
        }
    }

    fn change(path: String, old: &Value, new: &Value) -> Self {
        Self {
            op: DiffOp::Change,
            path,
            old: Some(old.clone()),
            new: Some(new.clone()),
        }
    }
}

/// Diff two normalized trees.
///
/// `subject` names the resource in the error raised when the fast equality
/// check and the full walk disagree.
pub fn diff(expected: &Value, actual: &Value, subject: &str) -> Result<Vec<DiffEntry>> {
    if tree::loose_eq(expected, actual) {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    walk(actual, expected, "", &mut entries);

    if entries.is_empty() {
        return Err(Error::EmptyDiff(subject.to_string()));
    }
    Ok(entries)
}

fn walk(old: &Value, new: &Value, path: &str, out: &mut Vec<DiffEntry>) {
    match (old, new) {
        (Value::Object(o), Value::Object(n)) => walk_objects(o, n, path, out),
        (Value::Array(o), Value::Array(n)) => {
            for (index, (l, r)) in o.iter().zip(n).enumerate() {
                walk(l, r, &index_path(path, index), out);
            }
            for (index, l) in o.iter().enumerate().skip(n.len()) {
                out.push(DiffEntry::remove(index_path(path, index), l));
            }
            for (index, r) in n.iter().enumerate().skip(o.len()) {
                out.push(DiffEntry::add(index_path(path, index), r));
            }
        }
        _ => {
            if !tree::loose_eq(old, new) {
                out.push(DiffEntry::change(path.to_string(), old, new));
            }
        }
    }
}

fn walk_objects(old: &Map<String, Value>, new: &Map<String, Value>, path: &str, out: &mut Vec<DiffEntry>) {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        let child = key_path(path, key);
        match (old.get(key), new.get(key)) {
            (Some(l), Some(r)) => walk(l, r, &child, out),
            (Some(l), None) => out.push(DiffEntry::remove(child, l)),
            (None, Some(r)) => out.push(DiffEntry::add(child, r)),
            (None, None) => {}
        }
    }
}

fn key_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}
