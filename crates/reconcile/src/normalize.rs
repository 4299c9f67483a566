//! Normalization of expected/actual pairs before diffing
//!
//! The provider echoes back fields nobody declared: server-side state, ids,
//! defaults it applies silently, and collections in its own order. All of
//! that is removed here so that [`crate::diff::diff`] only reports changes a
//! user made. Both trees are scratch copies owned by the caller.

use crate::kind::{
    COMMON_READONLY, NestedRule, ResourceKind, request_style_defaults, widget_common_defaults,
    widget_type_defaults,
};
use crate::tree;
use serde_json::Value;

/// Group widgets are followed this many levels deep
const MAX_WIDGET_DEPTH: u8 = 1;

/// Normalize an `(expected, actual)` pair of one kind in place
pub fn normalize(kind: ResourceKind, expected: &mut Value, actual: &mut Value) {
    let spec = kind.spec();

    for field in COMMON_READONLY.iter().chain(spec.readonly) {
        tree::remove_dotted(actual, field);
    }

    strip_defaults(expected, actual, &(spec.defaults)());

    for rule in spec.nested {
        match rule {
            NestedRule::Object { path, defaults } => {
                strip_nested(expected, actual, path, *defaults);
            }
            NestedRule::Widgets => normalize_widget_list(expected, actual, 0),
        }
    }

    for field in spec.sorted {
        sort_strings(expected, field);
        sort_strings(actual, field);
    }
}

/// Remove every field of `defaults` from both sides when neither side
/// carries anything but the default
pub fn strip_defaults(expected: &mut Value, actual: &mut Value, defaults: &Value) {
    let Some(defaults) = defaults.as_object() else {
        return;
    };

    for (field, default) in defaults {
        let at_default =
            |side: &Value| side.get(field).is_none_or(|value| tree::loose_eq(value, default));
        if at_default(expected) && at_default(actual) {
            for side in [&mut *expected, &mut *actual] {
                if let Some(object) = side.as_object_mut() {
                    object.remove(field);
                }
            }
        }
    }
}

/// Apply a default table to the objects at `path` on both sides.
///
/// A side that lacks the object is treated as an empty object. An object
/// left empty on one side while the other side never had it is dropped.
fn strip_nested(expected: &mut Value, actual: &mut Value, path: &[&str], defaults: fn() -> Value) {
    let had_expected = tree::get(expected, path).is_some();
    let had_actual = tree::get(actual, path).is_some();

    {
        let mut expected_scratch = Value::Null;
        let mut actual_scratch = Value::Null;
        let e = tree::get_mut(expected, path).unwrap_or(&mut expected_scratch);
        let a = tree::get_mut(actual, path).unwrap_or(&mut actual_scratch);
        strip_defaults(e, a, &defaults());
    }

    let dotted = path.join(".");
    if had_expected && !had_actual && is_empty_object(tree::get(expected, path)) {
        tree::remove_dotted(expected, &dotted);
    }
    if had_actual && !had_expected && is_empty_object(tree::get(actual, path)) {
        tree::remove_dotted(actual, &dotted);
    }
}

fn is_empty_object(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_object)
        .is_some_and(serde_json::Map::is_empty)
}

/// Widgets are paired by position, like the diff compares them
fn normalize_widget_list(expected: &mut Value, actual: &mut Value, depth: u8) {
    let mut no_expected = Vec::new();
    let mut no_actual = Vec::new();
    let expected = expected
        .get_mut("widgets")
        .and_then(Value::as_array_mut)
        .unwrap_or(&mut no_expected);
    let actual = actual
        .get_mut("widgets")
        .and_then(Value::as_array_mut)
        .unwrap_or(&mut no_actual);

    let mut missing = Value::Null;
    for index in 0..expected.len().max(actual.len()) {
        match (expected.get_mut(index), actual.get_mut(index)) {
            (Some(e), Some(a)) => normalize_widget(e, a, depth),
            (Some(e), None) => normalize_widget(e, &mut missing, depth),
            (None, Some(a)) => normalize_widget(&mut missing, a, depth),
            (None, None) => {}
        }
    }
}

fn normalize_widget(expected: &mut Value, actual: &mut Value, depth: u8) {
    for side in [&mut *expected, &mut *actual] {
        if let Some(widget) = side.as_object_mut() {
            widget.remove("id");
        }
    }

    let mut expected_scratch = Value::Null;
    let mut actual_scratch = Value::Null;
    let e = expected
        .get_mut("definition")
        .unwrap_or(&mut expected_scratch);
    let a = actual.get_mut("definition").unwrap_or(&mut actual_scratch);

    let widget_type = a
        .get("type")
        .or_else(|| e.get("type"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    strip_defaults(e, a, &widget_common_defaults());
    strip_defaults(e, a, &widget_type_defaults(&widget_type));
    normalize_requests(e, a);

    if widget_type == "group" && depth < MAX_WIDGET_DEPTH {
        normalize_widget_list(e, a, depth + 1);
    }
}

fn normalize_requests(expected: &mut Value, actual: &mut Value) {
    let mut no_expected = Vec::new();
    let mut no_actual = Vec::new();
    let expected = expected
        .get_mut("requests")
        .and_then(Value::as_array_mut)
        .unwrap_or(&mut no_expected);
    let actual = actual
        .get_mut("requests")
        .and_then(Value::as_array_mut)
        .unwrap_or(&mut no_actual);

    for request in expected.iter_mut().chain(actual.iter_mut()) {
        sort_by_content(request, "conditional_formats");
    }
    for (e, a) in expected.iter_mut().zip(actual.iter_mut()) {
        strip_nested(e, a, &["style"], request_style_defaults);
    }
}

fn sort_strings(value: &mut Value, field: &str) {
    if let Some(items) = value.get_mut(field).and_then(Value::as_array_mut) {
        items.sort_by(|a, b| sort_text(a).cmp(&sort_text(b)));
    }
}

fn sort_text(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_string)
}

fn sort_by_content(value: &mut Value, field: &str) {
    if let Some(items) = value.get_mut(field).and_then(Value::as_array_mut) {
        items.sort_by_cached_key(|item| *tree::content_key(item).as_bytes());
    }
}
