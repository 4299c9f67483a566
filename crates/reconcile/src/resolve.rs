//! Rewriting tracking-id references into provider ids
//!
//! Payloads can point at other managed objects by tracking id, e.g. a
//! composite monitor query `%{team:cpu} && %{team:mem}` or an SLO's
//! `monitor_ids`. Before anything is compared or sent, those references are
//! replaced with the ids recorded in the [`IdMap`].
//!
//! Resolution never mutates the declared payload: [`resolve_all`] returns a
//! new tree together with the references it had to leave in place.

use crate::error::{Error, Result};
use crate::id_map::{IdEntry, IdMap};
use crate::kind::{IdShape, QuerySyntax, RefLocation, ResourceKind};
use crate::tracking::{self, TrackingId};
use crate::tree;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\{(?<ref>[^}]+)\}").expect("valid regex"));

static SLO_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:error_budget|burn_rate|slo)\("(?<ref>[^"()]+)"\)"#).expect("valid regex")
});

/// Outcome of resolving a single value
#[derive(Debug)]
pub enum Resolution {
    /// The value to put in the payload
    Resolved(Value),
    /// Not resolvable yet; the original value stays
    Deferred(TrackingId),
    Fatal(Error),
}

/// A payload with every resolvable reference replaced
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub payload: Value,
    /// References left untouched, in payload order
    pub pending: Vec<TrackingId>,
}

impl Resolved {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Resolve one value that may hold a reference to a `target` object.
///
/// Values without a `:` are provider ids already and come back unchanged.
/// Without `force`, anything the map cannot answer yet is deferred; with
/// `force`, a reference to an object still to be created is a circular
/// dependency and a reference to an unknown object is unresolvable.
pub fn resolve(
    value: &Value,
    target: ResourceKind,
    shape: IdShape,
    id_map: &IdMap,
    force: bool,
    referrer: &TrackingId,
) -> Resolution {
    if !tracking::is_reference(value) {
        return Resolution::Resolved(value.clone());
    }
    let Some(reference) = value.as_str().and_then(|s| TrackingId::parse(s).ok()) else {
        return Resolution::Resolved(value.clone());
    };

    match id_map.entry(target, &reference) {
        Some(IdEntry::Id(id)) => Resolution::Resolved(id.to_value(shape)),
        Some(IdEntry::New) if force => Resolution::Fatal(Error::CircularDependency {
            referrer: referrer.to_string(),
            target_type: target.api_resource().to_string(),
            reference: reference.to_string(),
        }),
        None if force => Resolution::Fatal(Error::UnresolvableReference {
            referrer: referrer.to_string(),
            target_type: target.api_resource().to_string(),
            reference: reference.to_string(),
        }),
        Some(IdEntry::New) | None => Resolution::Deferred(reference),
    }
}

/// Resolve every reference location of a `kind` payload
pub fn resolve_all(
    payload: &Value,
    kind: ResourceKind,
    id_map: &IdMap,
    force: bool,
    referrer: &TrackingId,
) -> Result<Resolved> {
    let mut walker = Walker {
        id_map,
        force,
        referrer,
        pending: Vec::new(),
    };
    let mut scratch = payload.clone();
    for location in kind.spec().references {
        walker.apply(location, &mut scratch, 0)?;
    }

    if !walker.pending.is_empty() {
        log::debug!(
            "{referrer}: deferred references {}",
            walker
                .pending
                .iter()
                .map(TrackingId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(Resolved {
        payload: scratch,
        pending: walker.pending,
    })
}

struct Walker<'a> {
    id_map: &'a IdMap,
    force: bool,
    referrer: &'a TrackingId,
    pending: Vec<TrackingId>,
}

impl Walker<'_> {
    fn apply(&mut self, location: &RefLocation, value: &mut Value, depth: u8) -> Result<()> {
        match *location {
            RefLocation::Field {
                path,
                target,
                shape,
            } => {
                if let Some(field) = tree::get_mut(value, path) {
                    self.replace(field, target, shape)?;
                }
            }
            RefLocation::List {
                path,
                target,
                shape,
            } => {
                if let Some(items) = tree::get_mut(value, path).and_then(Value::as_array_mut) {
                    for item in items {
                        self.replace(item, target, shape)?;
                    }
                }
            }
            RefLocation::Query {
                path,
                when_type,
                syntax,
                target,
            } => {
                if value.get("type").and_then(Value::as_str) != Some(when_type) {
                    return Ok(());
                }
                if let Some(query) = tree::get_mut(value, path) {
                    self.replace_in_query(query, syntax, target)?;
                }
            }
            RefLocation::Widgets { locations } => {
                let Some(widgets) = value.get_mut("widgets").and_then(Value::as_array_mut) else {
                    return Ok(());
                };
                for widget in widgets {
                    let Some(definition) = widget.get_mut("definition") else {
                        continue;
                    };
                    for inner in locations {
                        self.apply(inner, definition, depth)?;
                    }
                    let is_group = definition.get("type").and_then(Value::as_str) == Some("group");
                    if is_group && depth == 0 {
                        self.apply(location, definition, depth + 1)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn replace(&mut self, value: &mut Value, target: ResourceKind, shape: IdShape) -> Result<()> {
        match resolve(value, target, shape, self.id_map, self.force, self.referrer) {
            Resolution::Resolved(resolved) => *value = resolved,
            Resolution::Deferred(reference) => self.pending.push(reference),
            Resolution::Fatal(err) => return Err(err),
        }
        Ok(())
    }

    fn replace_in_query(&mut self, query: &mut Value, syntax: QuerySyntax, target: ResourceKind) -> Result<()> {
        let Some(text) = query.as_str() else {
            return Ok(());
        };
        let pattern = match syntax {
            QuerySyntax::Placeholder => &*PLACEHOLDER,
            QuerySyntax::SloCall => &*SLO_CALL,
        };

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for captures in pattern.captures_iter(text) {
            let (Some(whole), Some(reference)) = (captures.get(0), captures.name("ref")) else {
                continue;
            };
            // placeholders disappear entirely; function calls keep their quotes
            let span = match syntax {
                QuerySyntax::Placeholder => whole,
                QuerySyntax::SloCall => reference,
            };
            out.push_str(&text[last..span.start()]);

            let candidate = Value::String(reference.as_str().to_string());
            match resolve(&candidate, target, IdShape::Text, self.id_map, self.force, self.referrer) {
                Resolution::Resolved(Value::String(id)) => out.push_str(&id),
                Resolution::Resolved(other) => out.push_str(&other.to_string()),
                Resolution::Deferred(pending) => {
                    self.pending.push(pending);
                    out.push_str(span.as_str());
                }
                Resolution::Fatal(err) => return Err(err),
            }
            last = span.end();
        }
        out.push_str(&text[last..]);

        *query = Value::String(out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_map::ProviderId;
    use serde_json::json;

    fn tid(s: &str) -> TrackingId {
        TrackingId::parse(s).unwrap()
    }

    fn referrer() -> TrackingId {
        tid("team:referrer")
    }

    #[test]
    fn test_raw_ids_pass_through() {
        let map = IdMap::new();
        for value in [json!(123), json!("abc-def"), json!(null)] {
            match resolve(&value, ResourceKind::Monitor, IdShape::Native, &map, true, &referrer()) {
                Resolution::Resolved(v) => assert_eq!(v, value),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_known_reference_is_substituted() {
        let mut map = IdMap::new();
        map.set(ResourceKind::Monitor, &tid("team:cpu"), ProviderId::Int(42));
        let value = json!("team:cpu");
        match resolve(&value, ResourceKind::Monitor, IdShape::Native, &map, false, &referrer()) {
            Resolution::Resolved(v) => assert_eq!(v, json!(42)),
            other => panic!("unexpected {other:?}"),
        }
        match resolve(&value, ResourceKind::Monitor, IdShape::Text, &map, false, &referrer()) {
            Resolution::Resolved(v) => assert_eq!(v, json!("42")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_new_reference_defers_or_fails() {
        let mut map = IdMap::new();
        map.set_new(ResourceKind::Monitor, &tid("team:cpu"));
        let value = json!("team:cpu");

        assert!(matches!(
            resolve(&value, ResourceKind::Monitor, IdShape::Native, &map, false, &referrer()),
            Resolution::Deferred(_)
        ));
        assert!(matches!(
            resolve(&value, ResourceKind::Monitor, IdShape::Native, &map, true, &referrer()),
            Resolution::Fatal(Error::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_reference() {
        let map = IdMap::new();
        let value = json!("team:ghost");
        assert!(matches!(
            resolve(&value, ResourceKind::Slo, IdShape::Native, &map, false, &referrer()),
            Resolution::Deferred(_)
        ));
        match resolve(&value, ResourceKind::Slo, IdShape::Native, &map, true, &referrer()) {
            Resolution::Fatal(err @ Error::UnresolvableReference { .. }) => {
                assert!(err.to_string().contains("Unable to find slo team:ghost"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_slo_monitor_ids() {
        let mut map = IdMap::new();
        map.set(ResourceKind::Monitor, &tid("team:cpu"), ProviderId::Int(7));
        map.set_new(ResourceKind::Monitor, &tid("team:mem"));
        let payload = json!({"monitor_ids": ["team:cpu", 99, "team:mem"]});

        let resolved = resolve_all(&payload, ResourceKind::Slo, &map, false, &referrer()).unwrap();
        assert_eq!(resolved.payload, json!({"monitor_ids": [7, 99, "team:mem"]}));
        assert_eq!(resolved.pending, vec![tid("team:mem")]);
        assert!(!resolved.is_complete());
        // declared payload is untouched
        assert_eq!(payload["monitor_ids"][0], json!("team:cpu"));
    }

    #[test]
    fn test_composite_query_placeholders() {
        let mut map = IdMap::new();
        map.set(ResourceKind::Monitor, &tid("team:a"), ProviderId::Int(1));
        map.set(ResourceKind::Monitor, &tid("team:b"), ProviderId::Int(2));
        let payload = json!({"type": "composite", "query": "%{team:a} && !%{team:b}"});

        let resolved = resolve_all(&payload, ResourceKind::Monitor, &map, true, &referrer()).unwrap();
        assert_eq!(resolved.payload["query"], json!("1 && !2"));
        assert!(resolved.is_complete());
    }

    #[test]
    fn test_placeholders_ignored_on_other_monitor_types() {
        let map = IdMap::new();
        let payload = json!({"type": "metric alert", "query": "avg(last_5m):%{team:a} > 1"});
        let resolved = resolve_all(&payload, ResourceKind::Monitor, &map, true, &referrer()).unwrap();
        assert_eq!(resolved.payload, payload);
    }

    #[test]
    fn test_slo_alert_query() {
        let mut map = IdMap::new();
        map.set(ResourceKind::Slo, &tid("team:latency"), ProviderId::from("abc123"));
        let payload = json!({"type": "slo alert", "query": "error_budget(\"team:latency\").over(\"7d\") > 10"});
        let resolved = resolve_all(&payload, ResourceKind::Monitor, &map, true, &referrer()).unwrap();
        assert_eq!(
            resolved.payload["query"],
            json!("error_budget(\"abc123\").over(\"7d\") > 10")
        );
    }

    #[test]
    fn test_deferred_placeholder_keeps_text() {
        let mut map = IdMap::new();
        map.set_new(ResourceKind::Monitor, &tid("team:a"));
        let payload = json!({"type": "composite", "query": "%{team:a} || 5"});
        let resolved = resolve_all(&payload, ResourceKind::Monitor, &map, false, &referrer()).unwrap();
        assert_eq!(resolved.payload, payload);
        assert_eq!(resolved.pending, vec![tid("team:a")]);

        assert!(matches!(
            resolve_all(&payload, ResourceKind::Monitor, &map, true, &referrer()),
            Err(Error::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_dashboard_widgets_with_group() {
        let mut map = IdMap::new();
        map.set(ResourceKind::Monitor, &tid("team:cpu"), ProviderId::Int(5));
        map.set(ResourceKind::Slo, &tid("team:lat"), ProviderId::from("s1"));
        let payload = json!({"widgets": [
            {"definition": {"type": "alert_graph", "alert_id": "team:cpu"}},
            {"definition": {"type": "group", "widgets": [
                {"definition": {"type": "manage_status", "monitor_ids": ["team:cpu"]}},
                {"definition": {"type": "slo", "slo_id": "team:lat"}},
            ]}},
        ]});

        let resolved = resolve_all(&payload, ResourceKind::Dashboard, &map, true, &referrer()).unwrap();
        assert_eq!(resolved.payload["widgets"][0]["definition"]["alert_id"], json!("5"));
        let inner = &resolved.payload["widgets"][1]["definition"]["widgets"];
        assert_eq!(inner[0]["definition"]["monitor_ids"], json!([5]));
        assert_eq!(inner[1]["definition"]["slo_id"], json!("s1"));
    }
}
