//! Resource kinds and their per-kind data
//!
//! Every kind-specific rule of the engine lives in the static [`KindSpec`]
//! table, so the normalizer, resolver and planner are written once and read
//! their behavior from here.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// The closed set of resource kinds managed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Monitor,
    Dashboard,
    Slo,
    SyntheticTest,
}

impl ResourceKind {
    /// All kinds, in download order
    pub const ALL: [Self; 4] = [Self::Monitor, Self::Dashboard, Self::Slo, Self::SyntheticTest];

    /// Per-kind rule table
    pub fn spec(self) -> &'static KindSpec {
        match self {
            Self::Monitor => &MONITOR,
            Self::Dashboard => &DASHBOARD,
            Self::Slo => &SLO,
            Self::SyntheticTest => &SYNTHETIC_TEST,
        }
    }

    /// Provider endpoint name, e.g. "monitor" or "synthetics/tests"
    pub fn api_resource(self) -> &'static str {
        self.spec().api_resource
    }

    /// Name used in project files, e.g. "synthetic_test"
    pub fn name(self) -> &'static str {
        match self {
            Self::Monitor => "monitor",
            Self::Dashboard => "dashboard",
            Self::Slo => "slo",
            Self::SyntheticTest => "synthetic_test",
        }
    }

    /// Look up a kind by its project-file name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Look up a kind by its provider endpoint name
    pub fn from_api_resource(api_resource: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.api_resource() == api_resource)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_resource())
    }
}

/// How a provider id is represented in payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    Integer,
    Text,
}

/// How a resolved id is written back into the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdShape {
    /// Integer ids stay numbers, text ids stay strings
    Native,
    /// Always written as a string
    Text,
}

/// Syntax of references embedded in query strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySyntax {
    /// `%{project:kennel_id}`
    Placeholder,
    /// `error_budget("project:kennel_id")`, `burn_rate(..)` or `slo(..)`
    SloCall,
}

/// A location in a payload that may hold a tracking-id reference
#[derive(Debug, Clone, Copy)]
pub enum RefLocation {
    /// A field holding a single reference
    Field {
        path: &'static [&'static str],
        target: ResourceKind,
        shape: IdShape,
    },
    /// An array field whose elements may be references
    List {
        path: &'static [&'static str],
        target: ResourceKind,
        shape: IdShape,
    },
    /// References embedded in a query string, only for payloads whose `type` matches
    Query {
        path: &'static [&'static str],
        when_type: &'static str,
        syntax: QuerySyntax,
        target: ResourceKind,
    },
    /// Apply `locations` to every widget definition, recursing into group widgets
    Widgets {
        locations: &'static [RefLocation],
    },
}

/// Nested structures that get their own default table during normalization
#[derive(Debug, Clone, Copy)]
pub enum NestedRule {
    /// Default table for the object at `path`
    Object {
        path: &'static [&'static str],
        defaults: fn() -> Value,
    },
    /// Dashboard widget tree (per-widget-type defaults, one level of group nesting)
    Widgets,
}

/// Per-kind rules
#[derive(Debug)]
pub struct KindSpec {
    pub kind: ResourceKind,
    pub api_resource: &'static str,
    /// Free-text field carrying the tracking marker
    pub tracking_field: &'static [&'static str],
    /// Field holding the provider id in downloaded objects
    pub id_field: &'static str,
    pub id_type: IdType,
    /// Field used to adopt an unmanaged remote object with the same title
    pub title_field: &'static str,
    pub required: &'static [&'static str],
    /// Server-computed fields, dotted paths, removed from actual before diffing
    pub readonly: &'static [&'static str],
    /// Top-level defaults the provider applies silently
    pub defaults: fn() -> Value,
    pub nested: &'static [NestedRule],
    /// Top-level string arrays compared as sets
    pub sorted: &'static [&'static str],
    pub references: &'static [RefLocation],
    /// `list` returns summaries; matched objects must be re-fetched with `show`
    pub needs_details: bool,
    /// Lower deletes first; dependents before dependencies
    pub delete_priority: u8,
    /// Web path with an `{id}` placeholder
    pub url_path: &'static str,
}

impl KindSpec {
    /// Web URL of a provider object
    pub fn url(&self, web_base: &str, id: &str) -> String {
        format!(
            "{}{}",
            web_base.trim_end_matches('/'),
            self.url_path.replace("{id}", id)
        )
    }
}

/// Fields the provider adds to every kind
pub const COMMON_READONLY: &[&str] = &[
    "id",
    "created",
    "created_at",
    "creator",
    "deleted",
    "modified",
    "modified_at",
    "org_id",
    "klass",
    "tracking_id",
];

const MONITOR_REFERENCES: &[RefLocation] = &[
    RefLocation::Query {
        path: &["query"],
        when_type: "composite",
        syntax: QuerySyntax::Placeholder,
        target: ResourceKind::Monitor,
    },
    RefLocation::Query {
        path: &["query"],
        when_type: "slo alert",
        syntax: QuerySyntax::SloCall,
        target: ResourceKind::Slo,
    },
];

const WIDGET_REFERENCES: &[RefLocation] = &[
    RefLocation::Field {
        path: &["alert_id"],
        target: ResourceKind::Monitor,
        shape: IdShape::Text,
    },
    RefLocation::List {
        path: &["monitor_ids"],
        target: ResourceKind::Monitor,
        shape: IdShape::Native,
    },
    RefLocation::Field {
        path: &["slo_id"],
        target: ResourceKind::Slo,
        shape: IdShape::Native,
    },
];

static MONITOR: KindSpec = KindSpec {
    kind: ResourceKind::Monitor,
    api_resource: "monitor",
    tracking_field: &["message"],
    id_field: "id",
    id_type: IdType::Integer,
    title_field: "name",
    required: &["name", "type", "query"],
    readonly: &[
        "overall_state",
        "overall_state_modified",
        "matching_downtimes",
        "multi",
        "options.silenced",
    ],
    defaults: monitor_defaults,
    nested: &[NestedRule::Object {
        path: &["options"],
        defaults: monitor_option_defaults,
    }],
    sorted: &["tags"],
    references: MONITOR_REFERENCES,
    needs_details: false,
    delete_priority: 2,
    url_path: "/monitors/{id}/edit",
};

static DASHBOARD: KindSpec = KindSpec {
    kind: ResourceKind::Dashboard,
    api_resource: "dashboard",
    tracking_field: &["description"],
    id_field: "id",
    id_type: IdType::Text,
    title_field: "title",
    required: &["title", "layout_type"],
    readonly: &["author_handle", "author_name", "url", "is_read_only"],
    defaults: dashboard_defaults,
    nested: &[NestedRule::Widgets],
    sorted: &["tags"],
    references: &[RefLocation::Widgets {
        locations: WIDGET_REFERENCES,
    }],
    needs_details: true,
    delete_priority: 0,
    url_path: "/dashboard/{id}",
};

static SLO: KindSpec = KindSpec {
    kind: ResourceKind::Slo,
    api_resource: "slo",
    tracking_field: &["description"],
    id_field: "id",
    id_type: IdType::Text,
    title_field: "name",
    required: &["name", "type"],
    readonly: &["type_id", "monitor_tags", "configured_alert_ids"],
    defaults: slo_defaults,
    nested: &[],
    sorted: &["tags"],
    references: &[RefLocation::List {
        path: &["monitor_ids"],
        target: ResourceKind::Monitor,
        shape: IdShape::Native,
    }],
    needs_details: false,
    delete_priority: 1,
    url_path: "/slo?slo_id={id}",
};

static SYNTHETIC_TEST: KindSpec = KindSpec {
    kind: ResourceKind::SyntheticTest,
    api_resource: "synthetics/tests",
    tracking_field: &["message"],
    id_field: "public_id",
    id_type: IdType::Text,
    title_field: "name",
    required: &["name", "type", "locations"],
    readonly: &["public_id", "monitor_id"],
    defaults: synthetic_test_defaults,
    nested: &[],
    sorted: &["tags"],
    references: &[],
    needs_details: false,
    delete_priority: 3,
    url_path: "/synthetics/details/{id}",
};

fn monitor_defaults() -> Value {
    json!({
        "priority": null,
        "restricted_roles": null,
    })
}

fn monitor_option_defaults() -> Value {
    json!({
        "timeout_h": 0,
        "renotify_interval": 0,
        "notify_audit": false,
        "no_data_timeframe": null,
        "notify_no_data": false,
        "new_host_delay": 300,
        "new_group_delay": null,
        "evaluation_delay": null,
        "include_tags": true,
        "require_full_window": false,
        "escalation_message": "",
        "locked": false,
        "notification_preset_name": "show_all",
        "groupby_simple_monitor": false,
    })
}

fn dashboard_defaults() -> Value {
    json!({
        "template_variables": [],
        "template_variable_presets": [],
        "notify_list": [],
        "reflow_type": null,
        "tags": [],
    })
}

fn slo_defaults() -> Value {
    json!({
        "description": null,
        "query": null,
        "groups": null,
        "monitor_ids": [],
        "thresholds": [],
        "tags": [],
    })
}

fn synthetic_test_defaults() -> Value {
    json!({
        "tags": [],
        "status": "live",
    })
}

/// Defaults shared by every widget definition
pub fn widget_common_defaults() -> Value {
    json!({
        "title_align": "left",
        "title_size": "16",
    })
}

/// Defaults for one widget definition type
pub fn widget_type_defaults(widget_type: &str) -> Value {
    match widget_type {
        "timeseries" => json!({
            "show_legend": true,
            "legend_layout": "auto",
            "legend_columns": ["avg", "min", "max", "value", "sum"],
            "markers": [],
        }),
        "note" => json!({
            "show_tick": false,
            "tick_edge": "left",
            "tick_pos": "50%",
            "text_align": "left",
            "has_padding": true,
            "background_color": "white",
            "font_size": "14",
        }),
        "query_value" => json!({"autoscale": true, "time": {}}),
        "free_text" => json!({"font_size": "auto"}),
        "check_status" => json!({"title_align": "left", "time": {}}),
        "slo" => json!({"global_time_target": "0"}),
        "alert_graph" | "query_table" => json!({"time": {}}),
        _ => json!({}),
    }
}

/// Defaults for a widget request's `style` object
pub fn request_style_defaults() -> Value {
    json!({
        "line_width": "normal",
        "palette": "dog_classic",
        "line_type": "solid",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_api_resource() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_name(kind.name()), Some(kind));
            assert_eq!(ResourceKind::from_api_resource(kind.api_resource()), Some(kind));
            assert_eq!(kind.spec().kind, kind);
        }
        assert_eq!(ResourceKind::from_name("widget"), None);
        assert_eq!(
            ResourceKind::from_api_resource("synthetics/tests"),
            Some(ResourceKind::SyntheticTest)
        );
    }

    #[test]
    fn test_delete_priority_puts_dependents_first() {
        let dashboard = ResourceKind::Dashboard.spec().delete_priority;
        let slo = ResourceKind::Slo.spec().delete_priority;
        let monitor = ResourceKind::Monitor.spec().delete_priority;
        assert!(dashboard < slo);
        assert!(slo < monitor);
    }

    #[test]
    fn test_url() {
        let spec = ResourceKind::Monitor.spec();
        assert_eq!(
            spec.url("https://app.datadoghq.com/", "123"),
            "https://app.datadoghq.com/monitors/123/edit"
        );
        assert_eq!(
            ResourceKind::Slo.spec().url("https://app.datadoghq.com", "abc"),
            "https://app.datadoghq.com/slo?slo_id=abc"
        );
    }

    #[test]
    fn test_default_tables_are_objects() {
        for kind in ResourceKind::ALL {
            assert!((kind.spec().defaults)().is_object(), "{kind}");
        }
        assert!(widget_type_defaults("unknown").as_object().unwrap().is_empty());
    }
}
