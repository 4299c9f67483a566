//! Tracking ids and the marker codec
//!
//! A tracking id is `project:kennel_id`. It is embedded in a free-text field
//! of every managed remote object as a trailing marker line:
//!
//! ```text
//! -- Managed by kennel team:cpu_high in projects/team.toml, do not modify manually
//! ```
//!
//! Remote objects without a marker are unmanaged and never touched.

use crate::error::{Error, Result};
use crate::tree;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Text that precedes the tracking id in a marker line
pub const MARKER_TEXT: &str = "Managed by kennel";

const SEGMENT: &str = r"[A-Za-z0-9_.\-]+";

static TRACKING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{SEGMENT}:{SEGMENT}$")).expect("valid regex"));

static SEGMENT_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{SEGMENT}$")).expect("valid regex"));

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "-- {} ({SEGMENT}:{SEGMENT})",
        regex::escape(MARKER_TEXT)
    ))
    .expect("valid regex")
});

// `.` stops at newlines and `$` is end of text: only the last line matches
static MARKER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("\n?-- {} .*$", regex::escape(MARKER_TEXT))).expect("valid regex")
});

/// A validated `project:kennel_id` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingId(String);

impl TrackingId {
    /// Join a project id and a kennel id
    pub fn new(project: &str, kennel_id: &str) -> Result<Self> {
        Self::parse(&format!("{project}:{kennel_id}"))
    }

    /// Parse and validate a tracking id
    pub fn parse(s: &str) -> Result<Self> {
        if TRACKING_ID.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidTrackingId(s.to_string()))
        }
    }

    /// Project segment
    pub fn project(&self) -> &str {
        self.0.split_once(':').map_or("", |(project, _)| project)
    }

    /// Kennel id segment
    pub fn kennel_id(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, kennel_id)| kennel_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TrackingId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TrackingId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<TrackingId> for String {
    fn from(id: TrackingId) -> Self {
        id.0
    }
}

/// Whether a project id or kennel id is well formed
pub fn is_valid_segment(segment: &str) -> bool {
    SEGMENT_ONLY.is_match(segment)
}

/// Whether a payload value looks like a symbolic reference rather than a provider id
pub fn is_reference(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.contains(':'))
}

/// The marker suffix for a tracking id
pub fn encode(tracking_id: &TrackingId, source: &str) -> String {
    format!("\n-- {MARKER_TEXT} {tracking_id} in {source}, do not modify manually")
}

/// Find the tracking id in the marker of `field`, if any.
///
/// Missing or null fields mean the object is unmanaged.
pub fn decode(payload: &Value, field: &[&str]) -> Option<TrackingId> {
    let text = tree::get(payload, field)?.as_str()?;
    MARKER
        .captures(text)
        .and_then(|captures| TrackingId::parse(&captures[1]).ok())
}

/// What the tracking field held before [`add`] appended the marker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Original {
    /// A string, possibly empty
    #[default]
    Text,
    Null,
    /// Not in the payload; the first `depth` path segments were created by [`add`]
    Absent { depth: usize },
}

impl Original {
    fn of(payload: &Value, field: &[&str]) -> Self {
        match tree::get(payload, field) {
            Some(Value::Null) => Self::Null,
            Some(_) => Self::Text,
            None => Self::Absent {
                depth: (1..=field.len())
                    .find(|&n| tree::get(payload, &field[..n]).is_none())
                    .unwrap_or(field.len()),
            },
        }
    }
}

/// Append the marker for `tracking_id` to `field`.
///
/// Fails when the field already carries a marker, which happens when a
/// tracked object was copied into a new declaration. The returned
/// [`Original`] lets [`strip`] put the field back exactly as it was.
pub fn add(payload: &mut Value, field: &[&str], tracking_id: &TrackingId, source: &str) -> Result<Original> {
    let existing = field_text(payload, field, tracking_id.as_str())?;
    let original = Original::of(payload, field);

    if decode(payload, field).is_some() {
        return Err(Error::DoubleTracking {
            tracking_id: tracking_id.to_string(),
            marker: MARKER_TEXT.to_string(),
            field: field.join("."),
        });
    }

    let suffix = encode(tracking_id, source);
    let text = if existing.is_empty() {
        suffix.trim_start_matches('\n').to_string()
    } else {
        format!("{existing}{suffix}")
    };

    if tree::set(payload, field, Value::String(text)) {
        Ok(original)
    } else {
        Err(Error::Validation {
            tracking_id: tracking_id.to_string(),
            message: format!("cannot write tracking marker into {}", field.join(".")),
        })
    }
}

/// Remove a previously added marker from `field`.
///
/// When nothing but the marker was there, the field goes back to the
/// null or missing state recorded in `original`.
pub fn strip(payload: &mut Value, field: &[&str], original: Original) -> Result<()> {
    let value = tree::get(payload, field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let Some(found) = MARKER_LINE.find(&value) else {
        return Err(Error::MissingTrackingMarker {
            field: field.join("."),
            value,
        });
    };

    let stripped = &value[..found.start()];
    match original {
        Original::Null if stripped.is_empty() => {
            tree::set(payload, field, Value::Null);
        }
        Original::Absent { depth } if stripped.is_empty() => {
            tree::remove(payload, &field[..depth]);
        }
        _ => {
            tree::set(payload, field, Value::String(stripped.to_string()));
        }
    }
    Ok(())
}

fn field_text(payload: &Value, field: &[&str], tracking_id: &str) -> Result<String> {
    match tree::get(payload, field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(Error::Validation {
            tracking_id: tracking_id.to_string(),
            message: format!("{} must be a string, got {other}", field.join(".")),
        }),
    }
}
