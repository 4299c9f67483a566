//! Run-scoped registry from tracking ids to provider ids

use crate::kind::{IdShape, IdType, ResourceKind};
use crate::tracking::TrackingId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A provider-assigned id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderId {
    Int(i64),
    Str(String),
}

impl ProviderId {
    /// Read an id out of a payload value, accepting both numbers and strings
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) if !s.is_empty() => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    /// Coerce to the representation a kind uses for its ids
    #[must_use]
    pub fn for_kind(self, kind: ResourceKind) -> Self {
        match (kind.spec().id_type, self) {
            (IdType::Integer, Self::Str(s)) => s.parse().map_or(Self::Str(s), Self::Int),
            (IdType::Text, Self::Int(n)) => Self::Str(n.to_string()),
            (_, id) => id,
        }
    }

    /// Render the id for insertion into a payload
    pub fn to_value(&self, shape: IdShape) -> Value {
        match (self, shape) {
            (Self::Int(n), IdShape::Native) => Value::from(*n),
            (Self::Int(n), IdShape::Text) => Value::String(n.to_string()),
            (Self::Str(s), _) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ProviderId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

/// What the map knows about a tracking id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdEntry {
    /// Declared and not created yet
    New,
    Id(ProviderId),
}

/// Mapping `(kind, tracking_id) -> provider id | NEW`
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    entries: HashMap<(ResourceKind, TrackingId), IdEntry>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a concrete provider id
    pub fn set(&mut self, kind: ResourceKind, tracking_id: &TrackingId, id: ProviderId) {
        self.entries
            .insert((kind, tracking_id.clone()), IdEntry::Id(id));
    }

    /// Mark a tracking id as "created later in this run"
    pub fn set_new(&mut self, kind: ResourceKind, tracking_id: &TrackingId) {
        self.entries
            .insert((kind, tracking_id.clone()), IdEntry::New);
    }

    /// Concrete id for a tracking id, if one is known
    pub fn get(&self, kind: ResourceKind, tracking_id: &TrackingId) -> Option<&ProviderId> {
        match self.entry(kind, tracking_id)? {
            IdEntry::Id(id) => Some(id),
            IdEntry::New => None,
        }
    }

    pub fn is_new(&self, kind: ResourceKind, tracking_id: &TrackingId) -> bool {
        matches!(self.entry(kind, tracking_id), Some(IdEntry::New))
    }

    pub fn entry(&self, kind: ResourceKind, tracking_id: &TrackingId) -> Option<&IdEntry> {
        self.entries.get(&(kind, tracking_id.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tid(s: &str) -> TrackingId {
        TrackingId::parse(s).unwrap()
    }

    #[test]
    fn test_new_then_set() {
        let mut map = IdMap::new();
        let id = tid("team:cpu");
        assert!(map.entry(ResourceKind::Monitor, &id).is_none());

        map.set_new(ResourceKind::Monitor, &id);
        assert!(map.is_new(ResourceKind::Monitor, &id));
        assert_eq!(map.get(ResourceKind::Monitor, &id), None);

        map.set(ResourceKind::Monitor, &id, ProviderId::Int(42));
        assert!(!map.is_new(ResourceKind::Monitor, &id));
        assert_eq!(map.get(ResourceKind::Monitor, &id), Some(&ProviderId::Int(42)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_keys_are_scoped_by_kind() {
        let mut map = IdMap::new();
        let id = tid("team:cpu");
        map.set(ResourceKind::Monitor, &id, ProviderId::Int(1));
        assert_eq!(map.get(ResourceKind::Slo, &id), None);
        assert_eq!(map.get(ResourceKind::Monitor, &tid("team:CPU")), None);
    }

    #[test]
    fn test_provider_id_conversions() {
        assert_eq!(ProviderId::from_value(&json!(12)), Some(ProviderId::Int(12)));
        assert_eq!(ProviderId::from_value(&json!("abc-def")), Some("abc-def".into()));
        assert_eq!(ProviderId::from_value(&json!("")), None);
        assert_eq!(ProviderId::from_value(&json!(null)), None);

        assert_eq!(
            ProviderId::from("12").for_kind(ResourceKind::Monitor),
            ProviderId::Int(12)
        );
        assert_eq!(
            ProviderId::Int(7).for_kind(ResourceKind::Dashboard),
            ProviderId::from("7")
        );

        assert_eq!(ProviderId::Int(5).to_value(IdShape::Native), json!(5));
        assert_eq!(ProviderId::Int(5).to_value(IdShape::Text), json!("5"));
        assert_eq!(ProviderId::from("x").to_value(IdShape::Native), json!("x"));
    }
}
