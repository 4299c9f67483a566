//! Objects downloaded from the provider

use crate::error::{Error, Result};
use crate::id_map::ProviderId;
use crate::kind::ResourceKind;
use crate::tracking::{self, TrackingId};
use serde_json::Value;
use std::fmt;

/// Remote state of one provider object
#[derive(Debug, Clone, PartialEq)]
pub struct Actual {
    pub kind: ResourceKind,
    pub id: ProviderId,
    /// Decoded from the tracking marker; `None` for unmanaged objects
    pub tracking_id: Option<TrackingId>,
    pub payload: Value,
}

impl Actual {
    /// Wrap a payload returned by the API
    pub fn from_api(kind: ResourceKind, payload: Value) -> Result<Self> {
        let spec = kind.spec();
        let id = payload
            .get(spec.id_field)
            .and_then(ProviderId::from_value)
            .map(|id| id.for_kind(kind))
            .ok_or_else(|| Error::MissingField {
                api_resource: spec.api_resource.to_string(),
                field: spec.id_field.to_string(),
            })?;
        let tracking_id = tracking::decode(&payload, spec.tracking_field);

        Ok(Self {
            kind,
            id,
            tracking_id,
            payload,
        })
    }

    pub fn is_managed(&self) -> bool {
        self.tracking_id.is_some()
    }

    /// Value of the kind's title field
    pub fn title(&self) -> Option<&str> {
        self.payload
            .get(self.kind.spec().title_field)
            .and_then(Value::as_str)
    }

    /// Key used to match declarations that pin an explicit id
    pub fn id_key(&self) -> String {
        id_key(self.kind, &self.id)
    }

    /// Web URL of the object
    pub fn url(&self, web_base: &str) -> String {
        self.kind.spec().url(web_base, &self.id.to_string())
    }
}

impl fmt::Display for Actual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tracking_id {
            Some(tracking_id) => write!(f, "{} {} ({})", self.kind, tracking_id, self.id),
            None => write!(f, "{} {}", self.kind, self.id),
        }
    }
}

/// `"{api_resource}:{id}"`
pub fn id_key(kind: ResourceKind, id: &ProviderId) -> String {
    format!("{}:{}", kind.api_resource(), id)
}
