//! Declared resources
//!
//! A [`Resource`] is the desired state of one provider object as declared in
//! a project. Its payload is built once per run, with the tracking marker
//! already appended, and is never mutated afterwards; reference resolution
//! works on copies (see [`crate::resolve`]).

use crate::error::{Error, Result};
use crate::id_map::{IdMap, ProviderId};
use crate::kind::ResourceKind;
use crate::resolve::{self, Resolved};
use crate::tracking::{self, TrackingId};
use serde_json::Value;
use std::fmt;

/// A declared resource with its built payload
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    kind: ResourceKind,
    tracking_id: TrackingId,
    id: Option<ProviderId>,
    source: String,
    payload: Value,
    untracked_field: tracking::Original,
}

impl Resource {
    /// Validate attributes and build the payload.
    ///
    /// `source` is where the declaration lives; it ends up in the tracking
    /// marker so readers of the remote object know where to edit it.
    pub fn build(
        kind: ResourceKind,
        project: &str,
        kennel_id: &str,
        attributes: Value,
        id: Option<ProviderId>,
        source: &str,
    ) -> Result<Self> {
        let tracking_id = TrackingId::new(project, kennel_id)?;
        let spec = kind.spec();

        let Value::Object(fields) = &attributes else {
            return Err(Error::Validation {
                tracking_id: tracking_id.to_string(),
                message: format!("{} attributes must be a table", kind.name()),
            });
        };

        if fields.contains_key(spec.id_field) {
            return Err(Error::Validation {
                tracking_id: tracking_id.to_string(),
                message: format!(
                    "set `id` next to `kennel_id` instead of `{}` in the attributes",
                    spec.id_field
                ),
            });
        }

        let missing: Vec<&str> = spec
            .required
            .iter()
            .copied()
            .filter(|field| fields.get(*field).is_none_or(Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Validation {
                tracking_id: tracking_id.to_string(),
                message: format!("{} is missing required attributes: {}", kind.name(), missing.join(", ")),
            });
        }

        let mut payload = attributes;
        let untracked_field = tracking::add(&mut payload, spec.tracking_field, &tracking_id, source)?;

        Ok(Self {
            kind,
            tracking_id,
            id: id.map(|id| id.for_kind(kind)),
            source: source.to_string(),
            payload,
            untracked_field,
        })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn tracking_id(&self) -> &TrackingId {
        &self.tracking_id
    }

    pub fn project(&self) -> &str {
        self.tracking_id.project()
    }

    pub fn kennel_id(&self) -> &str {
        self.tracking_id.kennel_id()
    }

    /// Explicit provider id pinned by the declaration
    pub fn id(&self) -> Option<&ProviderId> {
        self.id.as_ref()
    }

    /// Forget the pinned id so the resource gets created instead
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Built payload, tracking marker included
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// What the tracking field held before the marker was added
    pub fn untracked_field(&self) -> tracking::Original {
        self.untracked_field
    }

    /// Value of the kind's title field
    pub fn title(&self) -> Option<&str> {
        self.payload
            .get(self.kind.spec().title_field)
            .and_then(Value::as_str)
    }

    /// Resolve linked tracking ids against `id_map`
    pub fn resolve_linked(&self, id_map: &IdMap, force: bool) -> Result<Resolved> {
        resolve::resolve_all(&self.payload, self.kind, id_map, force, &self.tracking_id)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.tracking_id)
    }
}

/// Fail when two resources share a tracking id
pub fn check_duplicates(resources: &[Resource]) -> Result<()> {
    let mut seen: std::collections::HashMap<&TrackingId, &Resource> =
        std::collections::HashMap::new();
    for resource in resources {
        if let Some(first) = seen.insert(&resource.tracking_id, resource) {
            return Err(Error::DuplicateTrackingId {
                key: resource.tracking_id.to_string(),
                first: format!("{} in {}", first, first.source),
                second: format!("{} in {}", resource, resource.source),
            });
        }
    }
    Ok(())
}
