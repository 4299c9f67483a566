//! The provider API seam
//!
//! The engine talks to the provider through the [`Api`] trait only. The HTTP
//! implementation lives in the `ddapi` crate; [`MockApi`] keeps objects in
//! memory and records every call, for tests.
//!
//! ```
//! use reconcile::api::{Api, MockApi};
//! use reconcile::ResourceKind;
//! use serde_json::json;
//!
//! let api = MockApi::new();
//! let created = api.create(ResourceKind::Monitor, &json!({"name": "cpu"})).unwrap();
//! assert_eq!(created["id"], json!(1));
//! assert_eq!(api.list(ResourceKind::Monitor).unwrap().len(), 1);
//! ```

use crate::error::{Error, Result};
use crate::id_map::ProviderId;
use crate::kind::{IdShape, IdType, ResourceKind};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// CRUD operations on provider objects
///
/// Every method fails with [`Error::Api`] on a non-success response.
pub trait Api: Send + Sync {
    /// All objects of a kind; may be summaries for some kinds
    fn list(&self, kind: ResourceKind) -> Result<Vec<Value>>;

    /// One object with all details
    fn show(&self, kind: ResourceKind, id: &ProviderId) -> Result<Value>;

    /// Create an object; the reply carries the new id
    fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Value>;

    fn update(&self, kind: ResourceKind, id: &ProviderId, payload: &Value) -> Result<Value>;

    fn delete(&self, kind: ResourceKind, id: &ProviderId) -> Result<()>;
}

/// Operation recorded by [`MockApi`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    List,
    Show,
    Create,
    Update,
    Delete,
}

impl fmt::Display for ApiOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Show => "show",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub op: ApiOp,
    pub kind: ResourceKind,
    pub id: Option<ProviderId>,
    pub payload: Option<Value>,
}

/// In-memory provider for tests
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    objects: Arc<Mutex<HashMap<ResourceKind, Vec<Value>>>>,
    calls: Arc<Mutex<Vec<ApiCall>>>,
    failures: Arc<Mutex<Vec<(ApiOp, ResourceKind)>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a remote object; it must carry the kind's id field
    pub fn add(&self, kind: ResourceKind, object: Value) {
        lock(&self.objects).entry(kind).or_default().push(object);
    }

    /// Make every `op` on `kind` fail with HTTP 500
    pub fn fail_on(&self, op: ApiOp, kind: ResourceKind) {
        lock(&self.failures).push((op, kind));
    }

    /// Stored objects of a kind
    pub fn objects(&self, kind: ResourceKind) -> Vec<Value> {
        lock(&self.objects).get(&kind).cloned().unwrap_or_default()
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.calls).clone()
    }

    /// Calls that changed something, as `(op, kind, id)`
    pub fn mutations(&self) -> Vec<(ApiOp, ResourceKind, Option<ProviderId>)> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c.op, ApiOp::Create | ApiOp::Update | ApiOp::Delete))
            .map(|c| (c.op, c.kind, c.id))
            .collect()
    }

    fn record(&self, op: ApiOp, kind: ResourceKind, id: Option<&ProviderId>, payload: Option<&Value>) -> Result<()> {
        lock(&self.calls).push(ApiCall {
            op,
            kind,
            id: id.cloned(),
            payload: payload.cloned(),
        });

        if lock(&self.failures).contains(&(op, kind)) {
            return Err(Error::api(
                op.to_string(),
                kind.api_resource(),
                id.map(ToString::to_string).unwrap_or_default(),
                "HTTP 500 Internal Server Error",
                Some(500),
            ));
        }
        Ok(())
    }

    fn allocate_id(&self, kind: ResourceKind) -> ProviderId {
        let mut next = lock(&self.next_id);
        *next += 1;
        match kind.spec().id_type {
            IdType::Integer => ProviderId::Int(*next),
            IdType::Text => ProviderId::Str(format!("{}-{next:03}", kind.name())),
        }
    }

    fn not_found(op: ApiOp, kind: ResourceKind, id: &ProviderId) -> Error {
        Error::api(
            op.to_string(),
            kind.api_resource(),
            id.to_string(),
            "HTTP 404 Not Found",
            Some(404),
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn has_id(object: &Value, kind: ResourceKind, id: &ProviderId) -> bool {
    object
        .get(kind.spec().id_field)
        .and_then(ProviderId::from_value)
        .is_some_and(|found| found.for_kind(kind) == *id)
}

impl Api for MockApi {
    fn list(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        self.record(ApiOp::List, kind, None, None)?;
        Ok(self.objects(kind))
    }

    fn show(&self, kind: ResourceKind, id: &ProviderId) -> Result<Value> {
        self.record(ApiOp::Show, kind, Some(id), None)?;
        lock(&self.objects)
            .get(&kind)
            .and_then(|objects| objects.iter().find(|o| has_id(o, kind, id)))
            .cloned()
            .ok_or_else(|| Self::not_found(ApiOp::Show, kind, id))
    }

    fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Value> {
        self.record(ApiOp::Create, kind, None, Some(payload))?;
        let id = self.allocate_id(kind);
        let mut object = payload.clone();
        if let Some(fields) = object.as_object_mut() {
            fields.insert(
                kind.spec().id_field.to_string(),
                id.to_value(IdShape::Native),
            );
        }
        self.add(kind, object.clone());
        Ok(object)
    }

    fn update(&self, kind: ResourceKind, id: &ProviderId, payload: &Value) -> Result<Value> {
        self.record(ApiOp::Update, kind, Some(id), Some(payload))?;
        let mut objects = lock(&self.objects);
        let stored = objects
            .get_mut(&kind)
            .and_then(|objects| objects.iter_mut().find(|o| has_id(o, kind, id)))
            .ok_or_else(|| Self::not_found(ApiOp::Update, kind, id))?;

        let mut object = payload.clone();
        if let Some(fields) = object.as_object_mut() {
            fields.insert(
                kind.spec().id_field.to_string(),
                id.to_value(IdShape::Native),
            );
        }
        *stored = object.clone();
        Ok(object)
    }

    fn delete(&self, kind: ResourceKind, id: &ProviderId) -> Result<()> {
        self.record(ApiOp::Delete, kind, Some(id), None)?;
        let mut objects = lock(&self.objects);
        let list = objects.entry(kind).or_default();
        let before = list.len();
        list.retain(|o| !has_id(o, kind, id));
        if list.len() == before {
            return Err(Self::not_found(ApiOp::Delete, kind, id));
        }
        Ok(())
    }
}
