//! Reconciliation plans

use crate::actual::Actual;
use crate::diff::DiffEntry;
use crate::id_map::ProviderId;
use crate::kind::ResourceKind;
use crate::resource::Resource;
use crate::tracking::TrackingId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A declared resource with no remote counterpart
#[derive(Debug, Clone)]
pub struct PlannedCreate {
    pub resource: Resource,
}

/// A matched pair whose normalized payloads differ
#[derive(Debug, Clone)]
pub struct PlannedUpdate {
    pub resource: Resource,
    pub actual: Actual,
    /// Never empty
    pub diff: Vec<DiffEntry>,
}

/// A managed remote object that is no longer declared
#[derive(Debug, Clone)]
pub struct PlannedDelete {
    pub actual: Actual,
    /// Duplicate of a matched object with the same tracking id
    pub superseded: bool,
}

impl PlannedDelete {
    /// Managed objects only end up here, so this is always known
    pub fn tracking_id(&self) -> Option<&TrackingId> {
        self.actual.tracking_id.as_ref()
    }
}

/// What a change does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Flat description of one operation, for display and logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub change_type: ChangeType,
    pub kind: ResourceKind,
    pub tracking_id: String,
    /// `None` for creates until they ran
    pub id: Option<ProviderId>,
}

impl Change {
    pub fn new(
        change_type: ChangeType,
        kind: ResourceKind,
        tracking_id: impl Into<String>,
        id: Option<ProviderId>,
    ) -> Self {
        Self {
            change_type,
            kind,
            tracking_id: tracking_id.into(),
            id,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.change_type, self.kind, self.tracking_id)?;
        if let Some(id) = &self.id {
            write!(f, " ({id})")?;
        }
        Ok(())
    }
}

/// Ordered create, update and delete lists
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub creates: Vec<PlannedCreate>,
    pub updates: Vec<PlannedUpdate>,
    /// Sorted by kind delete priority
    pub deletes: Vec<PlannedDelete>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    /// All operations as changes: deletes, then creates, then updates
    pub fn changes(&self) -> Vec<Change> {
        let deletes = self.deletes.iter().map(|d| {
            Change::new(
                ChangeType::Delete,
                d.actual.kind,
                d.tracking_id().map(ToString::to_string).unwrap_or_default(),
                Some(d.actual.id.clone()),
            )
        });
        let creates = self.creates.iter().map(|c| {
            Change::new(
                ChangeType::Create,
                c.resource.kind(),
                c.resource.tracking_id().as_str(),
                None,
            )
        });
        let updates = self.updates.iter().map(|u| {
            Change::new(
                ChangeType::Update,
                u.resource.kind(),
                u.resource.tracking_id().as_str(),
                Some(u.actual.id.clone()),
            )
        });
        deletes.chain(creates).chain(updates).collect()
    }
}

/// Counts per change type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl PlanSummary {
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            creates: plan.creates.len(),
            updates: plan.updates.len(),
            deletes: plan.deletes.len(),
        }
    }

    pub fn from_changes(changes: &[Change]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change.change_type {
                ChangeType::Create => summary.creates += 1,
                ChangeType::Update => summary.updates += 1,
                ChangeType::Delete => summary.deletes += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete",
            self.creates, self.updates, self.deletes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffOp;
    use serde_json::json;

    fn resource(kennel_id: &str) -> Resource {
        Resource::build(
            ResourceKind::Monitor,
            "team",
            kennel_id,
            json!({"name": kennel_id, "type": "metric alert", "query": "q"}),
            None,
            "p.toml",
        )
        .unwrap()
    }

    fn actual(id: i64, tracking_id: &str) -> Actual {
        Actual::from_api(
            ResourceKind::Monitor,
            json!({"id": id, "message": format!("-- Managed by kennel {tracking_id} in p.toml, do not modify manually")}),
        )
        .unwrap()
    }

    #[test]
    fn test_changes_order_deletes_creates_updates() {
        let plan = Plan {
            creates: vec![PlannedCreate {
                resource: resource("new"),
            }],
            updates: vec![PlannedUpdate {
                resource: resource("changed"),
                actual: actual(2, "team:changed"),
                diff: vec![DiffEntry {
                    op: DiffOp::Change,
                    path: "name".into(),
                    old: Some(json!("a")),
                    new: Some(json!("b")),
                }],
            }],
            deletes: vec![PlannedDelete {
                actual: actual(3, "team:gone"),
                superseded: false,
            }],
        };

        let changes = plan.changes();
        let types: Vec<_> = changes.iter().map(|c| c.change_type).collect();
        assert_eq!(types, vec![ChangeType::Delete, ChangeType::Create, ChangeType::Update]);
        assert_eq!(changes[0].tracking_id, "team:gone");
        assert_eq!(changes[0].id, Some(ProviderId::Int(3)));
        assert_eq!(changes[1].id, None);
        assert_eq!(changes[2].to_string(), "update monitor team:changed (2)");

        assert_eq!(plan.len(), 3);
        let summary = PlanSummary::from_plan(&plan);
        assert_eq!(summary, PlanSummary::from_changes(&changes));
        assert_eq!(summary.to_string(), "1 to create, 1 to update, 1 to delete");
    }

    #[test]
    fn test_empty_plan() {
        let plan = Plan::default();
        assert!(plan.is_empty());
        assert!(plan.changes().is_empty());
        assert_eq!(PlanSummary::from_plan(&plan).total(), 0);
    }
}
