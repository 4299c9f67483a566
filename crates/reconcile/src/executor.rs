//! Execution engine - applies a plan against the provider API
//!
//! Order of operations:
//!
//! 1. deletes of duplicates whose tracking id stays matched, so the kept
//!    object never collides with its copy
//! 2. creates, in passes until every reference resolves
//! 3. updates, the same way
//! 4. all other deletes, dependents first
//!
//! Ids returned by creates go straight into the [`IdMap`], which is what lets
//! later operations in the same run reference objects that did not exist
//! when the plan was made.

use crate::actual::Actual;
use crate::api::Api;
use crate::context::ProgressCallback;
use crate::error::{Error, Result};
use crate::id_map::IdMap;
use crate::plan::{Change, ChangeType, Plan, PlannedCreate, PlannedDelete, PlannedUpdate};
use crate::resource::Resource;
use serde_json::Value;

/// Execute `plan`, returning the changes made in execution order
pub fn execute<P: ProgressCallback>(
    plan: Plan,
    id_map: &mut IdMap,
    api: &dyn Api,
    progress: &mut P,
) -> Result<Vec<Change>> {
    let mut done = Vec::with_capacity(plan.len());

    let (superseded, deletes): (Vec<PlannedDelete>, Vec<PlannedDelete>) =
        plan.deletes.into_iter().partition(|d| d.superseded);

    for delete in superseded {
        done.push(run_delete(delete, api, progress)?);
    }

    each_resolved(
        plan.creates,
        id_map,
        |c: &PlannedCreate| &c.resource,
        |create, payload, id_map| {
            done.push(run_create(&create.resource, &payload, id_map, api, progress)?);
            Ok(())
        },
    )?;

    each_resolved(
        plan.updates,
        id_map,
        |u: &PlannedUpdate| &u.resource,
        |update, payload, _| {
            done.push(run_update(&update, &payload, api, progress)?);
            Ok(())
        },
    )?;

    for delete in deletes {
        done.push(run_delete(delete, api, progress)?);
    }

    Ok(done)
}

/// Run `apply` on every item as soon as its references resolve.
///
/// Each pass must run at least one item. A pass that runs nothing means the
/// remaining items wait on each other or on something that will never exist;
/// resolving the first one with `force` turns that into the matching error.
fn each_resolved<T, R, F>(mut pending: Vec<T>, id_map: &mut IdMap, resource_of: R, mut apply: F) -> Result<()>
where
    R: Fn(&T) -> &Resource,
    F: FnMut(T, Value, &mut IdMap) -> Result<()>,
{
    while !pending.is_empty() {
        let mut remaining = Vec::with_capacity(pending.len());
        let before = pending.len();

        for item in pending {
            let resolved = resource_of(&item).resolve_linked(id_map, false)?;
            if resolved.is_complete() {
                apply(item, resolved.payload, id_map)?;
            } else {
                remaining.push(item);
            }
        }

        if remaining.len() == before {
            return Err(stuck(resource_of(&remaining[0]), id_map));
        }
        pending = remaining;
    }
    Ok(())
}

fn stuck(resource: &Resource, id_map: &IdMap) -> Error {
    match resource.resolve_linked(id_map, true) {
        Err(err) => err,
        Ok(resolved) => Error::CircularDependency {
            referrer: resource.tracking_id().to_string(),
            target_type: resource.kind().api_resource().to_string(),
            reference: resolved
                .pending
                .first()
                .map(ToString::to_string)
                .unwrap_or_default(),
        },
    }
}

fn run_create<P: ProgressCallback>(
    resource: &Resource,
    payload: &Value,
    id_map: &mut IdMap,
    api: &dyn Api,
    progress: &mut P,
) -> Result<Change> {
    let kind = resource.kind();
    let tracking_id = resource.tracking_id();
    let mut change = Change::new(ChangeType::Create, kind, tracking_id.as_str(), None);
    progress.on_change_start(&change);

    let reply = api
        .create(kind, payload)
        .map_err(|e| e.with_subject(tracking_id.as_str()))?;
    let created = Actual::from_api(kind, reply)?;
    id_map.set(kind, tracking_id, created.id.clone());

    change.id = Some(created.id);
    log::info!("{change}");
    progress.on_change_complete(&change);
    Ok(change)
}

fn run_update<P: ProgressCallback>(
    update: &PlannedUpdate,
    payload: &Value,
    api: &dyn Api,
    progress: &mut P,
) -> Result<Change> {
    let kind = update.resource.kind();
    let tracking_id = update.resource.tracking_id().as_str();
    let change = Change::new(
        ChangeType::Update,
        kind,
        tracking_id,
        Some(update.actual.id.clone()),
    );
    progress.on_change_start(&change);

    api.update(kind, &update.actual.id, payload)
        .map_err(|e| e.with_subject(tracking_id))?;

    log::info!("{change}");
    progress.on_change_complete(&change);
    Ok(change)
}

fn run_delete<P: ProgressCallback>(
    delete: PlannedDelete,
    api: &dyn Api,
    progress: &mut P,
) -> Result<Change> {
    let actual = delete.actual;
    let tracking_id = actual
        .tracking_id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    let change = Change::new(
        ChangeType::Delete,
        actual.kind,
        tracking_id.as_str(),
        Some(actual.id.clone()),
    );
    progress.on_change_start(&change);

    api.delete(actual.kind, &actual.id)
        .map_err(|e| e.with_subject(&tracking_id))?;

    log::info!("{change}");
    progress.on_change_complete(&change);
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiOp, MockApi};
    use crate::context::NoProgress;
    use crate::id_map::ProviderId;
    use crate::kind::ResourceKind;
    use crate::planner::{PlanOptions, plan};
    use serde_json::json;

    fn build(kind: ResourceKind, kennel_id: &str, attributes: Value) -> Resource {
        Resource::build(kind, "proj", kennel_id, attributes, None, "projects/proj.toml").unwrap()
    }

    fn monitor(kennel_id: &str, query: &str, monitor_type: &str) -> Resource {
        build(
            ResourceKind::Monitor,
            kennel_id,
            json!({"name": kennel_id, "type": monitor_type, "query": query}),
        )
    }

    fn reconcile(api: &MockApi, resources: Vec<Resource>) -> Result<Vec<Change>> {
        let actuals = crate::download(api, &ResourceKind::ALL)?;
        let mut planned = plan(api, resources, actuals, &PlanOptions::default())?;
        execute(planned.plan, &mut planned.id_map, api, &mut NoProgress)
    }

    #[test]
    fn test_forward_reference_is_resolved_after_create() {
        let api = MockApi::new();
        // the SLO is declared first but needs the monitor's id
        let slo = build(
            ResourceKind::Slo,
            "uptime",
            json!({"name": "Uptime", "type": "monitor", "monitor_ids": ["proj:cpu"]}),
        );
        let cpu = monitor("cpu", "avg(last_5m):cpu > 1", "metric alert");

        let changes = reconcile(&api, vec![slo, cpu]).unwrap();
        let order: Vec<_> = changes.iter().map(|c| (c.change_type, c.kind)).collect();
        assert_eq!(
            order,
            vec![
                (ChangeType::Create, ResourceKind::Monitor),
                (ChangeType::Create, ResourceKind::Slo),
            ]
        );

        let monitor_id = changes[0].id.clone().unwrap();
        assert!(matches!(monitor_id, ProviderId::Int(_)));
        let stored = api.objects(ResourceKind::Slo);
        assert_eq!(stored[0]["monitor_ids"], json!([monitor_id.to_value(crate::kind::IdShape::Native)]));
    }

    #[test]
    fn test_circular_dependency_is_detected() {
        let api = MockApi::new();
        let a = monitor("a", "%{proj:b} && 1", "composite");
        let b = monitor("b", "%{proj:a} || 1", "composite");

        let err = reconcile(&api, vec![a, b]).unwrap_err();
        assert!(matches!(err, Error::CircularDependency { .. }), "{err}");
        assert!(err.to_string().contains("circular dependency"));
        assert!(api.mutations().is_empty());
    }

    #[test]
    fn test_unresolvable_reference_fails() {
        let api = MockApi::new();
        let slo = build(
            ResourceKind::Slo,
            "uptime",
            json!({"name": "Uptime", "type": "monitor", "monitor_ids": ["proj:ghost"]}),
        );
        let err = reconcile(&api, vec![slo]).unwrap_err();
        assert!(matches!(err, Error::UnresolvableReference { .. }), "{err}");
    }

    #[test]
    fn test_execution_order() {
        let api = MockApi::new();
        let kept = monitor("kept", "q", "metric alert");
        let mut old_version = kept.payload().clone();
        old_version["name"] = json!("before");

        let mut original = old_version.clone();
        original["id"] = json!(101);
        let mut copy = old_version;
        copy["id"] = json!(102);
        api.add(ResourceKind::Monitor, original);
        api.add(ResourceKind::Monitor, copy);

        let gone = monitor("gone", "q", "metric alert");
        let mut gone_remote = gone.payload().clone();
        gone_remote["id"] = json!(103);
        api.add(ResourceKind::Monitor, gone_remote);

        let added = monitor("added", "q", "metric alert");

        reconcile(&api, vec![kept, added]).unwrap();
        let mutations: Vec<_> = api
            .mutations()
            .into_iter()
            .map(|(op, _, id)| (op, id))
            .collect();
        assert_eq!(
            mutations,
            vec![
                (ApiOp::Delete, Some(ProviderId::Int(102))),
                (ApiOp::Create, None),
                (ApiOp::Update, Some(ProviderId::Int(101))),
                (ApiOp::Delete, Some(ProviderId::Int(103))),
            ]
        );
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let api = MockApi::new();
        let declared = || {
            vec![
                monitor("a", "avg(last_5m):cpu > 1", "metric alert"),
                monitor("b", "avg(last_5m):mem > 1", "metric alert"),
                monitor("both", "%{proj:a} && %{proj:b}", "composite"),
                build(
                    ResourceKind::Dashboard,
                    "board",
                    json!({"title": "Board", "layout_type": "ordered", "widgets": [
                        {"definition": {"type": "alert_graph", "alert_id": "proj:both", "viz_type": "timeseries"}}
                    ]}),
                ),
            ]
        };

        let first = reconcile(&api, declared()).unwrap();
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(|c| c.change_type == ChangeType::Create));

        let composite = api
            .objects(ResourceKind::Monitor)
            .into_iter()
            .find(|m| m["type"] == json!("composite"))
            .unwrap();
        assert!(!composite["query"].as_str().unwrap().contains("proj:"));

        let second = reconcile(&api, declared()).unwrap();
        assert!(second.is_empty(), "{second:?}");
    }

    #[test]
    fn test_api_failure_names_the_resource() {
        let api = MockApi::new();
        api.fail_on(ApiOp::Create, ResourceKind::Monitor);
        let err = reconcile(&api, vec![monitor("a", "q", "metric alert")]).unwrap_err();
        assert!(err.is_api());
        let message = err.to_string();
        assert!(message.contains("proj:a"), "{message}");
        assert!(message.contains("HTTP 500"));
    }
}
