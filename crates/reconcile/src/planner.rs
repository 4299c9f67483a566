//! Sync planner - matches declared resources against remote objects
//!
//! The planner pairs every declared [`Resource`] with at most one downloaded
//! [`Actual`], then classifies:
//!
//! - matched pairs with a non-empty normalized diff become updates
//! - declared resources without a partner become creates
//! - managed remote objects without a partner become deletes
//!
//! Remote objects without a tracking marker are never touched.

use crate::actual::{self, Actual};
use crate::api::Api;
use crate::diff;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::id_map::{IdEntry, IdMap};
use crate::kind::ResourceKind;
use crate::normalize::normalize;
use crate::plan::{Plan, PlannedCreate, PlannedDelete, PlannedUpdate};
use crate::resource::{self, Resource};
use crate::tracking::{self, TrackingId};
use crate::tree;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Settings for one planning run
#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub filter: Filter,
    /// Fail on declarations pinning an id that no longer exists remotely;
    /// otherwise drop the id and create the resource
    pub strict_imports: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            filter: Filter::all(),
            strict_imports: true,
        }
    }
}

/// A plan plus the id map it was computed with
///
/// The executor keeps filling the map as creates return ids.
#[derive(Debug, Clone)]
pub struct Planned {
    pub plan: Plan,
    pub id_map: IdMap,
}

/// Compute the plan that turns `actuals` into `resources`.
///
/// `api` is only used to fetch details for kinds whose list endpoint
/// returns summaries.
pub fn plan(
    api: &dyn Api,
    resources: Vec<Resource>,
    mut actuals: Vec<Actual>,
    options: &PlanOptions,
) -> Result<Planned> {
    resource::check_duplicates(&resources)?;

    // lowest id first, so the oldest of several copies is the one kept
    actuals.sort_by(|a, b| (a.kind, &a.id).cmp(&(b.kind, &b.id)));

    let filter = &options.filter;
    let mut id_map = seed_id_map(&resources, &actuals, filter);

    let mut expected: Vec<Resource> = resources
        .into_iter()
        .filter(|r| filter.matches(r.tracking_id()))
        .collect();
    actuals.retain(|a| a.tracking_id.as_ref().is_none_or(|t| filter.matches(t)));

    let mut matching = Matching::new(&expected)?;
    let mut unmatched_actual = matching.pair(actuals);
    matching.convert_replace_into_update(&expected, &mut unmatched_actual);
    check_explicit_ids(&mut expected, &matching, options.strict_imports)?;

    for (index, actual) in &matching.pairs {
        id_map.set(actual.kind, expected[*index].tracking_id(), actual.id.clone());
    }

    let mut slots: Vec<Option<Resource>> = expected.into_iter().map(Some).collect();
    let mut plan = Plan::default();

    for (index, mut actual) in matching.pairs {
        let Some(resource) = slots[index].take() else {
            continue;
        };
        let tracking_id = resource.tracking_id().to_string();

        if actual.kind.spec().needs_details {
            actual.payload = api
                .show(actual.kind, &actual.id)
                .map_err(|e| e.with_subject(&tracking_id))?;
        }

        let diff = diff_pair(&resource, &actual, &id_map, filter)?;
        if diff.is_empty() {
            log::debug!("{} {tracking_id} is up to date", resource.kind());
        } else {
            log::debug!("{} {tracking_id} has {} changes", resource.kind(), diff.len());
            plan.updates.push(PlannedUpdate {
                resource,
                actual,
                diff,
            });
        }
    }

    let declared = matching.matched_tracking_ids;
    for actual in unmatched_actual {
        match &actual.tracking_id {
            Some(tracking_id) => {
                let superseded = declared.contains(&(actual.kind, tracking_id.clone()));
                if superseded {
                    log::debug!("{actual} duplicates a matched object");
                }
                plan.deletes.push(PlannedDelete { actual, superseded });
            }
            None => log::trace!("ignoring unmanaged {actual}"),
        }
    }

    plan.creates = slots
        .into_iter()
        .flatten()
        .map(|resource| PlannedCreate { resource })
        .collect();

    plan.updates
        .sort_by_key(|u| u.resource.kind().spec().delete_priority);
    plan.deletes.sort_by(|a, b| {
        let key = |d: &PlannedDelete| (d.actual.kind.spec().delete_priority, d.actual.id.clone());
        key(a).cmp(&key(b))
    });

    Ok(Planned { plan, id_map })
}

/// Every declared resource is NEW unless a remote object already carries its tracking id.
///
/// Managed objects that are no longer declared are about to be deleted and
/// stay out of the map, except outside the filter of a partial run, where
/// they are assumed to still exist.
fn seed_id_map(resources: &[Resource], actuals: &[Actual], filter: &Filter) -> IdMap {
    let mut id_map = IdMap::new();
    for resource in resources {
        id_map.set_new(resource.kind(), resource.tracking_id());
    }
    for actual in actuals {
        let Some(tracking_id) = &actual.tracking_id else {
            continue;
        };
        let known = match id_map.entry(actual.kind, tracking_id) {
            Some(IdEntry::New) => true,
            Some(IdEntry::Id(_)) => false,
            None => !filter.matches(tracking_id),
        };
        if known {
            id_map.set(actual.kind, tracking_id, actual.id.clone());
        }
    }
    id_map
}

fn diff_pair(
    resource: &Resource,
    actual: &Actual,
    id_map: &IdMap,
    filter: &Filter,
) -> Result<Vec<diff::DiffEntry>> {
    let kind = resource.kind();
    let mut expected = resource.resolve_linked(id_map, false)?.payload;
    let mut remote = actual.payload.clone();

    // a partial run must not report adopting an untracked object as a change
    if filter.is_active() && actual.tracking_id.is_none() {
        let field = kind.spec().tracking_field;
        tracking::strip(&mut expected, field, resource.untracked_field())?;
        match_blank_field(&mut expected, &remote, field);
    }

    normalize(kind, &mut expected, &mut remote);
    diff::diff(&expected, &remote, resource.tracking_id().as_str())
}

/// Give an empty declared `field` the remote's shape when the remote is empty too
fn match_blank_field(expected: &mut Value, remote: &Value, field: &[&str]) {
    let is_blank = |value: &Value| value.is_null() || value.as_str() == Some("");
    if !tree::get(expected, field).is_none_or(is_blank) {
        return;
    }
    match tree::get(remote, field) {
        None => {
            tree::remove(expected, field);
        }
        Some(value) if is_blank(value) => {
            tree::set(expected, field, value.clone());
        }
        Some(_) => {}
    }
}

/// Pairing state between declared resources and remote objects
struct Matching {
    by_id: HashMap<String, usize>,
    by_tracking_id: HashMap<TrackingId, usize>,
    expected: Vec<(ResourceKind, TrackingId)>,
    taken: Vec<bool>,
    pairs: Vec<(usize, Actual)>,
    matched_tracking_ids: HashSet<(ResourceKind, TrackingId)>,
}

impl Matching {
    fn new(expected: &[Resource]) -> Result<Self> {
        let mut by_id: HashMap<String, usize> = HashMap::new();
        let mut by_tracking_id = HashMap::new();

        for (index, resource) in expected.iter().enumerate() {
            by_tracking_id.insert(resource.tracking_id().clone(), index);

            let Some(id) = resource.id() else {
                continue;
            };
            let key = actual::id_key(resource.kind(), id);
            if let Some(first) = by_id.insert(key.clone(), index) {
                return Err(Error::DuplicateTrackingId {
                    key,
                    first: format!("{} in {}", expected[first], expected[first].source()),
                    second: format!("{resource} in {}", resource.source()),
                });
            }
        }

        Ok(Self {
            by_id,
            by_tracking_id,
            expected: expected
                .iter()
                .map(|r| (r.kind(), r.tracking_id().clone()))
                .collect(),
            taken: vec![false; expected.len()],
            pairs: Vec::new(),
            matched_tracking_ids: HashSet::new(),
        })
    }

    /// Pair by explicit id first, then by tracking id; returns the leftovers
    fn pair(&mut self, actuals: Vec<Actual>) -> Vec<Actual> {
        let mut remaining = Vec::new();
        for actual in actuals {
            match self.by_id.get(&actual.id_key()).copied() {
                Some(index) if !self.taken[index] => self.take(index, actual),
                _ => remaining.push(actual),
            }
        }

        let mut unmatched = Vec::new();
        for actual in remaining {
            let index = actual
                .tracking_id
                .as_ref()
                .and_then(|t| self.by_tracking_id.get(t))
                .copied()
                .filter(|&index| !self.taken[index] && self.expected[index].0 == actual.kind);
            match index {
                Some(index) => self.take(index, actual),
                None => unmatched.push(actual),
            }
        }
        unmatched
    }

    /// Adopt a managed remote object whose declaration was renamed.
    ///
    /// An unmatched resource and an unmatched managed object of the same kind
    /// with the same title become an update instead of a delete plus a create,
    /// which keeps the object's URL stable.
    fn convert_replace_into_update(&mut self, resources: &[Resource], unmatched: &mut Vec<Actual>) {
        for (index, resource) in resources.iter().enumerate() {
            if self.taken[index] || resource.id().is_some() {
                continue;
            }
            let Some(title) = resource.title() else {
                continue;
            };
            let found = unmatched.iter().position(|a| {
                a.kind == resource.kind()
                    && a.title() == Some(title)
                    && a
                        .tracking_id
                        .as_ref()
                        .is_some_and(|t| !self.by_tracking_id.contains_key(t))
            });
            if let Some(position) = found {
                let actual = unmatched.remove(position);
                log::debug!("{resource} replaces {actual} with the same title");
                self.take(index, actual);
            }
        }
    }

    fn take(&mut self, index: usize, actual: Actual) {
        log::debug!("matched {actual}");
        self.taken[index] = true;
        self.matched_tracking_ids
            .insert(self.expected[index].clone());
        self.pairs.push((index, actual));
    }
}

/// Declarations that pin an id must have found it remotely
fn check_explicit_ids(expected: &mut [Resource], matching: &Matching, strict: bool) -> Result<()> {
    for (index, resource) in expected.iter_mut().enumerate() {
        if matching.taken[index] {
            continue;
        }
        let Some(id) = resource.id() else {
            continue;
        };

        if strict {
            return Err(Error::StaleExplicitId {
                api_resource: resource.kind().api_resource().to_string(),
                tracking_id: resource.tracking_id().to_string(),
                id: id.to_string(),
            });
        }
        log::warn!(
            "{resource}: {} {id} does not exist, it will be created instead",
            resource.kind()
        );
        resource.clear_id();
    }
    Ok(())
}
