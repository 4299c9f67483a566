//! Scoping a run to some projects or tracking ids

use crate::tracking::TrackingId;
use std::collections::BTreeSet;

/// Which tracking ids a run may touch
///
/// An empty filter matches everything. A run with an active filter is a
/// partial run: objects outside it are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    projects: Option<BTreeSet<String>>,
    tracking_ids: Option<BTreeSet<TrackingId>>,
}

impl Filter {
    pub fn new(projects: Option<Vec<String>>, tracking_ids: Option<Vec<TrackingId>>) -> Self {
        Self {
            projects: projects.map(|p| p.into_iter().collect()),
            tracking_ids: tracking_ids.map(|t| t.into_iter().collect()),
        }
    }

    /// Match everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Only these projects
    pub fn projects<I, S>(projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            projects: Some(projects.into_iter().map(Into::into).collect()),
            tracking_ids: None,
        }
    }

    /// Whether this is a partial run
    pub fn is_active(&self) -> bool {
        self.projects.is_some() || self.tracking_ids.is_some()
    }

    pub fn matches(&self, tracking_id: &TrackingId) -> bool {
        let project_ok = self
            .projects
            .as_ref()
            .is_none_or(|projects| projects.contains(tracking_id.project()));
        let id_ok = self
            .tracking_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(tracking_id));
        project_ok && id_ok
    }

    /// Whether files of `project` belong to this run
    pub fn matches_project(&self, project: &str) -> bool {
        let project_ok = self
            .projects
            .as_ref()
            .is_none_or(|projects| projects.contains(project));
        let id_ok = self
            .tracking_ids
            .as_ref()
            .is_none_or(|ids| ids.iter().any(|id| id.project() == project));
        project_ok && id_ok
    }
}
