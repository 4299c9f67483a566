//! Generated artifacts - one JSON file per declared resource
//!
//! `generated/{project}/{kennel_id}.json` holds the payload exactly as it
//! would be sent, so reviewers can see the effect of a change in a PR. Only
//! files whose content changed are rewritten; files of resources that are no
//! longer declared are removed.

use anyhow::{Context, Result};
use rayon::prelude::*;
use reconcile::{Filter, Resource, TrackingId};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a store write did
#[derive(Debug, Default)]
pub struct StoreReport {
    pub written: Vec<PathBuf>,
    pub unchanged: usize,
    pub removed: Vec<PathBuf>,
}

impl StoreReport {
    pub fn is_clean(&self) -> bool {
        self.written.is_empty() && self.removed.is_empty()
    }
}

pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File for a tracking id
    pub fn path_for(&self, tracking_id: &TrackingId) -> PathBuf {
        self.dir
            .join(tracking_id.project())
            .join(format!("{}.json", tracking_id.kennel_id()))
    }

    /// Write every resource inside `filter` and remove stale files inside it.
    ///
    /// Files outside the filter are left alone, so a scoped run never deletes
    /// another project's artifacts.
    pub fn write(&self, resources: &[Resource], filter: &Filter) -> Result<StoreReport> {
        let entries = resources
            .iter()
            .filter(|r| filter.matches(r.tracking_id()))
            .map(|r| Ok((self.path_for(r.tracking_id()), render(r)?)))
            .collect::<Result<Vec<_>>>()?;

        let changed = entries
            .par_iter()
            .map(|(path, content)| write_if_changed(path, content))
            .collect::<Result<Vec<bool>>>()?;

        let mut report = StoreReport::default();
        for ((path, _), changed) in entries.iter().zip(changed) {
            if changed {
                log::debug!("Wrote {}", path.display());
                report.written.push(path.clone());
            } else {
                report.unchanged += 1;
            }
        }

        let keep: HashSet<&Path> = entries.iter().map(|(path, _)| path.as_path()).collect();
        report.removed = self.remove_stale(&keep, filter)?;
        Ok(report)
    }

    fn remove_stale(&self, keep: &HashSet<&Path>, filter: &Filter) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut removed = Vec::new();
        for entry in WalkDir::new(&self.dir).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("Could not read {}", self.dir.display()))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().is_none_or(|e| e != "json")
                || keep.contains(path)
            {
                continue;
            }

            let in_scope = match tracking_id_of(path) {
                Some(tracking_id) => filter.matches(&tracking_id),
                None => !filter.is_active(),
            };
            if in_scope {
                fs::remove_file(path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                log::debug!("Removed stale {}", path.display());
                removed.push(path.to_path_buf());
            }
        }

        for path in &removed {
            if let Some(parent) = path.parent()
                && parent != self.dir
                && fs::read_dir(parent).is_ok_and(|mut d| d.next().is_none())
            {
                fs::remove_dir(parent)
                    .with_context(|| format!("Failed to remove {}", parent.display()))?;
            }
        }
        Ok(removed)
    }
}

/// Pretty JSON with a trailing newline
fn render(resource: &Resource) -> Result<String> {
    let mut content = serde_json::to_string_pretty(resource.payload())
        .with_context(|| format!("Failed to serialize {}", resource.tracking_id()))?;
    content.push('\n');
    Ok(content)
}

fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    if fs::read_to_string(path).is_ok_and(|existing| existing == content) {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// `{project}/{kennel_id}.json` back to a tracking id
fn tracking_id_of(path: &Path) -> Option<TrackingId> {
    let kennel_id = path.file_stem()?.to_str()?;
    let project = path.parent()?.file_name()?.to_str()?;
    TrackingId::new(project, kennel_id).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ResourceKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn monitor(project: &str, kennel_id: &str) -> Resource {
        Resource::build(
            ResourceKind::Monitor,
            project,
            kennel_id,
            json!({"name": kennel_id, "type": "metric alert", "query": "q"}),
            None,
            "projects/p.toml",
        )
        .unwrap()
    }

    #[test]
    fn test_writes_pretty_json() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        let resource = monitor("team", "cpu");

        let report = store.write(&[resource.clone()], &Filter::all()).unwrap();
        assert_eq!(report.written, vec![tmp.path().join("team").join("cpu.json")]);

        let content = fs::read_to_string(tmp.path().join("team/cpu.json")).unwrap();
        assert!(content.ends_with("}\n"));
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(&parsed, resource.payload());
    }

    #[test]
    fn test_unchanged_files_are_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        let resources = [monitor("team", "cpu"), monitor("team", "mem")];

        store.write(&resources, &Filter::all()).unwrap();
        let second = store.write(&resources, &Filter::all()).unwrap();
        assert!(second.is_clean());
        assert_eq!(second.unchanged, 2);
    }

    #[test]
    fn test_stale_files_are_removed() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        store
            .write(&[monitor("team", "cpu"), monitor("old", "gone")], &Filter::all())
            .unwrap();

        let report = store.write(&[monitor("team", "cpu")], &Filter::all()).unwrap();
        assert_eq!(report.removed, vec![tmp.path().join("old").join("gone.json")]);
        assert!(!tmp.path().join("old").exists());
        assert!(tmp.path().join("team/cpu.json").exists());
    }

    #[test]
    fn test_scoped_run_keeps_other_projects() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        store
            .write(
                &[monitor("a", "one"), monitor("b", "two")],
                &Filter::all(),
            )
            .unwrap();

        // only project a is loaded and in scope
        let report = store
            .write(&[monitor("a", "one")], &Filter::projects(["a"]))
            .unwrap();
        assert!(report.removed.is_empty());
        assert!(tmp.path().join("b/two.json").exists());

        let report = store.write(&[], &Filter::projects(["a"])).unwrap();
        assert_eq!(report.removed, vec![tmp.path().join("a").join("one.json")]);
    }

    #[test]
    fn test_tracking_id_of() {
        let tid = tracking_id_of(Path::new("generated/team/cpu.json")).unwrap();
        assert_eq!(tid.as_str(), "team:cpu");
        assert!(tracking_id_of(Path::new("generated/bad dir/cpu.json")).is_none());
    }
}
