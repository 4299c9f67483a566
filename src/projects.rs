//! Project loader - declared resources from TOML files
//!
//! Every `.toml` file under the projects directory declares one project:
//!
//! ```toml
//! [project]
//! id = "checkout"
//!
//! [[monitor]]
//! kennel_id = "error_rate"
//! name = "Checkout error rate"
//! type = "metric alert"
//! query = "sum(last_5m):sum:checkout.errors{*}.as_count() > 10"
//!
//! [[slo]]
//! kennel_id = "availability"
//! id = "1a2b3c"            # adopt an existing SLO
//! name = "Checkout availability"
//! type = "monitor"
//! monitor_ids = ["checkout:error_rate"]
//! ```
//!
//! Every key besides `kennel_id` and `id` is sent to the provider as-is.

use anyhow::{Context, Result, bail};
use reconcile::{ProviderId, Resource, ResourceKind};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::paths;

/// Resources declared by one file
#[derive(Debug)]
pub struct ProjectFile {
    pub path: PathBuf,
    pub project: String,
    pub resources: Vec<Resource>,
}

/// All `.toml` files under `dir`, in a stable order
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Projects directory {} does not exist", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Could not read {}", dir.display()))?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "toml") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Load every project under `dir`.
///
/// Tracking markers name files relative to `base`, normally the working directory.
pub fn load_all(dir: &Path, base: &Path) -> Result<Vec<ProjectFile>> {
    discover(dir)?
        .into_iter()
        .map(|path| {
            let source = paths::display_relative(&path, base);
            load_file(&path, &source)
        })
        .collect()
}

/// Flatten project files into the resource list the planner takes
pub fn resources(files: Vec<ProjectFile>) -> Vec<Resource> {
    files.into_iter().flat_map(|f| f.resources).collect()
}

/// Load one project file
pub fn load_file(path: &Path, source: &str) -> Result<ProjectFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let table: toml::Table =
        toml::from_str(&content).with_context(|| format!("Invalid TOML in {source}"))?;
    let (project, resources) =
        parse(table, source).with_context(|| format!("Invalid project file {source}"))?;

    log::debug!("Loaded {} resources from {source}", resources.len());
    Ok(ProjectFile {
        path: path.to_path_buf(),
        project,
        resources,
    })
}

fn parse(mut table: toml::Table, source: &str) -> Result<(String, Vec<Resource>)> {
    let project = project_id(table.remove("project"))?;

    let mut resources = Vec::new();
    for (key, value) in table {
        let Some(kind) = ResourceKind::from_name(&key) else {
            bail!(
                "unknown section [[{key}]], expected one of: {}",
                kind_names().join(", ")
            );
        };
        let toml::Value::Array(entries) = value else {
            bail!("{key} must be an array of tables, written [[{key}]]");
        };

        for entry in entries {
            let attributes = serde_json::to_value(entry)?;
            resources.push(build(kind, &project, attributes, source)?);
        }
    }
    Ok((project, resources))
}

fn project_id(section: Option<toml::Value>) -> Result<String> {
    let Some(toml::Value::Table(section)) = section else {
        bail!("missing [project] section");
    };
    let Some(toml::Value::String(id)) = section.get("id") else {
        bail!("[project] needs a string id");
    };
    if !reconcile::tracking::is_valid_segment(id) {
        bail!("invalid project id {id:?}, use letters, digits, '_', '.' and '-'");
    }
    Ok(id.clone())
}

fn build(kind: ResourceKind, project: &str, mut attributes: Value, source: &str) -> Result<Resource> {
    let Some(fields) = attributes.as_object_mut() else {
        bail!("every [[{}]] entry must be a table", kind.name());
    };

    let kennel_id = match fields.remove("kennel_id") {
        Some(Value::String(kennel_id)) => kennel_id,
        _ => bail!("[[{}]] entry in project {project} needs a string kennel_id", kind.name()),
    };

    let id = match fields.remove("id") {
        None => None,
        Some(value) => Some(ProviderId::from_value(&value).with_context(|| {
            format!("{project}:{kennel_id} has an invalid id {value}, expected a number or string")
        })?),
    };

    Ok(Resource::build(kind, project, &kennel_id, attributes, id, source)?)
}

fn kind_names() -> Vec<&'static str> {
    ResourceKind::ALL.iter().map(|k| k.name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const TEAM: &str = r#"
[project]
id = "team"

[[monitor]]
kennel_id = "cpu"
name = "CPU high"
type = "metric alert"
query = "avg(last_5m):avg:system.cpu.user{*} > 90"
message = "@slack-team"

[monitor.options]
thresholds = { critical = 90 }

[[slo]]
kennel_id = "uptime"
id = "abc123"
name = "Uptime"
type = "monitor"
monitor_ids = ["team:cpu"]
"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_file() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "team.toml", TEAM);

        let file = load_file(&path, "projects/team.toml").unwrap();
        assert_eq!(file.project, "team");
        assert_eq!(file.resources.len(), 2);

        let monitor = file
            .resources
            .iter()
            .find(|r| r.kind() == ResourceKind::Monitor)
            .unwrap();
        assert_eq!(monitor.tracking_id().as_str(), "team:cpu");
        assert_eq!(monitor.payload()["options"]["thresholds"]["critical"], json!(90));
        assert!(monitor.payload().get("kennel_id").is_none());
        assert_eq!(
            monitor.payload()["message"],
            json!("@slack-team\n-- Managed by kennel team:cpu in projects/team.toml, do not modify manually")
        );

        let slo = file
            .resources
            .iter()
            .find(|r| r.kind() == ResourceKind::Slo)
            .unwrap();
        assert_eq!(slo.id(), Some(&ProviderId::from("abc123")));
        assert!(slo.payload().get("id").is_none());
    }

    #[test]
    fn test_load_all_walks_subdirectories() {
        let tmp = TempDir::new().unwrap();
        let projects = tmp.path().join("projects");
        write(&projects, "team.toml", TEAM);
        write(
            &projects,
            "nested/other.toml",
            "[project]\nid = \"other\"\n\n[[dashboard]]\nkennel_id = \"board\"\ntitle = \"Board\"\nlayout_type = \"ordered\"\n",
        );
        write(&projects, "README.md", "not a project");

        let files = load_all(&projects, tmp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].project, "other");
        assert_eq!(files[0].resources[0].source(), "projects/nested/other.toml");
        assert_eq!(resources(files).len(), 3);
    }

    #[test]
    fn test_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let err = discover(&tmp.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_rejects_unknown_section() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "bad.toml", "[project]\nid = \"team\"\n\n[[monitors]]\nkennel_id = \"a\"\n");
        let err = load_file(&path, "bad.toml").unwrap_err();
        assert!(format!("{err:#}").contains("unknown section [[monitors]]"));
    }

    #[test]
    fn test_rejects_missing_project() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "bad.toml", "[[monitor]]\nkennel_id = \"a\"\n");
        let err = load_file(&path, "bad.toml").unwrap_err();
        assert!(format!("{err:#}").contains("missing [project]"));
    }

    #[test]
    fn test_rejects_invalid_ids() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "bad.toml", "[project]\nid = \"my team\"\n");
        assert!(load_file(&path, "bad.toml").is_err());

        let path = write(
            tmp.path(),
            "bad2.toml",
            "[project]\nid = \"team\"\n\n[[monitor]]\nname = \"x\"\ntype = \"metric alert\"\nquery = \"q\"\n",
        );
        let err = load_file(&path, "bad2.toml").unwrap_err();
        assert!(format!("{err:#}").contains("needs a string kennel_id"));
    }

    #[test]
    fn test_missing_required_attribute() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "bad.toml",
            "[project]\nid = \"team\"\n\n[[monitor]]\nkennel_id = \"cpu\"\nname = \"x\"\n",
        );
        let err = load_file(&path, "bad.toml").unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("team:cpu"), "{message}");
        assert!(message.contains("query"), "{message}");
    }
}
