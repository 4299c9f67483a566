//! Settings for a run: CLI and environment first, then kennel.toml, then defaults

use anyhow::{Context, Result, bail};
use ddapi::DEFAULT_SITE;
use reconcile::{Filter, TrackingId};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;
use crate::paths;

/// Contents of kennel.toml
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub projects_dir: Option<String>,
    pub generated_dir: Option<String>,
    pub site: Option<String>,
    pub strict_imports: Option<bool>,
}

impl FileConfig {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }
}

/// Resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub projects_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub site: String,
    pub strict_imports: bool,
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    pub filter: Filter,
}

impl Settings {
    /// Merge CLI/environment settings with the config file, if there is one
    pub fn resolve(args: &GlobalArgs) -> Result<Self> {
        let file = match paths::config_file(args.config.as_deref()) {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    pub(crate) fn merge(args: &GlobalArgs, file: FileConfig) -> Result<Self> {
        let projects_dir = file.projects_dir.as_deref().unwrap_or("projects");
        let generated_dir = file.generated_dir.as_deref().unwrap_or("generated");

        Ok(Self {
            projects_dir: paths::expand(projects_dir),
            generated_dir: paths::expand(generated_dir),
            site: args
                .site
                .clone()
                .or(file.site)
                .unwrap_or_else(|| DEFAULT_SITE.to_string()),
            strict_imports: args.strict_imports.or(file.strict_imports).unwrap_or(true),
            api_key: non_empty(args.api_key.as_deref()),
            app_key: non_empty(args.app_key.as_deref()),
            filter: build_filter(&args.project, &args.tracking_id)?,
        })
    }

    /// Web UI base, used for links in plan output
    pub fn web_base(&self) -> String {
        format!("https://app.{}", self.site)
    }

    /// Client for the configured site; fails without credentials
    pub fn client(&self) -> Result<ddapi::DatadogClient> {
        let client = ddapi::DatadogClient::new(
            &self.site,
            self.api_key.as_deref().unwrap_or_default(),
            self.app_key.as_deref().unwrap_or_default(),
        )?;
        Ok(client)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).map(str::to_string)
}

/// Build the run filter from PROJECT and TRACKING_ID values
pub fn build_filter(projects: &[String], tracking_ids: &[String]) -> Result<Filter> {
    let projects: Vec<String> = projects
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    let tracking_ids = tracking_ids
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(TrackingId::parse)
        .collect::<reconcile::Result<Vec<_>>>()?;

    if !projects.is_empty() {
        for tracking_id in &tracking_ids {
            if !projects.iter().any(|p| p == tracking_id.project()) {
                bail!(
                    "tracking id {tracking_id} is outside the selected projects ({})",
                    projects.join(", ")
                );
            }
        }
    }

    Ok(Filter::new(
        (!projects.is_empty()).then_some(projects),
        (!tracking_ids.is_empty()).then_some(tracking_ids),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::merge(&GlobalArgs::default(), FileConfig::default()).unwrap();
        assert_eq!(settings.projects_dir, PathBuf::from("projects"));
        assert_eq!(settings.generated_dir, PathBuf::from("generated"));
        assert_eq!(settings.site, "datadoghq.com");
        assert_eq!(settings.web_base(), "https://app.datadoghq.com");
        assert!(settings.strict_imports);
        assert!(!settings.filter.is_active());
    }

    #[test]
    fn test_cli_beats_file() {
        let args = GlobalArgs {
            site: Some("datadoghq.eu".into()),
            strict_imports: Some(false),
            ..Default::default()
        };
        let file = FileConfig {
            site: Some("us5.datadoghq.com".into()),
            strict_imports: Some(true),
            projects_dir: Some("monitoring/projects".into()),
            generated_dir: None,
        };
        let settings = Settings::merge(&args, file).unwrap();
        assert_eq!(settings.site, "datadoghq.eu");
        assert!(!settings.strict_imports);
        assert_eq!(settings.projects_dir, PathBuf::from("monitoring/projects"));
    }

    #[test]
    fn test_load_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kennel.toml");
        fs::write(&path, "site = \"datadoghq.eu\"\nstrict_imports = false\n").unwrap();

        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.site.as_deref(), Some("datadoghq.eu"));
        assert_eq!(file.strict_imports, Some(false));
        assert_eq!(file.projects_dir, None);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kennel.toml");
        fs::write(&path, "marker_text = \"other\"\n").unwrap();
        assert!(FileConfig::load(&path).is_err());
    }

    #[test]
    fn test_blank_credentials_are_missing() {
        let args = GlobalArgs {
            api_key: Some("  ".into()),
            app_key: Some("app".into()),
            ..Default::default()
        };
        let settings = Settings::merge(&args, FileConfig::default()).unwrap();
        assert_eq!(settings.api_key, None);
        assert!(settings.client().is_err());
    }

    #[test]
    fn test_build_filter() {
        let filter = build_filter(&["a".into(), " ".into()], &[]).unwrap();
        assert!(filter.is_active());
        assert!(filter.matches(&TrackingId::parse("a:x").unwrap()));
        assert!(!filter.matches(&TrackingId::parse("b:x").unwrap()));

        let filter = build_filter(&[], &["b:x".into()]).unwrap();
        assert!(filter.matches(&TrackingId::parse("b:x").unwrap()));
        assert!(!filter.matches(&TrackingId::parse("b:y").unwrap()));

        assert!(build_filter(&[], &["no-colon".into()]).is_err());
        assert!(build_filter(&["a".into()], &["b:x".into()]).is_err());
        assert!(!build_filter(&[], &[]).unwrap().is_active());
    }
}
