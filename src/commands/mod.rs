// Reconciliation against the API
pub mod plan;
pub mod update;

// Local-only commands
pub mod generate;
pub mod validate;

use anyhow::{Context, Result};
use reconcile::Resource;
use std::env;

use crate::config::Settings;
use crate::projects;

/// Load every declared resource under the projects directory
pub fn load_resources(settings: &Settings) -> Result<Vec<Resource>> {
    let base = env::current_dir().context("Could not determine working directory")?;
    let files = projects::load_all(&settings.projects_dir, &base)?;
    for file in &files {
        log::debug!(
            "{}: project {}, {} resources",
            file.path.display(),
            file.project,
            file.resources.len()
        );
    }
    let resources = projects::resources(files);
    log::info!(
        "Loaded {} resources from {}",
        resources.len(),
        settings.projects_dir.display()
    );
    Ok(resources)
}
