//! `kennel plan` - show what `update` would change

use anyhow::Result;
use reconcile::{Actual, Api, PlanOptions, Planned, Resource, ResourceKind};

use crate::Context;
use crate::config::Settings;
use crate::printer;
use crate::progress;

pub fn run(ctx: &Context, settings: &Settings) -> Result<()> {
    let resources = super::load_resources(settings)?;
    let client = settings.client()?;
    let planned = compute(ctx, &client, resources, settings)?;
    printer::print_plan(&planned.plan, &settings.web_base());
    Ok(())
}

/// Download the remote state and plan against it
pub fn compute(
    ctx: &Context,
    api: &dyn Api,
    resources: Vec<Resource>,
    settings: &Settings,
) -> Result<Planned> {
    let actuals = if ctx.quiet {
        reconcile::download(api, &ResourceKind::ALL)?
    } else {
        download_with_spinner(api)?
    };

    let options = PlanOptions {
        filter: settings.filter.clone(),
        strict_imports: settings.strict_imports,
    };
    Ok(reconcile::plan(api, resources, actuals, &options)?)
}

fn download_with_spinner(api: &dyn Api) -> Result<Vec<Actual>> {
    let pb = progress::spinner("Downloading existing objects...");
    match reconcile::download(api, &ResourceKind::ALL) {
        Ok(actuals) => {
            progress::finish_success(&pb, &format!("Downloaded {} objects", actuals.len()));
            Ok(actuals)
        }
        Err(e) => {
            progress::finish_error(&pb, "Download failed");
            Err(e.into())
        }
    }
}
