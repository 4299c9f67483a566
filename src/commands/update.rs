//! `kennel update` - plan, confirm, execute

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use reconcile::{Api, Change, ChangeType, PlanSummary, ProgressCallback, Resource};
use std::io::IsTerminal;

use crate::Context;
use crate::config::Settings;
use crate::printer;
use crate::ui;

pub fn run(ctx: &Context, settings: &Settings, yes: bool) -> Result<()> {
    let resources = super::load_resources(settings)?;
    let client = settings.client()?;
    apply(ctx, &client, resources, settings, yes).map(|_| ())
}

/// Plan, show the plan, and execute it once confirmed.
///
/// Returns the executed changes; empty when there was nothing to do or the
/// user declined.
pub fn apply(
    ctx: &Context,
    api: &dyn Api,
    resources: Vec<Resource>,
    settings: &Settings,
    yes: bool,
) -> Result<Vec<Change>> {
    let planned = super::plan::compute(ctx, api, resources, settings)?;
    let web_base = settings.web_base();
    printer::print_plan(&planned.plan, &web_base);

    if planned.plan.is_empty() {
        return Ok(Vec::new());
    }

    if !yes && !confirm()? {
        println!("  {} Aborted", "✗".red());
        return Ok(Vec::new());
    }

    let mut id_map = planned.id_map;
    let mut reporter = Reporter {
        web_base,
        quiet: ctx.quiet,
    };
    let changes = reconcile::execute(planned.plan, &mut id_map, api, &mut reporter)?;

    println!();
    ui::success(&format!("Done: {}", done_summary(&PlanSummary::from_changes(&changes))));
    Ok(changes)
}

fn confirm() -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        bail!("Refusing to update without a terminal to confirm; pass --yes to skip the prompt");
    }

    dialoguer::Confirm::new()
        .with_prompt("Execute Plan?")
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

fn done_summary(summary: &PlanSummary) -> String {
    format!(
        "{} created, {} updated, {} deleted",
        summary.creates, summary.updates, summary.deletes
    )
}

/// Prints every change as it completes
struct Reporter {
    web_base: String,
    quiet: bool,
}

impl ProgressCallback for Reporter {
    fn on_change_start(&mut self, change: &Change) {
        log::debug!("Starting {change}");
    }

    fn on_change_complete(&mut self, change: &Change) {
        if self.quiet {
            return;
        }
        let verb = ui::done_verb(change.change_type);
        let url = match (&change.id, change.change_type) {
            (Some(id), ChangeType::Create | ChangeType::Update) => change
                .kind
                .spec()
                .url(&self.web_base, &id.to_string())
                .dimmed()
                .to_string(),
            _ => String::new(),
        };
        println!("  {verb} {} {} {url}", change.kind, change.tracking_id);
    }
}
