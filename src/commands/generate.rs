//! `kennel generate` - refresh the generated directory

use anyhow::Result;

use crate::Context;
use crate::config::Settings;
use crate::store::Store;
use crate::ui;

pub fn run(ctx: &Context, settings: &Settings) -> Result<()> {
    let resources = super::load_resources(settings)?;
    reconcile::resource::check_duplicates(&resources)?;

    let store = Store::new(&settings.generated_dir);
    let report = store.write(&resources, &settings.filter)?;

    if !ctx.quiet {
        for path in &report.written {
            ui::dim(&format!("wrote {}", path.display()));
        }
        for path in &report.removed {
            ui::dim(&format!("removed {}", path.display()));
        }
    }

    if report.is_clean() {
        ui::success(&format!(
            "{} up to date ({} files)",
            settings.generated_dir.display(),
            report.unchanged
        ));
    } else {
        ui::success(&format!(
            "Generated {} files, removed {}, {} unchanged",
            report.written.len(),
            report.removed.len(),
            report.unchanged
        ));
    }
    Ok(())
}
