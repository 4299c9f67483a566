//! `kennel validate` - load everything, call nothing

use anyhow::Result;
use reconcile::{Resource, ResourceKind};

use crate::Context;
use crate::config::Settings;
use crate::ui;

pub fn run(ctx: &Context, settings: &Settings) -> Result<()> {
    let resources = super::load_resources(settings)?;
    reconcile::resource::check_duplicates(&resources)?;

    if !ctx.quiet {
        ui::header("Declared resources");
        for (kind, count) in count_by_kind(&resources) {
            ui::row(kind.name(), count);
        }
        println!();
    }
    ui::success(&format!("{} resources are valid", resources.len()));
    Ok(())
}

fn count_by_kind(resources: &[Resource]) -> Vec<(ResourceKind, usize)> {
    ResourceKind::ALL
        .into_iter()
        .map(|kind| (kind, resources.iter().filter(|r| r.kind() == kind).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::plan::tests::monitor;
    use serde_json::json;

    #[test]
    fn test_count_by_kind() {
        let resources = vec![monitor("a", json!({})), monitor("b", json!({}))];
        assert_eq!(count_by_kind(&resources), vec![(ResourceKind::Monitor, 2)]);
        assert!(count_by_kind(&[]).is_empty());
    }
}
