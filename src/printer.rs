//! Plan display

use colored::Colorize;
use reconcile::{ChangeType, DiffEntry, DiffOp, Plan, PlanSummary};
use serde_json::Value;

use crate::ui;

/// Longest rendered value before it is cut
const MAX_VALUE_LEN: usize = 100;

/// One rendered diff line, before coloring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub op: DiffOp,
    pub text: String,
}

/// Print a plan grouped by create, update and delete
pub fn print_plan(plan: &Plan, web_base: &str) {
    println!();
    if plan.is_empty() {
        println!("  {} Nothing to do", "✓".green());
        return;
    }

    if !plan.creates.is_empty() {
        ui::section(ChangeType::Create, plan.creates.len());
        for create in &plan.creates {
            let resource = &create.resource;
            println!(
                "  {} {} {}",
                ui::paint(ChangeType::Create, "+"),
                resource.kind(),
                resource.tracking_id()
            );
        }
    }

    if !plan.updates.is_empty() {
        ui::section(ChangeType::Update, plan.updates.len());
        for update in &plan.updates {
            println!(
                "  {} {} {} {}",
                ui::paint(ChangeType::Update, "~"),
                update.resource.kind(),
                update.resource.tracking_id(),
                update.actual.url(web_base).dimmed()
            );
            for entry in &update.diff {
                for line in render_entry(entry) {
                    print_line(&line);
                }
            }
        }
    }

    if !plan.deletes.is_empty() {
        ui::section(ChangeType::Delete, plan.deletes.len());
        for delete in &plan.deletes {
            let actual = &delete.actual;
            let tracking_id = delete
                .tracking_id()
                .map(ToString::to_string)
                .unwrap_or_default();
            println!(
                "  {} {} {} {}",
                ui::paint(ChangeType::Delete, "-"),
                actual.kind,
                tracking_id,
                actual.url(web_base).dimmed()
            );
        }
    }

    println!();
    println!("Plan: {}", PlanSummary::from_plan(plan).to_string().bold());
}

fn print_line(line: &Line) {
    let text = format!("    {} {}", line.op.symbol(), line.text);
    match line.op {
        DiffOp::Add => println!("{}", text.green()),
        DiffOp::Remove => println!("{}", text.red()),
        DiffOp::Change => println!("{}", text.yellow()),
    }
}

/// Render one diff entry.
///
/// A changed multi-line string becomes a header plus one line per changed
/// text line; everything else is a single line.
pub fn render_entry(entry: &DiffEntry) -> Vec<Line> {
    match (entry.op, &entry.old, &entry.new) {
        (DiffOp::Change, Some(Value::String(old)), Some(Value::String(new)))
            if old.contains('\n') || new.contains('\n') =>
        {
            let mut lines = vec![Line {
                op: DiffOp::Change,
                text: entry.path.clone(),
            }];
            lines.extend(text_diff(old, new));
            lines
        }
        (DiffOp::Change, old, new) => vec![Line {
            op: DiffOp::Change,
            text: format!(
                "{} {} -> {}",
                entry.path,
                format_value(old.as_ref()),
                format_value(new.as_ref())
            ),
        }],
        (DiffOp::Add, _, new) => vec![Line {
            op: DiffOp::Add,
            text: format!("{} {}", entry.path, format_value(new.as_ref())),
        }],
        (DiffOp::Remove, old, _) => vec![Line {
            op: DiffOp::Remove,
            text: format!("{} {}", entry.path, format_value(old.as_ref())),
        }],
    }
}

/// Changed lines of a multi-line string, indented under the path
fn text_diff(old: &str, new: &str) -> Vec<Line> {
    let diff = similar::TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .filter_map(|change| {
            let op = match change.tag() {
                similar::ChangeTag::Delete => DiffOp::Remove,
                similar::ChangeTag::Insert => DiffOp::Add,
                similar::ChangeTag::Equal => return None,
            };
            Some(Line {
                op,
                text: format!("  {}", change.value().trim_end_matches('\n')),
            })
        })
        .collect()
}

/// Compact JSON, cut at [`MAX_VALUE_LEN`] characters
pub fn format_value(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "null".to_string();
    };
    let text = value.to_string();
    match text.char_indices().nth(MAX_VALUE_LEN) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text,
    }
}
