//! Terminal output shared by the commands

use colored::{ColoredString, Colorize};
use reconcile::ChangeType;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Errors go to stderr so plan output stays pipeable
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a title underlined to its width
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Aligned `label value` row under a header
pub fn row(label: &str, value: impl std::fmt::Display) {
    dim(&format!("{label:<18} {value}"));
}

/// Announce that only part of the declared resources take part in this run
pub fn scope(filters: &[&str]) {
    if !filters.is_empty() {
        info(&format!("Limited to {}", filters.join(", ")));
    }
}

/// Color `text` the way its change type is shown everywhere
pub fn paint(change_type: ChangeType, text: &str) -> ColoredString {
    match change_type {
        ChangeType::Create => text.green(),
        ChangeType::Update => text.yellow(),
        ChangeType::Delete => text.red(),
    }
}

/// Plan section heading, e.g. `Create (2)`
pub fn section(change_type: ChangeType, count: usize) {
    let label = match change_type {
        ChangeType::Create => "Create",
        ChangeType::Update => "Update",
        ChangeType::Delete => "Delete",
    };
    println!("{} ({count})", paint(change_type, label).bold());
}

/// Past-tense verb for a change that went through
pub fn done_verb(change_type: ChangeType) -> ColoredString {
    let verb = match change_type {
        ChangeType::Create => "Created",
        ChangeType::Update => "Updated",
        ChangeType::Delete => "Deleted",
    };
    paint(change_type, verb)
}
