use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kennel")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Keep Datadog monitors, dashboards, SLOs and synthetics in code", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings shared by every command; each can come from the environment
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to kennel.toml
    #[arg(long, env = "KENNEL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Only touch these projects (comma-separated)
    #[arg(short, long, env = "PROJECT", value_delimiter = ',', global = true)]
    pub project: Vec<String>,

    /// Only touch these tracking ids, project:kennel_id (comma-separated)
    #[arg(short, long, env = "TRACKING_ID", value_delimiter = ',', global = true)]
    pub tracking_id: Vec<String>,

    /// Fail when a declared id no longer exists remotely [default: true]
    #[arg(long, env = "STRICT_IMPORTS", action = clap::ArgAction::Set, global = true)]
    pub strict_imports: Option<bool>,

    /// Datadog site, e.g. datadoghq.eu [default: datadoghq.com]
    #[arg(long, env = "DATADOG_SITE", global = true)]
    pub site: Option<String>,

    /// Datadog API key
    #[arg(long, env = "DATADOG_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Datadog application key
    #[arg(long, env = "DATADOG_APP_KEY", hide_env_values = true, global = true)]
    pub app_key: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what `update` would change
    Plan,

    /// Apply the plan to Datadog
    Update {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Write every declared payload to the generated directory
    Generate,

    /// Load and check every declared resource without calling the API
    Validate,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
