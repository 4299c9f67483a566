mod cli;
mod commands;
mod config;
mod paths;
mod printer;
mod progress;
mod projects;
mod store;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Settings;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context { quiet: cli.quiet };

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "kennel", &mut io::stdout());
        return Ok(());
    }

    let settings = Settings::resolve(&cli.global)?;
    if settings.filter.is_active() && !ctx.quiet {
        let scope: Vec<&str> = cli
            .global
            .project
            .iter()
            .chain(&cli.global.tracking_id)
            .map(String::as_str)
            .collect();
        ui::scope(&scope);
    }

    match cli.command {
        Command::Plan => commands::plan::run(&ctx, &settings),
        Command::Update { yes } => commands::update::run(&ctx, &settings, yes),
        Command::Generate => commands::generate::run(&ctx, &settings),
        Command::Validate => commands::validate::run(&ctx, &settings),
        Command::Completions { .. } => Ok(()),
    }
}
