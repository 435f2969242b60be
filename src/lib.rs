pub mod cli;
pub mod config;
pub mod deployment_manager;
pub mod error;
pub mod exec;
pub mod gh_client;
pub mod git_client;
pub mod outcome;
pub mod poll;
pub mod secrets;
pub mod template;
pub mod types;
pub mod ui;

mod logs;
mod status;

#[cfg(test)]
mod fake;

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use console::style;
use tracing_subscriber::EnvFilter;

pub use cli::CLI;
pub use config::Config;
pub use error::{Error, Result};

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run() -> ExitCode {
    let cli = match CLI::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_tracing(cli.verbose);

    let config = match Config::from_env_and_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red(), e);
            println!();
            Config::show_configuration_help();
            return ExitCode::FAILURE;
        }
    };

    let Some(command) = cli.command else {
        let _ = CLI::command().print_help();
        return ExitCode::SUCCESS;
    };

    match cli::dispatch(command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("  {} {}", style("Error:").red(), e);
            for line in e.guidance() {
                eprintln!("  {}  {}", style("›").dim(), style(line).dim());
            }
            eprintln!();
            ExitCode::FAILURE
        }
    }
}
