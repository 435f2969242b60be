use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::Config;
use crate::deployment_manager::DeploymentManager;
use crate::error::Result;
use crate::ui::Ui;

#[derive(Debug, Parser)]
#[command(
    name = "gh-pages",
    version,
    about = "Set up and deploy GitHub Pages sites through GitHub Actions",
    disable_version_flag = true
)]
pub struct CLI {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(short = 'v', long = "version", action = ArgAction::Version, help = "Show version")]
    pub version: Option<bool>,

    #[arg(short = 'C', long, global = true, help = "Repository directory (defaults to the current directory)")]
    pub dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "SECONDS", help = "Seconds between deployment checks")]
    pub poll_interval: Option<u64>,

    #[arg(long, global = true, value_name = "N", help = "Deployment checks before giving up")]
    pub max_attempts: Option<u32>,

    #[arg(long, global = true, value_name = "URL", help = "Where to download the deploy workflow from")]
    pub template_url: Option<String>,

    #[arg(long, global = true, action = ArgAction::Count, help = "Increase log verbosity (--verbose, --verbose --verbose)")]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deploy your site to GitHub Pages
    Deploy,
    /// Set up CI/CD workflow and permissions
    Setup,
    /// Check deployment status
    Status,
    /// View workflow run logs
    Logs,
    /// Upload .env secrets to GitHub
    Put {
        #[command(subcommand)]
        target: Option<PutTarget>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PutTarget {
    /// Upload secrets from an env file
    Secrets {
        /// Env file to read (defaults to the first of .env, .env.local, .env.production, .env.staging)
        path: Option<PathBuf>,
    },
    /// Anything else prints the `put` usage
    #[command(external_subcommand)]
    Other(Vec<String>),
}

pub fn print_put_usage(ui: &Ui) {
    use console::style;

    ui.heading("USAGE");
    ui.log(format!("  gh-pages put {}", style("<subcommand>").cyan()));
    ui.heading("SUBCOMMANDS");
    ui.log(format!("  {}   Upload secrets from .env to GitHub", style("secrets").white()));
    ui.heading("EXAMPLES");
    ui.log(format!("  {} gh-pages put secrets", style("$").dim()));
    ui.log(format!("  {} gh-pages put secrets .env.production", style("$").dim()));
    ui.blank();
}

// Main application logic
pub async fn dispatch(command: Command, config: Config) -> Result<()> {
    let ui = Ui::new();
    ui.banner();

    let manager = DeploymentManager::for_repository(config);
    match command {
        Command::Deploy => manager.deploy().await,
        Command::Setup => manager.setup().await,
        Command::Status => manager.status().await,
        Command::Logs => manager.logs().await,
        Command::Put {
            target: Some(PutTarget::Secrets { path }),
        } => manager.put_secrets(path).await,
        Command::Put {
            target: None | Some(PutTarget::Other(_)),
        } => {
            print_put_usage(&ui);
            Ok(())
        }
    }
}
