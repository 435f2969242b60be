use std::path::PathBuf;
use std::time::Duration;

use crate::cli::CLI;
use crate::error::{Error, Result};
use crate::poll::PollSettings;
use crate::template::DEFAULT_TEMPLATE_URL;

/// Workflow file location, relative to the repository root.
pub const WORKFLOW_PATH: &str = ".github/workflows/deploy.yml";
/// Workflow file name as GitHub refers to it.
pub const WORKFLOW_FILE: &str = "deploy.yml";
/// Branch whose appearance means a deployment finished.
pub const MARKER_BRANCH: &str = "public";

const DEFAULT_BUILD: &str = "bun install && bun run build";

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub template_url: String,
    pub poll: PollSettings,
    /// Local build steps for the orphan-branch route, as argument lists.
    pub build_commands: Vec<Vec<String>>,
    /// Runs listed by `status`.
    pub recent_runs: usize,
    /// Runs offered by `logs`.
    pub run_history: usize,
    /// Lines of job output shown by `logs`.
    pub log_tail_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            template_url: DEFAULT_TEMPLATE_URL.to_string(),
            poll: PollSettings::default(),
            build_commands: default_build(),
            recent_runs: 3,
            run_history: 10,
            log_tail_lines: 80,
        }
    }
}

impl Config {
    pub fn from_env_and_cli(cli: &CLI) -> Result<Self> {
        Self::from_lookup(cli, |key| std::env::var(key).ok())
    }

    /// Priority: CLI args > environment > defaults.
    pub fn from_lookup(cli: &CLI, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let root = match &cli.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        let template_url = cli
            .template_url
            .clone()
            .or_else(|| lookup("GH_PAGES_TEMPLATE_URL"))
            .unwrap_or(defaults.template_url);

        let interval_secs = match cli.poll_interval {
            Some(secs) => secs,
            None => parse_env(&lookup, "GH_PAGES_POLL_INTERVAL")?
                .unwrap_or(defaults.poll.interval.as_secs()),
        };

        let max_attempts = match cli.max_attempts {
            Some(n) => n,
            None => parse_env(&lookup, "GH_PAGES_MAX_ATTEMPTS")?.unwrap_or(defaults.poll.max_attempts),
        };
        if max_attempts == 0 {
            return Err(Error::Config("max attempts must be at least 1".to_string()));
        }

        let build_commands = match lookup("GH_PAGES_BUILD") {
            Some(build) => {
                let commands = parse_build_commands(&build)?;
                if commands.is_empty() {
                    return Err(Error::Config("GH_PAGES_BUILD is empty".to_string()));
                }
                commands
            }
            None => defaults.build_commands,
        };

        Ok(Config {
            root,
            template_url,
            poll: PollSettings {
                interval: Duration::from_secs(interval_secs),
                max_attempts,
            },
            build_commands,
            ..defaults
        })
    }

    pub fn workflow_path(&self) -> PathBuf {
        self.root.join(WORKFLOW_PATH)
    }

    pub fn show_configuration_help() {
        println!("Configuration options:");
        println!("  1. Command line flags:");
        println!(
            "     gh-pages deploy --dir ./site --poll-interval 10 --max-attempts 30 --template-url https://example.com/deploy.yml"
        );
        println!();
        println!("  2. Environment variables:");
        println!("     GH_PAGES_POLL_INTERVAL=5");
        println!("     GH_PAGES_MAX_ATTEMPTS=60");
        println!("     GH_PAGES_TEMPLATE_URL={DEFAULT_TEMPLATE_URL}");
        println!("     GH_PAGES_BUILD=\"{DEFAULT_BUILD}\"");
        println!();
        println!("Command line flags take precedence over environment variables.");
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} must be a whole number, got '{raw}'"))),
        None => Ok(None),
    }
}

fn default_build() -> Vec<Vec<String>> {
    [&["bun", "install"][..], &["bun", "run", "build"][..]]
        .iter()
        .map(|args| args.iter().map(|a| a.to_string()).collect())
        .collect()
}

/// Split a build line into one argument list per `&&`-joined command.
///
/// Single and double quotes group words. A backslash escapes the next
/// character outside single quotes. No other shell syntax is interpreted.
pub fn parse_build_commands(raw: &str) -> Result<Vec<Vec<String>>> {
    let mut commands = Vec::new();
    let mut args: Vec<String> = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = raw.chars().peekable();

    let finish_word = |word: &mut String, in_word: &mut bool, args: &mut Vec<String>| {
        if *in_word {
            args.push(std::mem::take(word));
            *in_word = false;
        }
    };

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => match chars.next() {
                Some(next) => {
                    word.push(next);
                    in_word = true;
                }
                None => return Err(Error::Config(format!("dangling escape in build command '{raw}'"))),
            },
            (Some(_), c) => word.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, '&') if chars.peek() == Some(&'&') => {
                chars.next();
                finish_word(&mut word, &mut in_word, &mut args);
                if !args.is_empty() {
                    commands.push(std::mem::take(&mut args));
                }
            }
            (None, c) if c.is_whitespace() => finish_word(&mut word, &mut in_word, &mut args),
            (None, c) => {
                word.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(Error::Config(format!("unterminated quote in build command '{raw}'")));
    }
    finish_word(&mut word, &mut in_word, &mut args);
    if !args.is_empty() {
        commands.push(args);
    }
    Ok(commands)
}
