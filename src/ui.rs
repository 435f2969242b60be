//! Terminal output and interactive prompts.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::{Error, Result};
use crate::outcome::StepOutcome;

const PAD: &str = "  ";

#[derive(Debug, Default, Clone, Copy)]
pub struct Ui;

impl Ui {
    pub fn new() -> Self {
        Self
    }

    pub fn log(&self, msg: impl Display) {
        println!("{PAD}{msg}");
    }

    pub fn blank(&self) {
        println!();
    }

    pub fn banner(&self) {
        self.blank();
        self.log(format!(
            "{} {}",
            style("gh-pages").bold(),
            style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
        ));
    }

    /// Bold section title with an optional dimmed subtitle.
    pub fn label(&self, text: &str, sub: Option<&str>) {
        self.blank();
        match sub {
            Some(sub) => self.log(format!("{}  {}", style(text).bold(), style(sub).dim())),
            None => self.log(style(text).bold()),
        }
        self.blank();
    }

    pub fn heading(&self, text: &str) {
        self.blank();
        self.log(style(text).dim());
        self.blank();
    }

    pub fn kv(&self, key: &str, value: impl Display) {
        self.log(format!("{}  {}", style(key).dim(), value));
    }

    pub fn ok(&self, msg: impl Display) {
        self.log(format!("{}  {}", style("✓").green(), msg));
    }

    pub fn fail(&self, msg: impl Display) {
        self.log(format!("{}  {}", style("✗").red(), msg));
    }

    pub fn warn(&self, msg: impl Display) {
        self.log(format!("{}  {}", style("!").yellow(), style(msg).yellow()));
    }

    pub fn info(&self, msg: impl Display) {
        self.log(format!("{}  {}", style("›").dim(), style(msg).dim()));
    }

    pub fn done(&self, msg: impl Display) {
        self.blank();
        self.log(format!("{}  {}", style("✓").green().bold(), style(msg).bold()));
        self.blank();
    }

    pub fn report(&self, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Succeeded(msg) | StepOutcome::AlreadyDone(msg) => self.ok(msg),
            StepOutcome::Failed { message, guidance } => {
                self.fail(message);
                for line in guidance {
                    self.info(line);
                }
            }
        }
    }

    pub fn spinner(&self, msg: impl Into<String>) -> Spinner {
        Spinner::start(msg.into())
    }
}

/// A spinner that is replaced by a single status line when stopped.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    fn start(msg: String) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("  {spinner:.cyan}  {msg}") {
            bar.set_style(spinner_style.tick_chars("⠋⠙⠸⠴⠦⠇ "));
        }
        bar.set_message(msg);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    pub fn stop(self, msg: impl Display, success: bool) {
        self.bar.finish_and_clear();
        let ui = Ui::new();
        if success { ui.ok(msg) } else { ui.fail(msg) }
    }

    pub fn finish(self, outcome: &StepOutcome) {
        self.bar.finish_and_clear();
        Ui::new().report(outcome);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Source of answers to interactive questions.
pub trait Prompter: Send + Sync {
    /// Returns the `value` of the chosen option.
    fn select(&self, question: &str, choices: &[Choice]) -> Result<String>;
    /// Returns the trimmed answer, or `default` when the answer is empty.
    fn input(&self, question: &str, default: Option<&str>) -> Result<String>;
}

/// Reads answers from stdin. End of input aborts the command.
#[derive(Debug, Default)]
pub struct TermPrompter;

impl TermPrompter {
    fn read_line(&self) -> Result<String> {
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(Error::Aborted);
        }
        Ok(line.trim().to_string())
    }
}

impl Prompter for TermPrompter {
    fn select(&self, question: &str, choices: &[Choice]) -> Result<String> {
        println!("{PAD}{} {}", style("?").cyan(), style(question).bold());
        for (i, choice) in choices.iter().enumerate() {
            println!("{PAD}  [{}] {}", style(i + 1).cyan().bold(), choice.label);
        }

        loop {
            print!("{PAD}{}", style(format!("Select (1-{}): ", choices.len())).cyan());
            let answer = self.read_line()?;
            match answer.parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => return Ok(choices[n - 1].value.clone()),
                _ => println!(
                    "{PAD}{}",
                    style(format!("Please enter a number between 1 and {}", choices.len())).red()
                ),
            }
        }
    }

    fn input(&self, question: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(def) => print!("{PAD}{} {} {} ", style("?").cyan(), style(question).bold(), style(format!("({def})")).dim()),
            None => print!("{PAD}{} {} ", style("?").cyan(), style(question).bold()),
        }
        let answer = self.read_line()?;
        if answer.is_empty() {
            Ok(default.unwrap_or_default().to_string())
        } else {
            Ok(answer)
        }
    }
}

/// Icon for a run, job or step state.
pub fn status_icon(conclusion: Option<&str>, status: Option<&str>) -> String {
    match (conclusion, status) {
        (Some("success"), _) => style("✓").green().to_string(),
        (Some("failure"), _) => style("✗").red().to_string(),
        (Some("skipped"), _) => style("-").dim().to_string(),
        (_, Some("in_progress")) => style("▶").cyan().to_string(),
        _ => style("○").dim().to_string(),
    }
}

/// Colors `text` according to a run state.
pub fn status_text(text: &str, conclusion: Option<&str>, status: Option<&str>) -> String {
    match (conclusion, status) {
        (Some("success"), _) => style(text).green().to_string(),
        (Some("failure"), _) => style(text).red().to_string(),
        (_, Some("in_progress")) => style(text).cyan().to_string(),
        _ => style(text).yellow().to_string(),
    }
}

pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    let (mins, hours, days) = (secs / 60, secs / 3600, secs / 86_400);

    if secs < 60 {
        "just now".to_string()
    } else if mins < 60 {
        format!("{mins}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days < 30 {
        format!("{days}d ago")
    } else {
        then.with_timezone(&Local).format("%Y-%m-%d").to_string()
    }
}

/// Relative time for an RFC 3339 timestamp; the raw text when it does not parse.
pub fn relative_time_str(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| relative_time(t.with_timezone(&Utc), Utc::now()))
        .unwrap_or_else(|_| timestamp.to_string())
}

pub fn duration(start: Option<&str>, end: Option<&str>) -> String {
    let (Some(start), Some(end)) = (start, end) else {
        return String::new();
    };
    let (Ok(start), Ok(end)) = (
        DateTime::parse_from_rfc3339(start),
        DateTime::parse_from_rfc3339(end),
    ) else {
        return String::new();
    };

    let secs = (end - start).num_seconds();
    if secs < 1 {
        "<1s".to_string()
    } else if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
