use console::style;
use tracing::debug;

use crate::config::WORKFLOW_FILE;
use crate::deployment_manager::DeploymentManager;
use crate::error::Result;
use crate::types::{Job, WorkflowRun};
use crate::ui::{Choice, duration, relative_time_str, status_icon};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Error,
    Warning,
    Other,
}

/// Error lines mention "error" but are not a count such as "3 errors".
pub fn classify_line(line: &str) -> LineKind {
    let lower = line.to_lowercase();
    if lower.contains("error") && !is_error_count(&lower) {
        LineKind::Error
    } else if lower.contains("warn") {
        LineKind::Warning
    } else {
        LineKind::Other
    }
}

fn is_error_count(lower: &str) -> bool {
    lower.match_indices(" error").any(|(at, _)| {
        lower[..at]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_digit())
    })
}

/// Last `n` lines of `text` and the total line count.
pub fn tail(text: &str, n: usize) -> (Vec<&str>, usize) {
    let lines: Vec<&str> = text.lines().collect();
    let total = lines.len();
    let shown = lines[total.saturating_sub(n)..].to_vec();
    (shown, total)
}

impl DeploymentManager {
    pub async fn logs(&self) -> Result<()> {
        self.preflight().await?;

        self.ui.label("Logs", Some("workflow run history"));
        let repo = self.host.repo_name().await?;
        self.ui.kv("repo", style(&repo).cyan());
        self.ui.blank();

        let spinner = self.ui.spinner("Fetching workflow runs");
        let runs = match self
            .host
            .list_runs(&repo, WORKFLOW_FILE, self.config.run_history)
            .await
        {
            Ok(runs) => runs,
            Err(e) => {
                debug!(error = %e, "listing runs failed");
                spinner.stop("Could not fetch workflow runs", false);
                self.ui.info("Deploy workflow may not exist yet");
                self.ui.info(format!("Run {} to create one", style("gh-pages setup").cyan()));
                self.ui.blank();
                return Ok(());
            }
        };

        if runs.is_empty() {
            spinner.stop("No runs found", true);
            self.ui.info(format!(
                "Run {} to trigger a deployment",
                style("gh-pages deploy").cyan()
            ));
            self.ui.blank();
            return Ok(());
        }
        spinner.stop(format!("{} run(s) found", runs.len()), true);
        self.ui.blank();

        let choices: Vec<Choice> = runs
            .iter()
            .map(|run| Choice::new(run.id.to_string(), run_label(run)))
            .collect();
        let picked = self.prompter.select("Select a run:", &choices)?;
        let Some(run) = runs.iter().find(|r| r.id.to_string() == picked) else {
            return Ok(());
        };
        self.ui.blank();

        let spinner = self.ui.spinner("Fetching run details");
        match self.host.list_jobs(&repo, run.id).await {
            Ok(jobs) => {
                spinner.stop(format!("{} job(s)", jobs.len()), true);
                self.render_jobs(&jobs);
                self.offer_failed_logs(&repo, &jobs).await?;
            }
            Err(e) => {
                debug!(error = %e, run = run.id, "listing jobs failed");
                spinner.stop("Could not fetch details", false);
            }
        }

        if let Some(url) = &run.html_url {
            self.ui.blank();
            self.ui.info(style(url).cyan());
        }
        self.ui.blank();
        Ok(())
    }

    fn render_jobs(&self, jobs: &[Job]) {
        for job in jobs {
            let state = job
                .conclusion
                .as_deref()
                .or(job.status.as_deref())
                .unwrap_or_default();
            self.ui.blank();
            self.ui.log(format!(
                "{}  {}  {}",
                status_icon(job.conclusion.as_deref(), job.status.as_deref()),
                style(&job.name).bold(),
                style(state).dim()
            ));

            if !job.steps.is_empty() {
                self.ui.blank();
            }
            for step in &job.steps {
                self.ui.log(format!(
                    "    {}  {}  {}",
                    status_icon(step.conclusion.as_deref(), step.status.as_deref()),
                    step.name,
                    style(duration(step.started_at.as_deref(), step.completed_at.as_deref())).dim()
                ));
            }
        }
    }

    async fn offer_failed_logs(&self, repo: &str, jobs: &[Job]) -> Result<()> {
        let failed: Vec<&Job> = jobs.iter().filter(|j| j.failed()).collect();
        if failed.is_empty() {
            return Ok(());
        }

        self.ui.blank();
        self.ui.warn(format!("{} job(s) failed", failed.len()));
        self.ui.blank();

        let mut choices: Vec<Choice> = failed
            .iter()
            .map(|j| Choice::new(j.id.to_string(), j.name.clone()))
            .collect();
        choices.push(Choice::new("skip", "Skip"));

        let picked = self.prompter.select("View full logs for a failed job?", &choices)?;
        let Some(job) = failed.iter().find(|j| j.id.to_string() == picked) else {
            return Ok(());
        };

        self.ui.blank();
        let spinner = self.ui.spinner("Fetching logs");
        let text = match self.host.job_logs(repo, job.id).await {
            Ok(text) => {
                spinner.stop("Logs retrieved", true);
                text
            }
            Err(e) => {
                debug!(error = %e, job = job.id, "fetching job logs failed");
                spinner.stop("Could not fetch logs", false);
                self.ui.info("View logs on GitHub instead");
                return Ok(());
            }
        };
        self.ui.blank();

        let limit = self.config.log_tail_lines;
        let (lines, total) = tail(&text, limit);
        if total > limit {
            self.ui.info(format!("Showing last {limit} of {total} lines"));
            self.ui.blank();
        }
        for line in lines {
            let styled = match classify_line(line) {
                LineKind::Error => style(line).red(),
                LineKind::Warning => style(line).yellow(),
                LineKind::Other => style(line).dim(),
            };
            self.ui.log(format!("  {styled}"));
        }
        Ok(())
    }
}

fn run_label(run: &WorkflowRun) -> String {
    format!(
        "{}  #{} {}  {}  {}",
        status_icon(run.conclusion.as_deref(), run.status.as_deref()),
        run.run_number,
        run.state(),
        style(relative_time_str(&run.created_at)).dim(),
        style(run.title()).dim()
    )
}
