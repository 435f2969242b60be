use console::style;

use crate::config::{MARKER_BRANCH, WORKFLOW_FILE, WORKFLOW_PATH};
use crate::deployment_manager::DeploymentManager;
use crate::error::Result;
use crate::types::{PagesInfo, WorkflowRun};
use crate::ui::{relative_time_str, status_icon, status_text};

/// Results of the independent `status` checks. A failed check keeps its
/// error text and never hides the others.
#[derive(Debug)]
pub struct StatusReport {
    pub workflow: bool,
    pub pages: Result<PagesInfo, String>,
    pub marker_branch: bool,
    pub runs: Result<Vec<WorkflowRun>, String>,
    pub secrets: Result<usize, String>,
}

impl DeploymentManager {
    pub async fn collect_status(&self, repo: &str) -> StatusReport {
        StatusReport {
            workflow: self.config.workflow_path().exists(),
            pages: self.host.pages_info(repo).await.map_err(|e| e.to_string()),
            marker_branch: self.git.remote_branch_exists(MARKER_BRANCH).await,
            runs: self
                .host
                .list_runs(repo, WORKFLOW_FILE, self.config.recent_runs)
                .await
                .map_err(|e| e.to_string()),
            secrets: self.host.secret_count(repo).await.map_err(|e| e.to_string()),
        }
    }

    pub async fn status(&self) -> Result<()> {
        self.preflight().await?;

        self.ui.label("Status", None);
        let (repo, _) = self.identify().await?;

        let spinner = self.ui.spinner("Checking deployment status");
        let report = self.collect_status(&repo).await;
        spinner.stop("Status collected", true);

        self.render_status(&report);
        Ok(())
    }

    fn render_status(&self, report: &StatusReport) {
        let ui = &self.ui;

        ui.heading("WORKFLOW");
        if report.workflow {
            ui.ok(format!("Found at {}", style(WORKFLOW_PATH).cyan()));
        } else {
            ui.warn(format!("Not found at {WORKFLOW_PATH}"));
            ui.info(format!("Run {} to create one", style("gh-pages setup").cyan()));
        }

        ui.heading("GITHUB PAGES");
        match &report.pages {
            Ok(pages) => {
                ui.ok("Enabled");
                if let Some(url) = &pages.html_url {
                    ui.kv("  url", style(url).cyan());
                }
                if let Some(source) = &pages.source {
                    ui.kv("  source", style(&source.branch).cyan());
                }
                if let Some(status) = &pages.status {
                    let status = if status == "built" {
                        style(status).green()
                    } else {
                        style(status).yellow()
                    };
                    ui.kv("  status", status);
                }
                if let Some(cname) = &pages.cname {
                    ui.kv("  domain", style(cname).cyan());
                }
                match pages.https_enforced {
                    Some(true) => ui.kv("  https", style("enforced").green()),
                    Some(false) => ui.kv("  https", style("not enforced").yellow()),
                    None => {}
                }
            }
            Err(_) => {
                ui.fail("Not enabled");
                ui.info(format!("Run {} to enable", style("gh-pages deploy").cyan()));
            }
        }

        ui.heading("PUBLIC BRANCH");
        if report.marker_branch {
            ui.ok(format!("Branch {} exists on remote", style(MARKER_BRANCH).cyan()));
        } else {
            ui.fail(format!("Branch {} not found", style(MARKER_BRANCH).cyan()));
            ui.info("Created after first deployment");
        }

        ui.heading("RECENT RUNS");
        match &report.runs {
            Ok(runs) if runs.is_empty() => {
                ui.ok("No runs found");
                ui.info("Workflow has not been triggered yet");
            }
            Ok(runs) => {
                ui.ok(format!("{} recent run(s)", runs.len()));
                ui.blank();
                for run in runs {
                    ui.log(format!("  {}", run_summary(run)));
                }
            }
            Err(_) => {
                ui.fail("Could not fetch runs");
                ui.info("Deploy workflow may not exist yet");
            }
        }

        ui.heading("SECRETS");
        match report.secrets {
            Ok(0) => {
                ui.ok("No secrets configured");
                ui.info(format!("Run {} to upload", style("gh-pages put secrets").cyan()));
            }
            Ok(count) => ui.ok(format!("{count} secret(s) configured")),
            Err(_) => ui.fail("Could not check secrets"),
        }
        ui.blank();
    }
}

/// One-line run summary: icon, state, age and commit title.
pub(crate) fn run_summary(run: &WorkflowRun) -> String {
    let (conclusion, status) = (run.conclusion.as_deref(), run.status.as_deref());
    format!(
        "{}  {}  {}  {}",
        status_icon(conclusion, status),
        status_text(run.state(), conclusion, status),
        style(relative_time_str(&run.created_at)).dim(),
        style(run.title()).dim()
    )
}
