//! GitHub access through the `gh` CLI.
//!
//! The [`Host`] trait covers every remote call the commands make, so the
//! flows in `deployment_manager` can run against a fake in tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{Error, Result};
use crate::exec::{self, CommandError};
use crate::types::{Job, PagesInfo, WorkflowRun};

#[async_trait]
pub trait Host: Send + Sync {
    /// Fails with [`Error::MissingTool`] when `gh` cannot be spawned.
    async fn ensure_installed(&self) -> Result<()>;
    /// `owner/name` of the repository in the working directory.
    async fn repo_name(&self) -> Result<String>;
    /// `Ok(false)` while the branch does not exist yet.
    async fn branch_exists(&self, repo: &str, branch: &str) -> Result<bool>;
    async fn set_workflow_permissions(&self, repo: &str) -> Result<()>;
    async fn workflow_permissions(&self, repo: &str) -> Result<String>;
    async fn enable_actions(&self, repo: &str) -> Result<()>;
    async fn dispatch_workflow(&self, workflow: &str, git_ref: &str) -> Result<()>;
    async fn list_runs(&self, repo: &str, workflow: &str, limit: usize) -> Result<Vec<WorkflowRun>>;
    async fn list_jobs(&self, repo: &str, run_id: u64) -> Result<Vec<Job>>;
    async fn job_logs(&self, repo: &str, job_id: u64) -> Result<String>;
    async fn upload_secrets_file(&self, path: &Path) -> Result<()>;
    /// The value is written to `gh` on stdin and not kept.
    async fn set_secret(&self, key: &str, value: &str) -> Result<()>;
    async fn secret_count(&self, repo: &str) -> Result<usize>;
    async fn enable_pages(&self, repo: &str, branch: &str) -> Result<()>;
    async fn pages_info(&self, repo: &str) -> Result<PagesInfo>;
}

pub struct GhClient {
    root: PathBuf,
}

impl GhClient {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    async fn gh(&self, args: &[&str]) -> Result<String, CommandError> {
        exec::run(&self.root, "gh", args).await
    }

    async fn api_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let out = self.gh(args).await?;
        serde_json::from_str(&out).map_err(|source| Error::Parse {
            command: format!("gh {}", args.join(" ")),
            source,
        })
    }
}

#[async_trait]
impl Host for GhClient {
    async fn ensure_installed(&self) -> Result<()> {
        if exec::is_callable(&self.root, "gh").await {
            Ok(())
        } else {
            Err(Error::MissingTool {
                tool: "GitHub CLI",
                install_url: "https://cli.github.com",
            })
        }
    }

    async fn repo_name(&self) -> Result<String> {
        let out = self
            .gh(&["repo", "view", "--json", "nameWithOwner", "-q", ".nameWithOwner"])
            .await?;
        Ok(out.trim().to_string())
    }

    async fn branch_exists(&self, repo: &str, branch: &str) -> Result<bool> {
        let path = format!("repos/{repo}/branches/{branch}");
        branch_lookup(self.gh(&["api", &path, "--jq", ".name"]).await, branch)
    }

    async fn set_workflow_permissions(&self, repo: &str) -> Result<()> {
        let path = format!("repos/{repo}/actions/permissions/workflow");
        self.gh(&["api", "-X", "PUT", &path, "-f", "default_workflow_permissions=write"])
            .await?;
        info!("Workflow permissions for {} set to write", repo);
        Ok(())
    }

    async fn workflow_permissions(&self, repo: &str) -> Result<String> {
        let path = format!("repos/{repo}/actions/permissions/workflow");
        let out = self
            .gh(&["api", &path, "--jq", ".default_workflow_permissions"])
            .await?;
        Ok(out.trim().to_string())
    }

    async fn enable_actions(&self, repo: &str) -> Result<()> {
        let path = format!("repos/{repo}/actions/permissions");
        self.gh(&["api", "-X", "PUT", &path, "-f", "enabled=true", "-f", "allowed_actions=all"])
            .await?;
        Ok(())
    }

    async fn dispatch_workflow(&self, workflow: &str, git_ref: &str) -> Result<()> {
        self.gh(&["workflow", "run", workflow, "--ref", git_ref]).await?;
        info!("Dispatched {} on {}", workflow, git_ref);
        Ok(())
    }

    async fn list_runs(&self, repo: &str, workflow: &str, limit: usize) -> Result<Vec<WorkflowRun>> {
        let path = format!("repos/{repo}/actions/workflows/{workflow}/runs");
        let jq = format!(".workflow_runs[:{limit}]");
        self.api_json(&["api", &path, "--jq", &jq]).await
    }

    async fn list_jobs(&self, repo: &str, run_id: u64) -> Result<Vec<Job>> {
        let path = format!("repos/{repo}/actions/runs/{run_id}/jobs");
        self.api_json(&["api", &path, "--jq", ".jobs"]).await
    }

    async fn job_logs(&self, repo: &str, job_id: u64) -> Result<String> {
        let path = format!("repos/{repo}/actions/jobs/{job_id}/logs");
        Ok(self.gh(&["api", &path]).await?)
    }

    async fn upload_secrets_file(&self, path: &Path) -> Result<()> {
        let file = path.to_string_lossy();
        self.gh(&["secret", "set", "-f", &file]).await?;
        Ok(())
    }

    async fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        exec::run_with_input(&self.root, "gh", &["secret", "set", key], Some(value)).await?;
        Ok(())
    }

    async fn secret_count(&self, repo: &str) -> Result<usize> {
        let path = format!("repos/{repo}/actions/secrets");
        let out = self.gh(&["api", &path, "--jq", ".secrets | length"]).await?;
        out.trim()
            .parse()
            .map_err(|_| Error::Unexpected {
                command: format!("gh api {path}"),
                output: out.trim().to_string(),
            })
    }

    async fn enable_pages(&self, repo: &str, branch: &str) -> Result<()> {
        let path = format!("repos/{repo}/pages");
        let source = format!("source[branch]={branch}");
        self.gh(&["api", &path, "-X", "POST", "-f", &source, "-f", "source[path]=/"])
            .await?;
        info!("Pages enabled for {} from {}", repo, branch);
        Ok(())
    }

    async fn pages_info(&self, repo: &str) -> Result<PagesInfo> {
        let path = format!("repos/{repo}/pages");
        self.api_json(&["api", &path]).await
    }
}

/// A single-branch lookup answers 404 until the branch is pushed.
fn branch_lookup(result: Result<String, CommandError>, branch: &str) -> Result<bool> {
    match result {
        Ok(out) => Ok(out.trim() == branch),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}
