use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::error::{Error, Result};
use crate::exec::{self, CommandError};

/// Local version-control operations used by the deploy flows.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Fails with [`Error::MissingTool`] when `git` cannot be spawned.
    async fn ensure_installed(&self) -> Result<()>;
    async fn is_repository(&self) -> bool;
    /// Current branch name, `main` when it cannot be determined.
    async fn current_branch(&self) -> String;
    async fn has_changes(&self) -> bool;
    async fn add_all(&self) -> Result<(), CommandError>;
    async fn add(&self, paths: &[String]) -> Result<(), CommandError>;
    async fn commit(&self, message: &str, allow_empty: bool) -> Result<(), CommandError>;
    async fn push(&self, branch: &str, force: bool) -> Result<(), CommandError>;
    async fn stash(&self) -> Result<(), CommandError>;
    async fn stash_pop(&self) -> Result<(), CommandError>;
    async fn remote_branch_exists(&self, branch: &str) -> bool;
    async fn checkout(&self, branch: &str) -> Result<(), CommandError>;
    /// Switch to `branch`, discarding index and working tree changes to tracked files.
    async fn force_checkout(&self, branch: &str) -> Result<(), CommandError>;
    async fn checkout_orphan(&self, branch: &str) -> Result<(), CommandError>;
    /// Remove every tracked file from the index and working tree.
    async fn remove_tracked(&self) -> Result<(), CommandError>;
}

pub struct GitClient {
    root: PathBuf,
}

impl GitClient {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    async fn git(&self, args: &[&str]) -> Result<String, CommandError> {
        exec::run(&self.root, "git", args).await
    }
}

#[async_trait]
impl Vcs for GitClient {
    async fn ensure_installed(&self) -> Result<()> {
        if exec::is_callable(&self.root, "git").await {
            Ok(())
        } else {
            Err(Error::MissingTool {
                tool: "git",
                install_url: "https://git-scm.com/downloads",
            })
        }
    }

    async fn is_repository(&self) -> bool {
        self.git(&["rev-parse", "--git-dir"]).await.is_ok()
    }

    async fn current_branch(&self) -> String {
        match self.git(&["branch", "--show-current"]).await {
            Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
            _ => "main".to_string(),
        }
    }

    async fn has_changes(&self) -> bool {
        self.git(&["status", "--porcelain"])
            .await
            .map(|out| !out.trim().is_empty())
            .unwrap_or(false)
    }

    async fn add_all(&self) -> Result<(), CommandError> {
        self.git(&["add", "."]).await.map(|_| ())
    }

    async fn add(&self, paths: &[String]) -> Result<(), CommandError> {
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git(&args).await.map(|_| ())
    }

    async fn commit(&self, message: &str, allow_empty: bool) -> Result<(), CommandError> {
        let mut args = vec!["commit", "-m", message];
        if allow_empty {
            args.push("--allow-empty");
        }
        self.git(&args).await?;
        info!("Committed: {}", message);
        Ok(())
    }

    async fn push(&self, branch: &str, force: bool) -> Result<(), CommandError> {
        let mut args = vec!["push", "origin", branch];
        if force {
            args.push("--force");
        }
        self.git(&args).await?;
        info!("Pushed {} to origin", branch);
        Ok(())
    }

    async fn stash(&self) -> Result<(), CommandError> {
        self.git(&["stash", "--include-untracked"]).await.map(|_| ())
    }

    async fn stash_pop(&self) -> Result<(), CommandError> {
        self.git(&["stash", "pop"]).await.map(|_| ())
    }

    async fn remote_branch_exists(&self, branch: &str) -> bool {
        self.git(&["ls-remote", "--exit-code", "--heads", "origin", branch])
            .await
            .is_ok()
    }

    async fn checkout(&self, branch: &str) -> Result<(), CommandError> {
        self.git(&["checkout", branch]).await.map(|_| ())
    }

    async fn force_checkout(&self, branch: &str) -> Result<(), CommandError> {
        self.git(&["checkout", "--force", branch]).await.map(|_| ())
    }

    async fn checkout_orphan(&self, branch: &str) -> Result<(), CommandError> {
        self.git(&["checkout", "--orphan", branch]).await.map(|_| ())
    }

    async fn remove_tracked(&self) -> Result<(), CommandError> {
        // A fresh orphan branch has nothing to remove.
        match self.git(&["rm", "-rf", "--ignore-unmatch", "."]).await {
            Ok(_) => Ok(()),
            Err(err) if err.stderr.contains("did not match any files") => Ok(()),
            Err(err) => Err(err),
        }
    }
}
