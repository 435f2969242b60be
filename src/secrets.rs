//! Environment files holding the secrets to upload.

use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use tracing::debug;

use crate::deployment_manager::DeploymentManager;
use crate::error::{Error, Result};
use crate::ui::Choice;

/// Files looked up, in order, when `put secrets` gets no explicit path.
pub const ENV_FILE_CANDIDATES: [&str; 4] = [".env", ".env.local", ".env.production", ".env.staging"];

pub const NEW_ENV_FILE_HEADER: &str = "# GitHub Actions Secrets\n# Format: KEY=value\n\n";

/// A secret found in an env file. Only the key is kept; values stay in the
/// file and are read by `gh` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    pub key: String,
}

/// Lines that are not blank, not comments and contain `=` are secrets.
pub fn parse_env_file(content: &str) -> Vec<SecretEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, _)| SecretEntry {
            key: key.trim().to_string(),
        })
        .collect()
}

/// Candidate env files that exist under `root`.
pub fn discover_env_files(root: &Path) -> Vec<PathBuf> {
    ENV_FILE_CANDIDATES
        .iter()
        .map(|name| root.join(name))
        .filter(|path| path.is_file())
        .collect()
}

impl DeploymentManager {
    /// `put secrets [path]`
    pub async fn put_secrets(&self, path: Option<PathBuf>) -> Result<()> {
        self.preflight().await?;

        self.ui.label("Put Secrets", None);
        let repo = self.host.repo_name().await?;
        self.ui.kv("repo", style(&repo).cyan());
        self.ui.blank();

        self.upload_secrets(&repo, path).await
    }

    /// Upload the secrets of an env file, discovering one when `path` is `None`.
    pub(crate) async fn upload_secrets(&self, repo: &str, path: Option<PathBuf>) -> Result<()> {
        let env_path = match path {
            Some(path) => {
                let path = self.config.root.join(path);
                if !path.is_file() {
                    return Err(Error::NotFound(format!("env file {}", path.display())));
                }
                path
            }
            None => match self.choose_env_file(repo).await? {
                Some(path) => path,
                None => return Ok(()),
            },
        };
        let shown = self.display_path(&env_path).into_owned();

        let entries = parse_env_file(&fs::read_to_string(&env_path)?);
        if entries.is_empty() {
            self.ui.warn(format!("{shown} has no secrets"));
            self.ui.blank();
            return Ok(());
        }

        self.ui.log(format!(
            "Found {} secret(s) in {}:",
            style(entries.len()).white(),
            style(&shown).cyan()
        ));
        self.ui.blank();
        for entry in &entries {
            self.ui.log(format!("  {}  {}", style("·").dim(), entry.key));
        }
        self.ui.blank();

        let confirm = self.prompter.select(
            "Upload these secrets to GitHub?",
            &[
                Choice::new("yes", "Yes, upload all"),
                Choice::new("no", "Cancel"),
            ],
        )?;
        if confirm == "no" {
            return self.cancelled();
        }

        self.ui.blank();
        let spinner = self.ui.spinner(format!("Uploading secrets from {shown}"));
        if let Err(e) = self.host.upload_secrets_file(&env_path).await {
            debug!(error = %e, "secret upload failed");
            spinner.stop("Failed to upload secrets", false);
            self.ui.info(format!(
                "Try: {}",
                style(format!("gh secret set -f {shown}")).yellow()
            ));
            self.ui.blank();
            return Ok(());
        }
        spinner.stop(format!("{} secret(s) uploaded", entries.len()), true);

        self.ui.blank();
        self.ui.ok("Secrets are now available in GitHub Actions");
        self.ui.info(format!("Access via: {}", style("${{ secrets.KEY_NAME }}").cyan()));
        self.ui.blank();
        Ok(())
    }

    /// Pick an env file among the candidates. `None` when nothing is left to upload.
    async fn choose_env_file(&self, repo: &str) -> Result<Option<PathBuf>> {
        let mut found = discover_env_files(&self.config.root);

        match found.len() {
            0 => {
                self.ui.warn("No .env file found");
                self.ui.blank();
                let action = self.prompter.select(
                    "What would you like to do?",
                    &[
                        Choice::new("create", "Create a new .env file"),
                        Choice::new("manual", "Set secrets manually"),
                        Choice::new("skip", "Cancel"),
                    ],
                )?;
                match action.as_str() {
                    "create" => {
                        fs::write(self.config.root.join(ENV_FILE_CANDIDATES[0]), NEW_ENV_FILE_HEADER)?;
                        self.ui.ok("Created .env file");
                        self.ui.info("Add your secrets, then run this command again");
                        self.ui.blank();
                    }
                    "manual" => self.manual_secrets(repo).await?,
                    _ => self.cancelled()?,
                }
                Ok(None)
            }
            1 => Ok(found.pop()),
            _ => {
                let choices: Vec<Choice> = found
                    .iter()
                    .map(|path| {
                        let name = self.display_path(path).into_owned();
                        Choice::new(name.clone(), name)
                    })
                    .collect();
                let picked = self
                    .prompter
                    .select("Multiple .env files found. Which one?", &choices)?;
                self.ui.blank();
                Ok(Some(self.config.root.join(picked)))
            }
        }
    }

    /// Prompt for name/value pairs until an empty name.
    async fn manual_secrets(&self, repo: &str) -> Result<()> {
        self.ui.blank();
        self.ui.log("Set secrets one at a time. Leave name empty to finish.");
        self.ui.blank();
        debug!(repo, "setting secrets manually");

        let mut count = 0;
        loop {
            let key = self.prompter.input("Secret name (empty to finish)?", None)?;
            if key.trim().is_empty() {
                break;
            }
            let key = key.trim();

            let value = self.prompter.input(&format!("Value for {key}?"), None)?;
            if value.trim().is_empty() {
                self.ui.warn(format!("Skipped {key} (empty value)"));
                continue;
            }

            let spinner = self.ui.spinner(format!("Setting {key}"));
            match self.host.set_secret(key, &value).await {
                Ok(()) => {
                    spinner.stop(format!("{} set", style(key).cyan()), true);
                    count += 1;
                }
                Err(e) => {
                    debug!(error = %e, key, "setting secret failed");
                    spinner.stop(format!("Failed to set {key}"), false);
                }
            }
        }

        if count > 0 {
            self.ui.blank();
            self.ui.ok(format!("{count} secret(s) configured"));
        }
        self.ui.blank();
        Ok(())
    }
}
