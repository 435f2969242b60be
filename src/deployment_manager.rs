use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use console::style;
use tracing::{debug, info};

use crate::config::{Config, MARKER_BRANCH, WORKFLOW_FILE, WORKFLOW_PATH};
use crate::error::{Error, Result};
use crate::exec::{self, CommandError};
use crate::gh_client::{GhClient, Host};
use crate::git_client::{GitClient, Vcs};
use crate::outcome::StepOutcome;
use crate::poll::{PollOutcome, describe_budget, wait_for_branch};
use crate::template::{HttpTemplate, TemplateSource, install_workflow};
use crate::ui::{Choice, Prompter, TermPrompter, Ui};

const DEFAULT_COMMIT_MESSAGE: &str = "Deploy to GitHub Pages";

/// How `deploy` gets the site onto the marker branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployRoute {
    /// A workflow is installed; GitHub Actions builds and pushes the branch.
    Actions,
    /// No workflow; build locally and push the output as an orphan branch.
    OrphanBranch,
}

pub struct DeploymentManager {
    pub(crate) host: Box<dyn Host>,
    pub(crate) git: Box<dyn Vcs>,
    templates: Box<dyn TemplateSource>,
    pub(crate) prompter: Box<dyn Prompter>,
    pub(crate) config: Config,
    pub(crate) ui: Ui,
}

impl DeploymentManager {
    pub fn new(
        config: Config,
        host: Box<dyn Host>,
        git: Box<dyn Vcs>,
        templates: Box<dyn TemplateSource>,
        prompter: Box<dyn Prompter>,
    ) -> Self {
        Self {
            host,
            git,
            templates,
            prompter,
            config,
            ui: Ui::new(),
        }
    }

    /// Manager backed by the real `gh`, `git`, template URL and terminal.
    pub fn for_repository(config: Config) -> Self {
        let root = config.root.clone();
        Self::new(
            config.clone(),
            Box::new(GhClient::new(root.clone())),
            Box::new(GitClient::new(root)),
            Box::new(HttpTemplate::new(config.template_url)),
            Box::new(TermPrompter),
        )
    }

    /// Tools are installed and the working directory is a repository.
    pub(crate) async fn preflight(&self) -> Result<()> {
        self.host.ensure_installed().await?;
        self.git.ensure_installed().await?;
        if !self.git.is_repository().await {
            return Err(Error::NotARepository);
        }
        Ok(())
    }

    /// Repository and branch, printed as the command header.
    pub(crate) async fn identify(&self) -> Result<(String, String)> {
        let repo = self.host.repo_name().await?;
        let branch = self.git.current_branch().await;
        self.ui.kv("repo", style(&repo).cyan());
        self.ui.kv("branch", style(&branch).cyan());
        Ok((repo, branch))
    }

    pub(crate) fn cancelled(&self) -> Result<()> {
        self.ui.info("Cancelled.");
        self.ui.blank();
        Ok(())
    }

    pub(crate) fn display_path<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, str> {
        path.strip_prefix(&self.config.root)
            .unwrap_or(path)
            .to_string_lossy()
    }

    // ── setup ────────────────────────────────────────────────────────────

    pub async fn setup(&self) -> Result<()> {
        self.preflight().await?;

        self.ui.label("Setup", Some("CI/CD for GitHub Pages"));
        let (repo, branch) = self.identify().await?;

        self.ui.blank();
        if !self.ensure_workflow().await? {
            return self.cancelled();
        }

        self.ui.blank();
        let spinner = self.ui.spinner("Setting workflow permissions to read/write");
        spinner.finish(&self.configure_permissions(&repo).await);

        let spinner = self.ui.spinner("Enabling GitHub Actions");
        spinner.finish(&self.enable_actions(&repo).await);

        self.ui.blank();
        let upload = self.prompter.select(
            "Upload secrets from an env file now?",
            &[
                Choice::new("upload", "Yes, upload secrets"),
                Choice::new("skip", "Skip for now"),
            ],
        )?;
        if upload == "upload" {
            self.upload_secrets(&repo, None).await?;
        }

        if self.git.has_changes().await {
            self.ui.blank();
            let push = self.prompter.select(
                "Commit and push the workflow to start the first deployment?",
                &[
                    Choice::new("commit", "Commit and push now"),
                    Choice::new("skip", "Skip for now"),
                ],
            )?;
            if push == "commit" {
                self.commit_and_push(&branch).await?;
                self.await_deployment(&repo).await?;
                self.enable_pages(&repo).await;
                self.ui.blank();
                return Ok(());
            }
        }

        self.ui.done("CI/CD setup complete");
        self.ui.log("Your repo is configured for automatic deployment.");
        self.ui.blank();
        self.ui.log(style("Next steps:").dim());
        self.ui.log(format!(
            "  {} {}   Upload .env secrets",
            style("1.").dim(),
            style("gh-pages put secrets").cyan()
        ));
        self.ui.log(format!(
            "  {} {}        Trigger deployment",
            style("2.").dim(),
            style("gh-pages deploy").cyan()
        ));
        self.ui.blank();
        Ok(())
    }

    /// Installs the workflow file unless the user keeps the existing one.
    /// Returns `false` when the user cancels.
    async fn ensure_workflow(&self) -> Result<bool> {
        let path = self.config.workflow_path();

        if path.exists() {
            self.ui.warn(format!("Workflow already exists at {WORKFLOW_PATH}"));
            let action = self.prompter.select(
                "What would you like to do?",
                &[
                    Choice::new("overwrite", "Overwrite with latest template"),
                    Choice::new("keep", "Keep existing"),
                    Choice::new("abort", "Cancel"),
                ],
            )?;
            match action.as_str() {
                "abort" => return Ok(false),
                "keep" => {
                    self.ui.ok("Keeping existing workflow");
                    return Ok(true);
                }
                _ => {}
            }
        }

        debug!(url = self.templates.location(), "fetching workflow template");
        let spinner = self.ui.spinner("Downloading workflow template");
        let content = match self.templates.fetch().await {
            Ok(content) => {
                spinner.stop("Workflow template downloaded", true);
                content
            }
            Err(e) => {
                spinner.stop("Failed to download workflow template", false);
                return Err(e);
            }
        };

        install_workflow(&path, &content).await?;
        self.ui.ok(format!("Created {}", style(WORKFLOW_PATH).cyan()));
        Ok(true)
    }

    /// Sets the default workflow token permission to write. A refused update
    /// is fine when the current value is already `write`.
    pub async fn configure_permissions(&self, repo: &str) -> StepOutcome {
        match self.host.set_workflow_permissions(repo).await {
            Ok(()) => return StepOutcome::Succeeded("Workflow permissions set to read/write".into()),
            Err(e) => debug!(error = %e, "permission update refused"),
        }

        let settings = format!("https://github.com/{repo}/settings/actions");
        match self.host.workflow_permissions(repo).await {
            Ok(current) if current == "write" => {
                StepOutcome::AlreadyDone("Permissions already set to read/write".into())
            }
            Ok(current) => StepOutcome::failed("Could not set permissions automatically")
                .with_guidance(format!("Current: {current}. Set to \"Read and write\" at:"))
                .with_guidance(settings),
            Err(_) => StepOutcome::failed("Could not verify permissions").with_guidance(settings),
        }
    }

    async fn enable_actions(&self, repo: &str) -> StepOutcome {
        match self.host.enable_actions(repo).await {
            Ok(()) => StepOutcome::Succeeded("GitHub Actions enabled".into()),
            Err(e) => {
                debug!(error = %e, "actions update refused");
                StepOutcome::AlreadyDone("Actions already enabled".into())
            }
        }
    }

    // ── deploy ───────────────────────────────────────────────────────────

    pub fn deploy_route(&self) -> DeployRoute {
        if self.config.workflow_path().exists() {
            DeployRoute::Actions
        } else {
            DeployRoute::OrphanBranch
        }
    }

    pub async fn deploy(&self) -> Result<()> {
        self.preflight().await?;

        match self.deploy_route() {
            DeployRoute::Actions => self.deploy_via_actions().await,
            DeployRoute::OrphanBranch => {
                self.ui.blank();
                let choice = self.prompter.select(
                    "No deploy workflow found. How would you like to deploy?",
                    &[
                        Choice::new("orphan", "Deploy via orphan branch (build locally)"),
                        Choice::new("setup", "Set up CI/CD first"),
                    ],
                )?;
                if choice == "setup" {
                    self.ui.blank();
                    self.ui.info(format!("Run: {}", style("gh-pages setup").cyan()));
                    self.ui.blank();
                    return Ok(());
                }
                self.deploy_via_orphan_branch().await
            }
        }
    }

    async fn deploy_via_actions(&self) -> Result<()> {
        self.ui.label("Deploy", Some("via GitHub Actions"));
        let (repo, branch) = self.identify().await?;
        self.ui.blank();

        if self.git.has_changes().await {
            self.ui.warn("You have uncommitted changes");
            self.ui.blank();

            let action = self.prompter.select(
                "What would you like to do?",
                &[
                    Choice::new("commit", "Commit and push, then deploy"),
                    Choice::new("deploy", "Deploy without committing"),
                    Choice::new("abort", "Cancel"),
                ],
            )?;

            match action.as_str() {
                "abort" => return self.cancelled(),
                "commit" => {
                    self.commit_and_push(&branch).await?;
                    self.ui.blank();
                    self.ui.info("Push will trigger the deploy workflow automatically.");
                    self.await_deployment(&repo).await?;
                    self.enable_pages(&repo).await;
                    self.ui.blank();
                    return Ok(());
                }
                _ => {}
            }
        }

        let spinner = self.ui.spinner("Triggering deploy workflow");
        if let Err(e) = self.host.dispatch_workflow(WORKFLOW_FILE, &branch).await {
            spinner.stop("Failed to trigger workflow", false);
            self.ui.info(format!(
                "Try: {}",
                style(format!("gh workflow run {WORKFLOW_FILE} --ref {branch}")).yellow()
            ));
            return Err(e);
        }
        spinner.stop("Deploy workflow triggered", true);

        self.await_deployment(&repo).await?;
        self.enable_pages(&repo).await;
        self.ui.blank();
        Ok(())
    }

    async fn commit_and_push(&self, branch: &str) -> Result<()> {
        let message = self
            .prompter
            .input("Commit message?", Some(DEFAULT_COMMIT_MESSAGE))?;

        self.ui.blank();
        let spinner = self.ui.spinner("Committing and pushing");
        match self.push_changes(&message, branch).await {
            Ok(()) => {
                spinner.stop(format!("Pushed to {}", style(branch).cyan()), true);
                Ok(())
            }
            Err(e) => {
                spinner.stop("Failed to push", false);
                Err(e.into())
            }
        }
    }

    async fn push_changes(&self, message: &str, branch: &str) -> Result<(), CommandError> {
        self.git.add_all().await?;
        self.git.commit(message, false).await?;
        self.git.push(branch, false).await
    }

    async fn deploy_via_orphan_branch(&self) -> Result<()> {
        self.ui.label("Deploy", Some("orphan branch"));
        let (repo, branch) = self.identify().await?;
        self.ui.blank();
        self.ui.info("No deploy workflow found. Building locally and pushing output.");
        self.ui.blank();

        let detected = detect_build_folder(&self.config.root);
        let folder = self.prompter.input("Build output folder?", Some(detected))?;
        self.ui.blank();

        self.run_build().await?;

        let out_dir = self.config.root.join(&folder);
        if !out_dir.is_dir() {
            self.ui.fail(format!("Build output folder \"{folder}\" not found"));
            return Err(Error::NotFound(format!("build output folder \"{folder}\"")));
        }

        let spinner = self.ui.spinner(format!(
            "Deploying {} to {} branch",
            style(&folder).cyan(),
            style(MARKER_BRANCH).cyan()
        ));
        if let Err(e) = self.publish_folder(&out_dir, &branch).await {
            spinner.stop("Deployment failed", false);
            return Err(e);
        }
        spinner.stop(format!("Deployed to {} branch", style(MARKER_BRANCH).cyan()), true);

        self.enable_pages(&repo).await;
        self.ui.blank();
        Ok(())
    }

    async fn run_build(&self) -> Result<()> {
        if self.config.build_commands.is_empty() {
            return Ok(());
        }

        let spinner = self.ui.spinner("Building project");
        for command in &self.config.build_commands {
            let Some((program, rest)) = command.split_first() else { continue };
            let args: Vec<&str> = rest.iter().map(String::as_str).collect();

            if let Err(e) = exec::run(&self.config.root, program, &args).await {
                spinner.stop("Build failed", false);
                self.ui.info(&e.stderr);
                return Err(e.into());
            }
        }
        spinner.stop("Build completed", true);
        Ok(())
    }

    /// Replace the marker branch contents with `out_dir` and force-push it,
    /// leaving the working tree on `branch` with local changes restored.
    async fn publish_folder(&self, out_dir: &Path, branch: &str) -> Result<()> {
        let staging = tempfile::tempdir()?;
        copy_dir_contents(out_dir, staging.path())?;

        let stashed = self.git.has_changes().await;
        if stashed {
            self.git.stash().await?;
        }

        let published = self.commit_to_marker_branch(out_dir, staging.path()).await;

        let returned = match &published {
            Ok(()) => self.git.checkout(branch).await,
            Err(e) => {
                debug!(error = %e, "publish failed, leaving {}", MARKER_BRANCH);
                self.discard_marker_files(staging.path());
                self.git.force_checkout(branch).await
            }
        };

        if let Err(e) = returned {
            self.ui.warn(format!("Could not switch back to {branch}"));
            self.ui.info(format!("Run: git checkout --force {branch}"));
            if stashed {
                self.ui.info("Then restore your changes with: git stash pop");
            }
            published?;
            return Err(e.into());
        }

        if stashed {
            if let Err(e) = self.git.stash_pop().await {
                self.ui.warn("Could not restore stashed changes; run `git stash pop` manually");
                debug!(error = %e, "stash pop failed");
            }
        }

        published
    }

    /// Delete the files copied onto the marker branch so the source branch
    /// can be checked out again. Tracked files come back with the checkout.
    fn discard_marker_files(&self, staging: &Path) {
        if let Err(e) = remove_copied(staging, &self.config.root) {
            debug!(error = %e, "could not remove published files");
        }
        let _ = fs::remove_file(self.config.root.join(".nojekyll"));
    }

    async fn commit_to_marker_branch(&self, out_dir: &Path, staging: &Path) -> Result<()> {
        if self.git.remote_branch_exists(MARKER_BRANCH).await {
            self.git.checkout(MARKER_BRANCH).await?;
        } else {
            self.git.checkout_orphan(MARKER_BRANCH).await?;
        }
        self.git.remove_tracked().await?;

        // Ignored build output survives the branch switch.
        if out_dir.exists() {
            fs::remove_dir_all(out_dir)?;
        }

        let mut entries = copy_dir_contents(staging, &self.config.root)?;
        fs::write(self.config.root.join(".nojekyll"), "")?;
        if !entries.iter().any(|e| e == ".nojekyll") {
            entries.push(".nojekyll".to_string());
            entries.sort();
        }

        self.git.add(&entries).await?;
        self.git.commit(DEFAULT_COMMIT_MESSAGE, true).await?;
        self.git.push(MARKER_BRANCH, true).await?;
        info!("Published {} entries to {}", entries.len(), MARKER_BRANCH);
        Ok(())
    }

    // ── completion ───────────────────────────────────────────────────────

    /// Poll for the marker branch; a timeout is fatal.
    pub(crate) async fn await_deployment(&self, repo: &str) -> Result<()> {
        self.ui.blank();
        let spinner = self.ui.spinner("Waiting for deployment");

        match wait_for_branch(self.host.as_ref(), repo, MARKER_BRANCH, self.config.poll).await {
            PollOutcome::Found { .. } => {
                spinner.stop("Deployment completed", true);
                Ok(())
            }
            PollOutcome::TimedOut {
                attempts,
                last_error,
            } => {
                spinner.stop(
                    format!("Timed out after {}", describe_budget(self.config.poll.budget())),
                    false,
                );
                if let Some(err) = last_error {
                    self.ui.info(format!(
                        "Last error: {}",
                        err.lines().last().unwrap_or_default()
                    ));
                }
                self.ui.info(format!(
                    "Check: {}",
                    style(format!("https://github.com/{repo}/actions")).cyan()
                ));
                self.ui.info("Once the build is complete, enable Pages with:");
                self.ui.info(format!(
                    "gh api repos/{repo}/pages -X POST -f source[branch]={MARKER_BRANCH} -f source[path]=/"
                ));
                Err(Error::BuildTimeout {
                    branch: MARKER_BRANCH.to_string(),
                    attempts,
                })
            }
        }
    }

    /// Turn on Pages for the marker branch. HTTP 409 means it already is.
    pub async fn request_pages(&self, repo: &str) -> StepOutcome {
        match self.host.enable_pages(repo, MARKER_BRANCH).await {
            Ok(()) => StepOutcome::Succeeded("GitHub Pages enabled".into()),
            Err(e) if e.is_conflict() => StepOutcome::AlreadyDone("GitHub Pages already enabled".into()),
            Err(e) => {
                debug!(error = %e, "enabling pages failed");
                StepOutcome::failed("Could not enable automatically")
                    .with_guidance("Enable manually in Settings > Pages")
            }
        }
    }

    pub(crate) async fn enable_pages(&self, repo: &str) -> StepOutcome {
        self.ui.blank();
        let spinner = self.ui.spinner("Enabling GitHub Pages");
        let outcome = self.request_pages(repo).await;
        spinner.finish(&outcome);

        if outcome.is_success() {
            match self.host.pages_info(repo).await.ok().and_then(|p| p.html_url) {
                Some(url) => self.ui.done(format!("Live at {}", style(url).cyan())),
                None => self.ui.info("Site URL will be available shortly"),
            }
        }
        outcome
    }
}

/// Default build output folder: `.next`, then `out`, then `dist`.
pub fn detect_build_folder(root: &Path) -> &'static str {
    [".next", "out"]
        .into_iter()
        .find(|name| root.join(name).exists())
        .unwrap_or("dist")
}

/// Recursively copy the contents of `src` into `dst`, returning the
/// top-level entry names.
fn copy_dir_contents(src: &Path, dst: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target: PathBuf = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&target)?;
            copy_dir_contents(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Remove from `dst` every file that mirrors one under `src`, then any
/// directory left empty.
fn remove_copied(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            if target.is_dir() {
                remove_copied(&entry.path(), &target)?;
                if fs::read_dir(&target)?.next().is_none() {
                    fs::remove_dir(&target)?;
                }
            }
        } else if target.is_file() {
            fs::remove_file(&target)?;
        }
    }
    Ok(())
}
