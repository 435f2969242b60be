//! In-memory stand-ins for `gh`, `git`, the template download and the
//! terminal, used by the command tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::exec::CommandError;
use crate::gh_client::Host;
use crate::git_client::Vcs;
use crate::template::TemplateSource;
use crate::types::{Job, PagesInfo, WorkflowRun};
use crate::ui::{Choice, Prompter};

fn command_error(command: &str, stderr: &str) -> CommandError {
    CommandError {
        command: command.to_string(),
        status: Some(1),
        stderr: stderr.to_string(),
    }
}

/// Recorded host call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    SetPermissions,
    EnableActions,
    Dispatch { workflow: String, git_ref: String },
    ListJobs(u64),
    JobLogs(u64),
    UploadSecretsFile(PathBuf),
    SetSecret(String),
    EnablePages { branch: String },
}

struct HostState {
    repo: String,
    installed: bool,
    branch_checks: u32,
    failing_checks: u32,
    branch_appears: Option<(String, u32)>,
    permissions: String,
    reject_redundant_permission_updates: bool,
    actions_enabled: bool,
    pages_enabled: bool,
    pages_broken: bool,
    runs: Option<Vec<WorkflowRun>>,
    jobs: Vec<Job>,
    logs: String,
    secret_count: Option<usize>,
    dispatch_fails: bool,
    calls: Vec<HostCall>,
}

#[derive(Clone)]
pub struct FakeHost {
    state: Arc<Mutex<HostState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                repo: "octo/site".to_string(),
                installed: true,
                branch_checks: 0,
                failing_checks: 0,
                branch_appears: None,
                permissions: "read".to_string(),
                reject_redundant_permission_updates: false,
                actions_enabled: false,
                pages_enabled: false,
                pages_broken: false,
                runs: Some(Vec::new()),
                jobs: Vec::new(),
                logs: String::new(),
                secret_count: Some(0),
                dispatch_fails: false,
                calls: Vec::new(),
            })),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut HostState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    fn record(&self, call: HostCall) {
        self.with_state(|s| s.calls.push(call));
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn uninstalled(self) -> Self {
        self.with_state(|s| s.installed = false);
        self
    }

    /// Check number `attempt` and later find `branch`.
    pub fn branch_appears_on_check(&self, branch: &str, attempt: u32) {
        self.with_state(|s| s.branch_appears = Some((branch.to_string(), attempt)));
    }

    /// The first `count` checks fail.
    pub fn fail_branch_checks(&self, count: u32) {
        self.with_state(|s| s.failing_checks = count);
    }

    pub fn branch_checks(&self) -> u32 {
        self.with_state(|s| s.branch_checks)
    }

    /// Mimic an API that refuses a permission update that changes nothing.
    pub fn reject_redundant_permission_updates(&self) {
        self.with_state(|s| s.reject_redundant_permission_updates = true);
    }

    pub fn permissions(&self) -> String {
        self.with_state(|s| s.permissions.clone())
    }

    pub fn enable_pages_already(&self) {
        self.with_state(|s| s.pages_enabled = true);
    }

    pub fn break_pages(&self) {
        self.with_state(|s| s.pages_broken = true);
    }

    pub fn pages_enabled(&self) -> bool {
        self.with_state(|s| s.pages_enabled)
    }

    pub fn set_runs(&self, runs: Option<Vec<WorkflowRun>>) {
        self.with_state(|s| s.runs = runs);
    }

    pub fn set_jobs(&self, jobs: Vec<Job>, logs: &str) {
        self.with_state(|s| {
            s.jobs = jobs;
            s.logs = logs.to_string();
        });
    }

    pub fn set_secret_count(&self, count: Option<usize>) {
        self.with_state(|s| s.secret_count = count);
    }

    pub fn fail_dispatch(&self) {
        self.with_state(|s| s.dispatch_fails = true);
    }
}

#[async_trait]
impl Host for FakeHost {
    async fn ensure_installed(&self) -> Result<()> {
        if self.with_state(|s| s.installed) {
            Ok(())
        } else {
            Err(Error::MissingTool {
                tool: "GitHub CLI",
                install_url: "https://cli.github.com",
            })
        }
    }

    async fn repo_name(&self) -> Result<String> {
        Ok(self.with_state(|s| s.repo.clone()))
    }

    async fn branch_exists(&self, _repo: &str, branch: &str) -> Result<bool> {
        self.with_state(|s| {
            s.branch_checks += 1;
            if s.branch_checks <= s.failing_checks {
                return Err(command_error("gh api repos/octo/site/branches", "gh: Bad Gateway (HTTP 502)").into());
            }
            Ok(branch == "main"
                || matches!(&s.branch_appears, Some((b, from)) if b == branch && s.branch_checks >= *from))
        })
    }

    async fn set_workflow_permissions(&self, _repo: &str) -> Result<()> {
        self.record(HostCall::SetPermissions);
        self.with_state(|s| {
            if s.reject_redundant_permission_updates && s.permissions == "write" {
                return Err(command_error("gh api -X PUT", "HTTP 422: no change").into());
            }
            s.permissions = "write".to_string();
            Ok(())
        })
    }

    async fn workflow_permissions(&self, _repo: &str) -> Result<String> {
        Ok(self.with_state(|s| s.permissions.clone()))
    }

    async fn enable_actions(&self, _repo: &str) -> Result<()> {
        self.record(HostCall::EnableActions);
        self.with_state(|s| s.actions_enabled = true);
        Ok(())
    }

    async fn dispatch_workflow(&self, workflow: &str, git_ref: &str) -> Result<()> {
        self.record(HostCall::Dispatch {
            workflow: workflow.to_string(),
            git_ref: git_ref.to_string(),
        });
        if self.with_state(|s| s.dispatch_fails) {
            return Err(command_error("gh workflow run", "HTTP 404").into());
        }
        Ok(())
    }

    async fn list_runs(&self, _repo: &str, _workflow: &str, limit: usize) -> Result<Vec<WorkflowRun>> {
        self.with_state(|s| match &s.runs {
            Some(runs) => Ok(runs.iter().take(limit).cloned().collect()),
            None => Err(command_error("gh api runs", "HTTP 404").into()),
        })
    }

    async fn list_jobs(&self, _repo: &str, run_id: u64) -> Result<Vec<Job>> {
        self.record(HostCall::ListJobs(run_id));
        Ok(self.with_state(|s| s.jobs.clone()))
    }

    async fn job_logs(&self, _repo: &str, job_id: u64) -> Result<String> {
        self.record(HostCall::JobLogs(job_id));
        Ok(self.with_state(|s| s.logs.clone()))
    }

    async fn upload_secrets_file(&self, path: &Path) -> Result<()> {
        self.record(HostCall::UploadSecretsFile(path.to_path_buf()));
        Ok(())
    }

    async fn set_secret(&self, key: &str, _value: &str) -> Result<()> {
        self.record(HostCall::SetSecret(key.to_string()));
        Ok(())
    }

    async fn secret_count(&self, _repo: &str) -> Result<usize> {
        self.with_state(|s| s.secret_count)
            .ok_or_else(|| command_error("gh api secrets", "HTTP 403").into())
    }

    async fn enable_pages(&self, _repo: &str, branch: &str) -> Result<()> {
        self.record(HostCall::EnablePages {
            branch: branch.to_string(),
        });
        self.with_state(|s| {
            if s.pages_broken {
                return Err(command_error("gh api pages", "HTTP 500").into());
            }
            if s.pages_enabled {
                return Err(command_error("gh api pages", "gh: Conflict (HTTP 409)").into());
            }
            s.pages_enabled = true;
            Ok(())
        })
    }

    async fn pages_info(&self, _repo: &str) -> Result<PagesInfo> {
        self.with_state(|s| {
            if s.pages_enabled && !s.pages_broken {
                Ok(PagesInfo {
                    html_url: Some("https://octo.github.io/site/".to_string()),
                    status: Some("built".to_string()),
                    ..PagesInfo::default()
                })
            } else {
                Err(command_error("gh api pages", "HTTP 404").into())
            }
        })
    }
}

/// Recorded git call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    AddAll,
    Add(Vec<String>),
    Commit(String),
    Push { branch: String, force: bool },
    Stash,
    StashPop,
    Checkout(String),
    ForceCheckout(String),
    CheckoutOrphan(String),
    RemoveTracked,
}

struct GitState {
    repository: bool,
    branch: String,
    dirty: bool,
    remote_branches: Vec<String>,
    push_fails: bool,
    commit_fails: bool,
    return_fails: bool,
    calls: Vec<GitCall>,
}

#[derive(Clone)]
pub struct FakeGit {
    state: Arc<Mutex<GitState>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GitState {
                repository: true,
                branch: "main".to_string(),
                dirty: false,
                remote_branches: Vec::new(),
                push_fails: false,
                commit_fails: false,
                return_fails: false,
                calls: Vec::new(),
            })),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut GitState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    fn record(&self, call: GitCall) {
        self.with_state(|s| s.calls.push(call));
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn not_a_repository(self) -> Self {
        self.with_state(|s| s.repository = false);
        self
    }

    pub fn dirty(self) -> Self {
        self.with_state(|s| s.dirty = true);
        self
    }

    pub fn with_remote_branch(self, branch: &str) -> Self {
        self.with_state(|s| s.remote_branches.push(branch.to_string()));
        self
    }

    pub fn failing_push(self) -> Self {
        self.with_state(|s| s.push_fails = true);
        self
    }

    pub fn failing_commit(self) -> Self {
        self.with_state(|s| s.commit_fails = true);
        self
    }

    /// Checking out any branch other than the current one fails.
    pub fn stuck_on_other_branches(self) -> Self {
        self.with_state(|s| s.return_fails = true);
        self
    }

    fn switch(&self, call: GitCall, branch: &str) -> Result<(), CommandError> {
        self.record(call);
        self.with_state(|s| {
            if s.return_fails && branch == s.branch {
                return Err(command_error(
                    "git checkout",
                    "error: Your local changes to the following files would be overwritten by checkout",
                ));
            }
            Ok(())
        })
    }
}

#[async_trait]
impl Vcs for FakeGit {
    async fn ensure_installed(&self) -> Result<()> {
        Ok(())
    }

    async fn is_repository(&self) -> bool {
        self.with_state(|s| s.repository)
    }

    async fn current_branch(&self) -> String {
        self.with_state(|s| s.branch.clone())
    }

    async fn has_changes(&self) -> bool {
        self.with_state(|s| s.dirty)
    }

    async fn add_all(&self) -> Result<(), CommandError> {
        self.record(GitCall::AddAll);
        Ok(())
    }

    async fn add(&self, paths: &[String]) -> Result<(), CommandError> {
        self.record(GitCall::Add(paths.to_vec()));
        Ok(())
    }

    async fn commit(&self, message: &str, _allow_empty: bool) -> Result<(), CommandError> {
        self.record(GitCall::Commit(message.to_string()));
        self.with_state(|s| {
            if s.commit_fails {
                return Err(command_error("git commit", "pre-commit hook failed"));
            }
            s.dirty = false;
            Ok(())
        })
    }

    async fn push(&self, branch: &str, force: bool) -> Result<(), CommandError> {
        self.record(GitCall::Push {
            branch: branch.to_string(),
            force,
        });
        if self.with_state(|s| s.push_fails) {
            return Err(command_error("git push", "rejected"));
        }
        Ok(())
    }

    async fn stash(&self) -> Result<(), CommandError> {
        self.record(GitCall::Stash);
        self.with_state(|s| s.dirty = false);
        Ok(())
    }

    async fn stash_pop(&self) -> Result<(), CommandError> {
        self.record(GitCall::StashPop);
        self.with_state(|s| s.dirty = true);
        Ok(())
    }

    async fn remote_branch_exists(&self, branch: &str) -> bool {
        self.with_state(|s| s.remote_branches.iter().any(|b| b == branch))
    }

    async fn checkout(&self, branch: &str) -> Result<(), CommandError> {
        self.switch(GitCall::Checkout(branch.to_string()), branch)
    }

    async fn force_checkout(&self, branch: &str) -> Result<(), CommandError> {
        self.switch(GitCall::ForceCheckout(branch.to_string()), branch)
    }

    async fn checkout_orphan(&self, branch: &str) -> Result<(), CommandError> {
        self.record(GitCall::CheckoutOrphan(branch.to_string()));
        Ok(())
    }

    async fn remove_tracked(&self) -> Result<(), CommandError> {
        self.record(GitCall::RemoveTracked);
        Ok(())
    }
}

/// Answers questions from a fixed script, in order.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
        }
    }

    fn next(&self) -> Result<String> {
        self.answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or(Error::Aborted)
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&self, question: &str, choices: &[Choice]) -> Result<String> {
        let answer = self.next()?;
        assert!(
            choices.iter().any(|c| c.value == answer),
            "'{answer}' is not an option for '{question}'"
        );
        Ok(answer)
    }

    fn input(&self, _question: &str, default: Option<&str>) -> Result<String> {
        let answer = self.next()?;
        if answer.is_empty() {
            Ok(default.unwrap_or_default().to_string())
        } else {
            Ok(answer)
        }
    }
}

pub struct StaticTemplate {
    content: Option<String>,
}

impl StaticTemplate {
    pub fn serving(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
        }
    }

    pub fn unavailable() -> Self {
        Self { content: None }
    }
}

#[async_trait]
impl TemplateSource for StaticTemplate {
    fn location(&self) -> &str {
        "https://templates.invalid/deploy.yml"
    }

    async fn fetch(&self) -> Result<String> {
        self.content.clone().ok_or_else(|| Error::Download {
            url: self.location().to_string(),
            reason: "HTTP 404".to_string(),
        })
    }
}
