//! Process execution shared by the `git` and `gh` clients.
//!
//! Every call captures stdout and stderr. A non-zero exit becomes a
//! [`CommandError`] carrying the rendered command line and the captured
//! stderr, which is what the user sees when a step fails.

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Error)]
#[error("Command failed: {command}\n{stderr}")]
pub struct CommandError {
    pub command: String,
    pub status: Option<i32>,
    pub stderr: String,
}

impl CommandError {
    fn spawn(command: String, err: &std::io::Error) -> Self {
        Self {
            command,
            status: None,
            stderr: err.to_string(),
        }
    }

    /// Status code of a failed `gh api` call, which reports it on stderr
    /// as "gh: Conflict (HTTP 409)".
    pub fn http_status(&self) -> Option<u16> {
        let (_, rest) = self.stderr.rsplit_once("(HTTP ")?;
        rest.split(')').next()?.parse().ok()
    }

    pub fn is_conflict(&self) -> bool {
        self.http_status() == Some(409)
    }

    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }
}

fn render(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.contains(char::is_whitespace) || arg.is_empty() {
            line.push('"');
            line.push_str(&arg.replace('"', "\\\""));
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Run `program args...` in `dir` and return its stdout.
pub async fn run(dir: &Path, program: &str, args: &[&str]) -> Result<String, CommandError> {
    run_with_input(dir, program, args, None).await
}

/// Same as [`run`], optionally feeding `input` on stdin.
pub async fn run_with_input(
    dir: &Path,
    program: &str,
    args: &[&str],
    input: Option<&str>,
) -> Result<String, CommandError> {
    let line = render(program, args);
    debug!(command = %line, dir = %dir.display(), "spawning");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(dir)
        .env("GH_PROMPT_DISABLED", "1")
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let mut child = cmd.spawn().map_err(|e| CommandError::spawn(line.clone(), &e))?;

    if let Some(input) = input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| CommandError::spawn(line.clone(), &e))?;
        }
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| CommandError::spawn(line.clone(), &e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(command = %line, status = ?output.status.code(), "command failed");
        return Err(CommandError {
            command: line,
            status: output.status.code(),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether `program --version` can be spawned and exits cleanly.
pub async fn is_callable(dir: &Path, program: &str) -> bool {
    run(dir, program, &["--version"]).await.is_ok()
}
