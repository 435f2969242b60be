use thiserror::Error;

use crate::exec::CommandError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{tool} not found")]
    MissingTool {
        tool: &'static str,
        install_url: &'static str,
    },

    #[error("not a git repository")]
    NotARepository,

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("unexpected output from `{command}`: {source}")]
    Parse {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected output from `{command}`: {output}")]
    Unexpected { command: String, output: String },

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("timed out waiting for branch '{branch}' after {attempts} attempts")]
    BuildTimeout { branch: String, attempts: u32 },

    #[error("{0} not found")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("aborted")]
    Aborted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Extra lines printed under the error message to tell the user what to do next.
    pub fn guidance(&self) -> Vec<String> {
        match self {
            Self::MissingTool { install_url, .. } => vec![format!("Install it at {install_url}")],
            Self::NotARepository => {
                vec!["Run this command inside a git repository".to_string()]
            }
            Self::Download { url, .. } => vec![format!("Download manually: {url}")],
            Self::Config(_) => vec!["Run with --help to see the available options".to_string()],
            _ => Vec::new(),
        }
    }

    /// True when a GitHub API call failed because the resource is already in place.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Command(err) if err.is_conflict())
    }
}
