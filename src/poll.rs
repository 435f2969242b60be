//! Waiting for a deployment to show up on the remote.
//!
//! GitHub Actions gives no completion signal to the caller, so the build is
//! considered done once the marker branch appears in the branch list.

use std::time::Duration;

use tracing::debug;

use crate::gh_client::Host;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

impl PollSettings {
    /// Total time the loop may spend sleeping.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Found { attempts: u32 },
    TimedOut {
        attempts: u32,
        /// Most recent lookup failure, if the last attempts were failing.
        last_error: Option<String>,
    },
}

/// Look up `branch` on `repo` every `settings.interval` until it exists or
/// `settings.max_attempts` lookups have been made.
///
/// Lookup failures count as "not visible yet".
pub async fn wait_for_branch<H>(host: &H, repo: &str, branch: &str, settings: PollSettings) -> PollOutcome
where
    H: Host + ?Sized,
{
    let mut last_error = None;

    for attempt in 1..=settings.max_attempts {
        match host.branch_exists(repo, branch).await {
            Ok(true) => {
                debug!(attempt, branch, "marker branch found");
                return PollOutcome::Found { attempts: attempt };
            }
            Ok(false) => {
                debug!(attempt, branch, "marker branch not present yet");
                last_error = None;
            }
            Err(err) => {
                debug!(attempt, error = %err, "branch lookup failed");
                last_error = Some(err.to_string());
            }
        }

        if attempt < settings.max_attempts {
            tokio::time::sleep(settings.interval).await;
        }
    }

    PollOutcome::TimedOut {
        attempts: settings.max_attempts,
        last_error,
    }
}

/// Human readable form of a wait budget, e.g. "5 minutes" or "45s".
pub fn describe_budget(budget: Duration) -> String {
    let secs = budget.as_secs();
    let (mins, rest) = (secs / 60, secs % 60);
    match (mins, rest) {
        (0, s) => format!("{s}s"),
        (1, 0) => "1 minute".to_string(),
        (m, 0) => format!("{m} minutes"),
        (m, s) => format!("{m}m {s}s"),
    }
}
