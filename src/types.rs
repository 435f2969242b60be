use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub run_number: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadCommit {
    #[serde(default)]
    pub message: Option<String>,
}

impl WorkflowRun {
    /// Conclusion when finished, otherwise the live status.
    pub fn state(&self) -> &str {
        self.conclusion
            .as_deref()
            .or(self.status.as_deref())
            .unwrap_or("unknown")
    }

    /// First line of the triggering commit message.
    pub fn title(&self) -> &str {
        self.head_commit
            .as_ref()
            .and_then(|c| c.message.as_deref())
            .and_then(|m| m.lines().next())
            .filter(|m| !m.is_empty())
            .unwrap_or("No message")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    pub conclusion: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Job {
    pub fn failed(&self) -> bool {
        self.conclusion.as_deref() == Some("failure")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    pub conclusion: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PagesInfo {
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cname: Option<String>,
    #[serde(default)]
    pub https_enforced: Option<bool>,
    #[serde(default)]
    pub source: Option<PagesSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesSource {
    pub branch: String,
    #[serde(default)]
    pub path: Option<String>,
}
