use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::error::{Error, Result};

pub const DEFAULT_TEMPLATE_URL: &str =
    "https://cdn.jsdelivr.net/gh/thinhphoenix/github-pages@main/.github/workflows/deploy.yml";

/// Where the deploy workflow definition comes from.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    fn location(&self) -> &str;
    async fn fetch(&self) -> Result<String>;
}

pub struct HttpTemplate {
    url: String,
    client: reqwest::Client,
}

impl HttpTemplate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TemplateSource for HttpTemplate {
    fn location(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<String> {
        let download_error = |reason: String| Error::Download {
            url: self.url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| download_error(e.to_string()))?;
        info!("Downloaded {} bytes from {}", body.len(), self.url);
        Ok(body)
    }
}

/// Write `content` to `path`, creating parent directories.
pub async fn install_workflow(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    info!("Wrote workflow to {}", path.display());
    Ok(())
}
