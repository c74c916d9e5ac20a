//! HTTP client for repository checks

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::errors::DeployError;

/// Tells whether a repository can be cloned without credentials
#[async_trait]
pub trait RepoProbe: Send + Sync {
    async fn is_public(&self, repo_url: &str) -> Result<bool, DeployError>;
}

/// Probes the repository's web URL with an unauthenticated GET
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Duration) -> Result<Self, DeployError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitedeploy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RepoProbe for HttpClient {
    async fn is_public(&self, repo_url: &str) -> Result<bool, DeployError> {
        let url = url::Url::parse(repo_url)
            .map_err(|e| DeployError::ValidationError(format!("Invalid repository URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DeployError::ValidationError(format!(
                "Unsupported repository URL scheme: {}",
                url.scheme()
            )));
        }

        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!("Repository probe for {} returned {}", repo_url, status);
        }
        Ok(status == StatusCode::OK)
    }
}

/// Probe that accepts every repository, for setups that skip the check
pub struct AllowAllProbe;

#[async_trait]
impl RepoProbe for AllowAllProbe {
    async fn is_public(&self, _repo_url: &str) -> Result<bool, DeployError> {
        Ok(true)
    }
}
