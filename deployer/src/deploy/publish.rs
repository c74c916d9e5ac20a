//! Site publisher for the content-addressed storage network

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{error, info};

use crate::deploy::process::{self, ProcessSpec};
use crate::errors::{DeployError, PublishMode};
use crate::filesys::dir::Dir;

/// Line printed by the publish command when a new site is created
static SITE_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"New site object ID: (0x[a-f0-9]+)").ok());

/// Pull the new site address out of publish output.
///
/// Returns `None` when the expected line is missing, which callers must treat
/// as a failure even if the command exited cleanly.
pub fn parse_site_id(output: &str) -> Option<String> {
    let pattern = SITE_ID_PATTERN.as_ref()?;
    pattern
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// What to publish
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    /// Deployment-scoped label, used for logging
    pub upload_id: &'a str,

    /// Built workspace
    pub workspace: &'a Dir,

    /// Output directory inside the workspace
    pub output_dir: &'a str,

    /// Address of the already-published site, if any
    pub site_id: Option<&'a str>,
}

impl PublishRequest<'_> {
    pub fn mode(&self) -> PublishMode {
        match self.site_id {
            Some(_) => PublishMode::Update,
            None => PublishMode::Publish,
        }
    }
}

/// Publishes a built directory and returns its content address
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, DeployError>;
}

/// Publisher settings
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    /// Publish CLI executable
    pub program: String,

    /// Storage epochs to pay for
    pub epochs: u32,

    pub timeout: Option<Duration>,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            program: "site-builder".to_string(),
            epochs: 1,
            timeout: Some(Duration::from_secs(900)),
        }
    }
}

/// Runs the `site-builder` CLI
#[derive(Debug, Clone, Default)]
pub struct SiteBuilderPublisher {
    settings: PublisherSettings,
}

impl SiteBuilderPublisher {
    pub fn new(settings: PublisherSettings) -> Self {
        Self { settings }
    }

    /// Build the command line for a request
    pub fn command_for(&self, request: &PublishRequest<'_>) -> ProcessSpec {
        let dist_path = request.workspace.path().join(request.output_dir);
        let dist_path = dist_path.to_string_lossy().to_string();
        let epochs = self.settings.epochs.to_string();

        let spec = ProcessSpec::new(&self.settings.program);
        let spec = match request.site_id {
            Some(site_id) => spec.args(["update", "--epochs", epochs.as_str(), dist_path.as_str(), site_id]),
            None => spec.args(["publish", dist_path.as_str(), "--epochs", epochs.as_str()]),
        };
        spec.timeout(self.settings.timeout).label("publish")
    }
}

#[async_trait]
impl ArtifactPublisher for SiteBuilderPublisher {
    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, DeployError> {
        let mode = request.mode();
        info!(
            "[{}] {} site from: {}/{}",
            request.upload_id,
            mode,
            request.workspace.path().display(),
            request.output_dir
        );

        let spec = self.command_for(&request);
        let output = process::run(&spec).await.map_err(|e| {
            error!("[{}] Failed to run publisher: {}", request.upload_id, e);
            DeployError::PublishError { mode, code: None }
        })?;

        if !output.success() {
            error!("[{}] {} failed with code {:?}", request.upload_id, mode, output.exit_code);
            return Err(DeployError::PublishError {
                mode,
                code: output.exit_code,
            });
        }

        match request.site_id {
            Some(site_id) => Ok(site_id.to_string()),
            None => parse_site_id(&output.stdout).ok_or(DeployError::PublishParseError {
                output: output.stdout,
            }),
        }
    }
}
