//! Site build runner

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::deploy::process::{self, ProcessError, ProcessSpec};
use crate::errors::{BuildFailure, DeployError};
use crate::filesys::dir::Dir;

/// Default install and build script
pub const DEFAULT_BUILD_COMMAND: &str = "npm install && npm run build";

/// Runs the project's build inside a workspace
#[async_trait]
pub trait BuildRunner: Send + Sync {
    /// Build the site; resolves with the workspace on success
    async fn build(&self, workspace: &Dir) -> Result<Dir, DeployError>;
}

/// Runs a shell command in the workspace and judges it by exit code only
#[derive(Debug, Clone)]
pub struct ShellBuildRunner {
    command: String,
    timeout: Option<Duration>,
}

impl ShellBuildRunner {
    pub fn new(command: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

impl Default for ShellBuildRunner {
    fn default() -> Self {
        Self::new(DEFAULT_BUILD_COMMAND, Some(Duration::from_secs(900)))
    }
}

#[async_trait]
impl BuildRunner for ShellBuildRunner {
    async fn build(&self, workspace: &Dir) -> Result<Dir, DeployError> {
        info!("Building project at: {}", workspace.path().display());

        let spec = ProcessSpec::shell(&self.command)
            .cwd(workspace.path())
            .timeout(self.timeout)
            .label("build");

        let output = process::run(&spec).await.map_err(|e| match e {
            ProcessError::TimedOut(limit) => BuildFailure::TimedOut(limit),
            other => BuildFailure::Spawn(other.to_string()),
        })?;

        info!("Build process exited with code {:?}", output.exit_code);
        match output.exit_code {
            Some(0) => Ok(workspace.clone()),
            Some(code) => {
                error!("Build failed with code {}", code);
                Err(BuildFailure::Exit { code }.into())
            }
            None => Err(BuildFailure::Terminated.into()),
        }
    }
}
