//! Per-deployment working directories

use std::path::PathBuf;

use tracing::{debug, info};

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::models::deployment::DeploymentId;

/// Allocates one directory per (project, deployment) under a fixed root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: Dir,
}

impl WorkspaceManager {
    /// Create a manager rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Dir::new(root),
        }
    }

    /// Root directory holding all workspaces
    pub fn root(&self) -> &Dir {
        &self.root
    }

    /// Path of the workspace for a deployment, without touching the filesystem
    pub fn path_for(&self, project_id: &str, deployment_id: DeploymentId) -> Result<Dir, DeployError> {
        validate_segment(project_id)?;
        Ok(self
            .root
            .subdir(project_id)
            .subdir(&deployment_id.to_string()))
    }

    /// Return the workspace for a deployment, creating it if absent.
    ///
    /// Calling this twice for the same pair returns the same directory and
    /// keeps whatever it already holds.
    pub async fn allocate(&self, project_id: &str, deployment_id: DeploymentId) -> Result<Dir, DeployError> {
        let dir = self.path_for(project_id, deployment_id)?;
        if dir.exists().await {
            debug!("Reusing workspace: {}", dir.path().display());
        } else {
            dir.create().await?;
            info!("Created workspace: {}", dir.path().display());
        }
        Ok(dir)
    }

    /// Remove a deployment's workspace
    pub async fn release(&self, project_id: &str, deployment_id: DeploymentId) -> Result<(), DeployError> {
        let dir = self.path_for(project_id, deployment_id)?;
        dir.delete().await?;
        debug!("Removed workspace: {}", dir.path().display());
        Ok(())
    }
}

fn validate_segment(segment: &str) -> Result<(), DeployError> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
    {
        return Err(DeployError::ConfigError(format!(
            "Invalid project id for workspace: {:?}",
            segment
        )));
    }
    Ok(())
}
