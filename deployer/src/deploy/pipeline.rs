//! Deployment pipeline
//!
//! Runs workspace → source → environment → build → publish for one
//! deployment, then records the outcome through the [`StateTracker`]. This is
//! the only place a deployment reaches a terminal status.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::deploy::build::BuildRunner;
use crate::deploy::env::{parse_env_json, write_env};
use crate::deploy::git::{normalize_repo_url, resolve_branch, SourceFetcher};
use crate::deploy::publish::{ArtifactPublisher, PublishRequest};
use crate::deploy::tracker::StateTracker;
use crate::deploy::workspace::WorkspaceManager;
use crate::errors::DeployError;
use crate::models::deployment::{CommitInfo, Deployment, DeploymentId};
use crate::models::project::DEFAULT_OUTPUT_DIR;
use crate::store::Store;

/// Stage implementations used by the pipeline
#[derive(Clone)]
pub struct Stages {
    pub workspaces: WorkspaceManager,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub builder: Arc<dyn BuildRunner>,
    pub publisher: Arc<dyn ArtifactPublisher>,
}

#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn Store>,
    stages: Stages,
    tracker: StateTracker,
}

impl Pipeline {
    pub fn new(store: Arc<dyn Store>, stages: Stages) -> Self {
        Self {
            tracker: StateTracker::new(store.clone()),
            store,
            stages,
        }
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// Process one deployment to a terminal status.
    ///
    /// Stage failures are recorded on the deployment and are not returned as
    /// errors; `Err` means the deployment could not be loaded or the outcome
    /// could not be written.
    pub async fn process(&self, deployment_id: DeploymentId) -> Result<Deployment, DeployError> {
        info!("Processing deployment: {}", deployment_id);

        let deployment = self
            .store
            .get_deployment(deployment_id)
            .await?
            .ok_or_else(|| DeployError::NotFound(format!("Deployment not found: {}", deployment_id)))?;

        if deployment.status.is_terminal() {
            warn!(
                "Deployment {} is already {}, skipping",
                deployment_id, deployment.status
            );
            return Ok(deployment);
        }

        let mut commit = None;
        match self.run_stages(&deployment, &mut commit).await {
            Ok(ipfs_cid) => {
                let deployment = self
                    .tracker
                    .mark_ready(deployment_id, ipfs_cid, commit.unwrap_or_default())
                    .await?;
                info!("Deployment {} is ready", deployment_id);
                Ok(deployment)
            }
            Err(e) => {
                error!("Deployment {} failed: {}", deployment_id, e);
                self.tracker.mark_failed(deployment_id, &e, commit).await
            }
        }
    }

    async fn run_stages(
        &self,
        deployment: &Deployment,
        commit: &mut Option<CommitInfo>,
    ) -> Result<String, DeployError> {
        let project_id = deployment.project_id.as_str();

        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| DeployError::NotFound(format!("Project not found: {}", project_id)))?;
        let environment = self.store.get_environment(project_id).await?;
        let build_config = self.store.get_build_config(project_id).await?;

        let repo_url = normalize_repo_url(Some(project.github_url.as_str()))?;
        let branch = resolve_branch(Some(project.github_branch.as_str()))?;
        let env_vars = match &environment {
            Some(env) => parse_env_json(&env.json_text)?,
            None => Vec::new(),
        };
        let output_dir = build_config
            .as_ref()
            .map(|c| c.output_dir())
            .unwrap_or(DEFAULT_OUTPUT_DIR);

        // 1. Workspace
        let workspace = self
            .stages
            .workspaces
            .allocate(project_id, deployment.id)
            .await?;

        // 2. Source
        let fetched = self
            .stages
            .fetcher
            .fetch(&repo_url, branch, &workspace)
            .await?;
        *commit = Some(fetched);

        // 3. Environment
        write_env(&workspace, &env_vars).await?;

        // 4. Build
        let built = self.stages.builder.build(&workspace).await?;

        // 5. Publish
        let upload_id = format!("{}-{}", project_id, deployment.id);
        let ipfs_cid = self
            .stages
            .publisher
            .publish(PublishRequest {
                upload_id: &upload_id,
                workspace: &built,
                output_dir,
                site_id: project.site_id.as_deref(),
            })
            .await?;

        if ipfs_cid.trim().is_empty() {
            return Err(DeployError::PublishParseError { output: ipfs_cid });
        }
        Ok(ipfs_cid)
    }
}
