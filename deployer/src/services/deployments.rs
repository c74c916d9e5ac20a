//! Deployment service: start, inspect and name deployments

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::deploy::fsm::DeploymentStatus;
use crate::deploy::tracker::StateTracker;
use crate::errors::DeployError;
use crate::models::deployment::{DeploymentId, DeploymentStatusView};
use crate::models::project::Project;
use crate::queue::JobQueue;
use crate::store::Store;

/// Request to deploy a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartDeploy {
    pub project_id: String,

    /// Environment JSON replacing the project's current environment
    #[serde(default)]
    pub env_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartDeployResponse {
    pub deploy_id: DeploymentId,
    pub status: DeploymentStatus,
}

/// Request to attach a name to a deployed site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEns {
    pub project_id: String,
    pub deploy_id: DeploymentId,
    pub ens_domain: String,
}

#[derive(Clone)]
pub struct DeployService {
    store: Arc<dyn Store>,
    queue: Arc<JobQueue>,
    tracker: StateTracker,
}

impl DeployService {
    pub fn new(store: Arc<dyn Store>, queue: Arc<JobQueue>) -> Self {
        Self {
            tracker: StateTracker::new(store.clone()),
            store,
            queue,
        }
    }

    /// Create a `processing` deployment, overwrite the environment and queue the job
    pub async fn start_deploy(&self, input: StartDeploy) -> Result<StartDeployResponse, DeployError> {
        let deployment = self.store.create_deployment(&input.project_id).await?;
        self.store
            .update_environment(&input.project_id, &input.env_json)
            .await?;

        if let Err(e) = self.queue.enqueue(deployment.id) {
            error!("Failed to queue deployment {}: {}", deployment.id, e);
            self.tracker.mark_failed(deployment.id, &e, None).await?;
            return Err(e);
        }

        info!(
            "Deployment {} started for project {}",
            deployment.id, input.project_id
        );
        Ok(StartDeployResponse {
            deploy_id: deployment.id,
            status: deployment.status,
        })
    }

    /// Status of a deployment
    pub async fn get_deployment(&self, deployment_id: DeploymentId) -> Result<DeploymentStatusView, DeployError> {
        let deployment = self
            .store
            .get_deployment(deployment_id)
            .await?
            .ok_or_else(|| DeployError::NotFound(format!("Deployment not found: {}", deployment_id)))?;
        Ok(DeploymentStatusView::from(&deployment))
    }

    /// Attach a name to a project whose deployment is ready
    pub async fn update_ens(&self, input: UpdateEns) -> Result<Project, DeployError> {
        let ens_domain = input.ens_domain.trim();
        if ens_domain.is_empty() {
            return Err(DeployError::ValidationError(
                "ENS domain must not be empty".to_string(),
            ));
        }
        self.tracker
            .confirm_domain(&input.project_id, input.deploy_id, ens_domain)
            .await
    }
}
