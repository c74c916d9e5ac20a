//! Deployment state tracker
//!
//! Writes the terminal status of a deployment. Only the pipeline calls
//! [`StateTracker::mark_ready`] and [`StateTracker::mark_failed`], once per run.

use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::DeployError;
use crate::models::deployment::{CommitInfo, Deployment, DeploymentId, DeploymentOutcome};
use crate::models::project::Project;
use crate::store::Store;

#[derive(Clone)]
pub struct StateTracker {
    store: Arc<dyn Store>,
}

impl StateTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// `processing -> ready`; also points the project at the new address
    pub async fn mark_ready(
        &self,
        deployment_id: DeploymentId,
        ipfs_cid: String,
        commit: CommitInfo,
    ) -> Result<Deployment, DeployError> {
        if ipfs_cid.trim().is_empty() {
            return Err(DeployError::ValidationError(
                "content address must not be empty".to_string(),
            ));
        }
        info!("Updating site address for deployment {}: {}", deployment_id, ipfs_cid);
        self.store
            .complete_deployment(deployment_id, DeploymentOutcome::Ready { ipfs_cid, commit })
            .await
    }

    /// `processing -> failed`; the project keeps its previous address
    pub async fn mark_failed(
        &self,
        deployment_id: DeploymentId,
        error: &DeployError,
        commit: Option<CommitInfo>,
    ) -> Result<Deployment, DeployError> {
        warn!("Deployment {} failed: {}", deployment_id, error);
        self.store
            .complete_deployment(
                deployment_id,
                DeploymentOutcome::Failed {
                    error: error.to_string(),
                    commit,
                },
            )
            .await
    }

    /// Attach a human-readable name to a ready deployment's project
    pub async fn confirm_domain(
        &self,
        project_id: &str,
        deployment_id: DeploymentId,
        ens_name: &str,
    ) -> Result<Project, DeployError> {
        info!("Updating ENS for {}: {}", project_id, ens_name);
        self.store.set_ens_name(project_id, deployment_id, ens_name).await
    }
}
