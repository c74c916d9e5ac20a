//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::DeploymentStatus;

/// Deployment identity
pub type DeploymentId = u64;

/// One run of the pipeline for a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: DeploymentId,

    /// Owning project
    pub project_id: String,

    /// Current status
    pub status: DeploymentStatus,

    /// Hash of the commit that was built
    pub commit_hash: Option<String>,

    /// First line of the commit message
    pub commit_title: Option<String>,

    /// Content address of the published site
    pub ipfs_cid: Option<String>,

    /// Error message, set on failure only
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deployed_at: Option<DateTime<Utc>>,
}

/// Latest commit found in a checkout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub title: String,
}

/// Terminal outcome written once by the pipeline
#[derive(Debug, Clone)]
pub enum DeploymentOutcome {
    Ready {
        ipfs_cid: String,
        commit: CommitInfo,
    },
    Failed {
        error: String,
        commit: Option<CommitInfo>,
    },
}

impl DeploymentOutcome {
    pub fn status(&self) -> DeploymentStatus {
        match self {
            DeploymentOutcome::Ready { .. } => DeploymentStatus::Ready,
            DeploymentOutcome::Failed { .. } => DeploymentStatus::Failed,
        }
    }
}

/// Status view returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStatusView {
    pub ipfs_cid: Option<String>,
    pub status: DeploymentStatus,
    pub error: Option<String>,
}

impl From<&Deployment> for DeploymentStatusView {
    fn from(deployment: &Deployment) -> Self {
        Self {
            ipfs_cid: deployment.ipfs_cid.clone(),
            status: deployment.status,
            error: deployment.error.clone(),
        }
    }
}
