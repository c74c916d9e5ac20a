//! Deployment status and its allowed transitions

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Queued or running through the pipeline
    Processing,

    /// Published successfully
    Ready,

    /// A pipeline stage failed
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Processing => "processing",
            DeploymentStatus::Ready => "ready",
            DeploymentStatus::Failed => "failed",
        }
    }

    /// Whether no further pipeline transition can happen
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeploymentStatus::Processing)
    }

    /// Validate a move to `next`, returning the new status
    pub fn transition(self, next: DeploymentStatus) -> Result<DeploymentStatus, DeployError> {
        match (self, next) {
            (DeploymentStatus::Processing, DeploymentStatus::Ready)
            | (DeploymentStatus::Processing, DeploymentStatus::Failed) => Ok(next),
            (from, to) => Err(DeployError::InvalidTransition(format!(
                "{} -> {}",
                from.as_str(),
                to.as_str()
            ))),
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(DeploymentStatus::Processing),
            "ready" => Ok(DeploymentStatus::Ready),
            "failed" => Ok(DeploymentStatus::Failed),
            _ => Err(DeployError::ValidationError(format!(
                "Invalid deployment status: {}",
                s
            ))),
        }
    }
}
