//! Record store for projects and deployments

pub mod memory;

use async_trait::async_trait;

use crate::deploy::fsm::DeploymentStatus;
use crate::errors::DeployError;
use crate::models::deployment::{Deployment, DeploymentId, DeploymentOutcome};
use crate::models::project::{BuildConfig, Environment, Project, ProjectUpsert};

/// Persistent record store.
///
/// Implementations must keep one Environment and one BuildConfig per Project
/// and one Project per (url, branch) pair.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create the project for (url, branch), or refresh it and overwrite its environment
    async fn upsert_project(&self, upsert: ProjectUpsert) -> Result<Project, DeployError>;

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>, DeployError>;

    /// First project registered for a repository URL
    async fn find_project_by_url(&self, github_url: &str) -> Result<Option<Project>, DeployError>;

    async fn list_projects_by_owner(&self, owner_address: &str) -> Result<Vec<Project>, DeployError>;

    async fn get_environment(&self, project_id: &str) -> Result<Option<Environment>, DeployError>;

    async fn get_build_config(&self, project_id: &str) -> Result<Option<BuildConfig>, DeployError>;

    /// Overwrite a project's environment text
    async fn update_environment(&self, project_id: &str, json_text: &str) -> Result<(), DeployError>;

    /// Create a deployment in `processing`
    async fn create_deployment(&self, project_id: &str) -> Result<Deployment, DeployError>;

    async fn get_deployment(&self, deployment_id: DeploymentId) -> Result<Option<Deployment>, DeployError>;

    /// Most recently created deployment of a project
    async fn latest_deployment(&self, project_id: &str) -> Result<Option<Deployment>, DeployError>;

    async fn list_deployments_by_status(&self, status: DeploymentStatus) -> Result<Vec<Deployment>, DeployError>;

    /// Write a terminal outcome. On success the project's site address is
    /// updated in the same step.
    async fn complete_deployment(
        &self,
        deployment_id: DeploymentId,
        outcome: DeploymentOutcome,
    ) -> Result<Deployment, DeployError>;

    /// Attach a name to a project and touch one of its ready deployments
    async fn set_ens_name(
        &self,
        project_id: &str,
        deployment_id: DeploymentId,
        ens_name: &str,
    ) -> Result<Project, DeployError>;
}
