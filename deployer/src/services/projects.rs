//! Project service: repository uploads and project queries

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::deploy::git::validate_branch;
use crate::errors::DeployError;
use crate::http::client::RepoProbe;
use crate::models::deployment::DeploymentId;
use crate::models::project::{EnsDomain, Project, ProjectDetails, ProjectUpsert};
use crate::services::deployments::{DeployService, StartDeploy};
use crate::store::Store;

/// Request to deploy a repository branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadGithub {
    pub url: String,

    #[serde(default)]
    pub branch: String,

    #[serde(default)]
    pub env_json: String,

    #[serde(default)]
    pub output_dir: String,

    /// Owner address
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub deploy_id: DeploymentId,
    pub project_id: String,
}

#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn Store>,
    deploys: DeployService,
    probe: Arc<dyn RepoProbe>,
}

impl ProjectService {
    pub fn new(store: Arc<dyn Store>, deploys: DeployService, probe: Arc<dyn RepoProbe>) -> Self {
        Self {
            store,
            deploys,
            probe,
        }
    }

    /// Register (or refresh) the project for a repository branch and deploy it
    pub async fn upload_github(&self, data: UploadGithub) -> Result<UploadResponse, DeployError> {
        let repo_url = data.url.trim().to_string();
        if repo_url.is_empty() {
            return Err(DeployError::ValidationError(
                "Repository URL is required".to_string(),
            ));
        }
        let branch = data.branch.trim();
        if !branch.is_empty() {
            validate_branch(branch).map_err(|e| DeployError::ValidationError(e.to_string()))?;
        }
        if !self.probe.is_public(&repo_url).await? {
            return Err(DeployError::ValidationError(
                "Repository is not public".to_string(),
            ));
        }

        info!("Uploading from GitHub: {}", repo_url);
        let project = self
            .store
            .upsert_project(ProjectUpsert {
                github_url: repo_url,
                github_branch: branch.to_string(),
                owner_address: data.address.trim().to_string(),
                env_json: data.env_json.clone(),
                output_dir: data.output_dir.trim().to_string(),
            })
            .await
            .map_err(|e| {
                error!("Error uploading from GitHub: {}", e);
                e
            })?;

        let started = self
            .deploys
            .start_deploy(StartDeploy {
                project_id: project.id.clone(),
                env_json: data.env_json,
            })
            .await?;

        Ok(UploadResponse {
            deploy_id: started.deploy_id,
            project_id: project.id,
        })
    }

    /// Project registered for a repository URL, with latest deployment and environment
    pub async fn get_github_upload(&self, repo_url: &str) -> Result<Option<ProjectDetails>, DeployError> {
        match self.store.find_project_by_url(repo_url.trim()).await? {
            Some(project) => Ok(Some(self.details(project, false).await?)),
            None => {
                info!("No records found for this GitHub URL");
                Ok(None)
            }
        }
    }

    /// Projects of an owner, each with its latest deployment
    pub async fn get_all_github_uploads(&self, address: &str) -> Result<Vec<ProjectDetails>, DeployError> {
        let projects = self.store.list_projects_by_owner(address).await?;
        let mut details = Vec::with_capacity(projects.len());
        for project in projects {
            let latest_deployment = self.store.latest_deployment(&project.id).await?;
            details.push(ProjectDetails {
                project,
                latest_deployment,
                environment: None,
                build_config: None,
            });
        }
        Ok(details)
    }

    /// Project with latest deployment, environment and build config
    pub async fn get_project(&self, project_id: &str) -> Result<ProjectDetails, DeployError> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| DeployError::NotFound(format!("Project not found: {}", project_id)))?;
        self.details(project, true).await
    }

    /// Named sites of an owner
    pub async fn get_ens_domains(&self, address: &str) -> Result<Vec<EnsDomain>, DeployError> {
        let projects = self.store.list_projects_by_owner(address).await?;
        Ok(projects
            .into_iter()
            .filter_map(|p| {
                p.ens_name.map(|ens_name| EnsDomain {
                    id: p.id,
                    ens_name,
                    github_url: p.github_url,
                    github_branch: p.github_branch,
                })
            })
            .collect())
    }

    async fn details(&self, project: Project, with_build_config: bool) -> Result<ProjectDetails, DeployError> {
        let latest_deployment = self.store.latest_deployment(&project.id).await?;
        let environment = self.store.get_environment(&project.id).await?;
        let build_config = if with_build_config {
            self.store.get_build_config(&project.id).await?
        } else {
            None
        };
        Ok(ProjectDetails {
            project,
            latest_deployment,
            environment,
            build_config,
        })
    }
}
