//! In-process store with optional JSON snapshot

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::deploy::fsm::DeploymentStatus;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::models::deployment::{Deployment, DeploymentId, DeploymentOutcome};
use crate::models::project::{BuildConfig, Environment, Project, ProjectUpsert};
use crate::store::Store;
use crate::utils::generate_id;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    projects: BTreeMap<String, Project>,
    environments: BTreeMap<String, Environment>,
    build_configs: BTreeMap<String, BuildConfig>,
    deployments: BTreeMap<DeploymentId, Deployment>,
    next_deployment_id: DeploymentId,
}

impl StoreData {
    fn project_mut(&mut self, project_id: &str) -> Result<&mut Project, DeployError> {
        self.projects
            .get_mut(project_id)
            .ok_or_else(|| DeployError::NotFound(format!("Project not found: {}", project_id)))
    }

    fn deployment_mut(&mut self, deployment_id: DeploymentId) -> Result<&mut Deployment, DeployError> {
        self.deployments
            .get_mut(&deployment_id)
            .ok_or_else(|| DeployError::NotFound(format!("Deployment not found: {}", deployment_id)))
    }
}

/// Store kept in memory, optionally mirrored to a snapshot file after every write
pub struct MemoryStore {
    data: RwLock<StoreData>,
    snapshot: Option<File>,
}

impl MemoryStore {
    /// Create an empty, purely in-memory store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(StoreData {
                next_deployment_id: 1,
                ..Default::default()
            }),
            snapshot: None,
        }
    }

    /// Open a store backed by a snapshot file, loading it if present
    pub async fn open(snapshot: File) -> Result<Self, DeployError> {
        let data = if snapshot.exists().await {
            let data: StoreData = snapshot.read_json().await?;
            info!(
                "Loaded store snapshot: {} projects, {} deployments",
                data.projects.len(),
                data.deployments.len()
            );
            data
        } else {
            StoreData {
                next_deployment_id: 1,
                ..Default::default()
            }
        };

        Ok(Self {
            data: RwLock::new(data),
            snapshot: Some(snapshot),
        })
    }

    async fn persist(&self, data: &StoreData) -> Result<(), DeployError> {
        if let Some(file) = &self.snapshot {
            file.write_json_atomic(data)
                .await
                .map_err(|e| DeployError::StorageError(format!("Failed to write snapshot: {}", e)))?;
            debug!("Store snapshot written to {}", file.path().display());
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_project(&self, upsert: ProjectUpsert) -> Result<Project, DeployError> {
        let mut data = self.data.write().await;
        let now = Utc::now();

        let existing = data
            .projects
            .values()
            .find(|p| p.github_url == upsert.github_url && p.github_branch == upsert.github_branch)
            .map(|p| p.id.clone());

        let project = match existing {
            Some(id) => {
                let project = data.project_mut(&id)?;
                project.updated_at = now;
                let project = project.clone();

                let environment = data
                    .environments
                    .entry(id.clone())
                    .or_insert_with(|| Environment {
                        project_id: id.clone(),
                        json_text: String::new(),
                        created_at: now,
                        updated_at: now,
                    });
                environment.json_text = upsert.env_json;
                environment.updated_at = now;
                project
            }
            None => {
                let id = generate_id();
                let project = Project {
                    id: id.clone(),
                    github_url: upsert.github_url,
                    github_branch: upsert.github_branch,
                    owner_address: upsert.owner_address,
                    site_id: None,
                    ens_name: None,
                    created_at: now,
                    updated_at: now,
                };
                data.projects.insert(id.clone(), project.clone());
                data.environments.insert(
                    id.clone(),
                    Environment {
                        project_id: id.clone(),
                        json_text: upsert.env_json,
                        created_at: now,
                        updated_at: now,
                    },
                );
                data.build_configs.insert(
                    id.clone(),
                    BuildConfig {
                        project_id: id,
                        output_dir: upsert.output_dir,
                        json_text: String::new(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                project
            }
        };

        self.persist(&data).await?;
        Ok(project)
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>, DeployError> {
        Ok(self.data.read().await.projects.get(project_id).cloned())
    }

    async fn find_project_by_url(&self, github_url: &str) -> Result<Option<Project>, DeployError> {
        let data = self.data.read().await;
        Ok(data
            .projects
            .values()
            .filter(|p| p.github_url == github_url)
            .min_by_key(|p| p.created_at)
            .cloned())
    }

    async fn list_projects_by_owner(&self, owner_address: &str) -> Result<Vec<Project>, DeployError> {
        let data = self.data.read().await;
        let mut projects: Vec<Project> = data
            .projects
            .values()
            .filter(|p| p.owner_address == owner_address)
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    async fn get_environment(&self, project_id: &str) -> Result<Option<Environment>, DeployError> {
        Ok(self.data.read().await.environments.get(project_id).cloned())
    }

    async fn get_build_config(&self, project_id: &str) -> Result<Option<BuildConfig>, DeployError> {
        Ok(self.data.read().await.build_configs.get(project_id).cloned())
    }

    async fn update_environment(&self, project_id: &str, json_text: &str) -> Result<(), DeployError> {
        let mut data = self.data.write().await;
        let environment = data.environments.get_mut(project_id).ok_or_else(|| {
            DeployError::NotFound(format!("Environment not found for project: {}", project_id))
        })?;
        environment.json_text = json_text.to_string();
        environment.updated_at = Utc::now();

        self.persist(&data).await
    }

    async fn create_deployment(&self, project_id: &str) -> Result<Deployment, DeployError> {
        let mut data = self.data.write().await;
        if !data.projects.contains_key(project_id) {
            return Err(DeployError::NotFound(format!("Project not found: {}", project_id)));
        }

        let id = data.next_deployment_id.max(1);
        data.next_deployment_id = id + 1;

        let now = Utc::now();
        let deployment = Deployment {
            id,
            project_id: project_id.to_string(),
            status: DeploymentStatus::Processing,
            commit_hash: None,
            commit_title: None,
            ipfs_cid: None,
            error: None,
            created_at: now,
            updated_at: now,
            deployed_at: None,
        };
        data.deployments.insert(id, deployment.clone());

        self.persist(&data).await?;
        Ok(deployment)
    }

    async fn get_deployment(&self, deployment_id: DeploymentId) -> Result<Option<Deployment>, DeployError> {
        Ok(self.data.read().await.deployments.get(&deployment_id).cloned())
    }

    async fn latest_deployment(&self, project_id: &str) -> Result<Option<Deployment>, DeployError> {
        let data = self.data.read().await;
        // Ids are monotonic, so the highest id is the most recent
        Ok(data
            .deployments
            .values()
            .rev()
            .find(|d| d.project_id == project_id)
            .cloned())
    }

    async fn list_deployments_by_status(&self, status: DeploymentStatus) -> Result<Vec<Deployment>, DeployError> {
        let data = self.data.read().await;
        Ok(data
            .deployments
            .values()
            .filter(|d| d.status == status)
            .cloned()
            .collect())
    }

    async fn complete_deployment(
        &self,
        deployment_id: DeploymentId,
        outcome: DeploymentOutcome,
    ) -> Result<Deployment, DeployError> {
        let mut data = self.data.write().await;
        let now = Utc::now();

        let deployment = data.deployment_mut(deployment_id)?;
        deployment.status = deployment.status.transition(outcome.status())?;
        deployment.updated_at = now;

        let site = match outcome {
            DeploymentOutcome::Ready { ipfs_cid, commit } => {
                deployment.ipfs_cid = Some(ipfs_cid.clone());
                deployment.commit_hash = Some(commit.hash);
                deployment.commit_title = Some(commit.title);
                deployment.deployed_at = Some(now);
                Some((deployment.project_id.clone(), ipfs_cid))
            }
            DeploymentOutcome::Failed { error, commit } => {
                deployment.error = Some(error);
                if let Some(commit) = commit {
                    deployment.commit_hash = Some(commit.hash);
                    deployment.commit_title = Some(commit.title);
                }
                None
            }
        };
        let deployment = deployment.clone();

        if let Some((project_id, ipfs_cid)) = site {
            let project = data.project_mut(&project_id)?;
            project.site_id = Some(ipfs_cid);
            project.updated_at = now;
        }

        self.persist(&data).await?;
        Ok(deployment)
    }

    async fn set_ens_name(
        &self,
        project_id: &str,
        deployment_id: DeploymentId,
        ens_name: &str,
    ) -> Result<Project, DeployError> {
        let mut data = self.data.write().await;
        let now = Utc::now();

        let deployment = data.deployment_mut(deployment_id)?;
        if deployment.project_id != project_id {
            return Err(DeployError::ValidationError(format!(
                "Deployment {} does not belong to project {}",
                deployment_id, project_id
            )));
        }
        if deployment.status != DeploymentStatus::Ready {
            return Err(DeployError::InvalidTransition(format!(
                "cannot attach a name to a {} deployment",
                deployment.status
            )));
        }
        deployment.updated_at = now;

        let project = data.project_mut(project_id)?;
        project.ens_name = Some(ens_name.to_string());
        project.updated_at = now;
        let project = project.clone();

        self.persist(&data).await?;
        Ok(project)
    }
}
