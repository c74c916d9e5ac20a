//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::{DeployError, FailureKind};
use crate::models::deployment::DeploymentId;
use crate::server::state::ServerState;
use crate::services::deployments::{StartDeploy, UpdateEns};
use crate::services::projects::UploadGithub;
use crate::utils::version_info;

/// Error body returned by every handler
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wraps a [`DeployError`] so handlers can use `?`
pub struct ApiError(DeployError);

impl From<DeployError> for ApiError {
    fn from(err: DeployError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            FailureKind::NotFound => StatusCode::NOT_FOUND,
            FailureKind::Validation | FailureKind::Configuration => StatusCode::BAD_REQUEST,
            FailureKind::State => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "sitedeploy".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Register a repository branch and deploy it
pub async fn upload_github_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<UploadGithub>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.projects.upload_github(body).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct RepoQuery {
    pub url: String,
}

/// Project registered for a repository URL
pub async fn get_github_upload_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RepoQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .projects
        .get_github_upload(&query.url)
        .await?
        .ok_or_else(|| DeployError::NotFound(format!("No project for {}", query.url)))?;
    Ok(Json(details))
}

/// Projects of an owner
pub async fn owner_uploads_handler(
    State(state): State<Arc<ServerState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.projects.get_all_github_uploads(&address).await?))
}

/// Project details
pub async fn project_handler(
    State(state): State<Arc<ServerState>>,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.projects.get_project(&project_id).await?))
}

/// Named sites of an owner
pub async fn ens_domains_handler(
    State(state): State<Arc<ServerState>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.projects.get_ens_domains(&address).await?))
}

/// Start a deployment for an existing project
pub async fn start_deploy_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<StartDeploy>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.deploys.start_deploy(body).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Deployment status
pub async fn deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<DeploymentId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.deploys.get_deployment(deployment_id).await?))
}

/// Attach a name to a deployed site
pub async fn update_ens_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<UpdateEns>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.deploys.update_ens(body).await?))
}
