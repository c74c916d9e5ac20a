//! Service layer and HTTP route tests

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use sitedeploy::deploy::fsm::DeploymentStatus;
use sitedeploy::errors::{DeployError, FailureKind};
use sitedeploy::http::client::{AllowAllProbe, RepoProbe};
use sitedeploy::models::deployment::{CommitInfo, DeploymentOutcome};
use sitedeploy::queue::JobQueue;
use sitedeploy::server::serve::router;
use sitedeploy::server::state::ServerState;
use sitedeploy::services::deployments::{DeployService, StartDeploy, UpdateEns};
use sitedeploy::services::projects::{ProjectService, UploadGithub};
use sitedeploy::store::memory::MemoryStore;
use sitedeploy::store::Store;

struct PrivateRepos;

#[async_trait]
impl RepoProbe for PrivateRepos {
    async fn is_public(&self, _repo_url: &str) -> Result<bool, DeployError> {
        Ok(false)
    }
}

struct Services {
    store: Arc<MemoryStore>,
    queue: Arc<JobQueue>,
    deploys: DeployService,
    projects: ProjectService,
}

fn services_with(probe: Arc<dyn RepoProbe>, max_pending: usize) -> Services {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(JobQueue::new(max_pending));
    let deploys = DeployService::new(store.clone(), queue.clone());
    let projects = ProjectService::new(store.clone(), deploys.clone(), probe);
    Services {
        store,
        queue,
        deploys,
        projects,
    }
}

fn services() -> Services {
    services_with(Arc::new(AllowAllProbe), 16)
}

fn upload(env_json: &str) -> UploadGithub {
    UploadGithub {
        url: "https://github.com/acme/site".to_string(),
        branch: "main".to_string(),
        env_json: env_json.to_string(),
        output_dir: String::new(),
        address: "0xowner".to_string(),
    }
}

async fn mark_ready(store: &MemoryStore, deployment_id: u64, site_id: &str) {
    store
        .complete_deployment(
            deployment_id,
            DeploymentOutcome::Ready {
                ipfs_cid: site_id.to_string(),
                commit: CommitInfo::default(),
            },
        )
        .await
        .unwrap();
}

// ============================== UPLOADS ================================== //

#[tokio::test]
async fn test_upload_creates_project_and_queues_deployment() {
    let s = services();
    let response = s
        .projects
        .upload_github(upload(r#"[{"key":"A","value":"1"}]"#))
        .await
        .unwrap();

    assert!(s.queue.is_queued(response.deploy_id));
    let status = s.deploys.get_deployment(response.deploy_id).await.unwrap();
    assert_eq!(status.status, DeploymentStatus::Processing);

    let details = s.projects.get_project(&response.project_id).await.unwrap();
    assert_eq!(details.project.owner_address, "0xowner");
    assert_eq!(
        details.environment.unwrap().json_text,
        r#"[{"key":"A","value":"1"}]"#
    );
    assert_eq!(details.build_config.unwrap().output_dir(), "dist");
}

#[tokio::test]
async fn test_reupload_updates_environment_in_place() {
    let s = services();
    let first = s.projects.upload_github(upload("")).await.unwrap();
    let second = s
        .projects
        .upload_github(upload(r#"[{"key":"B","value":"2"}]"#))
        .await
        .unwrap();

    assert_eq!(first.project_id, second.project_id);
    assert_ne!(first.deploy_id, second.deploy_id);

    let all = s.projects.get_all_github_uploads("0xowner").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(
        all[0].latest_deployment.as_ref().map(|d| d.id),
        Some(second.deploy_id)
    );

    let details = s
        .projects
        .get_github_upload("https://github.com/acme/site")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        details.environment.unwrap().json_text,
        r#"[{"key":"B","value":"2"}]"#
    );
}

#[tokio::test]
async fn test_private_repository_is_rejected() {
    let s = services_with(Arc::new(PrivateRepos), 16);
    let err = s.projects.upload_github(upload("")).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Validation);
    assert!(s.store.list_projects_by_owner("0xowner").await.unwrap().is_empty());
    assert_eq!(s.queue.pending_len(), 0);
}

#[tokio::test]
async fn test_blank_url_is_rejected() {
    let s = services();
    let mut data = upload("");
    data.url = "   ".to_string();
    let err = s.projects.upload_github(data).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Validation);
}

#[tokio::test]
async fn test_option_like_branch_is_rejected() {
    let s = services();
    let mut data = upload("");
    data.branch = "--upload-pack=touch /tmp/owned".to_string();
    let err = s.projects.upload_github(data).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Validation);
    assert!(s.store.list_projects_by_owner("0xowner").await.unwrap().is_empty());
    assert_eq!(s.queue.pending_len(), 0);
}

#[tokio::test]
async fn test_unknown_upload_lookup_is_none() {
    let s = services();
    let found = s
        .projects
        .get_github_upload("https://github.com/acme/other")
        .await
        .unwrap();
    assert!(found.is_none());
}

// ============================= DEPLOYMENTS =============================== //

#[tokio::test]
async fn test_full_queue_fails_the_new_deployment() {
    let s = services_with(Arc::new(AllowAllProbe), 1);
    let first = s.projects.upload_github(upload("")).await.unwrap();

    let err = s
        .deploys
        .start_deploy(StartDeploy {
            project_id: first.project_id.clone(),
            env_json: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Validation);

    let latest = s
        .store
        .latest_deployment(&first.project_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_unknown_deployment_is_not_found() {
    let s = services();
    let err = s.deploys.get_deployment(12345).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::NotFound);
}

#[tokio::test]
async fn test_update_ens_on_ready_deployment() {
    let s = services();
    let uploaded = s.projects.upload_github(upload("")).await.unwrap();
    mark_ready(&s.store, uploaded.deploy_id, "0xsite").await;

    let project = s
        .deploys
        .update_ens(UpdateEns {
            project_id: uploaded.project_id.clone(),
            deploy_id: uploaded.deploy_id,
            ens_domain: " acme.eth ".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(project.ens_name.as_deref(), Some("acme.eth"));
    assert_eq!(project.site_id.as_deref(), Some("0xsite"));

    let domains = s.projects.get_ens_domains("0xowner").await.unwrap();
    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0].ens_name, "acme.eth");
}

#[tokio::test]
async fn test_update_ens_requires_ready_deployment() {
    let s = services();
    let uploaded = s.projects.upload_github(upload("")).await.unwrap();

    let err = s
        .deploys
        .update_ens(UpdateEns {
            project_id: uploaded.project_id.clone(),
            deploy_id: uploaded.deploy_id,
            ens_domain: "acme.eth".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::State);

    let err = s
        .deploys
        .update_ens(UpdateEns {
            project_id: uploaded.project_id,
            deploy_id: uploaded.deploy_id,
            ens_domain: "  ".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Validation);
}

// ================================ ROUTES ================================= //

fn app(s: &Services) -> axum::Router {
    router(Arc::new(ServerState::new(
        s.deploys.clone(),
        s.projects.clone(),
    )))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_route() {
    let s = services();
    let response = app(&s)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_upload_route_then_status_route() {
    let s = services();
    let body = serde_json::json!({
        "url": "https://github.com/acme/site",
        "branch": "main",
        "address": "0xowner",
    });
    let response = app(&s)
        .oneshot(
            Request::post("/uploads/github")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let deploy_id = body_json(response).await["deploy_id"].as_u64().unwrap();

    let response = app(&s)
        .oneshot(
            Request::get(format!("/deployments/{}", deploy_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "processing");
}

#[tokio::test]
async fn test_errors_map_to_status_codes() {
    let s = services();

    let response = app(&s)
        .oneshot(Request::get("/deployments/404").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("404"));

    let response = app(&s)
        .oneshot(
            Request::get("/projects/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = serde_json::json!({ "url": "", "address": "0xowner" });
    let response = app(&s)
        .oneshot(
            Request::post("/uploads/github")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
