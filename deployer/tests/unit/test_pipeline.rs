//! Pipeline tests with in-process stage fakes

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use sitedeploy::deploy::build::BuildRunner;
use sitedeploy::deploy::env::ENV_FILE_NAME;
use sitedeploy::deploy::fsm::DeploymentStatus;
use sitedeploy::deploy::git::SourceFetcher;
use sitedeploy::deploy::pipeline::{Pipeline, Stages};
use sitedeploy::deploy::publish::{ArtifactPublisher, PublishRequest};
use sitedeploy::deploy::workspace::WorkspaceManager;
use sitedeploy::errors::{BuildFailure, DeployError, FailureKind};
use sitedeploy::filesys::dir::Dir;
use sitedeploy::models::deployment::CommitInfo;
use sitedeploy::models::project::{Project, ProjectUpsert};
use sitedeploy::store::memory::MemoryStore;
use sitedeploy::store::Store;

// ================================ FAKES ================================== //

#[derive(Default)]
struct FakeFetcher {
    calls: AtomicUsize,
    branches: Mutex<Vec<String>>,
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, _repo_url: &str, branch: &str, workspace: &Dir) -> Result<CommitInfo, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.branches.lock().unwrap().push(branch.to_string());
        workspace.create().await?;
        Ok(CommitInfo {
            hash: "abc123".to_string(),
            title: "Initial commit".to_string(),
        })
    }
}

struct FakeBuilder {
    exit_code: i32,
    calls: AtomicUsize,
}

impl FakeBuilder {
    fn exiting(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BuildRunner for FakeBuilder {
    async fn build(&self, workspace: &Dir) -> Result<Dir, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.exit_code {
            0 => Ok(workspace.clone()),
            code => Err(BuildFailure::Exit { code }.into()),
        }
    }
}

enum PublishBehavior {
    Mint(&'static str),
    NoSiteId,
}

struct FakePublisher {
    behavior: PublishBehavior,
    seen_site_ids: Mutex<Vec<Option<String>>>,
}

impl FakePublisher {
    fn new(behavior: PublishBehavior) -> Self {
        Self {
            behavior,
            seen_site_ids: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.seen_site_ids.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactPublisher for FakePublisher {
    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, DeployError> {
        self.seen_site_ids
            .lock()
            .unwrap()
            .push(request.site_id.map(str::to_string));
        if let Some(site_id) = request.site_id {
            return Ok(site_id.to_string());
        }
        match self.behavior {
            PublishBehavior::Mint(site_id) => Ok(site_id.to_string()),
            PublishBehavior::NoSiteId => Err(DeployError::PublishParseError {
                output: "Uploading...\nDone".to_string(),
            }),
        }
    }
}

// ================================ HELPERS ================================ //

struct Harness {
    _tmp: TempDir,
    store: Arc<MemoryStore>,
    workspaces: WorkspaceManager,
    fetcher: Arc<FakeFetcher>,
}

impl Harness {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let workspaces = WorkspaceManager::new(tmp.path().join("workspaces"));
        Self {
            _tmp: tmp,
            store: Arc::new(MemoryStore::new()),
            workspaces,
            fetcher: Arc::new(FakeFetcher::default()),
        }
    }

    fn pipeline(&self, builder: Arc<FakeBuilder>, publisher: Arc<FakePublisher>) -> Pipeline {
        Pipeline::new(
            self.store.clone(),
            Stages {
                workspaces: self.workspaces.clone(),
                fetcher: self.fetcher.clone(),
                builder,
                publisher,
            },
        )
    }

    async fn project(&self, url: &str, branch: &str, env_json: &str) -> Project {
        self.store
            .upsert_project(ProjectUpsert {
                github_url: url.to_string(),
                github_branch: branch.to_string(),
                owner_address: "0xowner".to_string(),
                env_json: env_json.to_string(),
                output_dir: String::new(),
            })
            .await
            .unwrap()
    }
}

const REPO: &str = "https://github.com/acme/site";

// ================================= TESTS ================================= //

#[tokio::test]
async fn test_successful_deployment_becomes_ready() {
    let h = Harness::new();
    let project = h
        .project(REPO, "", r#"[{"key":"A","value":"1"},{"key":"B","value":"2"}]"#)
        .await;
    let deployment = h.store.create_deployment(&project.id).await.unwrap();

    let builder = Arc::new(FakeBuilder::exiting(0));
    let publisher = Arc::new(FakePublisher::new(PublishBehavior::Mint("0xsite")));
    let pipeline = h.pipeline(builder.clone(), publisher.clone());

    let done = pipeline.process(deployment.id).await.unwrap();
    assert_eq!(done.status, DeploymentStatus::Ready);
    assert_eq!(done.ipfs_cid.as_deref(), Some("0xsite"));
    assert_eq!(done.commit_hash.as_deref(), Some("abc123"));
    assert_eq!(done.commit_title.as_deref(), Some("Initial commit"));
    assert!(done.deployed_at.is_some());
    assert!(done.error.is_none());

    // Project points at the new site, branch defaulted
    let project = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(project.site_id.as_deref(), Some("0xsite"));
    assert_eq!(h.fetcher.branches.lock().unwrap().as_slice(), ["main"]);

    // Environment written into the workspace
    let workspace = h.workspaces.path_for(&project.id, deployment.id).unwrap();
    let env = std::fs::read_to_string(workspace.path().join(ENV_FILE_NAME)).unwrap();
    assert_eq!(env, "A=1\nB=2");
}

#[tokio::test]
async fn test_second_deployment_updates_existing_site() {
    let h = Harness::new();
    let project = h.project(REPO, "main", "").await;

    let builder = Arc::new(FakeBuilder::exiting(0));
    let publisher = Arc::new(FakePublisher::new(PublishBehavior::Mint("0xsite")));
    let pipeline = h.pipeline(builder, publisher.clone());

    let first = h.store.create_deployment(&project.id).await.unwrap();
    pipeline.process(first.id).await.unwrap();
    let second = h.store.create_deployment(&project.id).await.unwrap();
    let done = pipeline.process(second.id).await.unwrap();

    assert_eq!(done.ipfs_cid.as_deref(), Some("0xsite"));
    assert_eq!(
        publisher.seen_site_ids.lock().unwrap().as_slice(),
        [None, Some("0xsite".to_string())]
    );
}

#[tokio::test]
async fn test_missing_repository_url_fails_before_fetch() {
    let h = Harness::new();
    let project = h.project("", "main", "").await;
    let deployment = h.store.create_deployment(&project.id).await.unwrap();

    let pipeline = h.pipeline(
        Arc::new(FakeBuilder::exiting(0)),
        Arc::new(FakePublisher::new(PublishBehavior::Mint("0xsite"))),
    );
    let done = pipeline.process(deployment.id).await.unwrap();

    assert_eq!(done.status, DeploymentStatus::Failed);
    assert!(done.error.unwrap().starts_with("Configuration error"));
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_option_like_branch_fails_before_fetch() {
    let h = Harness::new();
    let project = h.project(REPO, "--upload-pack=touch /tmp/owned", "").await;
    let deployment = h.store.create_deployment(&project.id).await.unwrap();

    let pipeline = h.pipeline(
        Arc::new(FakeBuilder::exiting(0)),
        Arc::new(FakePublisher::new(PublishBehavior::Mint("0xsite"))),
    );
    let done = pipeline.process(deployment.id).await.unwrap();

    assert_eq!(done.status, DeploymentStatus::Failed);
    assert!(done.error.unwrap().starts_with("Configuration error: Invalid branch name"));
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_environment_fails_deployment() {
    let h = Harness::new();
    let project = h.project(REPO, "main", "{not json").await;
    let deployment = h.store.create_deployment(&project.id).await.unwrap();

    let pipeline = h.pipeline(
        Arc::new(FakeBuilder::exiting(0)),
        Arc::new(FakePublisher::new(PublishBehavior::Mint("0xsite"))),
    );
    let done = pipeline.process(deployment.id).await.unwrap();

    assert_eq!(done.status, DeploymentStatus::Failed);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_build_failure_skips_publish() {
    let h = Harness::new();
    let project = h.project(REPO, "main", "").await;
    let deployment = h.store.create_deployment(&project.id).await.unwrap();

    let publisher = Arc::new(FakePublisher::new(PublishBehavior::Mint("0xsite")));
    let pipeline = h.pipeline(Arc::new(FakeBuilder::exiting(1)), publisher.clone());
    let done = pipeline.process(deployment.id).await.unwrap();

    assert_eq!(done.status, DeploymentStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("Build failed with code 1"));
    // The commit was fetched before the failure and is kept
    assert_eq!(done.commit_hash.as_deref(), Some("abc123"));
    assert!(done.ipfs_cid.is_none());
    assert_eq!(publisher.calls(), 0);
}

#[tokio::test]
async fn test_unparseable_publish_output_fails() {
    let h = Harness::new();
    let project = h.project(REPO, "main", "").await;
    let deployment = h.store.create_deployment(&project.id).await.unwrap();

    let pipeline = h.pipeline(
        Arc::new(FakeBuilder::exiting(0)),
        Arc::new(FakePublisher::new(PublishBehavior::NoSiteId)),
    );
    let done = pipeline.process(deployment.id).await.unwrap();

    assert_eq!(done.status, DeploymentStatus::Failed);
    assert!(done
        .error
        .unwrap()
        .starts_with("Could not find site ID in output:\n"));
    let project = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert!(project.site_id.is_none());
}

#[tokio::test]
async fn test_failure_keeps_previous_site_address() {
    let h = Harness::new();
    let project = h.project(REPO, "main", "").await;

    let publisher = Arc::new(FakePublisher::new(PublishBehavior::Mint("0xsite")));
    let good = h.pipeline(Arc::new(FakeBuilder::exiting(0)), publisher.clone());
    let first = h.store.create_deployment(&project.id).await.unwrap();
    good.process(first.id).await.unwrap();

    let bad = h.pipeline(Arc::new(FakeBuilder::exiting(2)), publisher);
    let second = h.store.create_deployment(&project.id).await.unwrap();
    let done = bad.process(second.id).await.unwrap();

    assert_eq!(done.status, DeploymentStatus::Failed);
    let project = h.store.get_project(&project.id).await.unwrap().unwrap();
    assert_eq!(project.site_id.as_deref(), Some("0xsite"));
}

#[tokio::test]
async fn test_terminal_deployment_is_not_reprocessed() {
    let h = Harness::new();
    let project = h.project(REPO, "main", "").await;
    let deployment = h.store.create_deployment(&project.id).await.unwrap();

    let builder = Arc::new(FakeBuilder::exiting(0));
    let pipeline = h.pipeline(
        builder.clone(),
        Arc::new(FakePublisher::new(PublishBehavior::Mint("0xsite"))),
    );
    pipeline.process(deployment.id).await.unwrap();
    let again = pipeline.process(deployment.id).await.unwrap();

    assert_eq!(again.status, DeploymentStatus::Ready);
    assert_eq!(builder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_deployment_is_an_error() {
    let h = Harness::new();
    let pipeline = h.pipeline(
        Arc::new(FakeBuilder::exiting(0)),
        Arc::new(FakePublisher::new(PublishBehavior::Mint("0xsite"))),
    );
    let err = pipeline.process(999).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::NotFound);
}
