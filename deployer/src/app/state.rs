//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::build::ShellBuildRunner;
use crate::deploy::git::GitFetcher;
use crate::deploy::pipeline::{Pipeline, Stages};
use crate::deploy::publish::{PublisherSettings, SiteBuilderPublisher};
use crate::deploy::workspace::WorkspaceManager;
use crate::errors::DeployError;
use crate::http::client::{AllowAllProbe, HttpClient, RepoProbe};
use crate::queue::JobQueue;
use crate::services::deployments::DeployService;
use crate::services::projects::ProjectService;
use crate::storage::settings::PipelineSettings;
use crate::store::memory::MemoryStore;
use crate::store::Store;

/// Main application state
pub struct AppState {
    /// Record store
    pub store: Arc<dyn Store>,

    /// Pending deployment jobs
    pub queue: Arc<JobQueue>,

    /// Stage runner shared by the workers
    pub pipeline: Arc<Pipeline>,

    /// Deployment service
    pub deploys: DeployService,

    /// Project service
    pub projects: ProjectService,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, DeployError> {
        info!("Initializing application state...");

        options.layout.setup().await?;

        let store: Arc<dyn Store> = Arc::new(MemoryStore::open(options.layout.state_file()).await?);
        let queue = Arc::new(JobQueue::new(options.deployer.max_pending));

        let stages = build_stages(
            WorkspaceManager::new(options.layout.workspaces_dir().path()),
            &options.pipeline,
        );
        let pipeline = Arc::new(Pipeline::new(store.clone(), stages));

        let probe: Arc<dyn RepoProbe> = if options.verify_public_repo {
            Arc::new(HttpClient::new(Duration::from_secs(30))?)
        } else {
            Arc::new(AllowAllProbe)
        };

        Ok(Self::assemble(store, queue, pipeline, probe))
    }

    /// Wire services around already-built components
    pub fn assemble(
        store: Arc<dyn Store>,
        queue: Arc<JobQueue>,
        pipeline: Arc<Pipeline>,
        probe: Arc<dyn RepoProbe>,
    ) -> Self {
        let deploys = DeployService::new(store.clone(), queue.clone());
        let projects = ProjectService::new(store.clone(), deploys.clone(), probe);
        Self {
            store,
            queue,
            pipeline,
            deploys,
            projects,
        }
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), DeployError> {
        info!(
            "Shutting down application state ({} jobs pending, {} active)...",
            self.queue.pending_len(),
            self.queue.active_len()
        );
        Ok(())
    }
}

/// Real stage implementations from the pipeline settings
pub fn build_stages(workspaces: WorkspaceManager, settings: &PipelineSettings) -> Stages {
    Stages {
        workspaces,
        fetcher: Arc::new(
            GitFetcher::new(secs(settings.git_timeout_secs)).with_program(&settings.git_program),
        ),
        builder: Arc::new(ShellBuildRunner::new(
            &settings.build_command,
            secs(settings.build_timeout_secs),
        )),
        publisher: Arc::new(SiteBuilderPublisher::new(PublisherSettings {
            program: settings.publish_program.clone(),
            epochs: settings.epochs,
            timeout: secs(settings.publish_timeout_secs),
        })),
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}
