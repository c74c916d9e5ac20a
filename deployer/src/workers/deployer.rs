//! Deployment worker

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info};

use crate::deploy::pipeline::Pipeline;
use crate::errors::DeployError;
use crate::queue::{Job, JobQueue};

/// Deployer worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Number of deployments processed at once
    pub concurrency: usize,

    /// Maximum number of waiting jobs
    pub max_pending: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_pending: 1024,
        }
    }
}

/// Run one deployer worker until shutdown
pub async fn run(
    worker_id: usize,
    queue: Arc<JobQueue>,
    pipeline: Arc<Pipeline>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Deployer worker {} starting...", worker_id);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_signal => {
                info!("Deployer worker {} shutting down...", worker_id);
                return;
            }
            job = queue.next() => {
                execute_job(worker_id, job, &queue, &pipeline).await;
            }
        }
    }
}

async fn execute_job(worker_id: usize, job: Job, queue: &JobQueue, pipeline: &Pipeline) {
    let deployment_id = job.deployment_id;
    info!("Worker {} picked up deployment {}", worker_id, deployment_id);

    // Runs inline so aborting the worker drops the pipeline and its child process
    let result = AssertUnwindSafe(pipeline.process(deployment_id))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(deployment)) => {
            info!(
                "Deployment {} finished with status {}",
                deployment_id, deployment.status
            );
        }
        Ok(Err(e)) => {
            error!("Deployment {} could not be processed: {}", deployment_id, e);
        }
        Err(panic) => {
            let err = DeployError::Internal(format!(
                "Deployment task panicked: {}",
                panic_message(panic.as_ref())
            ));
            error!("Deployment {}: {}", deployment_id, err);
            if let Err(e) = pipeline.tracker().mark_failed(deployment_id, &err, None).await {
                error!("Failed to record panic for deployment {}: {}", deployment_id, e);
            }
        }
    }

    queue.complete(deployment_id);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
