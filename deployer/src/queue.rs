//! Deployment job queue
//!
//! Holds deployment ids waiting for a worker. A deployment id can be pending
//! or active at most once; finished jobs are dropped rather than kept as
//! history. The deployment record in `processing` is the durable side of a
//! job, so pending jobs lost on restart are rebuilt from the store (see
//! [`JobQueue::recover`]).

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::deploy::fsm::DeploymentStatus;
use crate::errors::DeployError;
use crate::models::deployment::DeploymentId;
use crate::store::Store;

/// A queued unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub deployment_id: DeploymentId,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Job>,
    active: HashSet<DeploymentId>,
}

pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    max_pending: usize,
}

impl JobQueue {
    /// Create a queue holding at most `max_pending` waiting jobs
    pub fn new(max_pending: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            max_pending,
        }
    }

    /// Queue a deployment. Rejected if it is already pending or running.
    pub fn enqueue(&self, deployment_id: DeploymentId) -> Result<Job, DeployError> {
        let job = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

            if state.active.contains(&deployment_id)
                || state.pending.iter().any(|j| j.deployment_id == deployment_id)
            {
                return Err(DeployError::ValidationError(format!(
                    "Deployment {} is already queued",
                    deployment_id
                )));
            }
            if state.pending.len() >= self.max_pending {
                return Err(DeployError::ValidationError("Deploy queue is full".to_string()));
            }

            let job = Job {
                deployment_id,
                enqueued_at: Utc::now(),
            };
            state.pending.push_back(job.clone());
            job
        };

        self.notify.notify_one();
        info!("Deployment {} queued", deployment_id);
        Ok(job)
    }

    /// Wait for the next job and mark it active
    pub async fn next(&self) -> Job {
        loop {
            if let Some(job) = self.try_next() {
                return job;
            }
            self.notify.notified().await;
        }
    }

    /// Take the next job without waiting
    pub fn try_next(&self) -> Option<Job> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let job = state.pending.pop_front()?;
        state.active.insert(job.deployment_id);
        debug!("Deployment {} dequeued", job.deployment_id);
        Some(job)
    }

    /// Drop a finished job
    pub fn complete(&self, deployment_id: DeploymentId) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.active.remove(&deployment_id);
    }

    /// Re-queue every deployment the store still shows as `processing`.
    ///
    /// Called once at startup, before workers run, so nothing is active yet.
    pub async fn recover(&self, store: &dyn Store) -> Result<usize, DeployError> {
        let stuck = store
            .list_deployments_by_status(DeploymentStatus::Processing)
            .await?;
        let mut recovered = 0;
        for deployment in stuck {
            if self.enqueue(deployment.id).is_ok() {
                recovered += 1;
            }
        }
        if recovered > 0 {
            info!("Re-queued {} unfinished deployments", recovered);
        }
        Ok(recovered)
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).pending.len()
    }

    pub fn active_len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).active.len()
    }

    pub fn is_queued(&self, deployment_id: DeploymentId) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.active.contains(&deployment_id)
            || state.pending.iter().any(|j| j.deployment_id == deployment_id)
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(1024)
    }
}
