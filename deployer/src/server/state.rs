//! Server state

use crate::services::deployments::DeployService;
use crate::services::projects::ProjectService;

/// Server state shared across handlers
pub struct ServerState {
    pub deploys: DeployService,
    pub projects: ProjectService,
}

impl ServerState {
    pub fn new(deploys: DeployService, projects: ProjectService) -> Self {
        Self { deploys, projects }
    }
}
