//! Project models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::deployment::Deployment;

/// Branch used when a project does not name one
pub const DEFAULT_BRANCH: &str = "main";

/// Output directory used when a build config does not name one
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// A site source: one repository branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Opaque generated ID
    pub id: String,

    /// Repository URL as submitted
    pub github_url: String,

    /// Branch to build
    pub github_branch: String,

    /// Owner address supplied on first upload
    pub owner_address: String,

    /// Content address of the latest successfully published site
    pub site_id: Option<String>,

    /// Human-readable name attached to the site
    pub ens_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Environment variables of a project, kept as JSON text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub project_id: String,

    /// JSON list of `{key, value}` pairs
    pub json_text: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Build settings of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub project_id: String,

    /// Directory inside the workspace that holds the publishable site
    pub output_dir: String,

    /// Free-form build metadata
    pub json_text: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BuildConfig {
    /// Output directory, falling back to the default
    pub fn output_dir(&self) -> &str {
        if self.output_dir.trim().is_empty() {
            DEFAULT_OUTPUT_DIR
        } else {
            &self.output_dir
        }
    }
}

/// Fields for creating or refreshing a project keyed by repository and branch
#[derive(Debug, Clone)]
pub struct ProjectUpsert {
    pub github_url: String,
    pub github_branch: String,
    pub owner_address: String,
    pub env_json: String,
    pub output_dir: String,
}

/// A project together with its related records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub project: Project,

    /// Most recent deployment, if any
    pub latest_deployment: Option<Deployment>,

    pub environment: Option<Environment>,

    pub build_config: Option<BuildConfig>,
}

/// Project summary for name listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsDomain {
    pub id: String,
    pub ens_name: String,
    pub github_url: String,
    pub github_branch: String,
}
