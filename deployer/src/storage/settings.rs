//! Settings file management

use serde::{Deserialize, Serialize};

use crate::deploy::build::DEFAULT_BUILD_COMMAND;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Deployer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Also write logs to files in the logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Number of deployments processed at once
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of waiting jobs
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Reject repositories that are not publicly reachable
    #[serde(default = "default_true")]
    pub verify_public_repo: bool,
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    2
}

fn default_max_pending() -> usize {
    1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            server: ServerSettings::default(),
            pipeline: PipelineSettings::default(),
            workers: default_workers(),
            max_pending: default_max_pending(),
            verify_public_repo: true,
        }
    }
}

impl Settings {
    /// Read settings from `file`, falling back to defaults when it does not exist
    pub async fn load_or_default(file: &File) -> Result<Self, DeployError> {
        if file.exists().await {
            file.read_json().await
        } else {
            Ok(Self::default())
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enabled: true,
        }
    }
}

/// External command settings for the pipeline stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Git executable
    #[serde(default = "default_git_program")]
    pub git_program: String,

    /// Install and build script run with `sh -c`
    #[serde(default = "default_build_command")]
    pub build_command: String,

    /// Publish CLI executable
    #[serde(default = "default_publish_program")]
    pub publish_program: String,

    /// Storage epochs passed to the publish CLI
    #[serde(default = "default_epochs")]
    pub epochs: u32,

    /// Timeout for git commands, in seconds
    #[serde(default = "default_git_timeout")]
    pub git_timeout_secs: u64,

    /// Timeout for the build, in seconds (0 disables it)
    #[serde(default = "default_stage_timeout")]
    pub build_timeout_secs: u64,

    /// Timeout for publishing, in seconds (0 disables it)
    #[serde(default = "default_stage_timeout")]
    pub publish_timeout_secs: u64,
}

fn default_git_program() -> String {
    "git".to_string()
}

fn default_build_command() -> String {
    DEFAULT_BUILD_COMMAND.to_string()
}

fn default_publish_program() -> String {
    "site-builder".to_string()
}

fn default_epochs() -> u32 {
    1
}

fn default_git_timeout() -> u64 {
    300
}

fn default_stage_timeout() -> u64 {
    900
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            git_program: default_git_program(),
            build_command: default_build_command(),
            publish_program: default_publish_program(),
            epochs: default_epochs(),
            git_timeout_secs: default_git_timeout(),
            build_timeout_secs: default_stage_timeout(),
            publish_timeout_secs: default_stage_timeout(),
        }
    }
}
