//! Error types for the deployment pipeline

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which publish command was run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// First-time publish, mints a new site address
    Publish,

    /// Refresh an existing site in place
    Update,
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishMode::Publish => write!(f, "Publish"),
            PublishMode::Update => write!(f, "Update"),
        }
    }
}

/// Ways the build command can fail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildFailure {
    #[error("Build failed with code {code}")]
    Exit { code: i32 },

    #[error("Build process terminated without an exit code")]
    Terminated,

    #[error("Failed to launch build command: {0}")]
    Spawn(String),

    #[error("Build timed out after {0:?}")]
    TimedOut(Duration),
}

impl BuildFailure {
    /// Exit code of the build process, when it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BuildFailure::Exit { code } => Some(*code),
            _ => None,
        }
    }
}

/// Coarse failure classes, for callers that branch on the kind of error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Configuration,
    Io,
    SourceFetch,
    Build,
    Publish,
    PublishParse,
    State,
    NotFound,
    Validation,
    Other,
}

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to fetch source from {url}: {cause}")]
    SourceFetchError { url: String, cause: String },

    #[error(transparent)]
    BuildError(#[from] BuildFailure),

    #[error("{mode} failed with code {}", code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    PublishError { mode: PublishMode, code: Option<i32> },

    #[error("Could not find site ID in output:\n{output}")]
    PublishParseError { output: String },

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Classify the error
    pub fn kind(&self) -> FailureKind {
        match self {
            DeployError::ConfigError(_) | DeployError::JsonError(_) => FailureKind::Configuration,
            DeployError::IoError(_) => FailureKind::Io,
            DeployError::SourceFetchError { .. } => FailureKind::SourceFetch,
            DeployError::BuildError(_) => FailureKind::Build,
            DeployError::PublishError { .. } => FailureKind::Publish,
            DeployError::PublishParseError { .. } => FailureKind::PublishParse,
            DeployError::InvalidTransition(_) => FailureKind::State,
            DeployError::NotFound(_) => FailureKind::NotFound,
            DeployError::ValidationError(_) => FailureKind::Validation,
            _ => FailureKind::Other,
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
