//! Environment file materialization

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;

/// File written at the workspace root
pub const ENV_FILE_NAME: &str = ".env";

/// One environment variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Parse the stored environment text. Empty text means no variables.
pub fn parse_env_json(json_text: &str) -> Result<Vec<EnvVar>, DeployError> {
    if json_text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json_text)
        .map_err(|e| DeployError::ConfigError(format!("Invalid environment JSON: {}", e)))
}

/// Render `KEY=VALUE` lines in input order, joined without a trailing newline.
/// Keys and values are written verbatim.
pub fn render_env(vars: &[EnvVar]) -> String {
    vars.iter()
        .map(|var| format!("{}={}", var.key, var.value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write the variables to `.env` in the workspace, overwriting it.
/// Nothing is written for an empty list.
pub async fn write_env(workspace: &Dir, vars: &[EnvVar]) -> Result<(), DeployError> {
    if vars.is_empty() {
        return Ok(());
    }
    let file = workspace.file(ENV_FILE_NAME);
    info!("Writing {} env vars to: {}", vars.len(), file.path().display());
    file.write_string(&render_env(vars)).await
}
