//! Git source fetcher

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::deploy::process::{self, ProcessOutput, ProcessSpec};
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::models::deployment::CommitInfo;
use crate::models::project::DEFAULT_BRANCH;

/// Checks out a repository branch into a workspace
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Check out `branch` of `repo_url` into `workspace` and report the latest commit
    async fn fetch(&self, repo_url: &str, branch: &str, workspace: &Dir) -> Result<CommitInfo, DeployError>;
}

/// Trim a repository URL and give it the `.git` suffix.
///
/// An empty URL is a configuration problem, not a fetch failure.
pub fn normalize_repo_url(url: Option<&str>) -> Result<String, DeployError> {
    let url = url.map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return Err(DeployError::ConfigError(
            "No repository URL configured".to_string(),
        ));
    }
    if url.starts_with('-') {
        return Err(DeployError::ConfigError(format!(
            "Invalid repository URL: {}",
            url
        )));
    }
    if url.ends_with(".git") {
        Ok(url.to_string())
    } else {
        Ok(format!("{}.git", url))
    }
}

/// Branch to check out, `main` when unspecified
pub fn resolve_branch(branch: Option<&str>) -> Result<&str, DeployError> {
    match branch.map(str::trim) {
        Some(b) if !b.is_empty() => {
            validate_branch(b)?;
            Ok(b)
        }
        _ => Ok(DEFAULT_BRANCH),
    }
}

/// Reject names git would read as an option or refuse as a ref
pub fn validate_branch(branch: &str) -> Result<(), DeployError> {
    let invalid = branch.is_empty()
        || branch.starts_with('-')
        || branch.starts_with('/')
        || branch.ends_with('/')
        || branch.ends_with('.')
        || branch.ends_with(".lock")
        || branch.contains("..")
        || branch.contains("//")
        || branch.contains("@{")
        || branch == "@"
        || branch
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c));
    if invalid {
        return Err(DeployError::ConfigError(format!(
            "Invalid branch name: {}",
            branch
        )));
    }
    Ok(())
}

/// Parse `git log -1 --format=%H%n%B` output into hash and title
pub fn parse_commit(log_output: &str) -> Option<CommitInfo> {
    let mut lines = log_output.lines();
    let hash = lines.next()?.trim();
    if hash.is_empty() {
        return None;
    }
    let title = lines.next().unwrap_or_default().trim_end().to_string();
    Some(CommitInfo {
        hash: hash.to_string(),
        title,
    })
}

/// Fetches sources with the `git` command line
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: String,
    timeout: Option<Duration>,
}

impl GitFetcher {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            program: "git".to_string(),
            timeout,
        }
    }

    /// Use a different git executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn git(&self, repo_url: &str, spec: ProcessSpec) -> Result<ProcessOutput, DeployError> {
        let spec = spec.timeout(self.timeout).label("git");
        let output = process::run(&spec)
            .await
            .map_err(|e| DeployError::SourceFetchError {
                url: repo_url.to_string(),
                cause: e.to_string(),
            })?;
        if !output.success() {
            let cause = match output.stderr.trim() {
                "" => format!("git exited with code {:?}", output.exit_code),
                stderr => stderr.to_string(),
            };
            return Err(DeployError::SourceFetchError {
                url: repo_url.to_string(),
                cause,
            });
        }
        Ok(output)
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(300)))
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, repo_url: &str, branch: &str, workspace: &Dir) -> Result<CommitInfo, DeployError> {
        let path = workspace.path();
        validate_branch(branch)?;
        if repo_url.starts_with('-') {
            return Err(DeployError::ConfigError(format!(
                "Invalid repository URL: {}",
                repo_url
            )));
        }

        if workspace.subdir(".git").exists().await {
            // Same deployment dispatched again: refresh the existing checkout
            debug!("Checkout exists at {}, fetching {}", path.display(), branch);
            self.git(
                repo_url,
                ProcessSpec::new(&self.program)
                    .args(["fetch", "--depth=1", "--", "origin", branch])
                    .cwd(path),
            )
            .await?;
            self.git(
                repo_url,
                ProcessSpec::new(&self.program)
                    .args(["reset", "--hard", "FETCH_HEAD"])
                    .cwd(path),
            )
            .await?;
        } else {
            info!("Cloning {} (branch: {}) to {}", repo_url, branch, path.display());
            self.git(
                repo_url,
                ProcessSpec::new(&self.program)
                    .arg("clone")
                    .arg(format!("--branch={}", branch))
                    .args(["--single-branch", "--depth=1", "--", repo_url])
                    .arg(path.to_string_lossy()),
            )
            .await?;
        }

        let log = self
            .git(
                repo_url,
                ProcessSpec::new(&self.program)
                    .args(["log", "-1", "--format=%H%n%B"])
                    .cwd(path),
            )
            .await?;

        let commit = parse_commit(&log.stdout).unwrap_or_default();
        info!("Latest commit: {} {}", commit.hash, commit.title);
        Ok(commit)
    }
}
