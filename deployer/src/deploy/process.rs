//! Scoped child-process execution
//!
//! Every external command in the pipeline (git, build, publish) runs through
//! [`run`]. Output is streamed line by line to the log while it is collected,
//! and the child is killed if the call times out or the future is dropped.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A command to run
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Program to execute
    pub program: String,

    /// Positional arguments
    pub args: Vec<String>,

    /// Working directory
    pub cwd: Option<PathBuf>,

    /// Kill the process after this long
    pub timeout: Option<Duration>,

    /// Label used in log lines
    pub label: String,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            label: program.clone(),
            program,
            args: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    /// Run `script` through `sh -c`
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Collected result of a finished process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Why a process produced no [`ProcessOutput`]
#[derive(Debug)]
pub enum ProcessError {
    /// The program could not be started
    Spawn(std::io::Error),

    /// Waiting on the child failed
    Wait(std::io::Error),

    /// The timeout elapsed and the child was killed
    TimedOut(Duration),
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::Spawn(e) => write!(f, "failed to spawn: {}", e),
            ProcessError::Wait(e) => write!(f, "failed to wait: {}", e),
            ProcessError::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
        }
    }
}

/// Run a process to completion
pub async fn run(spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
    debug!("[{}] {} {:?}", spec.label, spec.program, spec.args);

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;

    let stdout_task = collect_lines(child.stdout.take(), spec.label.clone(), false);
    let stderr_task = collect_lines(child.stderr.take(), spec.label.clone(), true);

    let status = match spec.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(result) => result.map_err(ProcessError::Wait)?,
            Err(_) => {
                warn!("[{}] timed out after {:?}, killing", spec.label, limit);
                child.kill().await.ok();
                stdout_task.abort();
                stderr_task.abort();
                return Err(ProcessError::TimedOut(limit));
            }
        },
        None => child.wait().await.map_err(ProcessError::Wait)?,
    };

    let (stdout, stderr) = futures::future::join(stdout_task, stderr_task).await;
    let stdout = stdout.unwrap_or_default();
    let stderr = stderr.unwrap_or_default();

    debug!("[{}] exited with {:?}", spec.label, status.code());

    Ok(ProcessOutput {
        exit_code: status.code(),
        stdout,
        stderr,
    })
}

fn collect_lines<R>(reader: Option<R>, label: String, is_stderr: bool) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut collected = Vec::new();
        let Some(reader) = reader else {
            return String::new();
        };

        // Read raw bytes so non-UTF-8 output never closes the pipe early
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    if is_stderr {
                        warn!("[{}] stderr: {}", label, line);
                    } else {
                        info!("[{}] stdout: {}", label, line);
                    }
                    collected.push(line);
                }
                Err(e) => {
                    warn!("[{}] failed to read output, discarding the rest: {}", label, e);
                    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                    break;
                }
            }
        }
        collected.join("\n")
    })
}
