//! Worker backed by an external command
//!
//! The command runs under `sh -c` (or `cmd /C` on Windows). The task is
//! written to its stdin as one JSON document; the command answers on stdout
//! with a JSON object:
//!
//! ```json
//! {"payload": {...}, "confidence": 0.85, "feedback": [...]}
//! ```
//!
//! Anything the command prints before its final JSON line is ignored, so
//! scripts may log freely as long as the answer comes last. A non-zero exit
//! status is a worker failure. The child is killed when the dispatcher drops
//! the future (timeout or cancellation).

use async_trait::async_trait;
use phasegate_application::Worker;
use phasegate_domain::core::string::excerpt;
use phasegate_domain::{Task, WorkerError, WorkerOutput};
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Longest stderr excerpt carried into an error message
const MAX_STDERR_EXCERPT: usize = 2048;

/// Errors from running a command worker
#[derive(Error, Debug)]
pub enum CommandWorkerError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode task: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("'{command}' exited with code {code:?}: {stderr}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("'{command}' produced no JSON answer on stdout")]
    NoAnswer { command: String },

    #[error("'{command}' reported confidence {confidence} outside 0..=1")]
    ConfidenceOutOfRange { command: String, confidence: f64 },
}

impl From<CommandWorkerError> for WorkerError {
    fn from(err: CommandWorkerError) -> Self {
        WorkerError::failure(err.to_string())
    }
}

/// Runs a shell command per task
pub struct CommandWorker {
    name: String,
    capability: String,
    command: String,
    working_dir: Option<PathBuf>,
}

impl CommandWorker {
    pub fn new(
        name: impl Into<String>,
        capability: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            capability: capability.into(),
            command: command.into(),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn build_command(&self) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", &self.command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", &self.command]);
            c
        };

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Linux: request kernel to send SIGTERM to child when parent dies.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        cmd
    }

    async fn run(&self, task: &Task) -> Result<WorkerOutput, CommandWorkerError> {
        let input = serde_json::to_vec(task)?;
        let io_error = |source| CommandWorkerError::Io {
            command: self.command.clone(),
            source,
        };

        debug!("Worker '{}' running: {}", self.name, self.command);
        let mut child = self
            .build_command()
            .spawn()
            .map_err(|source| CommandWorkerError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that ignores its input may close stdin early
            match stdin.write_all(&input).await {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(io_error(e)),
                _ => {}
            }
            drop(stdin);
        }

        let output = child.wait_with_output().await.map_err(io_error)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CommandWorkerError::NonZeroExit {
                command: self.command.clone(),
                code: output.status.code(),
                stderr: excerpt(&stderr, MAX_STDERR_EXCERPT),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        self.parse_answer(&stdout)
    }

    fn parse_answer(&self, stdout: &str) -> Result<WorkerOutput, CommandWorkerError> {
        let answer = serde_json::from_str::<WorkerOutput>(stdout.trim())
            .ok()
            .or_else(|| {
                stdout
                    .lines()
                    .rev()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .and_then(|line| serde_json::from_str::<WorkerOutput>(line).ok())
            })
            .ok_or_else(|| CommandWorkerError::NoAnswer {
                command: self.command.clone(),
            })?;

        if !(0.0..=1.0).contains(&answer.confidence) {
            return Err(CommandWorkerError::ConfidenceOutOfRange {
                command: self.command.clone(),
                confidence: answer.confidence,
            });
        }
        Ok(answer)
    }
}

#[async_trait]
impl Worker for CommandWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> &str {
        &self.capability
    }

    async fn process(&self, task: Task) -> Result<WorkerOutput, WorkerError> {
        self.run(&task).await.map_err(WorkerError::from)
    }
}
