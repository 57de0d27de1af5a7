//! Code-executor seam.
//!
//! Workflow `run-command` / `execute-code` steps dispatch through the
//! [`CodeExecutor`] capability. The engine ships a local subprocess adapter
//! plus a canned-response executor for tests; production deployments plug in
//! their sandbox of choice.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stdout capture limit: 1 MiB.
pub const MAX_STDOUT_BYTES: usize = 1024 * 1024;
/// Stderr capture limit: 256 KiB.
pub const MAX_STDERR_BYTES: usize = 256 * 1024;

/// Errors from a code executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The contract was malformed.
    #[error("invalid contract: {0}")]
    InvalidContract(String),
    /// The process could not be spawned.
    #[error("spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
    /// The sandbox deadline elapsed.
    #[error("execution timed out after {0} ms")]
    Timeout(u64),
}

/// Inputs for an execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionInputs {
    /// Program to run.
    pub command: String,
    /// Arguments.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Extra environment variables.
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Working directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// Sandbox parameters for an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSpec {
    /// Hard deadline in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SandboxSpec {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// A full execution request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContract {
    /// Tool this execution belongs to.
    pub tool_id: String,
    /// Optional adapter override.
    #[serde(default)]
    pub adapter_id: Option<String>,
    /// Execution inputs.
    pub inputs: ExecutionInputs,
    /// Sandbox parameters.
    #[serde(default)]
    pub sandbox: Option<SandboxSpec>,
}

/// Result of an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the process exited zero.
    pub success: bool,
    /// Exit code, when the process ran to completion.
    pub exit_code: Option<i32>,
    /// Captured stdout, truncated to [`MAX_STDOUT_BYTES`].
    pub stdout: String,
    /// Captured stderr, truncated to [`MAX_STDERR_BYTES`].
    pub stderr: String,
    /// Wall-clock duration.
    pub duration_ms: u64,
    /// Whether either stream was truncated.
    pub truncated: bool,
}

/// Capability consumed by workflow command/code steps.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Execute the contract.
    async fn execute(&self, contract: &ExecutionContract) -> Result<ExecutionResult, ExecutorError>;
}

fn truncate_stream(bytes: &[u8], cap: usize) -> (String, bool) {
    let truncated = bytes.len() > cap;
    let slice = if truncated { &bytes[..cap] } else { bytes };
    (String::from_utf8_lossy(slice).into_owned(), truncated)
}

/// Runs contracts as local subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcessExecutor;

#[async_trait]
impl CodeExecutor for LocalProcessExecutor {
    async fn execute(&self, contract: &ExecutionContract) -> Result<ExecutionResult, ExecutorError> {
        if contract.inputs.command.is_empty() {
            return Err(ExecutorError::InvalidContract(
                "contract has no command".to_string(),
            ));
        }
        let timeout_ms = contract
            .sandbox
            .as_ref()
            .map_or_else(|| SandboxSpec::default().timeout_ms, |s| s.timeout_ms);

        let mut command = tokio::process::Command::new(&contract.inputs.command);
        command
            .args(&contract.inputs.arguments)
            .envs(&contract.inputs.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &contract.inputs.working_dir {
            command.current_dir(dir);
        }

        debug!(
            tool_id = %contract.tool_id,
            command = %contract.inputs.command,
            timeout_ms,
            "executing contract"
        );

        let started = Instant::now();
        let output = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            command.spawn()?.wait_with_output().await
        })
        .await
        .map_err(|_| ExecutorError::Timeout(timeout_ms))??;

        let (stdout, out_truncated) = truncate_stream(&output.stdout, MAX_STDOUT_BYTES);
        let (stderr, err_truncated) = truncate_stream(&output.stderr, MAX_STDERR_BYTES);

        Ok(ExecutionResult {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout,
            stderr,
            duration_ms: started.elapsed().as_millis() as u64,
            truncated: out_truncated || err_truncated,
        })
    }
}

/// Executor that replays canned results, keyed by command name. Used in
/// tests and dry runs.
#[derive(Debug, Default)]
pub struct StaticExecutor {
    results: HashMap<String, ExecutionResult>,
}

impl StaticExecutor {
    /// Create an empty static executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned result for a command.
    #[must_use]
    pub fn with_result(mut self, command: impl Into<String>, result: ExecutionResult) -> Self {
        self.results.insert(command.into(), result);
        self
    }

    /// A successful canned result with the given stdout.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> ExecutionResult {
        ExecutionResult {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 1,
            truncated: false,
        }
    }

    /// A failing canned result with the given exit code and stderr.
    #[must_use]
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> ExecutionResult {
        ExecutionResult {
            success: false,
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 1,
            truncated: false,
        }
    }
}

#[async_trait]
impl CodeExecutor for StaticExecutor {
    async fn execute(&self, contract: &ExecutionContract) -> Result<ExecutionResult, ExecutorError> {
        self.results
            .get(&contract.inputs.command)
            .cloned()
            .ok_or_else(|| {
                ExecutorError::InvalidContract(format!(
                    "no canned result for '{}'",
                    contract.inputs.command
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_truncated_at_caps() {
        let big = vec![b'x'; MAX_STDOUT_BYTES + 10];
        let (text, truncated) = truncate_stream(&big, MAX_STDOUT_BYTES);
        assert!(truncated);
        assert_eq!(text.len(), MAX_STDOUT_BYTES);

        let small = b"hello";
        let (text, truncated) = truncate_stream(small, MAX_STDOUT_BYTES);
        assert!(!truncated);
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn static_executor_replays_results() {
        let executor =
            StaticExecutor::new().with_result("build", StaticExecutor::success("built"));
        let contract = ExecutionContract {
            tool_id: "code".into(),
            inputs: ExecutionInputs {
                command: "build".into(),
                ..ExecutionInputs::default()
            },
            ..ExecutionContract::default()
        };
        let result = executor.execute(&contract).await.unwrap();
        assert!(result.success);
        assert_eq!(result.stdout, "built");

        let missing = ExecutionContract {
            inputs: ExecutionInputs {
                command: "ghost".into(),
                ..ExecutionInputs::default()
            },
            ..ExecutionContract::default()
        };
        assert!(executor.execute(&missing).await.is_err());
    }

    #[tokio::test]
    async fn empty_contract_is_rejected() {
        let result = LocalProcessExecutor.execute(&ExecutionContract::default()).await;
        assert!(matches!(result, Err(ExecutorError::InvalidContract(_))));
    }
}
