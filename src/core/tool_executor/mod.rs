use crate::core::error::QmError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;

const OUTPUT_CAPTURE_LIMIT_BYTES: usize = 1_048_576;

/// One external program invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandRequest {
    /// Short tool label used in errors and logs (`svn`, `solver`, ...).
    pub tool: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    pub fn new(tool: &str, program: impl Into<PathBuf>, cwd: &Path) -> Self {
        CommandRequest {
            tool: tool.to_string(),
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            timeout: None,
        }
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

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Seam through which every external process is launched.
#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, QmError>;
}

/// Runs programs as tokio child processes with captured output.
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, QmError> {
        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|err| QmError::ToolSpawn {
            tool: request.tool.clone(),
            cause: format!("{}: {}", request.program.display(), err),
        })?;

        let wait = child.wait_with_output();
        let output = match request.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result,
                // dropping the future kills the child
                Err(_) => {
                    return Err(QmError::ToolTimeout {
                        tool: request.tool.clone(),
                        timeout: limit,
                    })
                }
            },
            None => wait.await,
        }
        .map_err(|err| QmError::ToolSpawn {
            tool: request.tool.clone(),
            cause: err.to_string(),
        })?;

        Ok(CommandOutput {
            stdout: limit_bytes(&output.stdout),
            stderr: limit_bytes(&output.stderr),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Wraps a runner with diagnostics logging and exit-code checking.
#[derive(Clone)]
pub struct ToolExecutor {
    runner: Arc<dyn CommandRunner>,
}

impl ToolExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        ToolExecutor { runner }
    }

    pub fn tokio() -> Self {
        Self::new(Arc::new(TokioCommandRunner))
    }

    /// Run the request; a non-zero exit becomes `QmError::ToolFailure`.
    pub async fn run_checked(&self, request: &CommandRequest) -> Result<CommandOutput, QmError> {
        tracing::debug!(
            tool = %request.tool,
            program = %request.program.display(),
            args = %request.args.join(" "),
            cwd = %request.cwd.display(),
            "executing tool"
        );

        let start = Instant::now();
        let output = self.runner.run(request).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            tracing::info!(tool = %request.tool, "{}", stderr);
        }
        tracing::debug!(
            tool = %request.tool,
            exit_code = output.exit_code,
            duration_ms,
            "tool finished"
        );

        if !output.success() {
            return Err(QmError::ToolFailure {
                tool: request.tool.clone(),
                args: request.args.clone(),
                exit_code: output.exit_code,
                stderr: stderr.to_string(),
            });
        }

        Ok(output)
    }
}

fn limit_bytes(bytes: &[u8]) -> String {
    let limit = OUTPUT_CAPTURE_LIMIT_BYTES.min(bytes.len());
    String::from_utf8_lossy(&bytes[..limit]).into_owned()
}
