use crate::core::error::QmError;
use crate::core::tool_executor::{CommandRequest, ToolExecutor};
use std::path::{Path, PathBuf};
use std::time::Duration;

const TOOL: &str = "svn";

/// Version-control facade over the FarmDyn working copy.
#[derive(Clone)]
pub struct SvnWorkspace {
    root: PathBuf,
    program: PathBuf,
    timeout: Option<Duration>,
    tools: ToolExecutor,
}

impl SvnWorkspace {
    /// `program` may be relative to `root` (the bundled `r/qm/svn/svn.exe`).
    pub fn new(root: &Path, program: &str, timeout: Option<Duration>, tools: ToolExecutor) -> Self {
        SvnWorkspace {
            root: root.to_path_buf(),
            program: resolve_program(root, program),
            timeout,
            tools,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Release stale working-copy locks left by an interrupted client.
    pub async fn cleanup(&self) -> Result<(), QmError> {
        self.run(&["cleanup"]).await.map(|_| ())
    }

    /// Discard all local modifications below the root.
    pub async fn revert(&self) -> Result<(), QmError> {
        self.run(&["revert", "-R", "./"]).await.map(|_| ())
    }

    pub async fn update_to_head(&self) -> Result<(), QmError> {
        self.run(&["update", "-r", "HEAD", "--accept=theirs-full"])
            .await
            .map(|_| ())
    }

    pub async fn update_to_revision(&self, revision: u64) -> Result<(), QmError> {
        let revision = revision.to_string();
        self.run(&["update", "-r", &revision]).await.map(|_| ())
    }

    /// Revision of the working copy as reported by the client right now.
    pub async fn current_revision(&self) -> Result<u64, QmError> {
        let stdout = self.run(&["info", "--show-item", "revision"]).await?;
        let trimmed = stdout.trim();
        trimmed.parse::<u64>().map_err(|_| QmError::ToolOutput {
            tool: TOOL.to_string(),
            detail: format!("expected a revision number, got '{}'", trimmed),
        })
    }

    /// Author of the last change at `revision`, independent of where the working copy sits.
    pub async fn last_changed_author(&self, revision: u64) -> Result<String, QmError> {
        let revision = revision.to_string();
        let stdout = self
            .run(&["info", "-r", &revision, "--show-item", "last-changed-author"])
            .await?;
        Ok(stdout.trim().to_string())
    }

    async fn run(&self, args: &[&str]) -> Result<String, QmError> {
        let request = CommandRequest::new(TOOL, self.program.clone(), &self.root)
            .args(args.iter().copied())
            .timeout(self.timeout);
        let output = self.tools.run_checked(&request).await?;
        Ok(output.stdout)
    }
}

/// Programs given with a directory component are anchored at `root`; bare names go through PATH.
pub fn resolve_program(root: &Path, program: &str) -> PathBuf {
    let path = Path::new(program);
    let has_dir = program.contains('/') || program.contains('\\');
    if has_dir && path.is_relative() {
        root.join(path)
    } else {
        path.to_path_buf()
    }
}
