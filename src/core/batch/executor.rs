use super::descriptor::BatchDescriptor;
use crate::core::config::SolverConfig;
use crate::core::error::QmError;
use crate::core::tool_executor::{CommandRequest, ToolExecutor};
use crate::core::workspace::resolve_program;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const TOOL: &str = "solver";

/// Launches the batch solver for one descriptor and waits for it.
#[derive(Clone)]
pub struct BatchExecutor {
    gui_dir: PathBuf,
    program: PathBuf,
    fixed_args: Vec<String>,
    timeout: Option<Duration>,
    tools: ToolExecutor,
}

impl BatchExecutor {
    pub fn new(gui_dir: &Path, config: &SolverConfig, tools: ToolExecutor) -> Self {
        let mut fixed_args = config.jvm_args.clone();
        fixed_args.push("-classpath".to_string());
        fixed_args.push(config.classpath.clone());
        fixed_args.push(config.entry_point.clone());
        fixed_args.extend(config.config_files.iter().cloned());

        BatchExecutor {
            gui_dir: gui_dir.to_path_buf(),
            program: resolve_program(gui_dir, &config.program),
            fixed_args,
            timeout: config.timeout(),
            tools,
        }
    }

    /// Full invocation for `descriptor`, run from the GUI folder.
    pub fn request(&self, descriptor: &BatchDescriptor) -> CommandRequest {
        CommandRequest::new(TOOL, self.program.clone(), &self.gui_dir)
            .args(self.fixed_args.iter().cloned())
            .arg(descriptor_argument(&self.gui_dir, descriptor))
            .timeout(self.timeout)
    }

    /// Blocks until the solver exits; a non-zero exit fails the run.
    pub async fn execute(&self, descriptor: &BatchDescriptor) -> Result<(), QmError> {
        tracing::info!(batch = %descriptor.name, "starting batch execution");
        let start = Instant::now();
        self.tools.run_checked(&self.request(descriptor)).await?;
        tracing::info!(
            batch = %descriptor.name,
            elapsed = %humantime::format_duration(Duration::from_secs(start.elapsed().as_secs())),
            "batch execution finished"
        );
        Ok(())
    }
}

/// Descriptors inside the GUI folder are passed by file name, others by full path.
fn descriptor_argument(gui_dir: &Path, descriptor: &BatchDescriptor) -> String {
    match descriptor.path.parent() {
        Some(parent) if parent == gui_dir => descriptor.file_name.clone(),
        _ => descriptor.path.display().to_string(),
    }
}
