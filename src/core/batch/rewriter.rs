use super::descriptor::DirectiveSet;
use crate::core::error::QmError;
use std::fs;
use std::path::{Path, PathBuf};

pub const OUTPUT_DIR_KEY: &str = "output dir";
pub const SOLVER_KEY: &str = "Solver";

/// Points a descriptor's solver configuration at the QM machine's environment.
#[derive(Debug, Clone)]
pub struct DescriptorRewriter {
    output_dir: PathBuf,
    unavailable_backend: String,
    substitute_backend: String,
}

impl DescriptorRewriter {
    pub fn new(output_dir: PathBuf, unavailable_backend: &str, substitute_backend: &str) -> Self {
        DescriptorRewriter {
            output_dir,
            unavailable_backend: unavailable_backend.to_string(),
            substitute_backend: substitute_backend.to_string(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Rewrite the descriptor in place and return the output directory the solver will use.
    ///
    /// Fails with `MissingOutputDir` (leaving the file untouched) when the descriptor
    /// has no `output dir` directive.
    pub fn rewrite_output_dir(&self, descriptor: &Path) -> Result<PathBuf, QmError> {
        let content = fs::read_to_string(descriptor).map_err(|e| {
            QmError::io(format!("failed to read descriptor {}", descriptor.display()), e)
        })?;

        let mut directives = DirectiveSet::parse(&content);
        let output_dir = self.output_dir.display().to_string();
        if directives.set(OUTPUT_DIR_KEY, &output_dir) == 0 {
            return Err(QmError::MissingOutputDir(descriptor.to_path_buf()));
        }
        let swapped = directives.replace_value(
            SOLVER_KEY,
            &self.unavailable_backend,
            &self.substitute_backend,
        );

        let rewritten = directives.serialize();
        if rewritten != content {
            fs::write(descriptor, rewritten).map_err(|e| {
                QmError::io(
                    format!("failed to write descriptor {}", descriptor.display()),
                    e,
                )
            })?;
        }

        tracing::debug!(
            descriptor = %descriptor.display(),
            output_dir = %output_dir,
            solver_swaps = swapped,
            "rewrote batch descriptor"
        );
        Ok(self.output_dir.clone())
    }
}
