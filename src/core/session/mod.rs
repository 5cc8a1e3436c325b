use crate::core::error::QmError;
use crate::utils::files;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = ".farmdyn-qm.lock";

/// Scratch locations one RunKey writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchPaths {
    /// Shared results location scanned for solver artifacts.
    pub results_dir: PathBuf,
    /// Solver output directory written into the descriptor.
    pub output_dir: PathBuf,
}

/// Exclusive owner of the scratch locations for the duration of one RunKey.
///
/// Ownership is held through a lock file next to the results directory and
/// released when the session is dropped.
#[derive(Debug)]
pub struct RunSession {
    paths: ScratchPaths,
    lock_path: PathBuf,
}

impl RunSession {
    pub fn acquire(paths: ScratchPaths) -> Result<Self, QmError> {
        let lock_dir = paths
            .results_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| paths.results_dir.clone());
        fs::create_dir_all(&lock_dir)
            .map_err(|e| QmError::io(format!("failed to create {}", lock_dir.display()), e))?;
        fs::create_dir_all(&paths.results_dir).map_err(|e| {
            QmError::io(
                format!("failed to create {}", paths.results_dir.display()),
                e,
            )
        })?;

        let lock_path = lock_dir.join(LOCK_FILE_NAME);
        let mut lock = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(QmError::ScratchBusy(lock_path))
            }
            Err(err) => {
                return Err(QmError::io(
                    format!("failed to create lock file {}", lock_path.display()),
                    err,
                ))
            }
        };
        // the pid helps operators identify a stale lock
        let _ = writeln!(lock, "{}", std::process::id());

        tracing::debug!(lock = %lock_path.display(), "acquired run session");
        Ok(RunSession { paths, lock_path })
    }

    pub fn paths(&self) -> &ScratchPaths {
        &self.paths
    }

    /// Remove leftovers of a previous run from the shared results location.
    pub fn purge_results(&self) -> Result<usize, QmError> {
        let removed = files::purge_dir(&self.paths.results_dir, &[LOCK_FILE_NAME])?;
        tracing::debug!(
            dir = %self.paths.results_dir.display(),
            removed,
            "purged shared results location"
        );
        Ok(removed)
    }

    /// Empty the solver output directory, creating it when missing.
    pub fn prepare_output_dir(&self) -> Result<(), QmError> {
        files::ensure_empty_dir(&self.paths.output_dir)
    }

    /// Copy the shared results plus every scenario folder of the output dir into `archive`.
    ///
    /// Files are staged in a hidden sibling of `archive` that is renamed into
    /// place once every copy succeeded. On error the staging directory is
    /// removed and `archive` stays empty.
    pub fn promote(&self, archive: &Path) -> Result<usize, QmError> {
        let staging = staging_dir(archive);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| {
                QmError::io(format!("failed to remove {}", staging.display()), e)
            })?;
        }

        let copied = match self.copy_artifacts(&staging) {
            Ok(copied) => copied,
            Err(err) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    tracing::warn!(staging = %staging.display(), "failed to remove partial archive: {}", cleanup);
                }
                return Err(err);
            }
        };

        if archive.is_dir() {
            fs::remove_dir(archive)
                .map_err(|e| QmError::io(format!("failed to replace {}", archive.display()), e))?;
        }
        fs::rename(&staging, archive).map_err(|e| {
            QmError::io(
                format!("failed to move {} to {}", staging.display(), archive.display()),
                e,
            )
        })?;
        Ok(copied)
    }

    fn copy_artifacts(&self, target: &Path) -> Result<usize, QmError> {
        let mut copied = files::copy_tree(&self.paths.results_dir, target)?;

        if self.paths.output_dir.is_dir() {
            let entries = fs::read_dir(&self.paths.output_dir).map_err(|e| {
                QmError::io(
                    format!("failed to list {}", self.paths.output_dir.display()),
                    e,
                )
            })?;
            let mut scenario_dirs: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            scenario_dirs.sort();
            for dir in scenario_dirs {
                copied += files::copy_tree(&dir, target)?;
            }
        }
        Ok(copied)
    }
}

/// `<revision>/.<batch>.partial` next to the archive directory.
fn staging_dir(archive: &Path) -> PathBuf {
    let name = archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    archive.with_file_name(format!(".{}.partial", name))
}

impl Drop for RunSession {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.lock_path) {
            tracing::warn!(lock = %self.lock_path.display(), "failed to release run session: {}", err);
        }
    }
}
