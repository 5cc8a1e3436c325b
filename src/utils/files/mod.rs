use crate::core::error::QmError;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// True when `dir` exists and holds at least one entry.
pub fn dir_has_entries(dir: &Path) -> Result<bool, QmError> {
    if !dir.is_dir() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(dir)
        .map_err(|e| QmError::io(format!("failed to list {}", dir.display()), e))?;
    Ok(entries.next().is_some())
}

/// Delete everything inside `dir`, keeping `dir` itself.
///
/// Entries that cannot be removed are logged and skipped; the count of removed
/// entries is returned. Names listed in `keep` are left alone.
pub fn purge_dir(dir: &Path, keep: &[&str]) -> Result<usize, QmError> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let entries = fs::read_dir(dir)
        .map_err(|e| QmError::io(format!("failed to list {}", dir.display()), e))?;

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if entry
            .file_name()
            .to_str()
            .map(|name| keep.contains(&name))
            .unwrap_or(false)
        {
            continue;
        }
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(err) => tracing::warn!(path = %path.display(), "error while deleting: {}", err),
        }
    }
    Ok(removed)
}

/// Purge `dir` when it exists, create it otherwise.
pub fn ensure_empty_dir(dir: &Path) -> Result<(), QmError> {
    if dir.is_dir() {
        purge_dir(dir, &[])?;
        Ok(())
    } else {
        fs::create_dir_all(dir)
            .map_err(|e| QmError::io(format!("failed to create {}", dir.display()), e))
    }
}

/// Recursively copy the contents of `src` into `dst`, merging with what is there.
///
/// Existing files in `dst` are overwritten. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize, QmError> {
    fs::create_dir_all(dst)
        .map_err(|e| QmError::io(format!("failed to create {}", dst.display()), e))?;

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let context = format!("failed to walk {}", src.display());
            match e.into_io_error() {
                Some(io) => QmError::io(context, io),
                None => QmError::io(context, std::io::Error::other("filesystem loop")),
            }
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| QmError::io("failed to relativize path", std::io::Error::other(e)))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| QmError::io(format!("failed to create {}", target.display()), e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| {
                QmError::io(
                    format!(
                        "failed to copy {} to {}",
                        entry.path().display(),
                        target.display()
                    ),
                    e,
                )
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}
