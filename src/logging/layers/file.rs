use crate::logging::config::LoggingConfig;
use crate::Result;
use anyhow::{anyhow, Context};
use std::fs::{create_dir_all, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::registry::LookupSpan;

pub const LOG_FILE_NAME: &str = "farmdyn-qm.log";

/// Layer type produced by the file sink builder.
pub type FileFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Full>, BoxMakeWriter>;

/// Layer stack that already wraps the provided subscriber.
pub type FileLayerStack<S> = tracing_subscriber::layer::Layered<FileFmtLayer<S>, S>;

/// `<log_dir>/farmdyn-qm.log`; relative log dirs resolve against the FarmDyn root.
pub fn log_file_path(config: &LoggingConfig, root: &Path) -> PathBuf {
    let directory = match &config.log_dir {
        Some(custom) if custom.is_absolute() => custom.clone(),
        Some(custom) => root.join(custom),
        None => root.join(".qm").join("logs"),
    };
    directory.join(LOG_FILE_NAME)
}

/// Build a tracing layer that appends to `log_file` via a non-blocking writer.
pub fn file_layer<S>(
    log_file: &Path,
    enabled: bool,
) -> Result<(FileFmtLayer<S>, Option<WorkerGuard>)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if !enabled {
        return Ok((make_layer(BoxMakeWriter::new(io::sink)), None));
    }

    let directory = log_file
        .parent()
        .ok_or_else(|| anyhow!("log file path {} has no parent directory", log_file.display()))?;
    create_dir_all(directory)
        .with_context(|| format!("failed to create log directory {}", directory.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let writer = BoxMakeWriter::new(move || non_blocking.clone());
    Ok((make_layer(writer), Some(guard)))
}

fn make_layer<S>(writer: BoxMakeWriter) -> FileFmtLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
}
