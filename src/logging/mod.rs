pub mod config;
pub mod layers;

pub use layers::console::ConsoleOutput;

use crate::cli::Command;
use crate::logging::config::LoggingConfig;
use crate::logging::layers::{console, file};
use crate::Result;
use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Keeps the file writer flushing until the command returns.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    console_output: ConsoleOutput,
    log_file_path: PathBuf,
}

impl LoggingGuard {
    pub fn console_output(&self) -> ConsoleOutput {
        self.console_output
    }

    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }
}

/// Initialize tracing for `command`.
///
/// `RUST_LOG` takes precedence over `logging.default_level`. Errors when called twice.
pub fn init(command: &Command) -> Result<LoggingGuard> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }

    let root = command.root()?;
    let config = LoggingConfig::load(Some(root.as_path()), command.config_file())?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))
        .context("failed to configure tracing level")?;
    let log_file_path = file::log_file_path(&config, &root);

    type FileSubscriber = file::FileLayerStack<Registry>;

    let (file_layer, file_guard) = file::file_layer::<Registry>(&log_file_path, config.enable_file)?;
    let console_output =
        console::select_console_output(config.console_output, command.is_listing());
    let console_layer = console::console_layer::<FileSubscriber>(console_output);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(env_filter)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
        console_output,
        log_file_path,
    })
}
