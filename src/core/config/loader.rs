use super::QmConfig;
use crate::core::error::QmError;
use std::env;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the FarmDyn root.
pub const CONFIG_FILE_NAME: &str = "qm.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from the FarmDyn root (root/qm.toml)
    /// Environment variables override config file values
    pub fn load_from_root(root: &Path) -> Result<QmConfig, QmError> {
        Self::load(&root.join(CONFIG_FILE_NAME), false)
    }

    /// Load config from an explicit path; a missing explicit file is an error.
    pub fn load_from_path(path: &Path) -> Result<QmConfig, QmError> {
        Self::load(path, true)
    }

    fn load(path: &Path, required: bool) -> Result<QmConfig, QmError> {
        let config_file = Self::load_from_file(path)?;
        if required && config_file.is_none() {
            return Err(QmError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }

        let mut config = config_file.unwrap_or_default();
        Self::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<QmConfig>, QmError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            QmError::io(format!("failed to read config file {}", path.display()), e)
        })?;

        let config: QmConfig = toml::from_str(&content).map_err(|e| {
            QmError::Config(format!(
                "failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Some(config))
    }

    /// Environment variables take precedence over config file values
    fn apply_env_overrides(config: &mut QmConfig) -> Result<(), QmError> {
        if let Ok(program) = env::var("QM_SVN_PROGRAM") {
            config.svn.program = program;
        }

        if let Ok(program) = env::var("QM_SOLVER_PROGRAM") {
            config.solver.program = program;
        }

        if let Ok(timeout) = env::var("QM_SOLVER_TIMEOUT") {
            config.solver.timeout = Some(timeout);
        }

        if let Ok(dir) = env::var("QM_TEMP_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                config.paths.temp_output_dir = Some(PathBuf::from(dir));
            }
        }

        if let Ok(url) = env::var("QM_STORE_URL") {
            config.store.url = url;
        }

        if let Ok(enabled) = env::var("QM_NOTIFY_ENABLED") {
            config.notification.enabled = enabled.trim().parse::<bool>().map_err(|_| {
                QmError::Config(format!(
                    "QM_NOTIFY_ENABLED must be true or false, got '{}'",
                    enabled
                ))
            })?;
        }

        if let Ok(host) = env::var("QM_SMTP_HOST") {
            config.notification.smtp_host = host;
        }

        if let Ok(port) = env::var("QM_SMTP_PORT") {
            config.notification.smtp_port = port.trim().parse::<u16>().map_err(|_| {
                QmError::Config(format!("QM_SMTP_PORT must be a port number, got '{}'", port))
            })?;
        }

        Ok(())
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "QM_SVN_PROGRAM - Override the svn client (default: r/qm/svn/svn.exe)",
            "QM_SOLVER_PROGRAM - Override the solver launcher (default: java)",
            "QM_SOLVER_TIMEOUT - Bounded wait per batch, e.g. 6h",
            "QM_TEMP_OUTPUT_DIR - Solver output dir (default: <home>/qmTemp)",
            "QM_STORE_URL - Document store endpoint",
            "QM_NOTIFY_ENABLED - true/false to toggle the reviewer email",
            "QM_SMTP_HOST - SMTP submission host",
            "QM_SMTP_PORT - SMTP submission port",
        ]
    }
}
