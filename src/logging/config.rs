use crate::core::config::loader::CONFIG_FILE_NAME;
use crate::logging::layers::console::ConsoleOutput;
use crate::Result;
use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::filter::Directive;

const DEFAULT_LEVEL: &str = "info";

/// Resolved `[logging]` section of qm.toml after env overrides.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
    pub default_level: String,
    pub enable_file: bool,
    pub console_output: Option<ConsoleOutput>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            default_level: DEFAULT_LEVEL.to_string(),
            enable_file: true,
            console_output: None,
        }
    }
}

impl LoggingConfig {
    /// Defaults, then the config file, then `QM_LOG_DIR` / `QM_CONSOLE_OUTPUT`.
    ///
    /// `config_file` wins over `<root>/qm.toml` when given.
    pub fn load(root: Option<&Path>, config_file: Option<&Path>) -> Result<Self> {
        let mut config = LoggingConfig::default();
        let path = match (config_file, root) {
            (Some(file), _) => Some(file.to_path_buf()),
            (None, Some(root)) => Some(root.join(CONFIG_FILE_NAME)),
            (None, None) => None,
        };
        if let Some(path) = path {
            if let Some(file_config) = Self::load_from_file(&path)? {
                config.apply(file_config);
            }
        }
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Option<TomlLogging>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let parsed: TomlLogging = toml::from_str(&content)
            .with_context(|| format!("failed to parse logging section of {}", path.display()))?;
        Ok(Some(parsed))
    }

    fn apply(&mut self, toml: TomlLogging) {
        if let Some(logging) = toml.logging {
            if let Some(log_dir) = logging.log_dir {
                self.log_dir = Some(PathBuf::from(log_dir));
            }
            if let Some(default_level) = logging.default_level {
                self.default_level = default_level;
            }
            if let Some(enable_file) = logging.enable_file {
                self.enable_file = enable_file;
            }
            if let Some(console_output) = logging.console_output {
                self.console_output = Some(console_output);
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = env::var("QM_LOG_DIR") {
            if !dir.trim().is_empty() {
                self.log_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(output) = env::var("QM_CONSOLE_OUTPUT") {
            let parsed = ConsoleOutput::from_str(&output).map_err(|err| anyhow!(err))?;
            self.console_output = Some(parsed);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        Directive::from_str(&self.default_level)
            .map_err(|_| anyhow!("logging.default_level must be a valid tracing directive"))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TomlLogging {
    pub logging: Option<TomlLoggingSection>,
}

#[derive(Debug, Deserialize)]
struct TomlLoggingSection {
    pub log_dir: Option<String>,
    pub default_level: Option<String>,
    pub enable_file: Option<bool>,
    #[serde(default)]
    pub console_output: Option<ConsoleOutput>,
}
