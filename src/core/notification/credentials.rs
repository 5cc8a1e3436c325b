use crate::core::config::CredentialsConfig;
use crate::core::error::QmError;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// SMTP login; the user doubles as sender address.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct MailCredentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Source of the mail login, kept apart from the regular configuration.
pub trait CredentialProvider: Send + Sync + 'static {
    fn credentials(&self) -> Result<MailCredentials, QmError>;
}

/// Reads user and password from two environment variables.
pub struct EnvCredentialProvider {
    user_var: String,
    password_var: String,
}

impl EnvCredentialProvider {
    pub fn new(user_var: &str, password_var: &str) -> Self {
        EnvCredentialProvider {
            user_var: user_var.to_string(),
            password_var: password_var.to_string(),
        }
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn credentials(&self) -> Result<MailCredentials, QmError> {
        let read = |name: &str| {
            env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| QmError::Credentials(format!("{} is not set", name)))
        };
        Ok(MailCredentials {
            user: read(&self.user_var)?,
            password: read(&self.password_var)?,
        })
    }
}

/// Reads a TOML secret file with `user` and `password` keys.
pub struct FileCredentialProvider {
    path: PathBuf,
}

impl FileCredentialProvider {
    pub fn new(path: &Path) -> Self {
        FileCredentialProvider {
            path: path.to_path_buf(),
        }
    }
}

impl CredentialProvider for FileCredentialProvider {
    fn credentials(&self) -> Result<MailCredentials, QmError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            QmError::Credentials(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let credentials: MailCredentials = toml::from_str(&content).map_err(|e| {
            QmError::Credentials(format!("failed to parse {}: {}", self.path.display(), e))
        })?;
        if credentials.user.trim().is_empty() || credentials.password.is_empty() {
            return Err(QmError::Credentials(format!(
                "{} must define user and password",
                self.path.display()
            )));
        }
        Ok(credentials)
    }
}

/// Pick the provider described by the configuration; relative files resolve against `root`.
pub fn provider_from_config(config: &CredentialsConfig, root: &Path) -> Arc<dyn CredentialProvider> {
    match &config.file {
        Some(file) if file.is_absolute() => Arc::new(FileCredentialProvider::new(file)),
        Some(file) => Arc::new(FileCredentialProvider::new(&root.join(file))),
        None => Arc::new(EnvCredentialProvider::new(
            &config.user_env,
            &config.password_env,
        )),
    }
}
