pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;

use crate::core::error::QmError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main QM configuration loaded from qm.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QmConfig {
    /// Filesystem layout relative to the FarmDyn root
    #[serde(default)]
    pub paths: PathsConfig,

    /// Version-control client
    #[serde(default)]
    pub svn: SvnConfig,

    /// Solver invocation
    #[serde(default)]
    pub solver: SolverConfig,

    /// Output artifact decoding
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Document store
    #[serde(default)]
    pub store: StoreConfig,

    /// Reviewer email
    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Filesystem layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Folder holding the batch descriptors
    #[serde(default = "default_gui_dir")]
    pub gui_dir: PathBuf,

    /// Shared results scratch location scanned for solver output
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Root of the per-revision archive
    #[serde(default = "default_archive_root")]
    pub archive_root: PathBuf,

    /// Folder name below the home directory used as solver output dir
    #[serde(default = "default_temp_subdir")]
    pub temp_subdir: String,

    /// Explicit solver output dir, replaces home + temp_subdir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_output_dir: Option<PathBuf>,

    /// File name pattern of the descriptors to sweep
    #[serde(default = "default_batch_pattern")]
    pub batch_pattern: String,

    /// Descriptor file names skipped by a sweep, on top of the compilation test
    #[serde(default)]
    pub excluded_batches: Vec<String>,
}

/// Version-control client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvnConfig {
    #[serde(default = "default_svn_program")]
    pub program: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// Solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_solver_program")]
    pub program: String,

    #[serde(default = "default_jvm_args")]
    pub jvm_args: Vec<String>,

    #[serde(default = "default_classpath")]
    pub classpath: String,

    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// Configuration files passed ahead of the batch descriptor
    #[serde(default = "default_config_files")]
    pub config_files: Vec<String>,

    /// Bounded wait for one batch, e.g. "6h"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Solver backend that is not licensed on the QM machine
    #[serde(default = "default_unavailable_backend")]
    pub unavailable_backend: String,

    #[serde(default = "default_substitute_backend")]
    pub substitute_backend: String,
}

/// Artifact decoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,

    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    /// Symbol holding the summary table inside each artifact
    #[serde(default = "default_symbol")]
    pub symbol: String,

    #[serde(default = "default_dump_program")]
    pub dump_program: String,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub url: String,

    #[serde(default = "default_network_timeout")]
    pub timeout: String,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default = "default_network_timeout")]
    pub timeout: String,

    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,

    /// Network folder where reviewers browse the archive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_share: Option<String>,

    /// Author id used when the last contributor is unknown
    #[serde(default = "default_fallback_author")]
    pub fallback_author: String,

    #[serde(default)]
    pub authors: Vec<AuthorEntry>,

    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// One known contributor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorEntry {
    /// Version-control user name
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Where the SMTP login comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_user_env")]
    pub user_env: String,

    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// TOML file with `user` and `password`, preferred over the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl PathsConfig {
    pub fn gui_dir(&self, root: &Path) -> PathBuf {
        resolve(root, &self.gui_dir)
    }

    pub fn results_dir(&self, root: &Path) -> PathBuf {
        resolve(root, &self.results_dir)
    }

    pub fn archive_root(&self, root: &Path) -> PathBuf {
        resolve(root, &self.archive_root)
    }

    /// Writable solver output location: the override, or `<home>/<temp_subdir>`.
    pub fn temp_output_dir(&self) -> Result<PathBuf, QmError> {
        if let Some(dir) = &self.temp_output_dir {
            return Ok(dir.clone());
        }
        let home = dirs_next::home_dir()
            .ok_or_else(|| QmError::Config("home directory unavailable".to_string()))?;
        Ok(home.join(&self.temp_subdir))
    }
}

impl SvnConfig {
    pub fn timeout(&self) -> Option<Duration> {
        parse_optional_duration(self.timeout.as_deref())
    }
}

impl SolverConfig {
    pub fn timeout(&self) -> Option<Duration> {
        parse_optional_duration(self.timeout.as_deref())
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        parse_optional_duration(Some(&self.timeout)).unwrap_or(DEFAULT_NETWORK_TIMEOUT)
    }
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        parse_optional_duration(Some(&self.timeout)).unwrap_or(DEFAULT_NETWORK_TIMEOUT)
    }
}

const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn parse_optional_duration(value: Option<&str>) -> Option<Duration> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| humantime::parse_duration(s).ok())
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            gui_dir: default_gui_dir(),
            results_dir: default_results_dir(),
            archive_root: default_archive_root(),
            temp_subdir: default_temp_subdir(),
            temp_output_dir: None,
            batch_pattern: default_batch_pattern(),
            excluded_batches: Vec::new(),
        }
    }
}

impl Default for SvnConfig {
    fn default() -> Self {
        SvnConfig {
            program: default_svn_program(),
            timeout: None,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            program: default_solver_program(),
            jvm_args: default_jvm_args(),
            classpath: default_classpath(),
            entry_point: default_entry_point(),
            config_files: default_config_files(),
            timeout: None,
            unavailable_backend: default_unavailable_backend(),
            substitute_backend: default_substitute_backend(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            artifact_prefix: default_artifact_prefix(),
            artifact_extension: default_artifact_extension(),
            symbol: default_symbol(),
            dump_program: default_dump_program(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            url: default_store_url(),
            timeout: default_network_timeout(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            enabled: true,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            timeout: default_network_timeout(),
            dashboard_url: default_dashboard_url(),
            archive_share: None,
            fallback_author: default_fallback_author(),
            authors: Vec::new(),
            credentials: CredentialsConfig::default(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig {
            user_env: default_user_env(),
            password_env: default_password_env(),
            file: None,
        }
    }
}

// Default functions
fn default_gui_dir() -> PathBuf {
    PathBuf::from("gui")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results").join("expFarms")
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("..").join("QM")
}

fn default_temp_subdir() -> String {
    "qmTemp".to_string()
}

fn default_batch_pattern() -> String {
    "batch_test_*.txt".to_string()
}

fn default_svn_program() -> String {
    "r/qm/svn/svn.exe".to_string()
}

fn default_solver_program() -> String {
    "java".to_string()
}

fn default_jvm_args() -> Vec<String> {
    [
        "-Xmx1G",
        "-Xverify:none",
        "-XX:+UseParallelGC",
        "-XX:PermSize=20M",
        "-XX:MaxNewSize=32M",
        "-XX:NewSize=32M",
        "-Djava.library.path=jars",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_classpath() -> String {
    "jars/gig.jar".to_string()
}

fn default_entry_point() -> String {
    "de.capri.ggig.BatchExecution".to_string()
}

fn default_config_files() -> Vec<String> {
    vec![
        "dairydyn.ini".to_string(),
        "dairydyn_default.xml".to_string(),
    ]
}

fn default_unavailable_backend() -> String {
    "GUROBI".to_string()
}

fn default_substitute_backend() -> String {
    "CPLEX".to_string()
}

fn default_artifact_prefix() -> String {
    "res_".to_string()
}

fn default_artifact_extension() -> String {
    "gdx".to_string()
}

fn default_symbol() -> String {
    "p_sumRes".to_string()
}

fn default_dump_program() -> String {
    "gdxdump".to_string()
}

fn default_store_url() -> String {
    "https://fruchtfolge.agp.uni-bonn.de/db/farmdyn_qm/".to_string()
}

fn default_network_timeout() -> String {
    "30s".to_string()
}

fn default_true() -> bool {
    true
}

fn default_smtp_host() -> String {
    "mail.uni-bonn.de".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_dashboard_url() -> String {
    "https://chrispahm.github.io/farmdyn-qm-client/".to_string()
}

fn default_fallback_author() -> String {
    "tillk".to_string()
}

fn default_user_env() -> String {
    "QM_SMTP_USER".to_string()
}

fn default_password_env() -> String {
    "QM_SMTP_PASSWORD".to_string()
}
