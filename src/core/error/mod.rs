use crate::core::types::{ErrorCategory, ErrorSeverity};
use std::path::PathBuf;
use std::time::Duration;

/// Errors raised anywhere in the QM pipeline.
#[derive(Debug, thiserror::Error)]
pub enum QmError {
    #[error("failed to start {tool}: {cause}")]
    ToolSpawn { tool: String, cause: String },

    #[error("{tool} {} exited with code {exit_code}: {stderr}", join_args(.args))]
    ToolFailure {
        tool: String,
        args: Vec<String>,
        exit_code: i32,
        stderr: String,
    },

    #[error("{tool} did not finish within {}", format_timeout(.timeout))]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("unexpected output from {tool}: {detail}")]
    ToolOutput { tool: String, detail: String },

    #[error("checkout landed on revision {actual}, expected {expected}")]
    RevisionMismatch { expected: u64, actual: u64 },

    #[error("descriptor {} has no 'output dir' directive", .0.display())]
    MissingOutputDir(PathBuf),

    #[error("failed to decode artifact {}: {cause}", .path.display())]
    ArtifactDecode { path: PathBuf, cause: String },

    #[error("publishing {id} failed{}: {detail}", format_status(.status))]
    Publication {
        id: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("scratch location is owned by another run (lock file {})", .0.display())]
    ScratchBusy(PathBuf),

    #[error("mail delivery failed: {0}")]
    Mail(String),

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl QmError {
    /// Wrap an IO error with a human readable description of the failed operation.
    pub fn io<T: Into<String>>(context: T, source: std::io::Error) -> Self {
        QmError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            QmError::ToolSpawn { .. } | QmError::ToolFailure { .. } | QmError::ToolOutput { .. } => {
                ErrorCategory::ToolExecutionError
            }
            QmError::ToolTimeout { .. } => ErrorCategory::TimeoutError,
            QmError::RevisionMismatch { .. } => ErrorCategory::WorkspaceError,
            QmError::MissingOutputDir(_) => ErrorCategory::ValidationError,
            QmError::ArtifactDecode { .. } => ErrorCategory::ArtifactError,
            QmError::Publication { .. } => ErrorCategory::PublicationError,
            QmError::ScratchBusy(_) => ErrorCategory::ResourceError,
            QmError::Mail(_) => ErrorCategory::NotificationError,
            QmError::Credentials(_) | QmError::Config(_) => ErrorCategory::ConfigError,
            QmError::Io { .. } => ErrorCategory::IoError,
        }
    }

    /// Stable identifier for log searches and reports.
    pub fn code(&self) -> &'static str {
        match self {
            QmError::ToolSpawn { .. } => "QM-TOOL-001",
            QmError::ToolFailure { .. } => "QM-TOOL-002",
            QmError::ToolTimeout { .. } => "QM-TOOL-003",
            QmError::ToolOutput { .. } => "QM-TOOL-004",
            QmError::RevisionMismatch { .. } => "QM-WS-001",
            QmError::MissingOutputDir(_) => "QM-BATCH-001",
            QmError::ArtifactDecode { .. } => "QM-RES-001",
            QmError::Publication { .. } => "QM-RES-002",
            QmError::ScratchBusy(_) => "QM-SESSION-001",
            QmError::Mail(_) => "QM-MAIL-001",
            QmError::Credentials(_) => "QM-CFG-002",
            QmError::Config(_) => "QM-CFG-001",
            QmError::Io { .. } => "QM-IO-001",
        }
    }

    /// Fatal errors abort the whole process instead of a single RunKey.
    pub fn is_fatal(&self) -> bool {
        matches!(self, QmError::Config(_) | QmError::Credentials(_))
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            _ if self.is_fatal() => ErrorSeverity::Fatal,
            QmError::ArtifactDecode { .. } | QmError::Publication { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

fn join_args(args: &[String]) -> String {
    args.join(" ")
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

fn format_status(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {}", code))
        .unwrap_or_default()
}

pub trait ErrorReporter {
    fn report_error(&self, error: &QmError);
    fn report_warning(&self, message: &str, context: Option<String>);
}

/// Routes error reports into the tracing pipeline.
pub struct DefaultErrorReporter;

impl DefaultErrorReporter {
    pub fn new() -> Self {
        DefaultErrorReporter
    }
}

impl Default for DefaultErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorReporter for DefaultErrorReporter {
    fn report_error(&self, error: &QmError) {
        match error.severity() {
            ErrorSeverity::Warning => tracing::warn!(
                code = error.code(),
                category = %error.category(),
                "{}",
                error
            ),
            _ => tracing::error!(
                code = error.code(),
                category = %error.category(),
                "{}",
                error
            ),
        }
    }

    fn report_warning(&self, message: &str, context: Option<String>) {
        match context {
            Some(ctx) => tracing::warn!(context = %ctx, "{}", message),
            None => tracing::warn!("{}", message),
        }
    }
}
