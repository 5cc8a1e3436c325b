use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel spelling used on the command line and in archive paths.
pub const WORKING_COPY: &str = "WorkingCopy";

/// A state of the versioned source tree, or the untouched working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Revision {
    Number(u64),
    WorkingCopy,
}

impl Revision {
    /// Returns the revision number when a concrete checkout is requested.
    pub fn number(&self) -> Option<u64> {
        match self {
            Revision::Number(n) => Some(*n),
            Revision::WorkingCopy => None,
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Number(n) => write!(f, "{}", n),
            Revision::WorkingCopy => write!(f, "{}", WORKING_COPY),
        }
    }
}

impl FromStr for Revision {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case(WORKING_COPY) || trimmed.eq_ignore_ascii_case("working-copy")
        {
            return Ok(Revision::WorkingCopy);
        }
        trimmed.parse::<u64>().map(Revision::Number).map_err(|_| {
            format!(
                "invalid revision '{}'; expected a revision number or {}",
                value, WORKING_COPY
            )
        })
    }
}

/// Which revision a sweep should run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionRequest {
    /// Update to the latest revision first and sweep that.
    Head,
    Exact(Revision),
}

/// Identity of one (revision, batch) execution unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub revision: Revision,
    pub batch_name: String,
}

impl RunKey {
    pub fn new(revision: Revision, batch_name: impl Into<String>) -> Self {
        RunKey {
            revision,
            batch_name: batch_name.into(),
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.revision, self.batch_name)
    }
}

/// Lifecycle of a RunKey inside one coordinator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunState {
    #[default]
    NotStarted,
    InProgress,
    Satisfied,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::NotStarted => "not started",
            RunState::InProgress => "in progress",
            RunState::Satisfied => "satisfied",
            RunState::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    ValidationError,
    ToolExecutionError,
    TimeoutError,
    ResourceError,
    WorkspaceError,
    ArtifactError,
    PublicationError,
    NotificationError,
    ConfigError,
    IoError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Fatal,
    Error,
    Warning,
}
