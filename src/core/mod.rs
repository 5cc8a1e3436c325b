pub mod batch;
pub mod config;
pub mod error;
pub mod notification;
pub mod orchestrator;
pub mod publisher;
pub mod results_processor;
pub mod session;
pub mod tool_executor;
pub mod types;
pub mod workspace;

pub use config::{ConfigLoader, ConfigValidator, QmConfig};
pub use error::{DefaultErrorReporter, ErrorReporter, QmError};
pub use orchestrator::{RunCoordinator, RunOutcome, RunReport, SweepReport};
pub use types::*;
pub use workspace::SvnWorkspace;
