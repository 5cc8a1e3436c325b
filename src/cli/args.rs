use crate::core::types::Revision;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    /// FarmDyn working copy root (default: current directory)
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Path to config file (default: {root}/qm.toml)
    #[arg(long, value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Revision number or WorkingCopy (default: latest revision)
    #[arg(long, value_name = "REV")]
    pub revision: Option<Revision>,

    /// Skip the contributor email after the sweep
    #[arg(long)]
    pub no_notify: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Batch name (batch_test_x) or descriptor file name
    #[arg(value_name = "BATCH")]
    pub batch: String,

    /// FarmDyn working copy root (default: current directory)
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Path to config file (default: {root}/qm.toml)
    #[arg(long, value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Revision number or WorkingCopy (default: latest revision)
    #[arg(long, value_name = "REV")]
    pub revision: Option<Revision>,
}

#[derive(Args, Debug, Clone)]
pub struct NotifyArgs {
    /// Revision the email reports on
    #[arg(long, value_name = "N")]
    pub revision: u64,

    /// FarmDyn working copy root (default: current directory)
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Path to config file (default: {root}/qm.toml)
    #[arg(long, value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct BatchesArgs {
    /// FarmDyn working copy root (default: current directory)
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Path to config file (default: {root}/qm.toml)
    #[arg(long, value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,
}
