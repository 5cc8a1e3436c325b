pub mod args;
pub mod commands;

pub use args::{BatchesArgs, NotifyArgs, RunArgs, SweepArgs};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::env;
use std::path::{Path, PathBuf};

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
QM COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "farmdyn-qm")]
#[command(version = crate::VERSION)]
#[command(about = "Regression-test orchestrator for the FarmDyn model")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: list the batches, sweep the latest revision, then resend the email if needed."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(
        about = "Run every batch test for one revision",
        long_about = "Sweep updates the working copy, runs each batch descriptor through the solver, publishes the scenario results and emails the last contributor. Batches already archived for the revision are skipped.",
        after_help = "Example:\n    farmdyn-qm sweep ./FarmDyn --revision 4711"
    )]
    Sweep(SweepArgs),
    #[command(
        about = "Run a single batch test",
        long_about = "Run executes one batch descriptor for one revision, without sending an email.",
        after_help = "Example:\n    farmdyn-qm run batch_test_short ./FarmDyn --revision WorkingCopy"
    )]
    Run(RunArgs),
    #[command(
        about = "Resend the results email for a revision",
        long_about = "Notify looks up the last author of the revision and sends the results email again.",
        after_help = "Example:\n    farmdyn-qm notify --revision 4711 ./FarmDyn"
    )]
    Notify(NotifyArgs),
    #[command(
        about = "List the batch descriptors a sweep would run",
        after_help = "Example:\n    farmdyn-qm batches ./FarmDyn"
    )]
    Batches(BatchesArgs),
}

impl Command {
    fn root_arg(&self) -> Option<&Path> {
        match self {
            Command::Sweep(args) => args.root.as_deref(),
            Command::Run(args) => args.root.as_deref(),
            Command::Notify(args) => args.root.as_deref(),
            Command::Batches(args) => args.root.as_deref(),
        }
    }

    /// FarmDyn root given on the command line, or the current directory.
    pub fn root(&self) -> crate::Result<PathBuf> {
        match self.root_arg() {
            Some(root) => Ok(root.to_path_buf()),
            None => env::current_dir().context("failed to read current directory"),
        }
    }

    pub fn config_file(&self) -> Option<&Path> {
        match self {
            Command::Sweep(args) => args.config.as_deref(),
            Command::Run(args) => args.config.as_deref(),
            Command::Notify(args) => args.config.as_deref(),
            Command::Batches(args) => args.config.as_deref(),
        }
    }

    /// Commands whose result is printed to stdout.
    pub fn is_listing(&self) -> bool {
        matches!(self, Command::Batches(_))
    }
}

/// Dispatch `command` and return the process exit code.
pub async fn run(command: Command) -> crate::Result<i32> {
    let root = command.root()?;
    let config_file = command.config_file().map(Path::to_path_buf);
    match command {
        Command::Sweep(args) => commands::sweep(&root, config_file.as_deref(), args).await,
        Command::Run(args) => commands::run(&root, config_file.as_deref(), args).await,
        Command::Notify(args) => commands::notify(&root, config_file.as_deref(), args).await,
        Command::Batches(_) => commands::batches(&root, config_file.as_deref()),
    }
}
