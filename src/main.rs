use clap::Parser;
use farmdyn_qm::cli::{self, Args};
use farmdyn_qm::logging;
use std::process::ExitCode;

/// Setup or orchestration failure that stopped the run.
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match logging::init(&args.command) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("farmdyn-qm: failed to initialize logging: {:#}", err);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("farmdyn-qm: failed to start async runtime: {}", err);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match runtime.block_on(cli::run(args.command)) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(EXIT_FATAL)),
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("farmdyn-qm: {:#}", err);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
