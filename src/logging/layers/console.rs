use serde::Deserialize;
use std::fmt;
use std::io;
use std::str::FromStr;
use tracing::Subscriber;
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::layer::Layered;
use tracing_subscriber::registry::LookupSpan;

/// Layer type returned by the console builder.
pub type ConsoleFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Full>, BoxMakeWriter>;

/// Layer stack produced when a console layer is applied to a subscriber.
pub type ConsoleLayerStack<S> = Layered<ConsoleFmtLayer<S>, S>;

/// Where console logs should be emitted.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleOutput {
    Stdout,
    #[default]
    Stderr,
    None,
}

impl fmt::Display for ConsoleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleOutput::Stdout => write!(f, "stdout"),
            ConsoleOutput::Stderr => write!(f, "stderr"),
            ConsoleOutput::None => write!(f, "none"),
        }
    }
}

impl FromStr for ConsoleOutput {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "stdout" => Ok(ConsoleOutput::Stdout),
            "stderr" => Ok(ConsoleOutput::Stderr),
            "none" => Ok(ConsoleOutput::None),
            _ => Err(format!(
                "invalid logging.console_output '{}'; supported values are stdout, stderr, none",
                value
            )),
        }
    }
}

/// Listing commands print to stdout themselves, so their logs stay off it.
pub fn select_console_output(configured: Option<ConsoleOutput>, listing: bool) -> ConsoleOutput {
    match configured {
        Some(ConsoleOutput::Stdout) if listing => ConsoleOutput::Stderr,
        Some(output) => output,
        None => ConsoleOutput::Stderr,
    }
}

/// Build the console tracing layer for the provided subscriber type.
pub fn console_layer<S>(output: ConsoleOutput) -> ConsoleFmtLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let make_writer = match output {
        ConsoleOutput::Stdout => BoxMakeWriter::new(io::stdout),
        ConsoleOutput::Stderr => BoxMakeWriter::new(io::stderr),
        ConsoleOutput::None => BoxMakeWriter::new(io::sink),
    };

    tracing_fmt::layer()
        .with_writer(make_writer)
        .with_ansi(false)
        .with_target(false)
}
