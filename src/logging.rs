//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for TTY / local dev). Format
//! is auto-detected from the terminal but can be forced via `--json`
//! or `--pretty`. Spans opened by the pipeline stages are carried on
//! every event, so the subscriber is also where they get exported.

use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Registry};

use crate::cli::LogLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// Client-side crates that log every upstream connection at debug/trace.
const NOISY_TARGETS: [&str; 4] = ["hyper_util", "hyper", "rustls", "h2"];

fn filter(level: &LogLevel) -> Targets {
    let level = level.to_tracing_level();
    NOISY_TARGETS.iter().fold(
        Targets::new().with_default(level),
        |targets, target| targets.with_target(*target, level.min(Level::INFO)),
    )
}

/// Install the global subscriber. `export` is an extra layer that ships
/// spans elsewhere (OpenTelemetry), sitting next to the formatter.
pub fn init<L>(level: &LogLevel, format: LogFormat, export: Option<L>)
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let filter = filter(level);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(export)
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(false)
                        .with_current_span(true)
                        .with_span_list(false),
                )
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(export)
                .with(filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}
