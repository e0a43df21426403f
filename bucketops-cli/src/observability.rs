//! Log output of the command line tool.

use std::env;
use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, Registry, prelude::*};

use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber, writing to stderr.
pub fn init_tracing(config: &Config) {
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let format: Box<dyn Layer<Registry> + Send + Sync> = match resolve(config.logging.format) {
        LogFormat::Json => format.json().flatten_event(true).boxed(),
        LogFormat::Simplified => format.with_ansi(false).boxed(),
        LogFormat::Pretty | LogFormat::Auto => format.pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(format)
        .with(parse_rust_log(config.logging.level))
        .init();
}

fn resolve(format: LogFormat) -> LogFormat {
    match format {
        LogFormat::Auto if std::io::stderr().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        format => format,
    }
}

/// Builds the event filter from `RUST_LOG`, falling back to the configured level.
///
/// A plain level in `RUST_LOG` applies to the bucketops crates only. Anything else is used
/// literally as filter directives.
pub fn parse_rust_log(configured: LevelFilter) -> EnvFilter {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<LevelFilter>() {
            Ok(level) => level,
            Err(_) => return EnvFilter::new(value),
        },
        Err(_) => configured,
    };

    // Dependencies such as the AWS SDK are only interesting when they fail.
    EnvFilter::new(format!(
        "WARN,\
        bucketops={level},\
        bucketops_cli={level},\
        bucketops_client={level}"
    ))
}
