use tracing_subscriber::EnvFilter;

/// Crates whose events are captured at full verbosity.
const CRATE_NAMES: &[&str] = &["bucketops", "bucketops_client", "bucketops_cli"];

/// Initialize the logger for testing.
///
/// This logs to the stdout registered by the Rust test runner. Events from the bucketops crates
/// are captured at `TRACE`, everything else at `ERROR`. A non-empty `RUST_LOG` replaces these
/// directives, e.g. `RUST_LOG=bucketops_client::retry=debug` to follow only the retry loop.
///
/// The first call in a test binary installs the subscriber, later calls do nothing.
///
/// # Example
///
/// ```
/// bucketops_test::tracing::init();
/// ```
pub fn init() {
    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => default_filter(),
    };

    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}

fn default_filter() -> EnvFilter {
    let crates = CRATE_NAMES
        .iter()
        .map(|name| format!("{name}=TRACE"))
        .collect::<Vec<_>>();
    EnvFilter::new(format!("ERROR,{}", crates.join(",")))
}
