use tracing_subscriber::{EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. `RUST_LOG` wins when set; otherwise logging
/// is silent unless `verbose` is set, and the dashboard reports at `info`.
pub fn init_logging(verbose: bool, serving: bool) {
    let level = match (verbose, serving) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "off",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(env_filter)
        .init();
}
