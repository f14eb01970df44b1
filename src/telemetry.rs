//! Logging initialization.
//!
//! Logs go to stderr so they never interleave with prompts and rankings on
//! stdout. `RUST_LOG` controls the filter (default `warn`, which surfaces
//! state repairs and save failures); `PODIUM_LOG_FORMAT=json` switches the
//! human-readable format to JSON lines for machine consumption.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Install the global stderr subscriber. A second call is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("PODIUM_LOG_FORMAT").as_deref() == Ok("json") {
        let _ = registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init();
    } else {
        let _ = registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .without_time(),
            )
            .try_init();
    }
}
