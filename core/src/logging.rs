//! Tracing setup shared by the provider binaries.
//!
//! Logs always go to stderr; stdout belongs to usage text and `--print` output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for a `-v` count, falling back to a configured level.
#[must_use]
pub fn level_for(verbosity: u8, configured: Option<&str>) -> String {
    let level = match verbosity {
        0 => return configured.unwrap_or("warn").to_owned(),
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    level.to_string().to_lowercase()
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Calling this twice is harmless; the second call
/// is ignored.
pub fn init(verbosity: u8, configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity, configured)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
