//! Logging setup.
//!
//! Configures the global `tracing` subscriber from
//! [`Settings`](crate::settings::Settings).

use crate::settings::Settings;

/// Sets up the global tracing subscriber.
///
/// The filter directive comes from `settings.log_level`. In debug mode
/// a pretty, human-readable format is used; otherwise structured JSON.
/// Calling this twice is a no-op (the second install attempt is
/// ignored), which keeps tests that share a process happy.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}
