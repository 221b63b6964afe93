//! Telemetry and Observability
//!
//! Installs the `tracing-subscriber` stack. Logs always go to stderr so that
//! `devteam run --json` keeps stdout machine-readable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Pretty in debug builds, JSON with spans in release builds.
    pub fn for_build() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

fn default_filter(log_level: &str) -> String {
    format!(
        "{level},devteam_engine={level},devteam={level},sqlx=warn,hyper=warn",
        level = log_level
    )
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log_level`. Only the first call installs anything.
pub fn init_telemetry(log_level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Install the subscriber with the format matching the build profile.
pub fn init_telemetry_with_level(log_level: &str) {
    init_telemetry(log_level, LogFormat::for_build());
}
