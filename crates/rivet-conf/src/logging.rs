//! Logging bootstrap.

use tracing_subscriber::EnvFilter;

use crate::settings::LoggingSettings;

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over [`LoggingSettings::level`]. Returns `false`
/// when a global subscriber was already installed, which is not an error.
pub fn init(settings: &LoggingSettings) -> bool {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_ansi(settings.ansi)
		.with_target(settings.with_target)
		.try_init()
		.is_ok()
}
