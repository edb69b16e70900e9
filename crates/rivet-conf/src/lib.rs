//! # Rivet Conf
//!
//! Global settings for rivet, loaded once at process start from layered sources
//! (built-in defaults, a TOML file, prefixed environment variables) and shared
//! read-only with every controller. Also bootstraps `tracing` logging.

pub mod logging;
pub mod settings;
pub mod sources;

pub use logging::init as init_logging;
pub use settings::{LoggingSettings, Settings};
pub use sources::{ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource};
