//! Global settings.
//!
//! A single [`Settings`] value is built at process start and passed by
//! reference (usually behind an `Arc`) to every controller. It is never mutated
//! afterwards.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::sources::{
	ConfigSource, DefaultSource, EnvSource, SourceError, TomlFileSource, merge_sources,
	toml_to_map,
};

/// Environment prefix used by [`Settings::load`] when none is given.
pub const DEFAULT_ENV_PREFIX: &str = "RIVET_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
	/// Filter directive used when `RUST_LOG` is not set.
	pub level: String,
	pub ansi: bool,
	pub with_target: bool,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			ansi: true,
			with_target: true,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// Attach raw exception detail to error bodies.
	pub debug: bool,
	pub logging: LoggingSettings,
	pub default_page_size: usize,
	pub max_page_size: Option<usize>,
	/// Label-like column names tried in order when inferring association sub-fields.
	pub label_fields: Vec<String>,
	/// Column names considered searchable when a controller declares no search fields.
	pub search_columns: Vec<String>,
	/// Related tables whose associations are left out of default field lists.
	pub large_tables: Vec<String>,
	pub enable_rich_text: bool,
	pub enable_attachments: bool,
	pub permit_id_assignment: bool,
	pub permit_nested_attributes_assignment: bool,
	/// Raw per-controller override tables (`[controllers.<name>]`).
	pub controllers: IndexMap<String, Value>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			debug: false,
			logging: LoggingSettings::default(),
			default_page_size: 20,
			max_page_size: None,
			label_fields: to_strings(&[
				"name", "label", "login", "title", "email", "username", "url",
			]),
			search_columns: to_strings(&[
				"name",
				"title",
				"description",
				"note",
				"email",
				"login",
				"username",
				"first_name",
				"last_name",
			]),
			large_tables: Vec::new(),
			enable_rich_text: true,
			enable_attachments: true,
			permit_id_assignment: true,
			permit_nested_attributes_assignment: true,
			controllers: IndexMap::new(),
		}
	}
}

fn to_strings(items: &[&str]) -> Vec<String> {
	items.iter().map(|item| item.to_string()).collect()
}

impl Settings {
	/// Parses settings from TOML text on top of the built-in defaults.
	///
	/// # Examples
	///
	/// ```
	/// use rivet_conf::Settings;
	///
	/// let settings = Settings::from_toml_str("default_page_size = 5\n").unwrap();
	/// assert_eq!(settings.default_page_size, 5);
	/// assert!(settings.permit_id_assignment);
	/// ```
	pub fn from_toml_str(content: &str) -> Result<Self, SourceError> {
		let overrides = toml_to_map(content)?;
		Self::from_layers(vec![Box::new(
			DefaultSource::new().with_values(overrides),
		)])
	}

	/// Defaults, then the TOML file at `path` (skipped when absent), then
	/// environment variables carrying `env_prefix`.
	pub fn load(path: impl AsRef<Path>, env_prefix: Option<&str>) -> Result<Self, SourceError> {
		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(TomlFileSource::new(path.as_ref())),
			Box::new(EnvSource::new(env_prefix.unwrap_or(DEFAULT_ENV_PREFIX))),
		];
		Self::from_layers(sources)
	}

	/// Merges `sources` over the built-in defaults and deserializes the result.
	pub fn from_layers(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<Self, SourceError> {
		let defaults = match serde_json::to_value(Settings::default())? {
			Value::Object(map) => map.into_iter().collect(),
			_ => IndexMap::new(),
		};
		// Merging is stable within a priority, so defaults go first.
		sources.insert(0, Box::new(DefaultSource::new().with_values(defaults)));

		let merged = merge_sources(&sources)?;
		let object: serde_json::Map<String, Value> = merged.into_iter().collect();
		Ok(serde_json::from_value(Value::Object(object))?)
	}

	/// Override table declared for a controller, if any.
	pub fn controller_overrides(&self, name: &str) -> Option<&Value> {
		self.controllers.get(name)
	}

	pub fn is_large_table(&self, table: &str) -> bool {
		self.large_tables.iter().any(|large| large == table)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;
	use std::io::Write;

	#[rstest]
	fn test_defaults() {
		let settings = Settings::default();
		assert_eq!(settings.default_page_size, 20);
		assert_eq!(settings.max_page_size, None);
		assert_eq!(settings.label_fields.first().map(String::as_str), Some("name"));
		assert!(!settings.debug);
	}

	#[rstest]
	fn test_toml_overrides_keep_other_defaults() {
		let settings = Settings::from_toml_str(
			r#"
debug = true
max_page_size = 50
large_tables = ["audit_events"]

[logging]
level = "debug"

[controllers.users]
page_size = 2
"#,
		)
		.unwrap();

		assert!(settings.debug);
		assert_eq!(settings.max_page_size, Some(50));
		assert!(settings.is_large_table("audit_events"));
		assert_eq!(settings.logging.level, "debug");
		assert!(settings.logging.ansi);
		assert_eq!(
			settings.controller_overrides("users"),
			Some(&json!({"page_size": 2}))
		);
		assert_eq!(settings.default_page_size, 20);
	}

	#[rstest]
	fn test_env_wins_over_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "default_page_size = 10\ndebug = false").unwrap();

		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(TomlFileSource::new(file.path())),
			Box::new(EnvSource::new("APP_").with_vars([("APP_DEBUG", "true")])),
		];
		let settings = Settings::from_layers(sources).unwrap();

		assert_eq!(settings.default_page_size, 10);
		assert!(settings.debug);
	}

	#[rstest]
	fn test_malformed_toml_is_an_error() {
		let result = Settings::from_toml_str("debug = = true");
		assert!(matches!(result, Err(SourceError::Toml(_))));
	}
}
