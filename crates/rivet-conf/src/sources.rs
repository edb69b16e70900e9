//! Configuration sources for the layered settings
//!
//! Sources are merged in priority order (environment variables > config file >
//! defaults). Nested tables merge key by key; scalars and arrays are replaced.

use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Keys whose environment values are comma-separated lists.
const LIST_KEYS: &[&str] = &["label_fields", "search_columns", "large_tables"];

/// Separator for nested keys in environment variable names (`RIVET_LOGGING__LEVEL`).
const NESTED_SEPARATOR: &str = "__";

pub trait ConfigSource: Send + Sync {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Higher wins.
	fn priority(&self) -> u8;

	fn description(&self) -> String;
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl From<SourceError> for rivet_core::Error {
	fn from(error: SourceError) -> Self {
		rivet_core::Error::Configuration(error.to_string())
	}
}

/// Environment variables carrying a prefix, e.g. `RIVET_DEBUG=true`.
pub struct EnvSource {
	prefix: String,
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	/// # Examples
	///
	/// ```
	/// use rivet_conf::sources::{ConfigSource, EnvSource};
	///
	/// let source = EnvSource::new("RIVET_")
	/// 	.with_vars([("RIVET_DEFAULT_PAGE_SIZE", "50"), ("HOME", "/root")]);
	/// let loaded = source.load().unwrap();
	/// assert_eq!(loaded["default_page_size"], 50);
	/// assert!(!loaded.contains_key("home"));
	/// ```
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
			vars: None,
		}
	}

	/// Reads from the given pairs instead of the process environment.
	pub fn with_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.vars = Some(
			vars.into_iter()
				.map(|(key, value)| (key.into(), value.into()))
				.collect(),
		);
		self
	}

	fn parse_value(key: &str, value: String) -> Value {
		if LIST_KEYS.contains(&key) {
			let items = value
				.split(',')
				.map(str::trim)
				.filter(|item| !item.is_empty())
				.map(|item| Value::String(item.to_string()))
				.collect();
			return Value::Array(items);
		}
		match value.trim().to_lowercase().as_str() {
			"true" | "yes" | "on" => return Value::Bool(true),
			"false" | "no" | "off" => return Value::Bool(false),
			_ => {}
		}
		if let Ok(number) = value.trim().parse::<i64>() {
			Value::Number(number.into())
		} else {
			Value::String(value)
		}
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let vars: Vec<(String, String)> = match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		};

		let mut config = IndexMap::new();
		for (key, value) in vars {
			let Some(clean_key) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			let lower_key = clean_key.to_lowercase();
			let mut path: Vec<&str> = lower_key.split(NESTED_SEPARATOR).collect();
			let Some(leaf) = path.pop() else {
				continue;
			};

			let mut nested = Value::Object(serde_json::Map::new());
			insert_path(&mut nested, &path, leaf, Self::parse_value(leaf, value));
			if let Value::Object(map) = nested {
				for (name, value) in map {
					merge_entry(&mut config, name, value);
				}
			}
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}

fn insert_path(target: &mut Value, path: &[&str], leaf: &str, value: Value) {
	let mut current = target;
	for segment in path {
		current = match current {
			Value::Object(map) => map
				.entry(segment.to_string())
				.or_insert_with(|| Value::Object(serde_json::Map::new())),
			_ => return,
		};
	}
	if let Value::Object(map) = current {
		map.insert(leaf.to_string(), value);
	}
}

pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		toml_to_map(&content)
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

pub(crate) fn toml_to_map(content: &str) -> Result<IndexMap<String, Value>, SourceError> {
	let toml_value: toml::Value = toml::from_str(content)?;
	let json_value = serde_json::to_value(toml_value)?;
	match json_value {
		Value::Object(map) => Ok(map.into_iter().collect()),
		_ => Err(SourceError::Parse("Expected table at root".to_string())),
	}
}

/// Lowest-priority source holding built-in values.
#[derive(Default)]
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_values(mut self, values: IndexMap<String, Value>) -> Self {
		self.values.extend(values);
		self
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}

/// Loads every source and merges them lowest priority first.
pub fn merge_sources(
	sources: &[Box<dyn ConfigSource>],
) -> Result<IndexMap<String, Value>, SourceError> {
	let mut ordered: Vec<&Box<dyn ConfigSource>> = sources.iter().collect();
	ordered.sort_by_key(|source| source.priority());

	let mut merged = IndexMap::new();
	for source in ordered {
		tracing::debug!(source = %source.description(), "loading configuration source");
		for (key, value) in source.load()? {
			merge_entry(&mut merged, key, value);
		}
	}
	Ok(merged)
}

fn merge_entry(target: &mut IndexMap<String, Value>, key: String, value: Value) {
	match target.get_mut(&key) {
		Some(existing) => deep_merge(existing, value),
		None => {
			target.insert(key, value);
		}
	}
}

/// Merges `overlay` into `base`; objects merge recursively, anything else replaces.
pub fn deep_merge(base: &mut Value, overlay: Value) {
	match (base, overlay) {
		(Value::Object(base_map), Value::Object(overlay_map)) => {
			for (key, value) in overlay_map {
				match base_map.get_mut(&key) {
					Some(existing) => deep_merge(existing, value),
					None => {
						base_map.insert(key, value);
					}
				}
			}
		}
		(slot, value) => *slot = value,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case("RIVET_DEBUG", "true", "debug", json!(true))]
	#[case("RIVET_MAX_PAGE_SIZE", "100", "max_page_size", json!(100))]
	#[case("RIVET_LARGE_TABLES", "events, audits", "large_tables", json!(["events", "audits"]))]
	#[case("RIVET_LOGGING__LEVEL", "debug", "logging", json!({"level": "debug"}))]
	fn test_env_source_parsing(
		#[case] key: &str,
		#[case] value: &str,
		#[case] expected_key: &str,
		#[case] expected: Value,
	) {
		let loaded = EnvSource::new("RIVET_")
			.with_vars([(key, value)])
			.load()
			.unwrap();
		assert_eq!(loaded[expected_key], expected);
	}

	#[rstest]
	fn test_merge_respects_priority() {
		let defaults = DefaultSource::new().with_values(
			[
				("debug".to_string(), json!(false)),
				("logging".to_string(), json!({"level": "info", "json": false})),
			]
			.into_iter()
			.collect(),
		);
		let env = EnvSource::new("RIVET_").with_vars([("RIVET_LOGGING__LEVEL", "trace")]);

		let sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(env), Box::new(defaults)];
		let merged = merge_sources(&sources).unwrap();

		assert_eq!(merged["debug"], json!(false));
		assert_eq!(merged["logging"], json!({"level": "trace", "json": false}));
	}

	#[rstest]
	fn test_missing_toml_file_is_empty() {
		let source = TomlFileSource::new("/nonexistent/rivet.toml");
		assert!(source.load().unwrap().is_empty());
	}

	#[rstest]
	fn test_toml_root_must_be_table() {
		let map = toml_to_map("debug = true\n[controllers.users]\npage_size = 5\n").unwrap();
		assert_eq!(map["controllers"], json!({"users": {"page_size": 5}}));
	}
}
