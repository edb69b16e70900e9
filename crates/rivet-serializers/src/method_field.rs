//! Serializer method fields
//!
//! Virtual fields computed from a record by a registered function. They are
//! merged after the base projection, so they can add fields or override
//! projected ones.

use indexmap::IndexMap;
use rivet_db::Record;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Computes a value from a serialized record's source row.
pub type MethodFieldFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// A field whose value comes from a registered method.
///
/// # Examples
///
/// ```
/// use rivet_serializers::SerializerMethodField;
///
/// let field = SerializerMethodField::new("full_name").method_name("compute_full_name");
/// assert_eq!(field.get_method_name(), "compute_full_name");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializerMethodField {
	/// Name of the field in the output
	pub field_name: String,
	/// Method to call when it differs from the field name
	pub custom_method_name: Option<String>,
}

impl SerializerMethodField {
	pub fn new(field_name: impl Into<String>) -> Self {
		Self {
			field_name: field_name.into(),
			custom_method_name: None,
		}
	}

	pub fn method_name(mut self, name: impl Into<String>) -> Self {
		self.custom_method_name = Some(name.into());
		self
	}

	/// Get the actual method name to use for lookup
	pub fn get_method_name(&self) -> &str {
		self.custom_method_name.as_deref().unwrap_or(&self.field_name)
	}
}

/// Error type for method field operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum MethodFieldError {
	/// Method was not registered
	#[error("Method '{0}' not registered for serializer method fields")]
	MethodNotFound(String),
}

impl From<MethodFieldError> for rivet_core::Error {
	fn from(error: MethodFieldError) -> Self {
		rivet_core::Error::Configuration(error.to_string())
	}
}

/// Named methods plus the fields that call them.
#[derive(Clone, Default)]
pub struct MethodFieldRegistry {
	methods: IndexMap<String, MethodFieldFn>,
	fields: IndexMap<String, SerializerMethodField>,
}

impl MethodFieldRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a method under `name`, together with a field of the same name.
	///
	/// # Examples
	///
	/// ```
	/// use rivet_serializers::MethodFieldRegistry;
	/// use serde_json::json;
	///
	/// let registry = MethodFieldRegistry::new().method("kind", |_| json!("user"));
	/// assert!(registry.contains("kind"));
	/// ```
	pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
	where
		F: Fn(&Record) -> Value + Send + Sync + 'static,
	{
		let name = name.into();
		self.fields
			.entry(name.clone())
			.or_insert_with(|| SerializerMethodField::new(name.clone()));
		self.methods.insert(name, Arc::new(method));
		self
	}

	/// Registers a field, possibly backed by a differently named method.
	pub fn register(&mut self, field: SerializerMethodField) {
		self.fields.insert(field.field_name.clone(), field);
	}

	pub fn get(&self, name: &str) -> Option<&SerializerMethodField> {
		self.fields.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.fields.contains_key(name)
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Computes field `name` for `record`.
	pub fn get_value(&self, name: &str, record: &Record) -> Result<Value, MethodFieldError> {
		let method_name = self
			.fields
			.get(name)
			.map_or(name, SerializerMethodField::get_method_name);
		self.methods
			.get(method_name)
			.map(|method| method(record))
			.ok_or_else(|| MethodFieldError::MethodNotFound(method_name.to_string()))
	}
}

impl fmt::Debug for MethodFieldRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MethodFieldRegistry")
			.field("methods", &self.methods.keys().collect::<Vec<_>>())
			.field("fields", &self.fields)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn record(value: Value) -> Record {
		match value {
			Value::Object(map) => map,
			_ => Record::new(),
		}
	}

	#[rstest]
	fn test_custom_method_name() {
		let field = SerializerMethodField::new("full_name").method_name("compute_full_name");

		assert_eq!(field.field_name, "full_name");
		assert_eq!(field.get_method_name(), "compute_full_name");
	}

	#[rstest]
	fn test_get_value_through_field_alias() {
		let mut registry = MethodFieldRegistry::new().method("shout", |record| {
			json!(record["login"].as_str().unwrap_or_default().to_uppercase())
		});
		registry.register(SerializerMethodField::new("loud_login").method_name("shout"));

		let row = record(json!({"login": "ada"}));
		assert_eq!(registry.get_value("shout", &row).unwrap(), json!("ADA"));
		assert_eq!(registry.get_value("loud_login", &row).unwrap(), json!("ADA"));
	}

	#[rstest]
	#[case("missing")]
	#[case("dangling")]
	fn test_method_not_found(#[case] name: &str) {
		let mut registry = MethodFieldRegistry::new();
		registry.register(SerializerMethodField::new("dangling").method_name("nowhere"));

		let error = registry.get_value(name, &Record::new()).unwrap_err();

		assert!(matches!(error, MethodFieldError::MethodNotFound(_)));
		assert!(matches!(
			rivet_core::Error::from(error),
			rivet_core::Error::Configuration(_)
		));
	}
}
