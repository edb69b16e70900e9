use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::FieldSpec;

/// Per-field overrides declared on a controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
	/// Fields of the related model exposed for an association.
	pub sub_fields: Option<Vec<String>>,
	/// Accepted on writes, never rendered.
	pub write_only: bool,
	/// Rendered, never accepted on writes.
	pub read_only: bool,
	pub required: Option<bool>,
	pub label: Option<String>,
	pub help_text: Option<String>,
	/// Allowed values, reported by the metadata action.
	pub options: Option<Vec<Value>>,
}

impl FieldConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn sub_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.sub_fields = Some(fields.into_iter().map(Into::into).collect());
		self
	}

	pub fn write_only(mut self) -> Self {
		self.write_only = true;
		self
	}

	pub fn read_only(mut self) -> Self {
		self.read_only = true;
		self
	}

	pub fn required(mut self, required: bool) -> Self {
		self.required = Some(required);
		self
	}

	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	pub fn options(mut self, options: Vec<Value>) -> Self {
		self.options = Some(options);
		self
	}
}

/// Field configuration of one controller.
///
/// The permit flags start out as the global settings and can be overridden per
/// controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOptions {
	pub fields: Option<FieldSpec>,
	/// Field specs keyed by action name (`index`, `list`, `show`, ...).
	pub action_fields: IndexMap<String, FieldSpec>,
	pub field_config: IndexMap<String, FieldConfig>,
	pub permit_id_assignment: bool,
	pub permit_nested_attributes_assignment: bool,
}

impl Default for FieldOptions {
	fn default() -> Self {
		Self {
			fields: None,
			action_fields: IndexMap::new(),
			field_config: IndexMap::new(),
			permit_id_assignment: true,
			permit_nested_attributes_assignment: true,
		}
	}
}

impl FieldOptions {
	pub fn config(&self, field: &str) -> Option<&FieldConfig> {
		self.field_config.get(field)
	}

	pub fn is_read_only(&self, field: &str) -> bool {
		self.config(field).is_some_and(|config| config.read_only)
	}

	pub fn is_write_only(&self, field: &str) -> bool {
		self.config(field).is_some_and(|config| config.write_only)
	}
}
