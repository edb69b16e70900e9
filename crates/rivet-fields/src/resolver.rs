//! Field resolution per action.

use indexmap::IndexMap;
use rivet_conf::Settings;
use rivet_db::{Association, AssociationKind, ModelSchema, SchemaRegistry};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::FieldOptions;
use crate::kind::{FieldKind, FieldTable};

const ACTION_ALIASES: &[(&str, &str)] = &[("index", "list"), ("show", "retrieve")];

/// Names an action's field spec may be declared under, the action itself first.
///
/// # Examples
///
/// ```
/// use rivet_fields::action_aliases;
///
/// assert_eq!(action_aliases("index"), vec!["index", "list"]);
/// assert_eq!(action_aliases("retrieve"), vec!["retrieve", "show"]);
/// assert_eq!(action_aliases("create"), vec!["create"]);
/// ```
pub fn action_aliases(action: &str) -> Vec<&str> {
	let mut names = vec![action];
	for (left, right) in ACTION_ALIASES {
		if action == *left {
			names.push(*right);
		} else if action == *right {
			names.push(*left);
		}
	}
	names
}

/// Metadata of one field as reported by the metadata action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
	pub name: String,
	pub kind: FieldKind,
	#[serde(rename = "type")]
	pub field_type: String,
	pub label: String,
	pub required: bool,
	pub read_only: bool,
	pub write_only: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub default: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub help_text: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub options: Option<Vec<Value>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sub_fields: Option<Vec<String>>,
	#[serde(skip_serializing_if = "std::ops::Not::not")]
	pub multiple: bool,
}

/// Resolves a controller's fields against its model.
///
/// Built once when the controller is built and shared read-only by every
/// request afterwards.
#[derive(Clone)]
pub struct FieldResolver {
	controller: String,
	schema: Arc<dyn ModelSchema>,
	registry: Arc<SchemaRegistry>,
	settings: Arc<Settings>,
	options: FieldOptions,
	table: FieldTable,
}

impl FieldResolver {
	pub fn new(
		controller: impl Into<String>,
		schema: Arc<dyn ModelSchema>,
		registry: Arc<SchemaRegistry>,
		settings: Arc<Settings>,
		options: FieldOptions,
	) -> Self {
		let table = FieldTable::build(schema.as_ref(), &settings);
		Self {
			controller: controller.into(),
			schema,
			registry,
			settings,
			options,
			table,
		}
	}

	pub fn controller(&self) -> &str {
		&self.controller
	}

	pub fn schema(&self) -> &dyn ModelSchema {
		self.schema.as_ref()
	}

	pub fn registry(&self) -> &SchemaRegistry {
		&self.registry
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn options(&self) -> &FieldOptions {
		&self.options
	}

	pub fn kind(&self, field: &str) -> FieldKind {
		self.table.kind(field)
	}

	/// Fields exposed for `action`.
	///
	/// An action-specific spec (declared under the action or its alias) wins
	/// over the controller-wide spec, which wins over [`default_fields`].
	///
	/// [`default_fields`]: Self::default_fields
	pub fn resolve_fields(&self, action: Option<&str>) -> Vec<String> {
		let action_spec = action.and_then(|action| {
			action_aliases(action)
				.into_iter()
				.find_map(|name| self.options.action_fields.get(name))
		});
		match action_spec.or(self.options.fields.as_ref()) {
			Some(spec) => spec.resolve(|| self.default_fields()),
			None => self.default_fields(),
		}
	}

	/// Columns without `belongs_to` keys, then associations not pointing at
	/// large tables, then enabled attachments and rich text fields.
	pub fn default_fields(&self) -> Vec<String> {
		let hidden_keys: Vec<String> = self
			.schema
			.associations()
			.iter()
			.filter(|association| association.kind == AssociationKind::BelongsTo)
			.flat_map(|association| {
				let type_column = association
					.polymorphic
					.then(|| format!("{}_type", association.name));
				association.foreign_key.clone().into_iter().chain(type_column)
			})
			.collect();

		let columns = self
			.schema
			.columns()
			.iter()
			.map(|column| column.name.as_str())
			.filter(|name| !hidden_keys.iter().any(|hidden| hidden == name));
		let associations = self
			.schema
			.associations()
			.iter()
			.filter(|association| !self.is_large(association))
			.map(|association| association.name.as_str());

		columns
			.chain(associations)
			.chain(self.table.names(FieldKind::Attachment))
			.chain(self.table.names(FieldKind::RichText))
			.map(str::to_string)
			.collect()
	}

	fn is_large(&self, association: &Association) -> bool {
		association
			.related
			.as_deref()
			.is_some_and(|table| self.settings.is_large_table(table))
	}

	/// Schema of the model behind `association`, when registered.
	pub fn related_schema(&self, association: &str) -> Option<Arc<dyn ModelSchema>> {
		let related = self.schema.association(association)?.related.as_deref()?;
		self.registry.get(related)
	}

	/// Fields rendered and accepted for an association.
	///
	/// Explicit configuration wins. Polymorphic targets fall back to
	/// `["id", "name"]`. Otherwise the related primary key plus the first
	/// label-like column (or method) of the related model.
	pub fn sub_fields(&self, association: &str) -> Vec<String> {
		if let Some(fields) = self
			.options
			.config(association)
			.and_then(|config| config.sub_fields.clone())
		{
			return fields;
		}

		let polymorphic = self
			.schema
			.association(association)
			.is_some_and(|association| association.polymorphic);
		if polymorphic {
			return vec!["id".to_string(), "name".to_string()];
		}

		let Some(related) = self.related_schema(association) else {
			return vec!["id".to_string()];
		};
		let mut fields = vec![related.primary_key().to_string()];
		let label = self
			.settings
			.label_fields
			.iter()
			.find(|name| related.column(name).is_some())
			.or_else(|| {
				self.settings
					.label_fields
					.iter()
					.find(|name| related.has_method(name))
			});
		if let Some(label) = label {
			fields.push(label.clone());
		}
		fields
	}

	/// Metadata for `fields`, keyed by name.
	pub fn resolve_field_metadata(&self, fields: &[String]) -> IndexMap<String, Field> {
		fields
			.iter()
			.map(|name| (name.clone(), self.field_metadata(name)))
			.collect()
	}

	fn field_metadata(&self, name: &str) -> Field {
		let kind = self.table.kind(name);
		let mut field = Field {
			name: name.to_string(),
			kind,
			field_type: type_name(&kind),
			label: humanize(name),
			required: false,
			read_only: matches!(kind, FieldKind::Method | FieldKind::Computed),
			write_only: false,
			default: None,
			help_text: None,
			options: None,
			sub_fields: None,
			multiple: false,
		};

		match kind {
			FieldKind::Column => {
				if let Some(column) = self.schema.column(name) {
					field.field_type = type_name(&column.column_type);
					field.required = column.is_required();
					field.read_only = column.read_only;
					field.default = column.default.clone();
				}
			}
			FieldKind::Association => {
				if let Some(association) = self.schema.association(name) {
					field.field_type = type_name(&association.kind);
					field.multiple = association.is_collection();
				}
				field.sub_fields = Some(self.sub_fields(name));
			}
			FieldKind::Attachment => {
				field.multiple = self
					.schema
					.attachment(name)
					.is_some_and(|attachment| attachment.multiple);
			}
			FieldKind::RichText | FieldKind::Method | FieldKind::Computed => {}
		}

		if let Some(config) = self.options.config(name) {
			field.read_only |= config.read_only;
			field.write_only = config.write_only;
			if config.write_only {
				field.read_only = false;
			}
			if let Some(required) = config.required {
				field.required = required;
			}
			if let Some(label) = &config.label {
				field.label = label.clone();
			}
			field.help_text = config.help_text.clone();
			field.options = config.options.clone();
		}
		field
	}
}

fn type_name<T: Serialize>(value: &T) -> String {
	match serde_json::to_value(value) {
		Ok(Value::String(name)) => name,
		_ => "string".to_string(),
	}
}

fn humanize(name: &str) -> String {
	let spaced = name.replace('_', " ");
	let mut chars = spaced.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::FieldConfig;
	use crate::spec::FieldSpec;
	use rivet_db::{Column, ColumnType, TableSchema};
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn registry() -> Arc<SchemaRegistry> {
		Arc::new(
			SchemaRegistry::new()
				.register(
					TableSchema::new("User", "users")
						.column(Column::new("id", ColumnType::Integer).primary_key())
						.column(Column::new("login", ColumnType::String).not_null())
						.column(Column::new("balance", ColumnType::Decimal).default_value(0))
						.column(Column::new("manager_id", ColumnType::Integer))
						.association(Association::belongs_to("manager", "users"))
						.association(Association::has_many("posts", "posts"))
						.association(Association::has_many("events", "audit_events"))
						.association(Association::polymorphic("owner"))
						.column(Column::new("owner_id", ColumnType::Integer))
						.column(Column::new("owner_type", ColumnType::String))
						.attachment("avatar", false)
						.rich_text("bio")
						.method("display", |_| json!("x")),
				)
				.register(
					TableSchema::new("Post", "posts")
						.column(Column::new("id", ColumnType::Integer).primary_key())
						.column(Column::new("body", ColumnType::Text))
						.method("title", |_| json!("t")),
				)
				.register(
					TableSchema::new("AuditEvent", "audit_events")
						.column(Column::new("uuid", ColumnType::Uuid).primary_key()),
				),
		)
	}

	fn resolver(registry: Arc<SchemaRegistry>, options: FieldOptions) -> FieldResolver {
		let settings = Settings {
			large_tables: vec!["audit_events".to_string()],
			..Settings::default()
		};
		let schema = registry.get("User").unwrap();
		FieldResolver::new("users", schema, registry, Arc::new(settings), options)
	}

	#[rstest]
	fn test_default_fields(registry: Arc<SchemaRegistry>) {
		let resolver = resolver(registry, FieldOptions::default());
		assert_eq!(
			resolver.default_fields(),
			vec!["id", "login", "balance", "manager", "posts", "owner", "avatar", "bio"]
		);
	}

	#[rstest]
	fn test_action_spec_wins_over_controller_spec(registry: Arc<SchemaRegistry>) {
		let mut options = FieldOptions {
			fields: Some(FieldSpec::list(["id", "login"])),
			..FieldOptions::default()
		};
		options
			.action_fields
			.insert("list".to_string(), FieldSpec::spec().only(["id"]));
		let resolver = resolver(registry, options);

		assert_eq!(resolver.resolve_fields(Some("index")), vec!["id"]);
		assert_eq!(resolver.resolve_fields(Some("show")), vec!["id", "login"]);
		assert_eq!(resolver.resolve_fields(None), vec!["id", "login"]);
	}

	#[rstest]
	fn test_spec_resolves_against_defaults(registry: Arc<SchemaRegistry>) {
		let options = FieldOptions {
			fields: Some(FieldSpec::spec().include(["display"]).except(["avatar", "bio", "owner"])),
			..FieldOptions::default()
		};
		let resolver = resolver(registry, options);
		assert_eq!(
			resolver.resolve_fields(Some("show")),
			vec!["id", "login", "balance", "manager", "posts", "display"]
		);
	}

	#[rstest]
	#[case("manager", vec!["id", "login"])]
	#[case("posts", vec!["id", "title"])]
	#[case("owner", vec!["id", "name"])]
	#[case("events", vec!["uuid"])]
	fn test_sub_fields(
		registry: Arc<SchemaRegistry>,
		#[case] association: &str,
		#[case] expected: Vec<&str>,
	) {
		let resolver = resolver(registry, FieldOptions::default());
		assert_eq!(resolver.sub_fields(association), expected);
	}

	#[rstest]
	fn test_configured_sub_fields_win(registry: Arc<SchemaRegistry>) {
		let mut options = FieldOptions::default();
		options.field_config.insert(
			"manager".to_string(),
			FieldConfig::new().sub_fields(["id", "balance"]),
		);
		let resolver = resolver(registry, options);
		assert_eq!(resolver.sub_fields("manager"), vec!["id", "balance"]);
	}

	#[rstest]
	fn test_field_metadata(registry: Arc<SchemaRegistry>) {
		let mut options = FieldOptions::default();
		options.field_config.insert(
			"balance".to_string(),
			FieldConfig::new().label("Account balance").read_only(),
		);
		let resolver = resolver(registry, options);
		let fields: Vec<String> = ["id", "login", "balance", "posts", "display"]
			.into_iter()
			.map(String::from)
			.collect();

		let metadata = resolver.resolve_field_metadata(&fields);

		assert!(metadata["id"].read_only);
		assert!(metadata["login"].required);
		assert_eq!(metadata["login"].field_type, "string");
		assert_eq!(metadata["balance"].label, "Account balance");
		assert!(metadata["balance"].read_only);
		assert_eq!(metadata["balance"].default, Some(json!(0)));
		assert_eq!(metadata["posts"].field_type, "has_many");
		assert!(metadata["posts"].multiple);
		assert_eq!(metadata["display"].kind, FieldKind::Method);
		assert!(metadata["display"].read_only);

		let rendered = serde_json::to_value(&metadata["login"]).unwrap();
		assert_eq!(rendered["type"], "string");
		assert_eq!(rendered["label"], "Login");
		assert!(rendered.get("sub_fields").is_none());
	}
}
