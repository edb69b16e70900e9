//! Model schema metadata.
//!
//! The core reads schema metadata through [`ModelSchema`] and never introspects
//! the data store itself.

use indexmap::IndexMap;
use rivet_core::FieldErrors;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::source::Record;

/// Computed value of a model method for one record.
pub type MethodFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Model-level validation hook returning errors keyed by field.
pub type ValidatorFn = Arc<dyn Fn(&Record) -> FieldErrors + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
	Integer,
	BigInteger,
	Float,
	Decimal,
	Boolean,
	String,
	Text,
	Date,
	DateTime,
	Uuid,
	Json,
	Binary,
}

impl ColumnType {
	pub fn is_text(&self) -> bool {
		matches!(self, ColumnType::String | ColumnType::Text)
	}

	pub fn is_integer(&self) -> bool {
		matches!(self, ColumnType::Integer | ColumnType::BigInteger)
	}

	pub fn is_numeric(&self) -> bool {
		self.is_integer() || matches!(self, ColumnType::Float | ColumnType::Decimal)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
	pub name: String,
	pub column_type: ColumnType,
	pub nullable: bool,
	pub default: Option<Value>,
	pub primary_key: bool,
	pub read_only: bool,
}

impl Column {
	/// Nullable column without default.
	pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
		Self {
			name: name.into(),
			column_type,
			nullable: true,
			default: None,
			primary_key: false,
			read_only: false,
		}
	}

	pub fn not_null(mut self) -> Self {
		self.nullable = false;
		self
	}

	pub fn default_value(mut self, value: impl Into<Value>) -> Self {
		self.default = Some(value.into());
		self
	}

	pub fn primary_key(mut self) -> Self {
		self.primary_key = true;
		self.nullable = false;
		self.read_only = true;
		self
	}

	pub fn read_only(mut self) -> Self {
		self.read_only = true;
		self
	}

	/// A value must be supplied on create.
	pub fn is_required(&self) -> bool {
		!self.nullable && self.default.is_none() && !self.primary_key
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
	BelongsTo,
	HasOne,
	HasMany,
	HasAndBelongsToMany,
}

impl AssociationKind {
	pub fn is_collection(&self) -> bool {
		matches!(
			self,
			AssociationKind::HasMany | AssociationKind::HasAndBelongsToMany
		)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
	pub name: String,
	pub kind: AssociationKind,
	/// Table of the related model; `None` for polymorphic associations.
	pub related: Option<String>,
	/// Local column backing a `belongs_to`.
	pub foreign_key: Option<String>,
	pub polymorphic: bool,
}

impl Association {
	pub fn belongs_to(name: impl Into<String>, related: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			foreign_key: Some(format!("{}_id", name)),
			name,
			kind: AssociationKind::BelongsTo,
			related: Some(related.into()),
			polymorphic: false,
		}
	}

	/// `belongs_to` whose target type is stored alongside the key.
	pub fn polymorphic(name: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			foreign_key: Some(format!("{}_id", name)),
			name,
			kind: AssociationKind::BelongsTo,
			related: None,
			polymorphic: true,
		}
	}

	pub fn has_one(name: impl Into<String>, related: impl Into<String>) -> Self {
		Self::inverse(name, AssociationKind::HasOne, related)
	}

	pub fn has_many(name: impl Into<String>, related: impl Into<String>) -> Self {
		Self::inverse(name, AssociationKind::HasMany, related)
	}

	pub fn has_and_belongs_to_many(name: impl Into<String>, related: impl Into<String>) -> Self {
		Self::inverse(name, AssociationKind::HasAndBelongsToMany, related)
	}

	fn inverse(name: impl Into<String>, kind: AssociationKind, related: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind,
			related: Some(related.into()),
			foreign_key: None,
			polymorphic: false,
		}
	}

	pub fn with_foreign_key(mut self, column: impl Into<String>) -> Self {
		self.foreign_key = Some(column.into());
		self
	}

	pub fn is_collection(&self) -> bool {
		self.kind.is_collection()
	}

	/// Body key used to assign the association by id (`x_id` / `x_ids`).
	pub fn id_param(&self) -> String {
		if self.is_collection() {
			format!("{}_ids", self.name)
		} else {
			format!("{}_id", self.name)
		}
	}

	/// Body key used for nested attribute writes.
	pub fn attributes_param(&self) -> String {
		format!("{}_attributes", self.name)
	}
}

/// A file attachment slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
	pub name: String,
	pub multiple: bool,
}

/// Schema metadata for one model.
///
/// Implemented by the data layer collaborator. [`TableSchema`] covers the
/// common case.
pub trait ModelSchema: Send + Sync {
	/// Model name, e.g. `User`.
	fn name(&self) -> &str;

	fn table_name(&self) -> &str;

	fn primary_key(&self) -> &str;

	fn columns(&self) -> &[Column];

	fn associations(&self) -> &[Association];

	fn attachments(&self) -> &[Attachment] {
		&[]
	}

	fn rich_text_fields(&self) -> &[String] {
		&[]
	}

	/// Names of computed methods.
	fn methods(&self) -> Vec<&str> {
		Vec::new()
	}

	fn call_method(&self, _name: &str, _record: &Record) -> Option<Value> {
		None
	}

	fn column(&self, name: &str) -> Option<&Column> {
		self.columns().iter().find(|column| column.name == name)
	}

	fn association(&self, name: &str) -> Option<&Association> {
		self.associations()
			.iter()
			.find(|association| association.name == name)
	}

	fn attachment(&self, name: &str) -> Option<&Attachment> {
		self.attachments()
			.iter()
			.find(|attachment| attachment.name == name)
	}

	fn has_method(&self, name: &str) -> bool {
		self.methods().contains(&name)
	}

	fn is_rich_text(&self, name: &str) -> bool {
		self.rich_text_fields().iter().any(|field| field == name)
	}

	/// Checks `record` against column constraints.
	fn validate(&self, record: &Record, partial: bool) -> Result<(), FieldErrors> {
		let errors = validate_columns(self.columns(), record, partial);
		if errors.is_empty() {
			Ok(())
		} else {
			Err(errors)
		}
	}
}

/// Blank checks for non-nullable columns.
///
/// On create every required column must be present and non-blank. With
/// `partial` only the supplied values are checked.
pub fn validate_columns(columns: &[Column], record: &Record, partial: bool) -> FieldErrors {
	let mut errors = FieldErrors::new();
	for column in columns {
		if column.nullable || column.primary_key {
			continue;
		}
		let missing = match record.get(&column.name) {
			Some(Value::Null) => true,
			Some(Value::String(text)) => text.trim().is_empty(),
			Some(_) => false,
			None => !partial && column.is_required(),
		};
		if missing {
			errors
				.entry(column.name.clone())
				.or_default()
				.push("can't be blank".to_string());
		}
	}
	errors
}

/// Builder-style [`ModelSchema`].
///
/// # Examples
///
/// ```
/// use rivet_db::{Association, Column, ColumnType, ModelSchema, TableSchema};
///
/// let schema = TableSchema::new("User", "users")
/// 	.column(Column::new("id", ColumnType::Integer).primary_key())
/// 	.column(Column::new("login", ColumnType::String).not_null())
/// 	.column(Column::new("manager_id", ColumnType::Integer))
/// 	.association(Association::belongs_to("manager", "users"));
///
/// assert_eq!(schema.primary_key(), "id");
/// assert!(ModelSchema::column(&schema, "login").unwrap().is_required());
/// ```
#[derive(Clone)]
pub struct TableSchema {
	name: String,
	table: String,
	primary_key: String,
	columns: Vec<Column>,
	associations: Vec<Association>,
	attachments: Vec<Attachment>,
	rich_text: Vec<String>,
	methods: IndexMap<String, MethodFn>,
	validators: Vec<ValidatorFn>,
}

impl TableSchema {
	pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			table: table.into(),
			primary_key: "id".to_string(),
			columns: Vec::new(),
			associations: Vec::new(),
			attachments: Vec::new(),
			rich_text: Vec::new(),
			methods: IndexMap::new(),
			validators: Vec::new(),
		}
	}

	pub fn column(mut self, column: Column) -> Self {
		if column.primary_key {
			self.primary_key = column.name.clone();
		}
		self.columns.push(column);
		self
	}

	pub fn association(mut self, association: Association) -> Self {
		self.associations.push(association);
		self
	}

	pub fn attachment(mut self, name: impl Into<String>, multiple: bool) -> Self {
		self.attachments.push(Attachment {
			name: name.into(),
			multiple,
		});
		self
	}

	pub fn rich_text(mut self, name: impl Into<String>) -> Self {
		self.rich_text.push(name.into());
		self
	}

	pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
	where
		F: Fn(&Record) -> Value + Send + Sync + 'static,
	{
		self.methods.insert(name.into(), Arc::new(method));
		self
	}

	pub fn validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&Record) -> FieldErrors + Send + Sync + 'static,
	{
		self.validators.push(Arc::new(validator));
		self
	}
}

impl std::fmt::Debug for TableSchema {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TableSchema")
			.field("name", &self.name)
			.field("table", &self.table)
			.field("columns", &self.columns)
			.field("associations", &self.associations)
			.field("methods", &self.methods.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl ModelSchema for TableSchema {
	fn name(&self) -> &str {
		&self.name
	}

	fn table_name(&self) -> &str {
		&self.table
	}

	fn primary_key(&self) -> &str {
		&self.primary_key
	}

	fn columns(&self) -> &[Column] {
		&self.columns
	}

	fn associations(&self) -> &[Association] {
		&self.associations
	}

	fn attachments(&self) -> &[Attachment] {
		&self.attachments
	}

	fn rich_text_fields(&self) -> &[String] {
		&self.rich_text
	}

	fn methods(&self) -> Vec<&str> {
		self.methods.keys().map(String::as_str).collect()
	}

	fn call_method(&self, name: &str, record: &Record) -> Option<Value> {
		self.methods.get(name).map(|method| method(record))
	}

	fn validate(&self, record: &Record, partial: bool) -> Result<(), FieldErrors> {
		let mut errors = validate_columns(&self.columns, record, partial);
		for validator in &self.validators {
			for (field, messages) in validator(record) {
				errors.entry(field).or_default().extend(messages);
			}
		}
		if errors.is_empty() {
			Ok(())
		} else {
			Err(errors)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn users() -> TableSchema {
		TableSchema::new("User", "users")
			.column(Column::new("id", ColumnType::Integer).primary_key())
			.column(Column::new("login", ColumnType::String).not_null())
			.column(Column::new("balance", ColumnType::Decimal).not_null().default_value(0))
			.column(Column::new("manager_id", ColumnType::Integer))
			.association(Association::belongs_to("manager", "users"))
			.association(Association::has_many("posts", "posts"))
			.method("display", |record| {
				json!(format!("@{}", record.get("login").and_then(Value::as_str).unwrap_or("")))
			})
	}

	fn record(value: Value) -> Record {
		match value {
			Value::Object(map) => map,
			_ => unreachable!(),
		}
	}

	#[rstest]
	fn test_association_params(users: TableSchema) {
		let manager = ModelSchema::association(&users, "manager").unwrap();
		assert_eq!(manager.id_param(), "manager_id");
		assert_eq!(manager.attributes_param(), "manager_attributes");
		assert_eq!(manager.foreign_key.as_deref(), Some("manager_id"));

		let posts = ModelSchema::association(&users, "posts").unwrap();
		assert!(posts.is_collection());
		assert_eq!(posts.id_param(), "posts_ids");
	}

	#[rstest]
	fn test_call_method(users: TableSchema) {
		let value = users.call_method("display", &record(json!({"login": "ada"})));
		assert_eq!(value, Some(json!("@ada")));
		assert!(users.has_method("display"));
		assert_eq!(users.call_method("missing", &Record::new()), None);
	}

	#[rstest]
	fn test_validate_required_columns(users: TableSchema) {
		let errors = users.validate(&Record::new(), false).unwrap_err();
		assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["login"]);

		assert!(users.validate(&Record::new(), true).is_ok());
		assert!(users.validate(&record(json!({"login": ""})), true).is_err());
		assert!(users.validate(&record(json!({"login": "ada"})), false).is_ok());
	}

	#[rstest]
	fn test_custom_validators_merge(users: TableSchema) {
		let schema = users.validator(|record| {
			let mut errors = FieldErrors::new();
			if record.get("balance").and_then(Value::as_f64).is_some_and(|b| b < 0.0) {
				errors.insert("balance".into(), vec!["must be positive".into()]);
			}
			errors
		});

		let errors = schema
			.validate(&record(json!({"balance": -1})), false)
			.unwrap_err();
		assert_eq!(errors["login"], vec!["can't be blank".to_string()]);
		assert_eq!(errors["balance"], vec!["must be positive".to_string()]);
	}
}
