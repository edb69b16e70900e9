//! Config-driven serialization of records into plain JSON trees.

use rivet_core::{Error, QueryParams, Result};
use rivet_db::{DataSource, ModelSchema, QuerySet, Record};
use rivet_fields::FieldResolver;
use serde_json::Value;

use crate::config::{SerializerConfig, SerializerOptions};
use crate::method_field::{MethodFieldError, MethodFieldRegistry};

/// Converts an input into its serialized representation.
pub trait Serializer {
	type Input;
	type Output;

	fn serialize(&self, input: &Self::Input) -> Result<Self::Output>;
}

/// Serializes records of a controller's model.
///
/// The shape comes from [`SerializerOptions::resolve`]; whether the single or
/// plural config applies follows the input unless [`many`](Self::many) pins
/// it.
pub struct NativeSerializer<'a> {
	resolver: &'a FieldResolver,
	options: &'a SerializerOptions,
	source: &'a dyn DataSource,
	methods: Option<&'a MethodFieldRegistry>,
	action: Option<&'a str>,
	params: Option<&'a QueryParams>,
	config: Option<SerializerConfig>,
	many: Option<bool>,
}

impl<'a> NativeSerializer<'a> {
	pub fn new(
		resolver: &'a FieldResolver,
		options: &'a SerializerOptions,
		source: &'a dyn DataSource,
	) -> Self {
		Self {
			resolver,
			options,
			source,
			methods: None,
			action: None,
			params: None,
			config: None,
			many: None,
		}
	}

	pub fn methods(mut self, methods: &'a MethodFieldRegistry) -> Self {
		self.methods = Some(methods);
		self
	}

	pub fn action(mut self, action: &'a str) -> Self {
		self.action = Some(action);
		self
	}

	pub fn params(mut self, params: &'a QueryParams) -> Self {
		self.params = Some(params);
		self
	}

	/// Per-call config, overriding everything the controller declares.
	pub fn config(mut self, config: SerializerConfig) -> Self {
		self.config = Some(config);
		self
	}

	pub fn many(mut self, many: bool) -> Self {
		self.many = Some(many);
		self
	}

	pub fn get_serializer_config(&self, many: bool) -> SerializerConfig {
		self.options.resolve(
			self.config.as_ref(),
			self.resolver,
			self.action,
			self.many.unwrap_or(many),
			self.params,
		)
	}

	fn associations_limit(&self) -> Option<usize> {
		self.options.associations_limit_for(self.params)
	}

	/// Adds eager loading of the included associations to a collection query.
	///
	/// To-many associations are left out when an associations limit applies,
	/// since those are fetched per record with the limit.
	pub fn prefetch(&self, queryset: QuerySet, many: bool) -> QuerySet {
		let config = self.get_serializer_config(many);
		let limited = self.associations_limit().is_some();
		let schema = self.resolver.schema();
		let associations: Vec<&String> = config
			.include
			.keys()
			.filter(|name| {
				!(limited
					&& schema
						.association(name)
						.is_some_and(|association| association.is_collection()))
			})
			.collect();
		if associations.is_empty() {
			return queryset;
		}
		queryset.prefetch_related(associations)
	}

	pub fn serialize_record(&self, record: &Record) -> Result<Value> {
		let config = self.get_serializer_config(false);
		let rendered = self.render(Some(self.resolver.schema()), &config, record)?;
		Ok(Value::Object(rendered))
	}

	/// Serializes each record with the plural config.
	pub fn serialize_list(&self, records: &[Record]) -> Result<Vec<Value>> {
		let config = self.get_serializer_config(true);
		let schema = self.resolver.schema();
		tracing::trace!(
			model = schema.name(),
			records = records.len(),
			"serializing collection"
		);
		records
			.iter()
			.map(|record| self.render(Some(schema), &config, record).map(Value::Object))
			.collect()
	}

	pub fn serialize_records(&self, records: &[Record]) -> Result<Value> {
		self.serialize_list(records).map(Value::Array)
	}

	fn render(
		&self,
		schema: Option<&dyn ModelSchema>,
		config: &SerializerConfig,
		record: &Record,
	) -> Result<Record> {
		let mut output = Record::new();
		let excluded = |name: &str| config.except.iter().any(|except| except == name);

		match (&config.only, schema) {
			(Some(only), _) => {
				for name in only.iter().filter(|name| !excluded(name.as_str())) {
					match record.get(name) {
						Some(value) => {
							output.insert(name.clone(), value.clone());
						}
						None if schema.is_some_and(|schema| schema.column(name).is_some()) => {
							output.insert(name.clone(), Value::Null);
						}
						None => {}
					}
				}
			}
			(None, Some(schema)) => {
				for column in schema.columns().iter().filter(|column| !excluded(column.name.as_str())) {
					let value = record.get(&column.name).cloned().unwrap_or(Value::Null);
					output.insert(column.name.clone(), value);
				}
			}
			(None, None) => {
				for (name, value) in record {
					if !excluded(name.as_str()) && !config.include.contains_key(name) {
						output.insert(name.clone(), value.clone());
					}
				}
			}
		}

		for (name, nested) in &config.include {
			self.render_association(schema, name, nested, record, &mut output)?;
		}

		for method in &config.methods {
			let value = schema
				.and_then(|schema| schema.call_method(method, record))
				.or_else(|| record.get(method).cloned())
				.unwrap_or(Value::Null);
			output.insert(method.clone(), value);
		}

		for field in &config.serializer_methods {
			let value = match self.methods {
				Some(registry) => registry.get_value(field, record)?,
				None => return Err(MethodFieldError::MethodNotFound(field.clone()).into()),
			};
			output.insert(field.clone(), value);
		}

		Ok(output)
	}

	fn render_association(
		&self,
		schema: Option<&dyn ModelSchema>,
		name: &str,
		config: &SerializerConfig,
		record: &Record,
		output: &mut Record,
	) -> Result<()> {
		let association = schema.and_then(|schema| schema.association(name));
		let collection = match association {
			Some(association) => association.is_collection(),
			None => matches!(record.get(name), Some(Value::Array(_))),
		};
		let related = association
			.and_then(|association| association.related.as_deref())
			.and_then(|table| self.resolver.registry().get(table));

		let limit = self.associations_limit().filter(|_| collection);
		let rows = match (schema, limit, record.get(name)) {
			(Some(schema), Some(limit), _) => {
				self.source.fetch_related(schema, record, name, Some(limit))?
			}
			(_, _, Some(Value::Array(items))) => items
				.iter()
				.filter_map(|item| item.as_object().cloned())
				.collect(),
			(_, _, Some(Value::Object(item))) => vec![item.clone()],
			(_, _, Some(_)) => Vec::new(),
			(Some(schema), None, None) => self.source.fetch_related(schema, record, name, None)?,
			(None, _, None) => Vec::new(),
		};

		let mut rendered = rows
			.iter()
			.map(|row| self.render(related.as_deref(), config, row).map(Value::Object))
			.collect::<Result<Vec<_>>>()?;
		let value = if collection {
			Value::Array(rendered)
		} else if rendered.is_empty() {
			Value::Null
		} else {
			rendered.swap_remove(0)
		};
		output.insert(name.to_string(), value);

		if collection && self.options.include_associations_count {
			if let Some(schema) = schema {
				let count = self.source.count_related(schema, record, name)?;
				output.insert(format!("{name}.count"), Value::from(count));
			}
		}
		Ok(())
	}
}

impl Serializer for NativeSerializer<'_> {
	type Input = Value;
	type Output = Value;

	/// Serializes a record or a list of records.
	///
	/// `null` is a caller bug: a missing record must surface as
	/// `RecordNotFound` before serialization.
	fn serialize(&self, input: &Value) -> Result<Value> {
		match input {
			Value::Null => Err(Error::NilPayload),
			Value::Object(record) => self.serialize_record(record),
			Value::Array(items) => {
				let records = items
					.iter()
					.map(|item| {
						item.as_object().cloned().ok_or_else(|| {
							Error::InvalidParameter("serializer input must contain records".to_string())
						})
					})
					.collect::<Result<Vec<_>>>()?;
				self.serialize_records(&records)
			}
			_ => Err(Error::InvalidParameter(
				"serializer input must be a record or a list of records".to_string(),
			)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::method_field::SerializerMethodField;
	use rivet_conf::Settings;
	use rivet_db::{Association, Column, ColumnType, MemoryDataSource, SchemaRegistry, TableSchema};
	use rivet_fields::{FieldConfig, FieldOptions, FieldSpec};
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::sync::Arc;

	fn registry() -> Arc<SchemaRegistry> {
		Arc::new(
			SchemaRegistry::new()
				.register(
					TableSchema::new("User", "users")
						.column(Column::new("id", ColumnType::Integer).primary_key())
						.column(Column::new("login", ColumnType::String))
						.column(Column::new("balance", ColumnType::Integer))
						.column(Column::new("password", ColumnType::String))
						.column(Column::new("manager_id", ColumnType::Integer))
						.association(Association::belongs_to("manager", "users"))
						.association(Association::has_many("posts", "posts"))
						.method("initial", |record| {
							json!(record["login"].as_str().and_then(|login| login.get(..1)))
						}),
				)
				.register(
					TableSchema::new("Post", "posts")
						.column(Column::new("id", ColumnType::Integer).primary_key())
						.column(Column::new("title", ColumnType::String))
						.column(Column::new("body", ColumnType::Text)),
				),
		)
	}

	fn resolver_with(options: FieldOptions) -> FieldResolver {
		let registry = registry();
		let schema = registry.get("User").unwrap();
		FieldResolver::new("users", schema, registry, Arc::new(Settings::default()), options)
	}

	#[fixture]
	fn resolver() -> FieldResolver {
		resolver_with(FieldOptions::default())
	}

	#[fixture]
	fn source() -> MemoryDataSource {
		MemoryDataSource::new().with_rows("users", vec![
			json!({
				"id": 1, "login": "ada", "balance": 50, "password": "s3cret", "manager_id": null,
				"manager": null,
				"posts": [
					{"id": 10, "title": "one", "body": "a"},
					{"id": 11, "title": "two", "body": "b"},
					{"id": 12, "title": "three", "body": "c"},
				],
			}),
			json!({
				"id": 2, "login": "bob", "balance": 5, "password": "hunter2", "manager_id": 1,
				"manager": {"id": 1, "login": "ada"},
				"posts": [],
			}),
		])
	}

	fn rows(source: &MemoryDataSource) -> Vec<Record> {
		source.fetch(&QuerySet::new("users")).unwrap()
	}

	fn keys(value: &Value) -> Vec<&str> {
		value
			.as_object()
			.map(|object| object.keys().map(String::as_str).collect())
			.unwrap_or_default()
	}

	#[rstest]
	fn test_derived_shape(resolver: FieldResolver, source: MemoryDataSource) {
		let options = SerializerOptions::new();
		let serializer = NativeSerializer::new(&resolver, &options, &source);

		let output = serializer.serialize_record(&rows(&source)[1]).unwrap();

		assert_eq!(keys(&output), vec!["id", "login", "balance", "password", "manager", "posts"]);
		assert_eq!(output["manager"], json!({"id": 1, "login": "ada"}));
		assert_eq!(output["posts"], json!([]));
	}

	#[rstest]
	fn test_only_param(resolver: FieldResolver, source: MemoryDataSource) {
		let options = SerializerOptions::new();
		let params = QueryParams::new().with("only", "id,login");
		let serializer = NativeSerializer::new(&resolver, &options, &source).params(&params);

		let output = serializer.serialize_record(&rows(&source)[0]).unwrap();

		assert_eq!(output, json!({"id": 1, "login": "ada"}));
	}

	#[rstest]
	fn test_except_param_is_additive(resolver: FieldResolver, source: MemoryDataSource) {
		let options = SerializerOptions::new().config(SerializerConfig::new().except(["password"]));
		let params = QueryParams::new().with("except", "balance");
		let serializer = NativeSerializer::new(&resolver, &options, &source).params(&params);

		let output = serializer.serialize_record(&rows(&source)[0]).unwrap();

		assert_eq!(keys(&output), vec!["id", "login", "manager_id"]);
	}

	#[rstest]
	#[case("id,password", json!({"id": 1}))]
	#[case("id,posts", json!({"id": 1}))]
	#[case("login,manager_id", json!({"login": "ada", "manager_id": null}))]
	fn test_only_param_keeps_configured_exclusions(
		resolver: FieldResolver,
		source: MemoryDataSource,
		#[case] requested: &str,
		#[case] expected: Value,
	) {
		let options = SerializerOptions::new().config(SerializerConfig::new().except(["password"]));
		let params = QueryParams::new().with("only", requested);
		let serializer = NativeSerializer::new(&resolver, &options, &source).params(&params);

		let output = serializer.serialize_record(&rows(&source)[0]).unwrap();

		assert_eq!(output, expected);
	}

	#[rstest]
	fn test_action_config_wins_for_update(resolver: FieldResolver, source: MemoryDataSource) {
		let options = SerializerOptions::new()
			.config(SerializerConfig::new().only(["balance"]))
			.singular_config(SerializerConfig::new().only(["login"]))
			.plural_config(SerializerConfig::new().only(["password"]))
			.action_config("update", SerializerConfig::new().only(["id"]));
		let record = rows(&source).remove(0);

		let updated = NativeSerializer::new(&resolver, &options, &source)
			.action("update")
			.serialize(&Value::Object(record.clone()))
			.unwrap();
		let shown = NativeSerializer::new(&resolver, &options, &source)
			.action("show")
			.serialize(&Value::Object(record))
			.unwrap();

		assert_eq!(updated, json!({"id": 1}));
		assert_eq!(shown, json!({"login": "ada"}));
	}

	#[rstest]
	fn test_many_follows_input(resolver: FieldResolver, source: MemoryDataSource) {
		let options = SerializerOptions::new()
			.singular_config(SerializerConfig::new().only(["login"]))
			.plural_config(SerializerConfig::new().only(["id"]));
		let serializer = NativeSerializer::new(&resolver, &options, &source);
		let records: Vec<Value> = rows(&source).into_iter().map(Value::Object).collect();

		assert_eq!(serializer.serialize(&Value::Array(records.clone())).unwrap(), json!([{"id": 1}, {"id": 2}]));
		assert_eq!(serializer.serialize(&records[0]).unwrap(), json!({"login": "ada"}));

		let pinned = NativeSerializer::new(&resolver, &options, &source).many(true);
		assert_eq!(pinned.serialize(&records[0]).unwrap(), json!({"id": 1}));
	}

	#[rstest]
	fn test_eager_loaded_associations_skip_related_fetches(resolver: FieldResolver, source: MemoryDataSource) {
		let options = SerializerOptions::new();
		let serializer = NativeSerializer::new(&resolver, &options, &source);
		let queryset = serializer.prefetch(QuerySet::new("users"), true);

		let output = serializer.serialize_records(&source.fetch(&queryset).unwrap()).unwrap();

		assert_eq!(queryset.prefetched(), &["manager".to_string(), "posts".to_string()]);
		assert_eq!(output[0]["posts"].as_array().map(Vec::len), Some(3));
		assert_eq!(source.related_fetch_count(), 0);
	}

	#[rstest]
	fn test_associations_limit_fetches_per_record(resolver: FieldResolver, source: MemoryDataSource) {
		let options = SerializerOptions::new()
			.associations_limit(2)
			.include_associations_count(true);
		let serializer = NativeSerializer::new(&resolver, &options, &source);
		let queryset = serializer.prefetch(QuerySet::new("users"), true);

		let output = serializer.serialize_records(&source.fetch(&queryset).unwrap()).unwrap();

		assert_eq!(queryset.prefetched(), &["manager".to_string()]);
		assert_eq!(output[0]["posts"], json!([{"id": 10, "title": "one"}, {"id": 11, "title": "two"}]));
		assert_eq!(output[0]["posts.count"], json!(3));
		assert_eq!(output[1]["posts.count"], json!(0));
		assert_eq!(source.related_fetch_count(), 2);
	}

	#[rstest]
	fn test_serializer_methods_merge_last(resolver: FieldResolver, source: MemoryDataSource) {
		let options = SerializerOptions::new().config(
			SerializerConfig::new()
				.only(["id", "login"])
				.methods(["initial"])
				.serializer_methods(["login", "rich"]),
		);
		let mut methods = MethodFieldRegistry::new()
			.method("login", |record| json!(format!("@{}", record["login"].as_str().unwrap_or_default())))
			.method("wealth", |record| json!(record["balance"].as_i64().unwrap_or_default() > 10));
		methods.register(SerializerMethodField::new("rich").method_name("wealth"));
		let serializer = NativeSerializer::new(&resolver, &options, &source).methods(&methods);

		let output = serializer.serialize_record(&rows(&source)[0]).unwrap();

		assert_eq!(output, json!({"id": 1, "login": "@ada", "initial": "a", "rich": true}));
	}

	#[rstest]
	fn test_unregistered_serializer_method(resolver: FieldResolver, source: MemoryDataSource) {
		let options = SerializerOptions::new().config(SerializerConfig::new().serializer_methods(["nope"]));
		let serializer = NativeSerializer::new(&resolver, &options, &source);

		let error = serializer.serialize_record(&rows(&source)[0]).unwrap_err();

		assert!(matches!(error, Error::Configuration(_)));
	}

	#[rstest]
	fn test_write_only_never_serialized(source: MemoryDataSource) {
		let mut options = FieldOptions::default();
		options.fields = Some(FieldSpec::list(["id", "login", "password"]));
		options
			.field_config
			.insert("password".to_string(), FieldConfig::new().write_only());
		let resolver = resolver_with(options);
		let serializer_options = SerializerOptions::new();
		let params = QueryParams::new().with("only", "id,password");
		let serializer = NativeSerializer::new(&resolver, &serializer_options, &source).params(&params);

		let output = serializer.serialize_record(&rows(&source)[0]).unwrap();

		assert_eq!(output, json!({"id": 1}));
	}

	#[rstest]
	#[case(json!(null))]
	fn test_nil_payload(resolver: FieldResolver, source: MemoryDataSource, #[case] input: Value) {
		let options = SerializerOptions::new();
		let serializer = NativeSerializer::new(&resolver, &options, &source);
		assert!(matches!(serializer.serialize(&input), Err(Error::NilPayload)));
	}

	#[rstest]
	#[case(json!(3))]
	#[case(json!([1, 2]))]
	fn test_non_record_input(resolver: FieldResolver, source: MemoryDataSource, #[case] input: Value) {
		let options = SerializerOptions::new();
		let serializer = NativeSerializer::new(&resolver, &options, &source);
		assert!(matches!(serializer.serialize(&input), Err(Error::InvalidParameter(_))));
	}
}
