//! A configured controller: the model, field resolver, filter chain and data
//! source that handlers work with.

use rivet_conf::Settings;
use rivet_core::{Error, Result};
use rivet_db::{
	DataSource, Filter, FilterOperator, ModelSchema, QuerySet, Record, SchemaRegistry, found,
};
use rivet_fields::{AllowedParameters, FieldResolver, extract_root};
use rivet_filters::{FilterBackend, FilterChain, FilterContext, coerce};
use rivet_serializers::{MethodFieldRegistry, NativeSerializer};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::actions::ActionType;
use crate::config::ControllerConfig;
use crate::request::Request;

/// Path parameter carrying the lookup value of detail routes.
pub const LOOKUP_PARAM: &str = "id";

pub struct Controller {
	config: ControllerConfig,
	resolver: FieldResolver,
	filters: FilterChain,
	source: Arc<dyn DataSource>,
	methods: MethodFieldRegistry,
}

impl Controller {
	/// Resolves the controller's model and prepares its collaborators.
	///
	/// Fails with [`Error::UnknownModel`] when no model can be inferred.
	pub fn new(
		config: ControllerConfig,
		registry: Arc<SchemaRegistry>,
		settings: Arc<Settings>,
		source: Arc<dyn DataSource>,
	) -> Result<Self> {
		let schema = registry.resolve_for_controller(&config.name, config.model.as_deref())?;
		tracing::debug!(controller = %config.name, model = schema.name(), "controller configured");

		let resolver = FieldResolver::new(
			config.name.clone(),
			schema,
			registry,
			settings,
			config.field_options.clone(),
		);
		let filters = config.filter_chain();
		Ok(Self {
			config,
			resolver,
			filters,
			source,
			methods: MethodFieldRegistry::new(),
		})
	}

	/// Builds controller `name` from the `[controllers.<name>]` settings table.
	pub fn from_settings(
		name: &str,
		registry: Arc<SchemaRegistry>,
		settings: Arc<Settings>,
		source: Arc<dyn DataSource>,
	) -> Result<Self> {
		let config = ControllerConfig::load(name, &settings)?;
		Self::new(config, registry, settings, source)
	}

	/// Registers serializer method fields.
	pub fn with_methods(mut self, methods: MethodFieldRegistry) -> Self {
		self.methods = methods;
		self
	}

	pub fn name(&self) -> &str {
		&self.config.name
	}

	pub fn config(&self) -> &ControllerConfig {
		&self.config
	}

	pub fn resolver(&self) -> &FieldResolver {
		&self.resolver
	}

	pub fn schema(&self) -> &dyn ModelSchema {
		self.resolver.schema()
	}

	pub fn source(&self) -> &dyn DataSource {
		self.source.as_ref()
	}

	pub fn settings(&self) -> &Settings {
		self.resolver.settings()
	}

	pub fn get_fields(&self, action: ActionType) -> Vec<String> {
		self.resolver.resolve_fields(Some(action.name()))
	}

	/// The unfiltered collection.
	pub fn get_queryset(&self) -> QuerySet {
		QuerySet::new(self.schema().table_name())
	}

	/// The collection with the filter chain applied for this request.
	pub fn filtered_queryset(&self, request: &Request, action: ActionType) -> Result<QuerySet> {
		let fields = self.get_fields(action);
		let context = FilterContext::new(&request.query, &self.resolver, &fields);
		self.filters.filter_queryset(&context, self.get_queryset())
	}

	pub fn serializer<'a>(&'a self, request: &'a Request, action: ActionType) -> NativeSerializer<'a> {
		NativeSerializer::new(&self.resolver, &self.config.serializer, self.source.as_ref())
			.methods(&self.methods)
			.action(action.name())
			.params(&request.query)
	}

	pub fn lookup_field(&self) -> &str {
		self.config
			.lookup_field
			.as_deref()
			.unwrap_or_else(|| self.schema().primary_key())
	}

	/// The record addressed by the request's lookup path parameter.
	pub fn get_record(&self, request: &Request) -> Result<Record> {
		let raw = request
			.path_param(LOOKUP_PARAM)
			.ok_or_else(|| Error::ParameterMissing(LOOKUP_PARAM.to_string()))?;
		let schema = self.schema();
		let field = self.lookup_field();
		let value = coerce(schema.column(field).map(|column| column.column_type), raw);

		let queryset = self
			.get_queryset()
			.filter(Filter::new(field, FilterOperator::Eq, value));
		found(
			self.source.first(&queryset)?,
			schema.name(),
			format!("{field}={raw}"),
		)
	}

	/// Primary key value of a loaded record.
	pub fn record_key(&self, record: &Record) -> Result<Value> {
		let primary_key = self.schema().primary_key();
		match record.get(primary_key) {
			Some(Value::Null) | None => Err(Error::Database(format!(
				"{} record without `{primary_key}`",
				self.schema().name()
			))),
			Some(key) => Ok(key.clone()),
		}
	}

	pub fn allowed_parameters(&self, action: ActionType) -> Result<AllowedParameters> {
		AllowedParameters::for_action(&self.resolver, Some(action.name()))
	}

	/// The write payload: the body, unwrapped from `body_root` when configured.
	pub fn get_body(&self, request: &Request) -> Result<Value> {
		let body = request.body.clone().unwrap_or_else(|| Value::Object(Map::new()));
		match &self.config.body_root {
			Some(root) => extract_root(&body, root).cloned(),
			None => Ok(body),
		}
	}
}
