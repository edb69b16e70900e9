//! Serializer configuration and its precedence rules.

use indexmap::{IndexMap, IndexSet};
use rivet_core::QueryParams;
use rivet_fields::{FieldKind, FieldResolver, action_aliases};
use serde::{Deserialize, Serialize};

/// Shape of a serialized record.
///
/// `only` lists the columns to emit (all columns when unset), `except` removes
/// columns, `include` embeds associations with their own nested shape,
/// `methods` emits model methods and `serializer_methods` emits fields
/// computed by a [`MethodFieldRegistry`](crate::MethodFieldRegistry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub only: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub except: Vec<String>,
	#[serde(skip_serializing_if = "IndexMap::is_empty")]
	pub include: IndexMap<String, SerializerConfig>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub methods: Vec<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub serializer_methods: Vec<String>,
}

fn to_strings<I, S>(items: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	items.into_iter().map(Into::into).collect()
}

impl SerializerConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn only<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.only = Some(to_strings(fields));
		self
	}

	pub fn except<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.except = to_strings(fields);
		self
	}

	pub fn include(mut self, association: impl Into<String>, config: SerializerConfig) -> Self {
		self.include.insert(association.into(), config);
		self
	}

	pub fn methods<I, S>(mut self, methods: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.methods = to_strings(methods);
		self
	}

	pub fn serializer_methods<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.serializer_methods = to_strings(fields);
		self
	}

	/// Subtracts `fields` from every part of the shape.
	///
	/// With an explicit `only` the names leave it; otherwise they are added
	/// to `except`, keeping what was already excluded.
	pub fn apply_except(&mut self, fields: &[String]) {
		let excluded = |name: &String| fields.contains(name);
		match &mut self.only {
			Some(only) => only.retain(|name| !excluded(name)),
			None => {
				for field in fields {
					if !self.except.contains(field) {
						self.except.push(field.clone());
					}
				}
			}
		}
		self.include.retain(|name, _| !excluded(name));
		self.methods.retain(|name| !excluded(name));
		self.serializer_methods.retain(|name| !excluded(name));
	}

	/// Restricts every part of the shape to `fields`.
	///
	/// Without an explicit `only` the restriction starts from `columns` minus
	/// `except`, so narrowing never re-exposes an excluded column. Requested
	/// names that are neither columns nor part of the shape are dropped. The
	/// resulting `only` replaces any `except` list.
	pub fn apply_only(&mut self, fields: &[String], columns: &[&str]) {
		let kept = |name: &str| fields.iter().any(|field| field == name);
		self.only = Some(match self.only.take() {
			Some(mut only) => {
				only.retain(|name| kept(name.as_str()));
				only
			}
			None => columns
				.iter()
				.filter(|column| kept(**column))
				.filter(|column| !self.except.iter().any(|name| name == *column))
				.filter(|column| !self.include.contains_key(**column))
				.filter(|column| !self.methods.iter().any(|name| name == *column))
				.filter(|column| !self.serializer_methods.iter().any(|name| name == *column))
				.map(|column| column.to_string())
				.collect(),
		});
		self.except.clear();
		self.include.retain(|name, _| kept(name.as_str()));
		self.methods.retain(|name| kept(name.as_str()));
		self.serializer_methods.retain(|name| kept(name.as_str()));
	}

	/// Names this shape can emit at the top level.
	pub fn keys(&self) -> Vec<&str> {
		let mut keys: IndexSet<&str> = IndexSet::new();
		if let Some(only) = &self.only {
			keys.extend(only.iter().map(String::as_str));
		}
		keys.extend(self.include.keys().map(String::as_str));
		keys.extend(self.methods.iter().map(String::as_str));
		keys.extend(self.serializer_methods.iter().map(String::as_str));
		keys.into_iter().collect()
	}
}

/// Serializer settings declared by a controller.
///
/// The configs are consulted in precedence order by [`resolve`]; the query
/// parameter names enable request-time narrowing.
///
/// [`resolve`]: Self::resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerOptions {
	/// Unscoped default shape.
	pub config: Option<SerializerConfig>,
	/// Shape for single records.
	pub singular_config: Option<SerializerConfig>,
	/// Shape for collections.
	pub plural_config: Option<SerializerConfig>,
	/// Shapes keyed by action name.
	pub action_config: IndexMap<String, SerializerConfig>,
	pub only_query_param: Option<String>,
	pub except_query_param: Option<String>,
	/// Cap on related records serialized per parent for to-many associations.
	pub associations_limit: Option<usize>,
	/// Query parameter overriding `associations_limit` per request.
	pub associations_limit_query_param: Option<String>,
	/// Emit `<association>.count` next to to-many associations.
	pub include_associations_count: bool,
}

impl Default for SerializerOptions {
	fn default() -> Self {
		Self {
			config: None,
			singular_config: None,
			plural_config: None,
			action_config: IndexMap::new(),
			only_query_param: Some("only".to_string()),
			except_query_param: Some("except".to_string()),
			associations_limit: None,
			associations_limit_query_param: None,
			include_associations_count: false,
		}
	}
}

impl SerializerOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn config(mut self, config: SerializerConfig) -> Self {
		self.config = Some(config);
		self
	}

	pub fn singular_config(mut self, config: SerializerConfig) -> Self {
		self.singular_config = Some(config);
		self
	}

	pub fn plural_config(mut self, config: SerializerConfig) -> Self {
		self.plural_config = Some(config);
		self
	}

	pub fn action_config(mut self, action: impl Into<String>, config: SerializerConfig) -> Self {
		self.action_config.insert(action.into(), config);
		self
	}

	pub fn associations_limit(mut self, limit: usize) -> Self {
		self.associations_limit = Some(limit);
		self
	}

	pub fn associations_limit_query_param(mut self, param: impl Into<String>) -> Self {
		self.associations_limit_query_param = Some(param.into());
		self
	}

	pub fn include_associations_count(mut self, include: bool) -> Self {
		self.include_associations_count = include;
		self
	}

	/// The declared shape for an action, most specific first.
	///
	/// Action config (including its alias) wins over the singular or plural
	/// config, which wins over the unscoped default. `None` when nothing was
	/// declared.
	pub fn declared(&self, action: Option<&str>, many: bool) -> Option<&SerializerConfig> {
		let by_action = action.and_then(|action| {
			action_aliases(action)
				.into_iter()
				.find_map(|name| self.action_config.get(name))
		});
		let by_arity = if many {
			self.plural_config.as_ref()
		} else {
			self.singular_config.as_ref()
		};
		by_action.or(by_arity).or(self.config.as_ref())
	}

	/// Resolves the effective shape for a request.
	///
	/// An explicit config beats everything declared; without any declaration
	/// the shape is derived from the resolved fields. The request's `except`
	/// and `only` parameters narrow the result and write-only fields are
	/// always removed.
	pub fn resolve(
		&self,
		explicit: Option<&SerializerConfig>,
		resolver: &FieldResolver,
		action: Option<&str>,
		many: bool,
		params: Option<&QueryParams>,
	) -> SerializerConfig {
		let mut config = match explicit.or_else(|| self.declared(action, many)) {
			Some(config) => config.clone(),
			None => derive_config(resolver, action),
		};

		if let Some(params) = params {
			let requested = |param: &Option<String>| {
				param
					.as_deref()
					.and_then(|param| params.get_csv(param))
					.filter(|fields| !fields.is_empty())
			};
			if let Some(except) = requested(&self.except_query_param) {
				config.apply_except(&except);
			}
			if let Some(only) = requested(&self.only_query_param) {
				let columns: Vec<&str> = resolver
					.schema()
					.columns()
					.iter()
					.map(|column| column.name.as_str())
					.collect();
				config.apply_only(&only, &columns);
			}
		}

		let write_only: Vec<String> = resolver
			.options()
			.field_config
			.iter()
			.filter(|(_, field)| field.write_only)
			.map(|(name, _)| name.clone())
			.collect();
		if !write_only.is_empty() {
			config.apply_except(&write_only);
		}
		config
	}

	/// Per-parent limit for to-many associations in this request.
	pub fn associations_limit_for(&self, params: Option<&QueryParams>) -> Option<usize> {
		let requested = self
			.associations_limit_query_param
			.as_deref()
			.zip(params)
			.and_then(|(param, params)| params.get_trimmed(param))
			.and_then(|raw| raw.parse::<usize>().ok());
		requested.or(self.associations_limit)
	}
}

/// Builds a shape from the fields resolved for `action`.
///
/// Columns become `only`, associations are included with their sub-fields
/// split into related columns and related methods, everything else is emitted
/// as a method.
pub fn derive_config(resolver: &FieldResolver, action: Option<&str>) -> SerializerConfig {
	let mut only = Vec::new();
	let mut config = SerializerConfig::new();

	for field in resolver.resolve_fields(action) {
		if resolver.options().is_write_only(&field) {
			continue;
		}
		match resolver.kind(&field) {
			FieldKind::Column => only.push(field),
			FieldKind::Association => {
				let related = resolver.related_schema(&field);
				let (columns, methods): (Vec<String>, Vec<String>) = resolver
					.sub_fields(&field)
					.into_iter()
					.partition(|sub| match &related {
						Some(schema) => schema.column(sub).is_some(),
						None => true,
					});
				config
					.include
					.insert(field, SerializerConfig::new().only(columns).methods(methods));
			}
			FieldKind::Method | FieldKind::Attachment | FieldKind::RichText | FieldKind::Computed => {
				config.methods.push(field)
			}
		}
	}

	config.only = Some(only);
	config
}
