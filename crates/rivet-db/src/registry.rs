use indexmap::IndexMap;
use rivet_core::{Error, Result};
use std::sync::Arc;

use crate::schema::ModelSchema;

/// Models known to the application, keyed by model name.
///
/// Built once at startup. Lookups accept either the model name or its table.
#[derive(Default, Clone)]
pub struct SchemaRegistry {
	models: IndexMap<String, Arc<dyn ModelSchema>>,
}

impl SchemaRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(mut self, schema: impl ModelSchema + 'static) -> Self {
		self.models
			.insert(schema.name().to_string(), Arc::new(schema));
		self
	}

	pub fn register_arc(mut self, schema: Arc<dyn ModelSchema>) -> Self {
		self.models.insert(schema.name().to_string(), schema);
		self
	}

	/// Finds a model by name or table name.
	pub fn get(&self, name: &str) -> Option<Arc<dyn ModelSchema>> {
		self.models.get(name).cloned().or_else(|| {
			self.models
				.values()
				.find(|schema| schema.table_name() == name)
				.cloned()
		})
	}

	/// Model served by a controller.
	///
	/// An explicit `model` wins. Otherwise the controller name is tried as a
	/// model or table name, then in singular form (`users` -> `user`), compared
	/// case-insensitively.
	pub fn resolve_for_controller(
		&self,
		controller: &str,
		model: Option<&str>,
	) -> Result<Arc<dyn ModelSchema>> {
		let found = match model {
			Some(model) => self.get(model),
			None => self
				.get(controller)
				.or_else(|| self.find_case_insensitive(&singularize(controller))),
		};
		found.ok_or_else(|| Error::UnknownModel {
			controller: controller.to_string(),
		})
	}

	fn find_case_insensitive(&self, name: &str) -> Option<Arc<dyn ModelSchema>> {
		self.models
			.values()
			.find(|schema| {
				schema.name().eq_ignore_ascii_case(name)
					|| schema.table_name().eq_ignore_ascii_case(name)
			})
			.cloned()
	}

	pub fn len(&self) -> usize {
		self.models.len()
	}

	pub fn is_empty(&self) -> bool {
		self.models.is_empty()
	}
}

fn singularize(name: &str) -> String {
	if let Some(stem) = name.strip_suffix("ies") {
		format!("{}y", stem)
	} else if let Some(stem) = name.strip_suffix("ses") {
		format!("{}s", stem)
	} else if let Some(stem) = name.strip_suffix('s') {
		stem.to_string()
	} else {
		name.to_string()
	}
}
