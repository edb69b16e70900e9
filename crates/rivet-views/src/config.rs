//! Per-controller configuration.
//!
//! A [`ControllerConfig`] is built once at startup, either programmatically
//! or from the global settings merged with the `[controllers.<name>]` table,
//! and never mutated afterwards.

use rivet_conf::Settings;
use rivet_conf::sources::deep_merge;
use rivet_core::{Error, Result};
use rivet_fields::{FieldConfig, FieldOptions, FieldSpec};
use rivet_filters::{BuiltinFilter, FilterChain, ModelFilter, OrderingFilter, SearchFilter};
use rivet_pagination::PageNumberPagination;
use rivet_serializers::SerializerOptions;
use serde::{Deserialize, Serialize};

use crate::actions::Capabilities;

/// Immutable configuration of one controller.
///
/// # Examples
///
/// ```
/// use rivet_conf::Settings;
/// use rivet_views::ControllerConfig;
///
/// let settings = Settings::from_toml_str(
/// 	"[controllers.users]\nlookup_field = \"login\"\n[controllers.users.pagination]\npage_size = 5\n",
/// )
/// .unwrap();
/// let config = ControllerConfig::load("users", &settings).unwrap();
///
/// assert_eq!(config.lookup_field.as_deref(), Some("login"));
/// assert_eq!(config.pagination.page_size, 5);
/// assert!(config.field_options.permit_id_assignment);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
	pub name: String,
	/// Model name or table; inferred from `name` when unset.
	pub model: Option<String>,
	#[serde(flatten)]
	pub field_options: FieldOptions,
	pub actions: Capabilities,
	/// Filter backends, applied in this order.
	pub filter_backends: Vec<BuiltinFilter>,
	pub filterset_fields: Option<Vec<String>>,
	pub ordering_fields: Option<Vec<String>>,
	/// Ordering tokens used when the request names none.
	pub ordering: Vec<String>,
	pub ordering_query_param: String,
	pub ordering_no_reorder: bool,
	pub search_fields: Option<Vec<String>>,
	pub search_query_param: String,
	pub search_case_insensitive: bool,
	pub paginate: bool,
	pub pagination: PageNumberPagination,
	pub serializer: SerializerOptions,
	/// Column used to look up single records; the primary key when unset.
	pub lookup_field: Option<String>,
	/// Key wrapping request bodies of writes (`{"user": {...}}`).
	pub body_root: Option<String>,
}

impl Default for ControllerConfig {
	fn default() -> Self {
		Self {
			name: String::new(),
			model: None,
			field_options: FieldOptions::default(),
			actions: Capabilities::all(),
			filter_backends: vec![
				BuiltinFilter::Model,
				BuiltinFilter::Ordering,
				BuiltinFilter::Search,
			],
			filterset_fields: None,
			ordering_fields: None,
			ordering: Vec::new(),
			ordering_query_param: "ordering".to_string(),
			ordering_no_reorder: false,
			search_fields: None,
			search_query_param: "search".to_string(),
			search_case_insensitive: false,
			paginate: true,
			pagination: PageNumberPagination::default(),
			serializer: SerializerOptions::default(),
			lookup_field: None,
			body_root: None,
		}
	}
}

fn to_strings<I, S>(items: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	items.into_iter().map(Into::into).collect()
}

impl ControllerConfig {
	/// Defaults for controller `name`, seeded from the global settings.
	pub fn new(name: impl Into<String>, settings: &Settings) -> Self {
		let mut pagination = PageNumberPagination::new().page_size(settings.default_page_size);
		pagination.max_page_size = settings.max_page_size;

		let mut field_options = FieldOptions::default();
		field_options.permit_id_assignment = settings.permit_id_assignment;
		field_options.permit_nested_attributes_assignment =
			settings.permit_nested_attributes_assignment;

		Self {
			name: name.into(),
			field_options,
			pagination,
			..Self::default()
		}
	}

	/// Defaults for `name` with the `[controllers.<name>]` table merged over them.
	pub fn load(name: &str, settings: &Settings) -> Result<Self> {
		let invalid = |e: serde_json::Error| {
			Error::Configuration(format!("controller `{name}` configuration: {e}"))
		};
		let mut merged = serde_json::to_value(Self::new(name, settings)).map_err(invalid)?;
		if let Some(overrides) = settings.controller_overrides(name) {
			deep_merge(&mut merged, overrides.clone());
		}
		let mut config: Self = serde_json::from_value(merged).map_err(invalid)?;
		config.name = name.to_string();
		Ok(config)
	}

	pub fn model(mut self, model: impl Into<String>) -> Self {
		self.model = Some(model.into());
		self
	}

	pub fn fields(mut self, fields: FieldSpec) -> Self {
		self.field_options.fields = Some(fields);
		self
	}

	pub fn action_fields(mut self, action: impl Into<String>, fields: FieldSpec) -> Self {
		self.field_options.action_fields.insert(action.into(), fields);
		self
	}

	pub fn field_config(mut self, field: impl Into<String>, config: FieldConfig) -> Self {
		self.field_options.field_config.insert(field.into(), config);
		self
	}

	pub fn actions(mut self, actions: Capabilities) -> Self {
		self.actions = actions;
		self
	}

	pub fn filter_backends(mut self, backends: Vec<BuiltinFilter>) -> Self {
		self.filter_backends = backends;
		self
	}

	pub fn filterset_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.filterset_fields = Some(to_strings(fields));
		self
	}

	pub fn ordering_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.ordering_fields = Some(to_strings(fields));
		self
	}

	pub fn ordering<I, S>(mut self, tokens: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.ordering = to_strings(tokens);
		self
	}

	pub fn ordering_no_reorder(mut self, no_reorder: bool) -> Self {
		self.ordering_no_reorder = no_reorder;
		self
	}

	pub fn search_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.search_fields = Some(to_strings(fields));
		self
	}

	pub fn search_case_insensitive(mut self, case_insensitive: bool) -> Self {
		self.search_case_insensitive = case_insensitive;
		self
	}

	pub fn paginate(mut self, paginate: bool) -> Self {
		self.paginate = paginate;
		self
	}

	pub fn page_size(mut self, size: usize) -> Self {
		self.pagination.page_size = size;
		self
	}

	pub fn max_page_size(mut self, size: usize) -> Self {
		self.pagination.max_page_size = Some(size);
		self
	}

	pub fn serializer(mut self, serializer: SerializerOptions) -> Self {
		self.serializer = serializer;
		self
	}

	pub fn lookup_field(mut self, field: impl Into<String>) -> Self {
		self.lookup_field = Some(field.into());
		self
	}

	pub fn body_root(mut self, root: impl Into<String>) -> Self {
		self.body_root = Some(root.into());
		self
	}

	/// The filter chain declared by `filter_backends`.
	pub fn filter_chain(&self) -> FilterChain {
		self.filter_backends
			.iter()
			.fold(FilterChain::new(), |chain, backend| match backend {
				BuiltinFilter::Model => {
					let filter = match &self.filterset_fields {
						Some(fields) => ModelFilter::new().fields(fields.clone()),
						None => ModelFilter::new(),
					};
					chain.with_filter(filter)
				}
				BuiltinFilter::Ordering => {
					let mut filter = OrderingFilter::new()
						.param(self.ordering_query_param.clone())
						.default_ordering(self.ordering.clone())
						.no_reorder(self.ordering_no_reorder);
					if let Some(fields) = &self.ordering_fields {
						filter = filter.fields(fields.clone());
					}
					chain.with_filter(filter)
				}
				BuiltinFilter::Search => {
					let mut filter = SearchFilter::new()
						.param(self.search_query_param.clone())
						.case_insensitive(self.search_case_insensitive);
					if let Some(fields) = &self.search_fields {
						filter = filter.fields(fields.clone());
					}
					chain.with_filter(filter)
				}
			})
	}

	/// The paginator, unless pagination is turned off.
	pub fn paginator(&self) -> Option<&PageNumberPagination> {
		self.paginate.then_some(&self.pagination)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::actions::ActionType;
	use rstest::rstest;

	#[rstest]
	fn test_new_is_seeded_from_settings() {
		let settings = Settings::from_toml_str(
			"default_page_size = 7\nmax_page_size = 30\npermit_id_assignment = false\n",
		)
		.unwrap();

		let config = ControllerConfig::new("users", &settings);

		assert_eq!(config.pagination.page_size, 7);
		assert_eq!(config.pagination.max_page_size, Some(30));
		assert!(!config.field_options.permit_id_assignment);
		assert!(config.field_options.permit_nested_attributes_assignment);
	}

	#[rstest]
	fn test_load_merges_controller_table() {
		let settings = Settings::from_toml_str(
			r#"
default_page_size = 10

[controllers.users]
fields = ["id", "login"]
actions = ["list", "show"]
filter_backends = ["ordering"]
ordering = ["-id"]
paginate = false

[controllers.users.field_config.login]
label = "Handle"

[controllers.users.serializer]
associations_limit = 3
"#,
		)
		.unwrap();

		let config = ControllerConfig::load("users", &settings).unwrap();

		assert_eq!(config.name, "users");
		assert_eq!(config.field_options.fields, Some(FieldSpec::list(["id", "login"])));
		assert_eq!(config.field_options.field_config["login"].label.as_deref(), Some("Handle"));
		assert!(config.actions.supports(ActionType::Show));
		assert!(!config.actions.supports(ActionType::Create));
		assert_eq!(config.filter_backends, vec![BuiltinFilter::Ordering]);
		assert_eq!(config.filter_chain().filter_count(), 1);
		assert_eq!(config.ordering, vec!["-id"]);
		assert_eq!(config.pagination.page_size, 10);
		assert!(config.paginator().is_none());
		assert_eq!(config.serializer.associations_limit, Some(3));
		assert_eq!(config.serializer.only_query_param.as_deref(), Some("only"));
	}

	#[rstest]
	fn test_load_without_table_is_new() {
		let settings = Settings::default();
		assert_eq!(
			ControllerConfig::load("posts", &settings).unwrap(),
			ControllerConfig::new("posts", &settings)
		);
	}

	#[rstest]
	fn test_load_rejects_bad_shapes() {
		let settings = Settings::from_toml_str("[controllers.users]\npaginate = \"sometimes\"\n").unwrap();
		assert!(matches!(
			ControllerConfig::load("users", &settings),
			Err(Error::Configuration(_))
		));
	}

	#[rstest]
	fn test_builder() {
		let config = ControllerConfig::new("users", &Settings::default())
			.model("User")
			.page_size(2)
			.max_page_size(50)
			.ordering(["login"])
			.search_fields(["login"])
			.lookup_field("login")
			.body_root("user");

		assert_eq!(config.model.as_deref(), Some("User"));
		assert_eq!(config.paginator().map(|p| (p.page_size, p.max_page_size)), Some((2, Some(50))));
		assert_eq!(config.filter_chain().filter_count(), 3);
		assert_eq!(config.body_root.as_deref(), Some("user"));
	}
}
