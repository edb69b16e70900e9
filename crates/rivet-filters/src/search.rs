use rivet_core::Result;
use rivet_db::{Filter, FilterCondition, FilterOperator, QuerySet};

use crate::backend::{FilterBackend, FilterContext};

/// Free-text search across text columns.
///
/// The term is matched as a substring, OR-ed over the search fields. The
/// term is always bound as a value; the data source escapes it for `LIKE`.
/// Without configured fields, the exposed fields that are both commonly
/// searchable (per settings) and text columns are used.
#[derive(Debug, Clone)]
pub struct SearchFilter {
	param: String,
	fields: Option<Vec<String>>,
	case_insensitive: bool,
}

impl Default for SearchFilter {
	fn default() -> Self {
		Self {
			param: "search".to_string(),
			fields: None,
			case_insensitive: false,
		}
	}
}

impl SearchFilter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn param(mut self, param: impl Into<String>) -> Self {
		self.param = param.into();
		self
	}

	pub fn fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.fields = Some(fields.into_iter().map(Into::into).collect());
		self
	}

	pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
		self.case_insensitive = case_insensitive;
		self
	}

	pub fn search_fields(&self, context: &FilterContext<'_>) -> Vec<String> {
		if let Some(fields) = &self.fields {
			return fields.clone();
		}
		let searchable = &context.resolver.settings().search_columns;
		context
			.fields
			.iter()
			.filter(|field| searchable.contains(*field))
			.filter(|field| {
				context
					.column(field)
					.is_some_and(|column| column.column_type.is_text())
			})
			.cloned()
			.collect()
	}
}

impl FilterBackend for SearchFilter {
	fn filter_queryset(&self, context: &FilterContext<'_>, queryset: QuerySet) -> Result<QuerySet> {
		let Some(term) = context.params.get_trimmed(&self.param) else {
			return Ok(queryset);
		};
		let fields = self.search_fields(context);
		if fields.is_empty() {
			tracing::debug!(param = %self.param, "search requested without searchable fields");
			return Ok(queryset);
		}

		let operator = if self.case_insensitive {
			FilterOperator::IContains
		} else {
			FilterOperator::Contains
		};
		let filters = fields
			.into_iter()
			.map(|field| Filter::new(field, operator, term))
			.collect();
		Ok(queryset.filter(FilterCondition::or_filters(filters)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rivet_conf::Settings;
	use rivet_core::QueryParams;
	use rivet_db::{
		Column, ColumnType, DataSource, MemoryDataSource, Record, SchemaRegistry, TableSchema,
	};
	use rivet_fields::{FieldOptions, FieldResolver};
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::sync::Arc;

	#[fixture]
	fn resolver() -> FieldResolver {
		let registry = Arc::new(
			SchemaRegistry::new().register(
				TableSchema::new("User", "users")
					.column(Column::new("id", ColumnType::Integer).primary_key())
					.column(Column::new("login", ColumnType::String))
					.column(Column::new("email", ColumnType::String))
					.column(Column::new("bio", ColumnType::Text))
					.column(Column::new("name", ColumnType::Integer)),
			),
		);
		let schema = registry.get("User").unwrap();
		FieldResolver::new("users", schema, registry, Arc::new(Settings::default()), FieldOptions::default())
	}

	fn source() -> MemoryDataSource {
		MemoryDataSource::new().with_rows("users", vec![
			json!({"id": 1, "login": "Ada", "email": "ada@example.com", "bio": "math"}),
			json!({"id": 2, "login": "bob", "email": "BOB@EXAMPLE.COM", "bio": "ada fan"}),
			json!({"id": 3, "login": "50%_off", "email": "deals@example.com", "bio": null}),
		])
	}

	fn run(resolver: &FieldResolver, filter: SearchFilter, params: QueryParams) -> QuerySet {
		let fields = resolver.resolve_fields(None);
		let context = FilterContext::new(&params, resolver, &fields);
		filter
			.filter_queryset(&context, QuerySet::new("users"))
			.unwrap()
	}

	fn ids(rows: &[Record]) -> Vec<i64> {
		rows.iter().filter_map(|row| row["id"].as_i64()).collect()
	}

	#[rstest]
	fn test_auto_derived_fields(resolver: FieldResolver) {
		let params = QueryParams::new();
		let fields = resolver.resolve_fields(None);
		let context = FilterContext::new(&params, &resolver, &fields);
		assert_eq!(SearchFilter::new().search_fields(&context), vec!["login", "email"]);
	}

	#[rstest]
	#[case(false, "Ada", vec![1])]
	#[case(true, "ada", vec![1])]
	#[case(true, "example.COM", vec![1, 2, 3])]
	#[case(false, "%_", vec![3])]
	fn test_search(
		resolver: FieldResolver,
		#[case] case_insensitive: bool,
		#[case] term: &str,
		#[case] expected: Vec<i64>,
	) {
		let filter = SearchFilter::new().case_insensitive(case_insensitive);
		let queryset = run(&resolver, filter, QueryParams::new().with("search", term));
		assert_eq!(ids(&source().fetch(&queryset).unwrap()), expected);
	}

	#[rstest]
	fn test_configured_fields(resolver: FieldResolver) {
		let filter = SearchFilter::new().fields(["bio"]).case_insensitive(true);
		let queryset = run(&resolver, filter, QueryParams::new().with("q", "ADA"));
		assert_eq!(queryset, QuerySet::new("users"));

		let filter = SearchFilter::new().param("q").fields(["bio"]).case_insensitive(true);
		let queryset = run(&resolver, filter, QueryParams::new().with("q", "ADA"));
		assert_eq!(ids(&source().fetch(&queryset).unwrap()), vec![2]);
	}

	#[rstest]
	#[case("")]
	#[case("   ")]
	fn test_blank_term_is_identity(resolver: FieldResolver, #[case] term: &str) {
		let queryset = run(&resolver, SearchFilter::new(), QueryParams::new().with("search", term));
		assert_eq!(queryset, QuerySet::new("users"));
	}
}
