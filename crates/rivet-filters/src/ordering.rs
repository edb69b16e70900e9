use rivet_core::Result;
use rivet_db::{OrderBy, QuerySet};

use crate::backend::{FilterBackend, FilterContext};

/// Sorts by a comma-separated `ordering` parameter (`-price,name`).
///
/// Tokens naming fields outside the orderable set are dropped. The new
/// ordering replaces any existing one unless `no_reorder` is set, in which
/// case it is appended.
#[derive(Debug, Clone)]
pub struct OrderingFilter {
	param: String,
	fields: Option<Vec<String>>,
	default_ordering: Vec<String>,
	no_reorder: bool,
}

impl Default for OrderingFilter {
	fn default() -> Self {
		Self {
			param: "ordering".to_string(),
			fields: None,
			default_ordering: Vec::new(),
			no_reorder: false,
		}
	}
}

impl OrderingFilter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn param(mut self, param: impl Into<String>) -> Self {
		self.param = param.into();
		self
	}

	/// Orderable fields; every exposed column when unset.
	pub fn fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.fields = Some(fields.into_iter().map(Into::into).collect());
		self
	}

	/// Tokens applied when the request carries no ordering parameter.
	pub fn default_ordering<I, S>(mut self, tokens: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.default_ordering = tokens.into_iter().map(Into::into).collect();
		self
	}

	pub fn no_reorder(mut self, no_reorder: bool) -> Self {
		self.no_reorder = no_reorder;
		self
	}

	fn is_orderable(&self, context: &FilterContext<'_>, field: &str) -> bool {
		match &self.fields {
			Some(fields) => fields.iter().any(|allowed| allowed == field),
			None => context.column(field).is_some(),
		}
	}

	/// Parsed ordering for this request, unknown tokens removed.
	pub fn get_ordering(&self, context: &FilterContext<'_>) -> Vec<OrderBy> {
		let tokens = context
			.params
			.get_csv(&self.param)
			.unwrap_or_else(|| self.default_ordering.clone());

		tokens
			.iter()
			.filter_map(|token| {
				let order = OrderBy::parse(token)?;
				if self.is_orderable(context, &order.field) {
					Some(order)
				} else {
					tracing::debug!(token = %token, "ordering token for unknown field dropped");
					None
				}
			})
			.collect()
	}
}

impl FilterBackend for OrderingFilter {
	fn filter_queryset(&self, context: &FilterContext<'_>, queryset: QuerySet) -> Result<QuerySet> {
		let ordering = self.get_ordering(context);
		if ordering.is_empty() {
			return Ok(queryset);
		}
		Ok(if self.no_reorder {
			queryset.order_by(ordering)
		} else {
			queryset.reorder(ordering)
		})
	}
}
