//! Filter backend trait and chain.

use rivet_core::{QueryParams, Result};
use rivet_db::{Column, QuerySet};
use rivet_fields::FieldResolver;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::ModelFilter;
use crate::ordering::OrderingFilter;
use crate::search::SearchFilter;

/// Per-request inputs shared by every backend of a chain.
#[derive(Clone, Copy)]
pub struct FilterContext<'a> {
	pub params: &'a QueryParams,
	pub resolver: &'a FieldResolver,
	/// Fields resolved for the current action.
	pub fields: &'a [String],
}

impl<'a> FilterContext<'a> {
	pub fn new(params: &'a QueryParams, resolver: &'a FieldResolver, fields: &'a [String]) -> Self {
		Self {
			params,
			resolver,
			fields,
		}
	}

	pub fn exposes(&self, field: &str) -> bool {
		self.fields.iter().any(|exposed| exposed == field)
	}

	/// The column behind `field`, if it is exposed for this action.
	///
	/// Foreign keys of exposed `belongs_to` associations count as exposed, so
	/// `manager_id=3` works while only `manager` is listed.
	pub fn column(&self, field: &str) -> Option<&'a Column> {
		let schema = self.resolver.schema();
		let column = schema.column(field)?;
		let backs_association = self.fields.iter().any(|exposed| {
			schema
				.association(exposed)
				.and_then(|association| association.foreign_key.as_deref())
				== Some(field)
		});
		(self.exposes(field) || backs_association).then_some(column)
	}
}

/// A composable request-to-query transformation.
///
/// A backend with nothing to do returns the query set unchanged.
pub trait FilterBackend: Send + Sync {
	fn filter_queryset(&self, context: &FilterContext<'_>, queryset: QuerySet) -> Result<QuerySet>;
}

/// Names of the built-in backends, as used in controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinFilter {
	Model,
	Ordering,
	Search,
}

/// Backends applied in declared order.
///
/// # Examples
///
/// ```
/// use rivet_filters::{FilterChain, ModelFilter, OrderingFilter};
///
/// let chain = FilterChain::new()
/// 	.with_filter(ModelFilter::new())
/// 	.with_filter(OrderingFilter::new());
/// assert_eq!(chain.filter_count(), 2);
/// ```
#[derive(Clone)]
pub struct FilterChain {
	filters: Vec<Arc<dyn FilterBackend>>,
}

impl FilterChain {
	pub fn new() -> Self {
		Self {
			filters: Vec::new(),
		}
	}

	pub fn with_filter(mut self, filter: impl FilterBackend + 'static) -> Self {
		self.filters.push(Arc::new(filter));
		self
	}

	pub fn add_filter(&mut self, filter: Box<dyn FilterBackend>) {
		self.filters.push(Arc::from(filter));
	}

	pub fn filter_count(&self) -> usize {
		self.filters.len()
	}

	pub fn is_empty(&self) -> bool {
		self.filters.is_empty()
	}
}

impl Default for FilterChain {
	/// Predicate filter, then ordering, then search.
	fn default() -> Self {
		Self::new()
			.with_filter(ModelFilter::new())
			.with_filter(OrderingFilter::new())
			.with_filter(SearchFilter::new())
	}
}

impl FilterBackend for FilterChain {
	fn filter_queryset(&self, context: &FilterContext<'_>, queryset: QuerySet) -> Result<QuerySet> {
		self.filters
			.iter()
			.try_fold(queryset, |queryset, filter| {
				filter.filter_queryset(context, queryset)
			})
	}
}
