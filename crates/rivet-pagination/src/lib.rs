//! # Rivet Pagination
//!
//! Page-number pagination over a lazy [`QuerySet`].
//!
//! The count runs on the filtered description with its projection and slice
//! stripped, and the page itself is fetched with `LIMIT`/`OFFSET`.
//!
//! ## Example
//!
//! ```
//! use rivet_core::QueryParams;
//! use rivet_db::{MemoryDataSource, QuerySet};
//! use rivet_pagination::{PageNumberPagination, Paginated};
//! use serde_json::json;
//!
//! let source = MemoryDataSource::new().with_rows(
//! 	"items",
//! 	(1..=7).map(|id| json!({"id": id})).collect(),
//! );
//! let paginator = PageNumberPagination::new().page_size(3);
//! let params = QueryParams::new().with("page", "3");
//!
//! let Paginated::Page(page) = paginator
//! 	.paginate(&source, &QuerySet::new("items"), &params)
//! 	.unwrap()
//! else {
//! 	unreachable!()
//! };
//! assert_eq!(page.num_pages, 3);
//! assert_eq!(page.len(), 1);
//! ```

use rivet_core::{QueryParams, Result};
use rivet_db::{DataSource, QuerySet, Record};
use serde::{Deserialize, Serialize};

/// Response envelope of a paginated list.
///
/// The member names are part of the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
	pub count: usize,
	pub page: usize,
	pub page_size: usize,
	pub total_pages: usize,
	pub results: Vec<T>,
}

impl<T> From<Page<T>> for PaginatedResponse<T> {
	fn from(page: Page<T>) -> Self {
		Self {
			count: page.count,
			page: page.number,
			page_size: page.page_size,
			total_pages: page.num_pages,
			results: page.object_list,
		}
	}
}

/// A single page of results
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
	/// Items in this page
	pub object_list: Vec<T>,
	/// Current page number (1-indexed)
	pub number: usize,
	/// Total number of pages
	pub num_pages: usize,
	/// Total number of items across all pages
	pub count: usize,
	/// Items per page
	pub page_size: usize,
}

impl<T> Page<T> {
	pub fn new(
		object_list: Vec<T>,
		number: usize,
		num_pages: usize,
		count: usize,
		page_size: usize,
	) -> Self {
		Self {
			object_list,
			number,
			num_pages,
			count,
			page_size,
		}
	}

	pub fn has_next(&self) -> bool {
		self.number < self.num_pages
	}

	pub fn has_previous(&self) -> bool {
		self.number > 1
	}

	pub fn len(&self) -> usize {
		self.object_list.len()
	}

	pub fn is_empty(&self) -> bool {
		self.object_list.is_empty()
	}

	/// Converts the items, keeping the page metadata.
	pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
		Page {
			object_list: self.object_list.into_iter().map(f).collect(),
			number: self.number,
			num_pages: self.num_pages,
			count: self.count,
			page_size: self.page_size,
		}
	}
}

/// Outcome of [`PageNumberPagination::paginate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Paginated<T> {
	Page(Page<T>),
	/// Pagination was disabled for this request (`page_size=0` without a
	/// maximum). Carries the full collection without an envelope.
	Unpaginated(Vec<T>),
}

/// `ceil(count / page_size)` in integer arithmetic.
pub fn total_pages(count: usize, page_size: usize) -> usize {
	count.div_ceil(page_size.max(1))
}

/// Rows skipped before `page` (1-indexed).
pub fn page_offset(page: usize, page_size: usize) -> usize {
	page.saturating_sub(1).saturating_mul(page_size)
}

/// Page number based pagination
///
/// Example URLs:
/// - `/accounts?page=4`
/// - `/accounts?page=4&page_size=100`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageNumberPagination {
	/// Default page size
	pub page_size: usize,
	/// Query parameter name for page number
	pub page_query_param: String,
	/// Query parameter name for page size; `None` ignores client sizes
	pub page_size_query_param: Option<String>,
	/// Maximum allowed page size
	pub max_page_size: Option<usize>,
}

impl Default for PageNumberPagination {
	fn default() -> Self {
		Self {
			page_size: 20,
			page_query_param: "page".to_string(),
			page_size_query_param: Some("page_size".to_string()),
			max_page_size: None,
		}
	}
}

impl PageNumberPagination {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn page_size(mut self, size: usize) -> Self {
		self.page_size = size;
		self
	}

	pub fn max_page_size(mut self, size: usize) -> Self {
		self.max_page_size = Some(size);
		self
	}

	pub fn page_query_param(mut self, param: impl Into<String>) -> Self {
		self.page_query_param = param.into();
		self
	}

	pub fn page_size_query_param(mut self, param: Option<String>) -> Self {
		self.page_size_query_param = param;
		self
	}

	/// Page size for a request; `None` when pagination is disabled.
	///
	/// Requested size, else the default, clamped to the maximum and then
	/// floored at 1. A requested `0` without a maximum disables pagination.
	pub fn resolve_page_size(&self, params: &QueryParams) -> Option<usize> {
		let requested = self
			.page_size_query_param
			.as_deref()
			.and_then(|param| params.get_trimmed(param))
			.and_then(|raw| raw.parse::<i64>().ok());

		if requested == Some(0) && self.max_page_size.is_none() {
			return None;
		}

		let size = requested.unwrap_or(self.page_size as i64);
		let size = match self.max_page_size {
			Some(max) => size.min(max as i64),
			None => size,
		};
		Some(size.max(1) as usize)
	}

	/// Requested page number, defaulting to 1 when absent, blank, unparsable or
	/// not positive.
	pub fn resolve_page_number(&self, params: &QueryParams) -> usize {
		params
			.get_trimmed(&self.page_query_param)
			.and_then(|raw| raw.parse::<i64>().ok())
			.filter(|number| *number > 0)
			.map_or(1, |number| number as usize)
	}

	/// Counts and slices `queryset` for the requested page.
	pub fn paginate(
		&self,
		source: &dyn DataSource,
		queryset: &QuerySet,
		params: &QueryParams,
	) -> Result<Paginated<Record>> {
		let Some(page_size) = self.resolve_page_size(params) else {
			tracing::debug!(table = queryset.table(), "pagination disabled by request");
			return Ok(Paginated::Unpaginated(source.fetch(queryset)?));
		};
		let number = self.resolve_page_number(params);

		let count = source.count(&queryset.without_select().unsliced())?;
		let rows = source.fetch(
			&queryset
				.clone()
				.limit(page_size)
				.offset(page_offset(number, page_size)),
		)?;

		Ok(Paginated::Page(Page::new(
			rows,
			number,
			total_pages(count, page_size),
			count,
			page_size,
		)))
	}
}
