//! Lazy query descriptions.
//!
//! A [`QuerySet`] only records what should be fetched. Every builder method
//! returns a new description, so filter backends can be chained without ever
//! materializing rows.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
	Eq,
	Ne,
	Gt,
	Gte,
	Lt,
	Lte,
	In,
	/// Case-sensitive substring match.
	Contains,
	/// Case-insensitive substring match.
	IContains,
	IsNull,
	IsNotNull,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
	String(String),
	Integer(i64),
	Float(f64),
	Boolean(bool),
	Null,
	List(Vec<FilterValue>),
}

impl FilterValue {
	pub fn is_null(&self) -> bool {
		matches!(self, FilterValue::Null)
	}

	pub fn to_json(&self) -> Value {
		match self {
			FilterValue::String(value) => Value::String(value.clone()),
			FilterValue::Integer(value) => Value::from(*value),
			FilterValue::Float(value) => Value::from(*value),
			FilterValue::Boolean(value) => Value::Bool(*value),
			FilterValue::Null => Value::Null,
			FilterValue::List(values) => Value::Array(values.iter().map(Self::to_json).collect()),
		}
	}
}

impl From<&str> for FilterValue {
	fn from(value: &str) -> Self {
		FilterValue::String(value.to_string())
	}
}

impl From<String> for FilterValue {
	fn from(value: String) -> Self {
		FilterValue::String(value)
	}
}

impl From<i64> for FilterValue {
	fn from(value: i64) -> Self {
		FilterValue::Integer(value)
	}
}

impl From<i32> for FilterValue {
	fn from(value: i32) -> Self {
		FilterValue::Integer(value as i64)
	}
}

impl From<f64> for FilterValue {
	fn from(value: f64) -> Self {
		FilterValue::Float(value)
	}
}

impl From<bool> for FilterValue {
	fn from(value: bool) -> Self {
		FilterValue::Boolean(value)
	}
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
	fn from(values: Vec<T>) -> Self {
		FilterValue::List(values.into_iter().map(Into::into).collect())
	}
}

/// A single comparison. `field` may be a dotted `association.column` path.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
	pub field: String,
	pub operator: FilterOperator,
	pub value: FilterValue,
}

impl Filter {
	pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<FilterValue>) -> Self {
		Self {
			field: field.into(),
			operator,
			value: value.into(),
		}
	}

	pub fn is_null(field: impl Into<String>) -> Self {
		Self::new(field, FilterOperator::IsNull, FilterValue::Null)
	}

	pub fn is_not_null(field: impl Into<String>) -> Self {
		Self::new(field, FilterOperator::IsNotNull, FilterValue::Null)
	}

	/// Association named by a dotted field, if any.
	pub fn association(&self) -> Option<&str> {
		self.field.split_once('.').map(|(association, _)| association)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
	Single(Filter),
	And(Vec<FilterCondition>),
	Or(Vec<FilterCondition>),
	Not(Box<FilterCondition>),
}

impl FilterCondition {
	pub fn single(filter: Filter) -> Self {
		Self::Single(filter)
	}

	pub fn and(conditions: Vec<FilterCondition>) -> Self {
		Self::And(conditions)
	}

	pub fn or(conditions: Vec<FilterCondition>) -> Self {
		Self::Or(conditions)
	}

	#[allow(clippy::should_implement_trait)]
	pub fn not(condition: FilterCondition) -> Self {
		Self::Not(Box::new(condition))
	}

	/// OR across filters, as used by free-text search.
	///
	/// # Examples
	///
	/// ```
	/// use rivet_db::{Filter, FilterCondition, FilterOperator};
	///
	/// let search = FilterCondition::or_filters(vec![
	/// 	Filter::new("name", FilterOperator::IContains, "ada"),
	/// 	Filter::new("email", FilterOperator::IContains, "ada"),
	/// ]);
	/// assert!(!search.is_empty());
	/// ```
	pub fn or_filters(filters: Vec<Filter>) -> Self {
		Self::Or(filters.into_iter().map(FilterCondition::Single).collect())
	}

	pub fn and_filters(filters: Vec<Filter>) -> Self {
		Self::And(filters.into_iter().map(FilterCondition::Single).collect())
	}

	pub fn is_empty(&self) -> bool {
		match self {
			FilterCondition::Single(_) => false,
			FilterCondition::And(conditions) | FilterCondition::Or(conditions) => {
				conditions.iter().all(FilterCondition::is_empty)
			}
			FilterCondition::Not(inner) => inner.is_empty(),
		}
	}
}

impl From<Filter> for FilterCondition {
	fn from(filter: Filter) -> Self {
		FilterCondition::Single(filter)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
	Asc,
	Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
	pub field: String,
	pub direction: OrderDirection,
}

impl OrderBy {
	pub fn asc(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			direction: OrderDirection::Asc,
		}
	}

	pub fn desc(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			direction: OrderDirection::Desc,
		}
	}

	/// Parses an ordering token; a leading `-` means descending.
	pub fn parse(token: &str) -> Option<Self> {
		let token = token.trim();
		let (field, direction) = match token.strip_prefix('-') {
			Some(field) => (field, OrderDirection::Desc),
			None => (token, OrderDirection::Asc),
		};
		(!field.is_empty()).then(|| Self {
			field: field.to_string(),
			direction,
		})
	}
}

/// Lazy query description over one table.
///
/// # Examples
///
/// ```
/// use rivet_db::{Filter, FilterOperator, OrderBy, QuerySet};
///
/// let base = QuerySet::new("users").order_by(vec![OrderBy::asc("id")]);
/// let page = base.clone()
/// 	.filter(Filter::new("balance", FilterOperator::Gt, 10))
/// 	.reorder(vec![OrderBy::desc("login")])
/// 	.limit(2)
/// 	.offset(0);
///
/// assert_eq!(base.conditions().len(), 0);
/// assert_eq!(page.ordering(), &[OrderBy::desc("login")]);
/// assert_eq!(page.limit_value(), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySet {
	table: String,
	conditions: Vec<FilterCondition>,
	ordering: Vec<OrderBy>,
	limit: Option<usize>,
	offset: Option<usize>,
	prefetch: Vec<String>,
	selection: Option<Vec<String>>,
}

impl QuerySet {
	pub fn new(table: impl Into<String>) -> Self {
		Self {
			table: table.into(),
			..Self::default()
		}
	}

	/// Keeps rows matching `condition` (`where`).
	pub fn filter(mut self, condition: impl Into<FilterCondition>) -> Self {
		let condition = condition.into();
		if !condition.is_empty() {
			self.conditions.push(condition);
		}
		self
	}

	/// Drops rows matching `condition` (`where_not`).
	pub fn exclude(mut self, condition: impl Into<FilterCondition>) -> Self {
		let condition = condition.into();
		if !condition.is_empty() {
			self.conditions.push(FilterCondition::not(condition));
		}
		self
	}

	/// Appends to any existing ordering.
	pub fn order_by(mut self, ordering: Vec<OrderBy>) -> Self {
		self.ordering.extend(ordering);
		self
	}

	/// Replaces any existing ordering.
	pub fn reorder(mut self, ordering: Vec<OrderBy>) -> Self {
		self.ordering = ordering;
		self
	}

	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn offset(mut self, offset: usize) -> Self {
		self.offset = Some(offset);
		self
	}

	/// Marks associations for eager loading (`includes`).
	pub fn prefetch_related<I, S>(mut self, associations: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		for association in associations {
			let association = association.into();
			if !self.prefetch.contains(&association) {
				self.prefetch.push(association);
			}
		}
		self
	}

	pub fn select<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.selection = Some(fields.into_iter().map(Into::into).collect());
		self
	}

	/// Same description without selection clauses, for counting.
	pub fn without_select(&self) -> Self {
		Self {
			selection: None,
			..self.clone()
		}
	}

	/// Same description without limit and offset.
	pub fn unsliced(&self) -> Self {
		Self {
			limit: None,
			offset: None,
			..self.clone()
		}
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	pub fn conditions(&self) -> &[FilterCondition] {
		&self.conditions
	}

	/// All conditions joined with AND, or `None` when unfiltered.
	pub fn where_condition(&self) -> Option<FilterCondition> {
		match self.conditions.len() {
			0 => None,
			1 => Some(self.conditions[0].clone()),
			_ => Some(FilterCondition::And(self.conditions.clone())),
		}
	}

	pub fn ordering(&self) -> &[OrderBy] {
		&self.ordering
	}

	pub fn limit_value(&self) -> Option<usize> {
		self.limit
	}

	pub fn offset_value(&self) -> Option<usize> {
		self.offset
	}

	pub fn prefetched(&self) -> &[String] {
		&self.prefetch
	}

	pub fn selection(&self) -> Option<&[String]> {
		self.selection.as_deref()
	}
}
