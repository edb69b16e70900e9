//! Equality and predicate filtering from query parameters.
//!
//! `balance=10`, `balance_gt=10`, `status_in=2,5,null`, `login_cont=ad`,
//! `manager.login=ada`. Names that match nothing are ignored so pagination,
//! ordering and search parameters can share the query string.

use rivet_core::{ParamValue, Result};
use rivet_db::{ColumnType, Filter, FilterCondition, FilterOperator, FilterValue, QuerySet};
use rivet_fields::FieldKind;

use crate::backend::{FilterBackend, FilterContext};

/// Suffixes in match order; `_lte`/`_gte` come before `_lt`/`_gt`.
const PREDICATES: &[(&str, Predicate)] = &[
	("_lte", Predicate::Lte),
	("_gte", Predicate::Gte),
	("_lt", Predicate::Lt),
	("_gt", Predicate::Gt),
	("_not", Predicate::Not),
	("_cont", Predicate::Cont),
	("_in", Predicate::In),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Predicate {
	Eq,
	Lt,
	Lte,
	Gt,
	Gte,
	Not,
	Cont,
	In,
}

/// A parameter name resolved against the exposed fields.
#[derive(Debug, PartialEq, Eq)]
struct Target {
	field: String,
	column_type: Option<ColumnType>,
	association: Option<String>,
	predicate: Predicate,
}

#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
	fields: Option<Vec<String>>,
}

impl ModelFilter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Restricts filtering to `fields` instead of every exposed column.
	pub fn fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.fields = Some(fields.into_iter().map(Into::into).collect());
		self
	}

	fn allows(&self, field: &str) -> bool {
		self.fields
			.as_ref()
			.is_none_or(|fields| fields.iter().any(|allowed| allowed == field))
	}

	fn target(&self, context: &FilterContext<'_>, name: &str) -> Option<Target> {
		if let Some(target) = self.field_target(context, name, Predicate::Eq) {
			return Some(target);
		}
		PREDICATES.iter().find_map(|(suffix, predicate)| {
			let field = name.strip_suffix(suffix)?;
			self.field_target(context, field, *predicate)
		})
	}

	fn field_target(
		&self,
		context: &FilterContext<'_>,
		field: &str,
		predicate: Predicate,
	) -> Option<Target> {
		if let Some((association, sub_field)) = field.split_once('.') {
			return self.association_target(context, association, sub_field, predicate);
		}
		if !self.allows(field) {
			return None;
		}
		let column = context.column(field)?;
		Some(Target {
			field: field.to_string(),
			column_type: Some(column.column_type),
			association: None,
			predicate,
		})
	}

	/// `assoc.sub` only when the association is exposed and `sub` is one of
	/// its sub-fields.
	fn association_target(
		&self,
		context: &FilterContext<'_>,
		association: &str,
		sub_field: &str,
		predicate: Predicate,
	) -> Option<Target> {
		if !self.allows(association)
			|| !context.exposes(association)
			|| context.resolver.kind(association) != FieldKind::Association
		{
			return None;
		}
		if !context
			.resolver
			.sub_fields(association)
			.iter()
			.any(|allowed| allowed == sub_field)
		{
			return None;
		}
		let column_type = context
			.resolver
			.related_schema(association)
			.and_then(|related| related.column(sub_field).map(|column| column.column_type));
		Some(Target {
			field: format!("{}.{}", association, sub_field),
			column_type,
			association: Some(association.to_string()),
			predicate,
		})
	}
}

impl FilterBackend for ModelFilter {
	fn filter_queryset(&self, context: &FilterContext<'_>, mut queryset: QuerySet) -> Result<QuerySet> {
		for (name, value) in context.params.iter() {
			let Some(target) = self.target(context, name) else {
				continue;
			};
			let Some(condition) = condition(&target, value) else {
				tracing::debug!(param = name, "filter parameter without usable value ignored");
				continue;
			};
			queryset = queryset.filter(condition);
			if let Some(association) = target.association {
				queryset = queryset.prefetch_related([association]);
			}
		}
		Ok(queryset)
	}
}

fn condition(target: &Target, value: &ParamValue) -> Option<FilterCondition> {
	let field = target.field.as_str();
	let repeated = value.as_slice().len() > 1;
	let folds = matches!(target.predicate, Predicate::Eq | Predicate::Not);

	if target.predicate == Predicate::In || (folds && repeated) {
		let values: Vec<FilterValue> = value
			.as_slice()
			.iter()
			.flat_map(|raw| {
				if target.predicate == Predicate::In {
					raw.split(',').collect::<Vec<_>>()
				} else {
					vec![raw.as_str()]
				}
			})
			.map(str::trim)
			.filter(|raw| !raw.is_empty())
			.map(|raw| coerce(target.column_type, raw))
			.collect();
		let membership = membership(field, values)?;
		return Some(match target.predicate {
			Predicate::Not => FilterCondition::not(membership),
			_ => membership,
		});
	}

	// Repeated bounds and substrings must all hold.
	let mut conditions: Vec<FilterCondition> = value
		.as_slice()
		.iter()
		.filter_map(|raw| comparison(target, raw.trim()))
		.collect();
	match conditions.len() {
		0 => None,
		1 => conditions.pop(),
		_ => Some(FilterCondition::and(conditions)),
	}
}

fn comparison(target: &Target, raw: &str) -> Option<FilterCondition> {
	let field = target.field.as_str();
	let filter = match (target.predicate, coerce(target.column_type, raw)) {
		(Predicate::Eq, FilterValue::Null) => Filter::is_null(field),
		(Predicate::Not, FilterValue::Null) => Filter::is_not_null(field),
		(Predicate::Eq, value) => Filter::new(field, FilterOperator::Eq, value),
		(Predicate::Not, value) => Filter::new(field, FilterOperator::Ne, value),
		(Predicate::Lt, value) => Filter::new(field, FilterOperator::Lt, value),
		(Predicate::Lte, value) => Filter::new(field, FilterOperator::Lte, value),
		(Predicate::Gt, value) => Filter::new(field, FilterOperator::Gt, value),
		(Predicate::Gte, value) => Filter::new(field, FilterOperator::Gte, value),
		(Predicate::Cont, _) if raw.is_empty() => return None,
		(Predicate::Cont, _) => Filter::new(field, FilterOperator::Contains, raw),
		(Predicate::In, _) => return None,
	};
	Some(filter.into())
}

/// `field IN (...)`, with an `IS NULL` branch when the set holds a null.
fn membership(field: &str, values: Vec<FilterValue>) -> Option<FilterCondition> {
	let (nulls, present): (Vec<_>, Vec<_>) = values.into_iter().partition(FilterValue::is_null);
	match (present.is_empty(), nulls.is_empty()) {
		(true, true) => None,
		(true, false) => Some(Filter::is_null(field).into()),
		(false, true) => Some(Filter::new(field, FilterOperator::In, present).into()),
		(false, false) => Some(FilterCondition::or(vec![
			Filter::new(field, FilterOperator::In, present).into(),
			Filter::is_null(field).into(),
		])),
	}
}

/// Converts a raw parameter by column type, falling back to a string.
pub fn coerce(column_type: Option<ColumnType>, raw: &str) -> FilterValue {
	if raw.eq_ignore_ascii_case("nil") || raw.eq_ignore_ascii_case("null") {
		return FilterValue::Null;
	}
	let parsed = match column_type {
		Some(ColumnType::Boolean) | None => parse_bool(raw).map(FilterValue::Boolean),
		Some(column_type) if column_type.is_integer() => raw.parse().ok().map(FilterValue::Integer),
		Some(column_type) if column_type.is_numeric() => raw
			.parse()
			.ok()
			.map(FilterValue::Integer)
			.or_else(|| raw.parse().ok().map(FilterValue::Float)),
		Some(_) => None,
	};
	parsed.unwrap_or_else(|| FilterValue::String(raw.to_string()))
}

fn parse_bool(raw: &str) -> Option<bool> {
	match raw.to_ascii_lowercase().as_str() {
		"true" | "t" | "1" => Some(true),
		"false" | "f" | "0" => Some(false),
		_ => None,
	}
}
