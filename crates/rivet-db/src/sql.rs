//! SQL rendering of query descriptions.
//!
//! Every user-supplied value is emitted as a bound parameter. Substring
//! predicates escape `%`, `_` and `\` in the pattern before binding it, so
//! search input can never widen a match or reach the SQL text.
//!
//! Dotted `association.column` fields render as qualified column references;
//! joining the association table is the caller's concern.

use sea_query::{
	Alias, Asterisk, Condition, Expr, ExprTrait, Func, LikeExpr, Order, PostgresQueryBuilder,
	Query, SelectStatement, Values,
};

use crate::query::{Filter, FilterCondition, FilterOperator, FilterValue, OrderDirection, QuerySet};

/// Escapes LIKE wildcards so the input matches literally.
///
/// # Examples
///
/// ```
/// use rivet_db::sql::escape_like_pattern;
///
/// assert_eq!(escape_like_pattern("50%_off"), "50\\%\\_off");
/// ```
pub fn escape_like_pattern(input: &str) -> String {
	input
		.replace('\\', "\\\\")
		.replace('%', "\\%")
		.replace('_', "\\_")
}

fn column(field: &str) -> Expr {
	match field.split_once('.') {
		Some((table, name)) => Expr::col((Alias::new(table), Alias::new(name))),
		None => Expr::col(Alias::new(field)),
	}
}

fn to_sea_value(value: &FilterValue) -> sea_query::Value {
	match value {
		FilterValue::String(text) => text.clone().into(),
		FilterValue::Integer(number) => (*number).into(),
		FilterValue::Float(number) => (*number).into(),
		FilterValue::Boolean(flag) => (*flag).into(),
		FilterValue::Null => Option::<String>::None.into(),
		FilterValue::List(values) => values
			.iter()
			.map(|value| value.to_json().to_string())
			.collect::<Vec<_>>()
			.join(",")
			.into(),
	}
}

fn contains_pattern(value: &FilterValue, lowercase: bool) -> Option<LikeExpr> {
	let FilterValue::String(text) = value else {
		return None;
	};
	let text = if lowercase {
		text.to_lowercase()
	} else {
		text.clone()
	};
	Some(LikeExpr::new(format!("%{}%", escape_like_pattern(&text))).escape('\\'))
}

/// A filter no row can satisfy: an empty membership set.
fn never() -> Expr {
	Expr::cust("FALSE")
}

/// A filter that is unknown for every row, so neither it nor its negation matches.
fn unknown() -> Expr {
	Expr::cust("NULL")
}

fn build_filter(filter: &Filter) -> Condition {
	let col = column(&filter.field);
	let value = &filter.value;

	let expr = match filter.operator {
		FilterOperator::Eq if value.is_null() => col.is_null(),
		FilterOperator::Ne if value.is_null() => col.is_not_null(),
		FilterOperator::Eq => col.eq(to_sea_value(value)),
		FilterOperator::Ne => col.ne(to_sea_value(value)),
		FilterOperator::Gt => col.gt(to_sea_value(value)),
		FilterOperator::Gte => col.gte(to_sea_value(value)),
		FilterOperator::Lt => col.lt(to_sea_value(value)),
		FilterOperator::Lte => col.lte(to_sea_value(value)),
		FilterOperator::In => {
			let values: Vec<sea_query::Value> = match value {
				FilterValue::List(items) => items
					.iter()
					.filter(|item| !item.is_null())
					.map(to_sea_value)
					.collect(),
				single => vec![to_sea_value(single)],
			};
			if values.is_empty() {
				never()
			} else {
				col.is_in(values)
			}
		}
		FilterOperator::Contains => match contains_pattern(value, false) {
			Some(pattern) => col.like(pattern),
			None => unknown(),
		},
		FilterOperator::IContains => match contains_pattern(value, true) {
			Some(pattern) => Expr::expr(Func::lower(col)).like(pattern),
			None => unknown(),
		},
		FilterOperator::IsNull => col.is_null(),
		FilterOperator::IsNotNull => col.is_not_null(),
	};
	Condition::all().add(expr)
}

/// Converts a condition tree.
///
/// An empty conjunction is skipped and an empty disjunction matches nothing,
/// so negating either keeps the in-memory meaning.
pub fn build_condition(condition: &FilterCondition) -> Option<Condition> {
	match condition {
		FilterCondition::Single(filter) => Some(build_filter(filter)),
		FilterCondition::And(conditions) => {
			let built: Vec<Condition> = conditions.iter().filter_map(build_condition).collect();
			(!built.is_empty()).then(|| built.into_iter().fold(Condition::all(), |all, built| all.add(built)))
		}
		FilterCondition::Or(conditions) => {
			if conditions.is_empty() {
				return Some(Condition::all().add(never()));
			}
			let mut combined = Condition::any();
			for condition in conditions {
				// A skipped branch always holds, and so does the disjunction.
				combined = combined.add(build_condition(condition)?);
			}
			Some(combined)
		}
		FilterCondition::Not(inner) => Some(match build_condition(inner) {
			Some(built) => built.not(),
			None => Condition::all().add(never()),
		}),
	}
}

fn base_select(query: &QuerySet) -> SelectStatement {
	let mut select = Query::select();
	select.from(Alias::new(query.table()));
	for condition in query.conditions() {
		if let Some(built) = build_condition(condition) {
			select.cond_where(built);
		}
	}
	select
}

/// Renders the rows query with its bound values.
pub fn compile_select(query: &QuerySet) -> (String, Values) {
	let mut select = base_select(query);
	match query.selection() {
		Some(fields) => {
			for field in fields {
				select.column(Alias::new(field.as_str()));
			}
		}
		None => {
			select.column(Asterisk);
		}
	}
	for order in query.ordering() {
		let direction = match order.direction {
			OrderDirection::Asc => Order::Asc,
			OrderDirection::Desc => Order::Desc,
		};
		select.order_by_expr(column(&order.field).into(), direction);
	}
	if let Some(limit) = query.limit_value() {
		select.limit(limit as u64);
	}
	if let Some(offset) = query.offset_value() {
		select.offset(offset as u64);
	}
	select.build(PostgresQueryBuilder)
}

/// Renders `COUNT(*)` over the projection-stripped, unordered description.
pub fn compile_count(query: &QuerySet) -> (String, Values) {
	let mut select = base_select(&query.without_select());
	select.expr(Func::count(Expr::col(Asterisk)));
	select.build(PostgresQueryBuilder)
}
