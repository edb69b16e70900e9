//! In-memory data source.
//!
//! Evaluates [`QuerySet`] descriptions against rows held in memory. Predicates
//! follow SQL three-valued logic: comparing against NULL is unknown, `NOT`
//! of unknown stays unknown, and only rows evaluating to true are kept.
//! Associations are stored inline on each row (an object for to-one, an array
//! for to-many), which also makes every association eager-loaded.

use indexmap::IndexMap;
use parking_lot::RwLock;
use rivet_core::{Error, Result};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use crate::query::{Filter, FilterCondition, FilterOperator, FilterValue, OrderDirection, QuerySet};
use crate::schema::ModelSchema;
use crate::source::{DataSource, Record, Upload, WriteSet, found};

const DESTROY_MARKER: &str = "_destroy";

static NULL: Value = Value::Null;

#[derive(Default)]
pub struct MemoryDataSource {
	tables: RwLock<IndexMap<String, Vec<Record>>>,
	related_fetches: AtomicUsize,
}

impl MemoryDataSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seeds `table` with rows. Non-object values are ignored.
	pub fn with_rows(self, table: impl Into<String>, rows: Vec<Value>) -> Self {
		let records = rows
			.into_iter()
			.filter_map(|row| match row {
				Value::Object(map) => Some(map),
				_ => None,
			})
			.collect();
		self.tables.write().insert(table.into(), records);
		self
	}

	/// Number of per-parent related fetches served so far.
	pub fn related_fetch_count(&self) -> usize {
		self.related_fetches.load(AtomicOrdering::Relaxed)
	}

	pub fn rows(&self, table: &str) -> Vec<Record> {
		self.tables.read().get(table).cloned().unwrap_or_default()
	}

	fn matching(&self, query: &QuerySet) -> Vec<Record> {
		let tables = self.tables.read();
		let Some(rows) = tables.get(query.table()) else {
			return Vec::new();
		};

		let mut matched: Vec<Record> = rows
			.iter()
			.filter(|row| {
				query
					.conditions()
					.iter()
					.all(|condition| evaluate(condition, row) == Some(true))
			})
			.cloned()
			.collect();

		if !query.ordering().is_empty() {
			matched.sort_by(|left, right| {
				for order in query.ordering() {
					let ordering = compare_nullable(
						first_value(left, &order.field),
						first_value(right, &order.field),
					);
					let ordering = match order.direction {
						OrderDirection::Asc => ordering,
						OrderDirection::Desc => ordering.reverse(),
					};
					if ordering != Ordering::Equal {
						return ordering;
					}
				}
				Ordering::Equal
			});
		}
		matched
	}

	fn slice(query: &QuerySet, rows: Vec<Record>) -> Vec<Record> {
		let offset = query.offset_value().unwrap_or(0);
		let rows = rows.into_iter().skip(offset);
		match query.limit_value() {
			Some(limit) => rows.take(limit).collect(),
			None => rows.collect(),
		}
	}

	fn next_key(rows: &[Record], primary_key: &str) -> i64 {
		rows.iter()
			.filter_map(|row| row.get(primary_key).and_then(Value::as_i64))
			.max()
			.unwrap_or(0)
			+ 1
	}

	/// Applies attributes to a stored row, expanding nested writes.
	fn apply(&self, schema: &dyn ModelSchema, row: &mut Record, changes: WriteSet) {
		for (key, value) in changes.attributes {
			if let Some(association) = key
				.strip_suffix("_attributes")
				.and_then(|name| schema.association(name))
			{
				let name = association.name.clone();
				let current = row.remove(&name).unwrap_or(Value::Null);
				let merged = if association.is_collection() {
					merge_nested_many(current, value)
				} else {
					merge_nested_one(current, value)
				};
				row.insert(name, merged);
				continue;
			}

			if let Some(association) = schema
				.associations()
				.iter()
				.find(|association| association.id_param() == key)
			{
				if let Some(related) = association
					.related
					.as_deref()
					.map(|table| self.rows(table))
				{
					let ids: Vec<&Value> = match &value {
						Value::Array(ids) => ids.iter().collect(),
						other => vec![other],
					};
					let picked: Vec<Value> = related
						.into_iter()
						.filter(|candidate| {
							candidate
								.get("id")
								.is_some_and(|id| ids.iter().any(|wanted| loosely_equal(id, wanted)))
						})
						.map(Value::Object)
						.collect();
					let embedded = if association.is_collection() {
						Value::Array(picked)
					} else {
						picked.into_iter().next().unwrap_or(Value::Null)
					};
					row.insert(association.name.clone(), embedded);
				}
				if association.is_collection() {
					continue;
				}
			}

			row.insert(key, value);
		}

		let mut grouped: IndexMap<String, Vec<Value>> = IndexMap::new();
		for upload in changes.uploads {
			grouped
				.entry(upload.field.clone())
				.or_default()
				.push(upload_metadata(&upload));
		}
		for (field, mut uploads) in grouped {
			let multiple = schema
				.attachment(&field)
				.is_some_and(|attachment| attachment.multiple);
			let value = if multiple {
				Value::Array(uploads)
			} else {
				uploads.pop().unwrap_or(Value::Null)
			};
			row.insert(field, value);
		}
	}
}

impl DataSource for MemoryDataSource {
	fn fetch(&self, query: &QuerySet) -> Result<Vec<Record>> {
		let rows = Self::slice(query, self.matching(query));
		let rows = match query.selection() {
			Some(fields) => rows
				.into_iter()
				.map(|row| {
					row.into_iter()
						.filter(|(key, _)| fields.contains(key))
						.collect()
				})
				.collect(),
			None => rows,
		};
		tracing::trace!(table = query.table(), rows = rows.len(), "fetched rows");
		Ok(rows)
	}

	fn count(&self, query: &QuerySet) -> Result<usize> {
		if query.selection().is_some() {
			return Err(Error::Database(
				"count over a projected query; strip the selection first".to_string(),
			));
		}
		Ok(Self::slice(query, self.matching(query)).len())
	}

	fn fetch_related(
		&self,
		_schema: &dyn ModelSchema,
		record: &Record,
		association: &str,
		limit: Option<usize>,
	) -> Result<Vec<Record>> {
		self.related_fetches.fetch_add(1, AtomicOrdering::Relaxed);
		let related: Vec<Record> = match record.get(association) {
			Some(Value::Array(items)) => items
				.iter()
				.filter_map(|item| item.as_object().cloned())
				.collect(),
			Some(Value::Object(item)) => vec![item.clone()],
			_ => Vec::new(),
		};
		Ok(match limit {
			Some(limit) => related.into_iter().take(limit).collect(),
			None => related,
		})
	}

	fn count_related(
		&self,
		_schema: &dyn ModelSchema,
		record: &Record,
		association: &str,
	) -> Result<usize> {
		Ok(match record.get(association) {
			Some(Value::Array(items)) => items.len(),
			Some(Value::Object(_)) => 1,
			_ => 0,
		})
	}

	fn insert(&self, schema: &dyn ModelSchema, changes: WriteSet) -> Result<Record> {
		let primary_key = schema.primary_key().to_string();
		let next_key = Self::next_key(&self.rows(schema.table_name()), &primary_key);

		let mut row = Record::new();
		for column in schema.columns() {
			row.insert(
				column.name.clone(),
				column.default.clone().unwrap_or(Value::Null),
			);
		}
		self.apply(schema, &mut row, changes);
		if row.get(&primary_key).is_none_or(Value::is_null) {
			row.insert(primary_key, Value::from(next_key));
		}

		self.tables
			.write()
			.entry(schema.table_name().to_string())
			.or_default()
			.push(row.clone());
		Ok(row)
	}

	fn update(&self, schema: &dyn ModelSchema, key: &Value, changes: WriteSet) -> Result<Record> {
		let primary_key = schema.primary_key();
		let existing = self
			.rows(schema.table_name())
			.into_iter()
			.find(|row| row.get(primary_key).is_some_and(|id| loosely_equal(id, key)));
		let mut row = found(existing, schema.name(), format!("{}={}", primary_key, key))?;

		self.apply(schema, &mut row, changes);

		let mut tables = self.tables.write();
		let slot = tables.get_mut(schema.table_name()).and_then(|rows| {
			rows.iter_mut()
				.find(|stored| stored.get(primary_key).is_some_and(|id| loosely_equal(id, key)))
		});
		if let Some(slot) = slot {
			*slot = row.clone();
		}
		Ok(row)
	}

	fn delete(&self, schema: &dyn ModelSchema, key: &Value) -> Result<()> {
		let primary_key = schema.primary_key();
		let mut tables = self.tables.write();
		let rows = tables.entry(schema.table_name().to_string()).or_default();
		let before = rows.len();
		rows.retain(|row| !row.get(primary_key).is_some_and(|id| loosely_equal(id, key)));
		if rows.len() == before {
			return Err(Error::record_not_found(
				schema.name(),
				format!("{}={}", primary_key, key),
			));
		}
		Ok(())
	}
}

fn is_destroyed(value: &Value) -> bool {
	match value.get(DESTROY_MARKER) {
		Some(Value::Bool(flag)) => *flag,
		Some(Value::String(flag)) => matches!(flag.as_str(), "1" | "true"),
		Some(Value::Number(flag)) => flag.as_i64() == Some(1),
		_ => false,
	}
}

fn without_marker(value: Value) -> Value {
	match value {
		Value::Object(mut map) => {
			map.remove(DESTROY_MARKER);
			Value::Object(map)
		}
		other => other,
	}
}

fn merge_nested_one(current: Value, incoming: Value) -> Value {
	if is_destroyed(&incoming) {
		return Value::Null;
	}
	match (current, without_marker(incoming)) {
		(Value::Object(mut base), Value::Object(overlay)) => {
			base.extend(overlay);
			Value::Object(base)
		}
		(_, incoming) => incoming,
	}
}

fn merge_nested_many(current: Value, incoming: Value) -> Value {
	let mut items: Vec<Value> = match current {
		Value::Array(items) => items,
		_ => Vec::new(),
	};
	let entries: Vec<Value> = match incoming {
		Value::Array(entries) => entries,
		// `{"0": {...}, "1": {...}}` form
		Value::Object(map) if map.values().all(Value::is_object) && !map.contains_key("id") => {
			map.into_iter().map(|(_, entry)| entry).collect()
		}
		other => vec![other],
	};

	for entry in entries {
		let position = entry.get("id").and_then(|id| {
			items
				.iter()
				.position(|item| item.get("id").is_some_and(|existing| loosely_equal(existing, id)))
		});
		match (position, is_destroyed(&entry)) {
			(Some(index), true) => {
				items.remove(index);
			}
			(Some(index), false) => {
				let merged = merge_nested_one(items[index].take(), entry);
				items[index] = merged;
			}
			(None, true) => {}
			(None, false) => items.push(without_marker(entry)),
		}
	}
	Value::Array(items)
}

fn upload_metadata(upload: &Upload) -> Value {
	let mut meta = Map::new();
	meta.insert(
		"filename".to_string(),
		upload.filename.clone().map_or(Value::Null, Value::String),
	);
	meta.insert(
		"content_type".to_string(),
		upload.content_type.clone().map_or(Value::Null, Value::String),
	);
	meta.insert("byte_size".to_string(), Value::from(upload.io.len()));
	if let Some(key) = &upload.key {
		meta.insert("key".to_string(), Value::String(key.clone()));
	}
	Value::Object(meta)
}

/// Values reachable through a possibly dotted path; to-many hops fan out.
fn resolve_path<'a>(record: &'a Record, path: &str) -> Vec<&'a Value> {
	let mut segments = path.split('.');
	let Some(head) = segments.next() else {
		return Vec::new();
	};
	let mut current: Vec<&Value> = record.get(head).into_iter().collect();
	for segment in segments {
		current = current
			.into_iter()
			.flat_map(|value| match value {
				Value::Array(items) => items.iter().filter_map(|item| item.get(segment)).collect(),
				Value::Object(map) => map.get(segment).into_iter().collect(),
				_ => Vec::new(),
			})
			.collect();
	}
	current
}

fn first_value<'a>(record: &'a Record, path: &str) -> &'a Value {
	resolve_path(record, path)
		.into_iter()
		.next()
		.unwrap_or(&NULL)
}

/// Three-valued evaluation: `None` is SQL's unknown.
fn evaluate(condition: &FilterCondition, record: &Record) -> Option<bool> {
	match condition {
		FilterCondition::Single(filter) => evaluate_filter(filter, record),
		FilterCondition::And(conditions) => {
			let mut result = Some(true);
			for condition in conditions {
				match evaluate(condition, record) {
					Some(false) => return Some(false),
					None => result = None,
					Some(true) => {}
				}
			}
			result
		}
		FilterCondition::Or(conditions) => {
			let mut result = Some(false);
			for condition in conditions {
				match evaluate(condition, record) {
					Some(true) => return Some(true),
					None => result = None,
					Some(false) => {}
				}
			}
			result
		}
		FilterCondition::Not(inner) => evaluate(inner, record).map(|value| !value),
	}
}

fn evaluate_filter(filter: &Filter, record: &Record) -> Option<bool> {
	let mut candidates = resolve_path(record, &filter.field);
	if candidates.is_empty() {
		candidates.push(&NULL);
	}

	// Any-match across to-many associations, as a join would.
	let mut result = Some(false);
	for candidate in candidates {
		match compare(candidate, filter.operator, &filter.value) {
			Some(true) => return Some(true),
			None => result = None,
			Some(false) => {}
		}
	}
	result
}

fn compare(value: &Value, operator: FilterOperator, expected: &FilterValue) -> Option<bool> {
	match operator {
		FilterOperator::IsNull => return Some(value.is_null()),
		FilterOperator::IsNotNull => return Some(!value.is_null()),
		_ => {}
	}
	if value.is_null() {
		return None;
	}

	match operator {
		FilterOperator::In => {
			let FilterValue::List(options) = expected else {
				return compare(value, FilterOperator::Eq, expected);
			};
			let mut result = Some(false);
			for option in options {
				match compare(value, FilterOperator::Eq, option) {
					Some(true) => return Some(true),
					None => result = None,
					Some(false) => {}
				}
			}
			result
		}
		FilterOperator::Contains | FilterOperator::IContains => {
			let FilterValue::String(needle) = expected else {
				return None;
			};
			let haystack = match value {
				Value::String(text) => text.clone(),
				other => other.to_string(),
			};
			Some(if operator == FilterOperator::IContains {
				haystack.to_lowercase().contains(&needle.to_lowercase())
			} else {
				haystack.contains(needle.as_str())
			})
		}
		_ => {
			let ordering = compare_values(value, &expected.to_json())?;
			Some(match operator {
				FilterOperator::Eq => ordering == Ordering::Equal,
				FilterOperator::Ne => ordering != Ordering::Equal,
				FilterOperator::Gt => ordering == Ordering::Greater,
				FilterOperator::Gte => ordering != Ordering::Less,
				FilterOperator::Lt => ordering == Ordering::Less,
				FilterOperator::Lte => ordering != Ordering::Greater,
				_ => return None,
			})
		}
	}
}

/// Orders two non-null scalars; `None` when they are not comparable.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
	match (left, right) {
		(Value::Null, _) | (_, Value::Null) => None,
		(Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
		(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
		(Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
		(Value::Number(a), Value::String(b)) => a.as_f64()?.partial_cmp(&b.trim().parse::<f64>().ok()?),
		(Value::String(a), Value::Number(b)) => a.trim().parse::<f64>().ok()?.partial_cmp(&b.as_f64()?),
		_ => None,
	}
}

/// Sort order with NULLs first.
fn compare_nullable(left: &Value, right: &Value) -> Ordering {
	match (left.is_null(), right.is_null()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Less,
		(false, true) => Ordering::Greater,
		(false, false) => compare_values(left, right).unwrap_or(Ordering::Equal),
	}
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
	compare_values(left, right) == Some(Ordering::Equal)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::query::{Filter, OrderBy};
	use crate::schema::{Association, Column, ColumnType, TableSchema};
	use proptest::prelude::*;
	use rstest::{fixture, rstest};
	use serde_json::json;

	fn users_schema() -> TableSchema {
		TableSchema::new("User", "users")
			.column(Column::new("id", ColumnType::Integer).primary_key())
			.column(Column::new("login", ColumnType::String).not_null())
			.column(Column::new("age", ColumnType::Integer))
			.column(Column::new("manager_id", ColumnType::Integer))
			.association(Association::belongs_to("manager", "users"))
			.association(Association::has_many("posts", "posts"))
			.attachment("avatar", false)
	}

	#[fixture]
	fn source() -> MemoryDataSource {
		MemoryDataSource::new().with_rows(
			"users",
			vec![
				json!({"id": 1, "login": "ada", "age": 36, "posts": [{"id": 1, "title": "Notes"}]}),
				json!({"id": 2, "login": "bob", "age": null, "posts": []}),
				json!({"id": 3, "login": "cy", "age": 5, "posts": [{"id": 2, "title": "Rust"}, {"id": 3, "title": "Zig"}]}),
				json!({"id": 4, "login": "dee", "age": 36, "posts": []}),
			],
		)
	}

	fn ids(rows: &[Record]) -> Vec<i64> {
		rows.iter()
			.filter_map(|row| row.get("id").and_then(Value::as_i64))
			.collect()
	}

	#[rstest]
	fn test_null_comparisons_are_unknown(source: MemoryDataSource) {
		let lte = QuerySet::new("users").filter(Filter::new("age", FilterOperator::Lte, 5));
		assert_eq!(ids(&source.fetch(&lte).unwrap()), vec![3]);

		// NOT (age <= 5) keeps NULL out, the same as a native `age > 5`.
		let not_lte = QuerySet::new("users").exclude(Filter::new("age", FilterOperator::Lte, 5));
		let gt = QuerySet::new("users").filter(Filter::new("age", FilterOperator::Gt, 5));
		assert_eq!(ids(&source.fetch(&not_lte).unwrap()), vec![1, 4]);
		assert_eq!(ids(&source.fetch(&gt).unwrap()), vec![1, 4]);
	}

	#[rstest]
	fn test_in_with_null_branch(source: MemoryDataSource) {
		let query = QuerySet::new("users").filter(FilterCondition::or(vec![
			Filter::new("age", FilterOperator::In, vec![5, 99]).into(),
			Filter::is_null("age").into(),
		]));
		assert_eq!(ids(&source.fetch(&query).unwrap()), vec![2, 3]);
	}

	#[rstest]
	fn test_multi_key_sort_is_stable(source: MemoryDataSource) {
		let query = QuerySet::new("users").order_by(vec![OrderBy::desc("age"), OrderBy::asc("login")]);
		assert_eq!(ids(&source.fetch(&query).unwrap()), vec![1, 4, 3, 2]);
	}

	#[rstest]
	fn test_dotted_path_matches_any_related(source: MemoryDataSource) {
		let query = QuerySet::new("users").filter(Filter::new("posts.title", FilterOperator::Eq, "Zig"));
		assert_eq!(ids(&source.fetch(&query).unwrap()), vec![3]);
	}

	#[rstest]
	fn test_count_rejects_projection(source: MemoryDataSource) {
		let query = QuerySet::new("users").filter(Filter::is_not_null("age"));
		assert_eq!(source.count(&query).unwrap(), 3);
		assert!(source.count(&query.clone().select(["id"])).is_err());
		assert_eq!(source.count(&query.select(["id"]).without_select()).unwrap(), 3);
	}

	#[rstest]
	fn test_fetch_related_is_bounded(source: MemoryDataSource) {
		let schema = users_schema();
		let rows = source.fetch(&QuerySet::new("users").filter(Filter::new("id", FilterOperator::Eq, 3))).unwrap();
		let posts = source.fetch_related(&schema, &rows[0], "posts", Some(1)).unwrap();
		assert_eq!(posts.len(), 1);
		assert_eq!(source.count_related(&schema, &rows[0], "posts").unwrap(), 2);
		assert_eq!(source.related_fetch_count(), 1);
	}

	#[rstest]
	fn test_insert_assigns_key_and_nested_attributes(source: MemoryDataSource) {
		let schema = users_schema();
		let mut changes = WriteSet::new(
			json!({
				"login": "eve",
				"manager_id": 1,
				"posts_attributes": [{"title": "Hello"}, {"title": "Gone", "_destroy": true}],
			})
			.as_object()
			.cloned()
			.unwrap(),
		);
		changes.uploads.push(Upload {
			field: "avatar".into(),
			io: b"png".to_vec(),
			content_type: Some("image/png".into()),
			filename: Some("a.png".into()),
			key: None,
		});

		let row = source.insert(&schema, changes).unwrap();
		assert_eq!(row["id"], json!(5));
		assert_eq!(row["manager"]["login"], json!("ada"));
		assert_eq!(row["posts"], json!([{"title": "Hello"}]));
		assert_eq!(row["avatar"]["byte_size"], json!(3));
		assert_eq!(source.rows("users").len(), 5);
	}

	#[rstest]
	fn test_update_merges_nested_by_id(source: MemoryDataSource) {
		let schema = users_schema();
		let changes = WriteSet::new(
			json!({"posts_attributes": [{"id": 2, "_destroy": "1"}, {"id": 3, "title": "Zig 0.14"}]})
				.as_object()
				.cloned()
				.unwrap(),
		);
		let row = source.update(&schema, &json!("3"), changes).unwrap();
		assert_eq!(row["posts"], json!([{"id": 3, "title": "Zig 0.14"}]));
	}

	#[rstest]
	fn test_missing_rows(source: MemoryDataSource) {
		let schema = users_schema();
		assert!(matches!(
			source.delete(&schema, &json!(42)),
			Err(Error::RecordNotFound { .. })
		));
		assert!(matches!(
			source.update(&schema, &json!(42), WriteSet::default()),
			Err(Error::RecordNotFound { .. })
		));
		source.delete(&schema, &json!(1)).unwrap();
		assert_eq!(source.rows("users").len(), 3);
	}

	proptest! {
		#[test]
		fn prop_gte_matches_reference(
			ages in prop::collection::vec(prop::option::of(-50i64..50), 0..20),
			bound in -50i64..50,
		) {
			let rows = ages
				.iter()
				.enumerate()
				.map(|(index, age)| json!({"id": index, "age": age}))
				.collect();
			let source = MemoryDataSource::new().with_rows("people", rows);
			let query = QuerySet::new("people").filter(Filter::new("age", FilterOperator::Gte, bound));

			let expected: Vec<i64> = ages
				.iter()
				.enumerate()
				.filter(|(_, age)| age.is_some_and(|age| age >= bound))
				.map(|(index, _)| index as i64)
				.collect();
			prop_assert_eq!(ids(&source.fetch(&query).unwrap()), expected);
		}
	}
}
