//! The data source collaborator.

use rivet_core::{Error, Result};
use serde_json::{Map, Value};

use crate::query::QuerySet;
use crate::schema::ModelSchema;

/// A materialized row: column values plus any eager-loaded associations.
pub type Record = Map<String, Value>;

/// A decoded file upload bound for an attachment field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
	pub field: String,
	pub io: Vec<u8>,
	pub content_type: Option<String>,
	pub filename: Option<String>,
	pub key: Option<String>,
}

/// Sanitized attributes of a write plus the uploads that go with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSet {
	pub attributes: Record,
	pub uploads: Vec<Upload>,
}

impl WriteSet {
	pub fn new(attributes: Record) -> Self {
		Self {
			attributes,
			uploads: Vec::new(),
		}
	}
}

/// Executes query descriptions.
///
/// Calls are synchronous and bounded by the surrounding request. Errors are
/// returned as-is; nothing above the data source retries.
pub trait DataSource: Send + Sync {
	fn fetch(&self, query: &QuerySet) -> Result<Vec<Record>>;

	fn count(&self, query: &QuerySet) -> Result<usize>;

	/// Related records of `association` for one parent, optionally bounded.
	fn fetch_related(
		&self,
		schema: &dyn ModelSchema,
		record: &Record,
		association: &str,
		limit: Option<usize>,
	) -> Result<Vec<Record>>;

	fn count_related(
		&self,
		schema: &dyn ModelSchema,
		record: &Record,
		association: &str,
	) -> Result<usize>;

	fn insert(&self, schema: &dyn ModelSchema, changes: WriteSet) -> Result<Record>;

	fn update(&self, schema: &dyn ModelSchema, key: &Value, changes: WriteSet) -> Result<Record>;

	fn delete(&self, schema: &dyn ModelSchema, key: &Value) -> Result<()>;

	fn first(&self, query: &QuerySet) -> Result<Option<Record>> {
		Ok(self.fetch(&query.clone().limit(1))?.into_iter().next())
	}
}

/// Converts a missing row into `RecordNotFound`.
pub fn found(record: Option<Record>, model: &str, key: impl std::fmt::Display) -> Result<Record> {
	record.ok_or_else(|| Error::record_not_found(model, key))
}
