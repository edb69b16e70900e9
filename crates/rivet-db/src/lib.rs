//! # Rivet DB
//!
//! The data layer as seen by rivet. Nothing here talks to a database directly:
//!
//! - [`ModelSchema`] describes a model (columns, associations, attachments,
//!   methods) and is provided by the collaborator, with [`TableSchema`] as a
//!   builder-style implementation.
//! - [`QuerySet`] is a lazy, composable description of a query. Filters and
//!   pagination only ever extend it; nothing is materialized until a
//!   [`DataSource`] is asked to fetch it.
//! - [`MemoryDataSource`] evaluates query descriptions against in-memory
//!   records and serves as the reference semantics.
//! - [`sql`] renders a description to parameterized SQL.

pub mod memory;
pub mod query;
pub mod registry;
pub mod schema;
pub mod source;
pub mod sql;

pub use memory::MemoryDataSource;
pub use query::{
	Filter, FilterCondition, FilterOperator, FilterValue, OrderBy, OrderDirection, QuerySet,
};
pub use registry::SchemaRegistry;
pub use schema::{
	Association, AssociationKind, Attachment, Column, ColumnType, MethodFn, ModelSchema,
	TableSchema, ValidatorFn,
};
pub use source::{DataSource, Record, Upload, WriteSet, found};
