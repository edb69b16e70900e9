//! # Rivet
//!
//! A convention-driven REST resource layer. Given a model description and a
//! small amount of per-controller configuration, rivet answers list, show,
//! create, update, destroy and metadata requests with consistent field
//! selection, filtering, ordering, search, pagination and serialization.
//!
//! ## Feature Flags
//!
//! - `core` - field resolution, filters, pagination and serializers
//! - `conf` - layered settings and logging bootstrap
//! - `views` - controllers, handlers and renderers
//! - `full` (default) - everything
//!
//! ## Quick Example
//!
//! ```rust
//! use rivet::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let registry = SchemaRegistry::new().register(
//! 	TableSchema::new("User", "users")
//! 		.column(Column::new("id", ColumnType::Integer).primary_key())
//! 		.column(Column::new("login", ColumnType::String).not_null())
//! 		.column(Column::new("balance", ColumnType::Integer)),
//! );
//! let source = MemoryDataSource::new().with_rows("users", vec![
//! 	json!({"id": 1, "login": "ada", "balance": 50}),
//! 	json!({"id": 2, "login": "bob", "balance": 5}),
//! ]);
//! let settings = Arc::new(Settings::default());
//! let config = ControllerConfig::new("users", &settings);
//! let controller = Controller::new(config, Arc::new(registry), settings, Arc::new(source))?;
//!
//! let request = Request::get().with_query_param("balance_gt", "10");
//! let body = ModelViewSet::new(controller).handle(&request)?.json()?;
//! assert_eq!(body["results"], json!([{"id": 1, "login": "ada", "balance": 50}]));
//! # Ok::<(), rivet::Error>(())
//! ```

#[cfg(feature = "conf")]
pub mod conf;
#[cfg(feature = "core")]
pub mod core;
#[cfg(feature = "views")]
pub mod views;

#[cfg(feature = "core")]
pub use rivet_core::{Error, ErrorBody, FieldErrors, ParamValue, QueryParams, Result, ValidationKind};

#[cfg(feature = "conf")]
pub use rivet_conf::{Settings, init_logging};

#[cfg(feature = "core")]
pub use rivet_db::{
	Association, Column, ColumnType, DataSource, MemoryDataSource, ModelSchema, QuerySet, Record,
	SchemaRegistry, TableSchema,
};

#[cfg(feature = "core")]
pub use rivet_fields::{FieldConfig, FieldOptions, FieldResolver, FieldSpec};

#[cfg(feature = "core")]
pub use rivet_filters::{FilterBackend, FilterChain, ModelFilter, OrderingFilter, SearchFilter};

#[cfg(feature = "core")]
pub use rivet_pagination::{PageNumberPagination, PaginatedResponse};

#[cfg(feature = "core")]
pub use rivet_serializers::{MethodFieldRegistry, NativeSerializer, SerializerConfig, SerializerOptions};

#[cfg(feature = "views")]
pub use rivet_views::{
	ActionType, Capabilities, Controller, ControllerConfig, ModelViewSet, RenderFormat, Request,
	Response, ViewSet,
};

/// Commonly used types.
pub mod prelude {
	#[cfg(feature = "core")]
	pub use crate::{
		Association, Column, ColumnType, DataSource, Error, FieldConfig, FieldSpec, MemoryDataSource,
		MethodFieldRegistry, ModelSchema, QueryParams, Result, SchemaRegistry, SerializerConfig,
		SerializerOptions, TableSchema,
	};

	#[cfg(feature = "conf")]
	pub use crate::Settings;

	#[cfg(feature = "views")]
	pub use crate::{
		ActionType, Capabilities, Controller, ControllerConfig, ModelViewSet, Request, Response,
		ViewSet,
	};
}
