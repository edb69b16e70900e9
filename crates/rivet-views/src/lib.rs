//! Controllers for convention-driven REST endpoints.
//!
//! A [`Controller`] ties a model to its field resolver, filter chain,
//! paginator and serializer; a [`ModelViewSet`] routes requests to the
//! controller's actions and renders errors.
//!
//! ## Example
//!
//! ```
//! use rivet_conf::Settings;
//! use rivet_db::{Column, ColumnType, MemoryDataSource, SchemaRegistry, TableSchema};
//! use rivet_views::{Controller, ControllerConfig, ModelViewSet, Request, ViewSet};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let registry = SchemaRegistry::new().register(
//! 	TableSchema::new("Post", "posts")
//! 		.column(Column::new("id", ColumnType::Integer).primary_key())
//! 		.column(Column::new("title", ColumnType::String)),
//! );
//! let source = MemoryDataSource::new().with_rows("posts", vec![json!({"id": 1, "title": "Hi"})]);
//! let settings = Arc::new(Settings::default());
//! let config = ControllerConfig::new("posts", &settings);
//! let controller = Controller::new(config, Arc::new(registry), settings, Arc::new(source)).unwrap();
//!
//! let response = ModelViewSet::new(controller).dispatch(Request::get()).await;
//! assert_eq!(response.json().unwrap()["count"], json!(1));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! # 	tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod actions;
pub mod config;
pub mod controller;
pub mod handlers;
pub mod renderers;
pub mod request;
pub mod response;
pub mod viewset;

pub use actions::{ActionType, Capabilities};
pub use config::ControllerConfig;
pub use controller::{Controller, LOOKUP_PARAM};
pub use handlers::{Handler, emit, handler_for};
pub use renderers::{JsonRenderer, RenderFormat, Renderer, XmlRenderer};
pub use request::Request;
pub use response::Response;
pub use viewset::{ModelViewSet, ViewSet};
