//! Controllers, handlers and renderers.
//!
//! # Examples
//!
//! ```rust
//! use rivet::views::{ActionType, Request};
//!
//! let request = Request::patch().with_path_param("id", "3");
//! assert_eq!(
//! 	ActionType::route(&request.method, request.is_detail()).unwrap(),
//! 	ActionType::PartialUpdate
//! );
//! ```

pub use rivet_views::*;
