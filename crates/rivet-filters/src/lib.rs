//! # Rivet Filters
//!
//! Filter backends turn request query parameters into predicates, ordering and
//! search conditions on a [`QuerySet`](rivet_db::QuerySet). They never execute
//! anything: each backend takes the lazy description and returns an extended
//! one, and a [`FilterChain`] folds them left to right.
//!
//! The default chain is [`ModelFilter`] → [`OrderingFilter`] → [`SearchFilter`].

pub mod backend;
pub mod model;
pub mod ordering;
pub mod search;

pub use backend::{BuiltinFilter, FilterBackend, FilterChain, FilterContext};
pub use model::{ModelFilter, coerce};
pub use ordering::OrderingFilter;
pub use search::SearchFilter;
