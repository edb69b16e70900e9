//! Resolution engine: errors, the data layer abstraction, field resolution,
//! filters, pagination and serializers.
//!
//! # Examples
//!
//! ```rust
//! use rivet::core::pagination::total_pages;
//!
//! assert_eq!(total_pages(7, 3), 3);
//! ```

pub use rivet_core::*;

pub use rivet_db as db;
pub use rivet_fields as fields;
pub use rivet_filters as filters;
pub use rivet_pagination as pagination;
pub use rivet_serializers as serializers;
