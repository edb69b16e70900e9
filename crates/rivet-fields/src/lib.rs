//! # Rivet Fields
//!
//! Decides which model fields a controller exposes for an action, and which
//! request-body keys a write may apply.
//!
//! - [`FieldSpec`] and [`FieldOptions`] carry the declared configuration.
//! - [`FieldTable`] classifies every name once per model ([`FieldKind`]).
//! - [`FieldResolver`] resolves the field list, association sub-fields and
//!   field metadata for an action.
//! - [`AllowedParameters`] turns resolved fields into a whitelist and sanitizes
//!   request bodies with it.

pub mod config;
pub mod kind;
pub mod params;
pub mod resolver;
pub mod spec;

pub use config::{FieldConfig, FieldOptions};
pub use kind::{FieldKind, FieldTable};
pub use params::{AllowedParam, AllowedParameters, extract_root};
pub use resolver::{Field, FieldResolver, action_aliases};
pub use spec::FieldSpec;
