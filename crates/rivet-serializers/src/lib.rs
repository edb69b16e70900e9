//! # Rivet Serializers
//!
//! Turns records into plain JSON trees shaped by a [`SerializerConfig`].
//!
//! The effective config for a request is chosen by precedence (explicit,
//! action, singular or plural, default, derived from the resolved fields) and
//! then narrowed by the `only` and `except` query parameters. Associations are
//! embedded from eager-loaded data, or fetched per record when an
//! associations limit applies.

pub mod config;
pub mod method_field;
pub mod native;

pub use config::{SerializerConfig, SerializerOptions, derive_config};
pub use method_field::{
	MethodFieldError, MethodFieldFn, MethodFieldRegistry, SerializerMethodField,
};
pub use native::{NativeSerializer, Serializer};
