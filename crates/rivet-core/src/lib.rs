//! # Rivet Core
//!
//! Fundamental types shared by every rivet crate: the error taxonomy used at the
//! request boundary and the query parameter mapping handed over by the web
//! collaborator.

pub mod exception;
pub mod params;

pub use exception::{Error, ErrorBody, FieldErrors, Result, ValidationKind};
pub use params::{ParamValue, QueryParams};
