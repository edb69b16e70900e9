//! Error taxonomy and error body formatting.
//!
//! Internals never swallow errors coming from the data layer. They propagate up
//! to the boundary layer, which maps each kind to a status code through
//! [`Error::status_code`] and formats the payload through [`Error::to_body`].

use std::collections::BTreeMap;
use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Validation messages keyed by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Stage of a write at which model-level validation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
	Invalid,
	NotSaved,
	NotDestroyed,
}

impl fmt::Display for ValidationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let text = match self {
			ValidationKind::Invalid => "Record invalid",
			ValidationKind::NotSaved => "Record not saved",
			ValidationKind::NotDestroyed => "Record not destroyed",
		};
		f.write_str(text)
	}
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// No model could be inferred for a controller.
	#[error("Unable to determine model for controller `{controller}`")]
	UnknownModel { controller: String },

	/// A lookup by primary key or alternate key found nothing.
	#[error("Couldn't find {model} with {key}")]
	RecordNotFound { model: String, key: String },

	/// A write violated model-level constraints.
	#[error("{kind}")]
	ValidationFailed {
		kind: ValidationKind,
		errors: FieldErrors,
	},

	/// A handler tried to emit an absent payload instead of raising `RecordNotFound`.
	#[error("Attempted to emit an absent payload; raise RecordNotFound before serializing")]
	NilPayload,

	/// A required request parameter is entirely missing.
	#[error("Missing required parameter `{0}`")]
	ParameterMissing(String),

	#[error("Invalid parameter: {0}")]
	InvalidParameter(String),

	/// The action is outside the controller's capability set.
	#[error("Action `{0}` is not supported")]
	MethodNotAllowed(String),

	#[error("Database error: {0}")]
	Database(String),

	#[error("Configuration error: {0}")]
	Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	pub fn record_not_found(model: impl Into<String>, key: impl fmt::Display) -> Self {
		Error::RecordNotFound {
			model: model.into(),
			key: key.to_string(),
		}
	}

	pub fn invalid(errors: FieldErrors) -> Self {
		Error::ValidationFailed {
			kind: ValidationKind::Invalid,
			errors,
		}
	}

	/// HTTP status the boundary layer responds with for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Error::RecordNotFound { .. } => StatusCode::NOT_FOUND,
			Error::ValidationFailed { .. }
			| Error::ParameterMissing(_)
			| Error::InvalidParameter(_) => StatusCode::BAD_REQUEST,
			Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
			Error::UnknownModel { .. }
			| Error::NilPayload
			| Error::Database(_)
			| Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn is_server_error(&self) -> bool {
		self.status_code().is_server_error()
	}

	/// Builds the `{message, errors?, exception?}` error payload.
	///
	/// Raw exception detail is only attached when `include_exception` is set,
	/// typically from a debug setting.
	///
	/// # Examples
	///
	/// ```
	/// use rivet_core::exception::Error;
	///
	/// let body = Error::record_not_found("User", "id=7").to_body(false);
	/// assert_eq!(body.message, "Couldn't find User with id=7");
	/// assert!(body.exception.is_none());
	/// ```
	pub fn to_body(&self, include_exception: bool) -> ErrorBody {
		let errors = match self {
			Error::ValidationFailed { errors, .. } => Some(errors.clone()),
			_ => None,
		};
		ErrorBody {
			message: self.to_string(),
			errors,
			exception: include_exception.then(|| format!("{:?}", self)),
		}
	}
}

/// Error payload emitted by the boundary layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub errors: Option<FieldErrors>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exception: Option<String>,
}
