use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use rivet_core::{Error, Result};
use serde_json::Value;

use crate::renderers::RenderFormat;

/// HTTP Response representation
#[derive(Debug, Clone)]
pub struct Response {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
}

impl Response {
	/// Create a new Response with the given status code
	///
	/// # Examples
	///
	/// ```
	/// use rivet_views::Response;
	/// use http::StatusCode;
	///
	/// let response = Response::new(StatusCode::OK);
	/// assert_eq!(response.status, StatusCode::OK);
	/// assert!(response.body.is_empty());
	/// ```
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}

	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	pub fn created() -> Self {
		Self::new(StatusCode::CREATED)
	}

	pub fn no_content() -> Self {
		Self::new(StatusCode::NO_CONTENT)
	}

	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Renders `data` in `format` and sets the matching `Content-Type`.
	pub fn with_data(mut self, data: &Value, format: RenderFormat) -> Result<Self> {
		let renderer = format.renderer();
		self.body = renderer.render(data)?;
		self.headers.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static(renderer.media_type()),
		);
		Ok(self)
	}

	pub fn with_json(self, data: &Value) -> Result<Self> {
		self.with_data(data, RenderFormat::Json)
	}

	pub fn content_type(&self) -> Option<&str> {
		self.headers
			.get(header::CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
	}

	/// Parses a JSON body back into a tree.
	pub fn json(&self) -> Result<Value> {
		serde_json::from_slice(&self.body)
			.map_err(|e| Error::InvalidParameter(format!("response body is not JSON: {e}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_with_json() {
		let response = Response::created().with_json(&json!({"id": 1})).unwrap();

		assert_eq!(response.status, StatusCode::CREATED);
		assert_eq!(response.content_type(), Some("application/json"));
		assert_eq!(response.json().unwrap(), json!({"id": 1}));
	}

	#[rstest]
	fn test_with_xml() {
		let response = Response::ok().with_data(&json!({"id": 1}), RenderFormat::Xml).unwrap();

		assert_eq!(response.content_type(), Some("application/xml"));
		assert_eq!(&response.body[..], b"<response><id>1</id></response>");
		assert!(response.json().is_err());
	}
}
