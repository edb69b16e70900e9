//! Request abstraction handed over by the web collaborator.

use http::{HeaderMap, HeaderValue, Method, header};
use indexmap::IndexMap;
use rivet_core::{ParamValue, QueryParams};
use serde_json::Value;

/// An already-parsed HTTP request.
///
/// Routing, body parsing and query-string decoding happen before a request
/// reaches a controller; this type only carries their results.
#[derive(Debug, Clone)]
pub struct Request {
	pub method: Method,
	pub headers: HeaderMap,
	/// Path parameters captured by the router (`id` for detail routes).
	pub path_params: IndexMap<String, String>,
	pub query: QueryParams,
	/// Parsed request body, if any.
	pub body: Option<Value>,
}

impl Request {
	/// Create a request with the given method
	///
	/// # Examples
	///
	/// ```
	/// use rivet_views::Request;
	/// use http::Method;
	///
	/// let request = Request::new(Method::GET).with_query_param("page", "2");
	/// assert_eq!(request.query.get_str("page"), Some("2"));
	/// assert!(!request.is_detail());
	/// ```
	pub fn new(method: Method) -> Self {
		Self {
			method,
			headers: HeaderMap::new(),
			path_params: IndexMap::new(),
			query: QueryParams::new(),
			body: None,
		}
	}

	pub fn get() -> Self {
		Self::new(Method::GET)
	}

	pub fn post() -> Self {
		Self::new(Method::POST)
	}

	pub fn put() -> Self {
		Self::new(Method::PUT)
	}

	pub fn patch() -> Self {
		Self::new(Method::PATCH)
	}

	pub fn delete() -> Self {
		Self::new(Method::DELETE)
	}

	pub fn options() -> Self {
		Self::new(Method::OPTIONS)
	}

	pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.path_params.insert(name.into(), value.into());
		self
	}

	pub fn with_query(mut self, query: QueryParams) -> Self {
		self.query = query;
		self
	}

	pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
		self.query.insert(name, value);
		self
	}

	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);
		self
	}

	/// Adds a header; invalid names or values are ignored.
	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) = (
			header::HeaderName::from_bytes(name.as_bytes()),
			HeaderValue::from_str(value),
		) {
			self.headers.insert(name, value);
		}
		self
	}

	pub fn path_param(&self, name: &str) -> Option<&str> {
		self.path_params.get(name).map(String::as_str)
	}

	/// Whether the request targets a single record (an `id` path parameter).
	pub fn is_detail(&self) -> bool {
		self.path_params.contains_key("id")
	}

	pub fn accept(&self) -> Option<&str> {
		self.headers
			.get(header::ACCEPT)
			.and_then(|value| value.to_str().ok())
	}
}
