//! JSON and XML rendering of plain data trees.

use bytes::Bytes;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use rivet_core::{Error, QueryParams, Result};
use serde_json::Value;
use std::io::Write;

const XML_ROOT: &str = "response";
const XML_ITEM: &str = "item";

/// Output format picked for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
	#[default]
	Json,
	Xml,
}

impl RenderFormat {
	/// Picks a format from a `format` query parameter, then the `Accept` header.
	///
	/// # Examples
	///
	/// ```
	/// use rivet_core::QueryParams;
	/// use rivet_views::RenderFormat;
	///
	/// let params = QueryParams::new().with("format", "xml");
	/// assert_eq!(RenderFormat::negotiate(&params, None), RenderFormat::Xml);
	/// assert_eq!(
	/// 	RenderFormat::negotiate(&QueryParams::new(), Some("text/html, application/xml")),
	/// 	RenderFormat::Xml
	/// );
	/// assert_eq!(RenderFormat::negotiate(&QueryParams::new(), None), RenderFormat::Json);
	/// ```
	pub fn negotiate(params: &QueryParams, accept: Option<&str>) -> Self {
		match params.get_trimmed("format") {
			Some(format) if format.eq_ignore_ascii_case("xml") => return RenderFormat::Xml,
			Some(format) if format.eq_ignore_ascii_case("json") => return RenderFormat::Json,
			_ => {}
		}
		let prefers_xml = accept.is_some_and(|accept| {
			accept
				.split(',')
				.map(|media| media.split(';').next().unwrap_or_default().trim())
				.take_while(|media| *media != "application/json")
				.any(|media| media.ends_with("/xml"))
		});
		if prefers_xml {
			RenderFormat::Xml
		} else {
			RenderFormat::Json
		}
	}

	pub fn renderer(self) -> &'static dyn Renderer {
		match self {
			RenderFormat::Json => &JsonRenderer,
			RenderFormat::Xml => &XmlRenderer,
		}
	}
}

/// Serializes a data tree into a response body.
pub trait Renderer: Send + Sync {
	fn media_type(&self) -> &'static str;

	fn render(&self, data: &Value) -> Result<Bytes>;
}

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
	fn media_type(&self) -> &'static str {
		"application/json"
	}

	fn render(&self, data: &Value) -> Result<Bytes> {
		serde_json::to_vec(data)
			.map(Bytes::from)
			.map_err(|e| Error::Configuration(format!("JSON rendering failed: {e}")))
	}
}

/// Renders the same tree as JSON would, as XML.
///
/// The document root is `<response>`; sequence elements become `<item>`
/// children and nulls become empty elements marked `nil="true"`.
pub struct XmlRenderer;

impl Renderer for XmlRenderer {
	fn media_type(&self) -> &'static str {
		"application/xml"
	}

	fn render(&self, data: &Value) -> Result<Bytes> {
		let mut writer = Writer::new(Vec::new());
		write_element(&mut writer, XML_ROOT, data)
			.map_err(|e| Error::Configuration(format!("XML rendering failed: {e}")))?;
		Ok(Bytes::from(writer.into_inner()))
	}
}

/// Element names must not carry characters outside the XML name set.
fn element_name(key: &str) -> String {
	let name: String = key
		.chars()
		.map(|c| {
			if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
				c
			} else {
				'_'
			}
		})
		.collect();
	match name.chars().next() {
		Some(first) if first.is_alphabetic() || first == '_' => name,
		_ => format!("_{name}"),
	}
}

fn write_element<W: Write>(writer: &mut Writer<W>, name: &str, value: &Value) -> std::io::Result<()> {
	let start = BytesStart::new(name);
	match value {
		Value::Null => {
			writer.write_event(Event::Empty(start.with_attributes([("nil", "true")])))?;
			return Ok(());
		}
		Value::Object(map) => {
			writer.write_event(Event::Start(start))?;
			for (key, child) in map {
				write_element(writer, &element_name(key), child)?;
			}
		}
		Value::Array(items) => {
			writer.write_event(Event::Start(start))?;
			for item in items {
				write_element(writer, XML_ITEM, item)?;
			}
		}
		Value::String(text) => {
			writer.write_event(Event::Start(start))?;
			writer.write_event(Event::Text(BytesText::new(text)))?;
		}
		Value::Bool(_) | Value::Number(_) => {
			writer.write_event(Event::Start(start))?;
			writer.write_event(Event::Text(BytesText::new(&value.to_string())))?;
		}
	}
	writer.write_event(Event::End(BytesEnd::new(name)))?;
	Ok(())
}
