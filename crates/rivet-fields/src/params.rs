//! Allowed parameters and request body sanitizing.
//!
//! Writes only ever see keys derived from the resolved field list. Anything
//! else in a body is dropped before it reaches the data source.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rivet_core::{Error, Result};
use rivet_db::{Record, Upload, WriteSet};
use serde_json::{Map, Value};

use crate::kind::FieldKind;
use crate::resolver::FieldResolver;

const DESTROY_MARKER: &str = "_destroy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedParam {
	/// A scalar value.
	Key(String),
	/// An array of scalars, e.g. `posts_ids`.
	Array(String),
	/// Nested attribute writes for an association (`<name>_attributes`).
	Nested {
		association: String,
		key: String,
		collection: bool,
		keys: Vec<String>,
	},
	/// File upload slot.
	Attachment { name: String, multiple: bool },
}

impl AllowedParam {
	pub fn key(&self) -> &str {
		match self {
			AllowedParam::Key(key) | AllowedParam::Array(key) => key,
			AllowedParam::Nested { key, .. } => key,
			AllowedParam::Attachment { name, .. } => name,
		}
	}
}

/// The write whitelist of a controller action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedParameters {
	params: Vec<AllowedParam>,
}

impl AllowedParameters {
	pub fn new(params: Vec<AllowedParam>) -> Self {
		Self { params }
	}

	/// Derives the whitelist from the fields resolved for `action`.
	///
	/// Primary keys and read-only fields are never writable. Associations
	/// contribute `<name>_id`/`<name>_ids` and `<name>_attributes` keys as
	/// permitted by the controller. Fails with [`Error::UnknownModel`] when no
	/// field can be resolved at all.
	pub fn for_action(resolver: &FieldResolver, action: Option<&str>) -> Result<Self> {
		let fields = resolver.resolve_fields(action);
		if fields.is_empty() {
			return Err(Error::UnknownModel {
				controller: resolver.controller().to_string(),
			});
		}

		let schema = resolver.schema();
		let options = resolver.options();
		let mut params = Vec::new();

		for field in &fields {
			if options.is_read_only(field) {
				continue;
			}
			match resolver.kind(field) {
				FieldKind::Column => {
					let writable = schema
						.column(field)
						.is_some_and(|column| !column.primary_key && !column.read_only);
					if writable && field != schema.primary_key() {
						params.push(AllowedParam::Key(field.clone()));
					}
				}
				FieldKind::Method | FieldKind::RichText => {
					params.push(AllowedParam::Key(field.clone()));
				}
				FieldKind::Computed => {
					if options.is_write_only(field) {
						params.push(AllowedParam::Key(field.clone()));
					}
				}
				FieldKind::Association => {
					let Some(association) = schema.association(field) else {
						continue;
					};
					if options.permit_id_assignment {
						params.push(if association.is_collection() {
							AllowedParam::Array(association.id_param())
						} else {
							AllowedParam::Key(association.id_param())
						});
					}
					if options.permit_nested_attributes_assignment {
						let mut keys = resolver.sub_fields(field);
						keys.push(DESTROY_MARKER.to_string());
						params.push(AllowedParam::Nested {
							association: association.name.clone(),
							key: association.attributes_param(),
							collection: association.is_collection(),
							keys,
						});
					}
				}
				FieldKind::Attachment => {
					let multiple = schema
						.attachment(field)
						.is_some_and(|attachment| attachment.multiple);
					params.push(AllowedParam::Attachment {
						name: field.clone(),
						multiple,
					});
				}
			}
		}

		Ok(Self { params })
	}

	pub fn params(&self) -> &[AllowedParam] {
		&self.params
	}

	pub fn keys(&self) -> Vec<&str> {
		self.params.iter().map(AllowedParam::key).collect()
	}

	pub fn get(&self, key: &str) -> Option<&AllowedParam> {
		self.params.iter().find(|param| param.key() == key)
	}

	pub fn is_permitted(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	/// Whitelists a request body into a [`WriteSet`].
	///
	/// Bare association objects are first moved to their `_attributes` key and
	/// inline uploads are decoded. Unpermitted keys are dropped and logged.
	/// Undecodable uploads fail with [`Error::InvalidParameter`].
	pub fn sanitize(&self, body: &Value) -> Result<WriteSet> {
		let Value::Object(input) = body else {
			return Err(Error::InvalidParameter(
				"request body must be an object".to_string(),
			));
		};
		let mut input = input.clone();
		self.dispatch_associations(&mut input);

		let mut changes = WriteSet::default();
		let mut unpermitted = Vec::new();

		for (key, value) in input {
			let kept = match self.get(&key) {
				Some(AllowedParam::Key(_)) => is_scalar(&value).then_some(value),
				Some(AllowedParam::Array(_)) => match value {
					Value::Array(items) => Some(Value::Array(
						items.into_iter().filter(is_scalar).collect(),
					)),
					_ => None,
				},
				Some(AllowedParam::Nested {
					collection, keys, ..
				}) => permit_nested(value, *collection, keys),
				Some(AllowedParam::Attachment { name, multiple }) => {
					attach(name, *multiple, value, &mut changes.uploads)?
				}
				None => None,
			};
			match kept {
				Some(value) => {
					changes.attributes.insert(key, value);
				}
				None if self.is_upload_slot(&key) => {}
				None => unpermitted.push(key),
			}
		}

		if !unpermitted.is_empty() {
			tracing::debug!(keys = ?unpermitted, "unpermitted parameters dropped");
		}
		Ok(changes)
	}

	fn is_upload_slot(&self, key: &str) -> bool {
		matches!(self.get(key), Some(AllowedParam::Attachment { .. }))
	}

	fn dispatch_associations(&self, input: &mut Map<String, Value>) {
		for param in &self.params {
			let AllowedParam::Nested {
				association, key, ..
			} = param
			else {
				continue;
			};
			if input.contains_key(key) {
				continue;
			}
			let nested = match input.get(association) {
				Some(Value::Object(_)) => true,
				Some(Value::Array(items)) => items.iter().all(Value::is_object),
				_ => false,
			};
			if !nested {
				continue;
			}
			if let Some(value) = input.remove(association) {
				input.insert(key.clone(), value);
			}
		}
	}
}

/// The value under `root`, or [`Error::ParameterMissing`] when it is absent,
/// null or an empty object.
pub fn extract_root<'a>(body: &'a Value, root: &str) -> Result<&'a Value> {
	match body.get(root) {
		None | Some(Value::Null) => Err(Error::ParameterMissing(root.to_string())),
		Some(Value::Object(map)) if map.is_empty() => {
			Err(Error::ParameterMissing(root.to_string()))
		}
		Some(value) => Ok(value),
	}
}

fn is_scalar(value: &Value) -> bool {
	!matches!(value, Value::Object(_) | Value::Array(_))
}

fn permit_object(map: Map<String, Value>, keys: &[String]) -> Value {
	let permitted: Record = map
		.into_iter()
		.filter(|(key, value)| keys.contains(key) && is_scalar(value))
		.collect();
	Value::Object(permitted)
}

fn permit_nested(value: Value, collection: bool, keys: &[String]) -> Option<Value> {
	let permit_all = |items: Vec<Value>| {
		Value::Array(
			items
				.into_iter()
				.filter_map(|item| match item {
					Value::Object(map) => Some(permit_object(map, keys)),
					_ => None,
				})
				.collect(),
		)
	};
	match value {
		Value::Object(map) if !collection => Some(permit_object(map, keys)),
		Value::Array(items) if collection => Some(permit_all(items)),
		// `{"0": {...}, "1": {...}}` as sent by form encoders.
		Value::Object(map) if map.values().all(Value::is_object) && !map.is_empty() => {
			Some(permit_all(map.into_iter().map(|(_, item)| item).collect()))
		}
		Value::Object(map) => Some(permit_all(vec![Value::Object(map)])),
		_ => None,
	}
}

/// Collects uploads for an attachment slot. Returns the value to keep as a
/// plain attribute, if any (signed keys and nulls pass through).
fn attach(
	field: &str,
	multiple: bool,
	value: Value,
	uploads: &mut Vec<Upload>,
) -> Result<Option<Value>> {
	let items = match value {
		Value::Array(items) if multiple => items,
		Value::Array(_) => return Ok(None),
		single => vec![single],
	};

	let mut references = Vec::new();
	for item in items {
		match decode_upload(field, &item)? {
			Some(upload) => uploads.push(upload),
			None if matches!(item, Value::String(_) | Value::Null) => references.push(item),
			None => {}
		}
	}

	Ok(match (multiple, references.len()) {
		(_, 0) => None,
		(true, _) => Some(Value::Array(references)),
		(false, _) => references.pop(),
	})
}

fn decode_upload(field: &str, value: &Value) -> Result<Option<Upload>> {
	match value {
		Value::String(text) if text.starts_with("data:") => {
			let (content_type, io) = decode_data_url(field, text)?;
			Ok(Some(Upload {
				field: field.to_string(),
				io,
				content_type,
				filename: None,
				key: None,
			}))
		}
		Value::Object(map) if map.contains_key("io") => {
			let encoded = map.get("io").and_then(Value::as_str).ok_or_else(|| {
				Error::InvalidParameter(format!("{}: upload io must be a string", field))
			})?;
			let (sniffed, io) = if encoded.starts_with("data:") {
				decode_data_url(field, encoded)?
			} else {
				(None, decode_base64(field, encoded)?)
			};
			let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
			Ok(Some(Upload {
				field: field.to_string(),
				io,
				content_type: text("content_type").or(sniffed),
				filename: text("filename"),
				key: text("key"),
			}))
		}
		_ => Ok(None),
	}
}

/// Decodes `data:<content-type>;base64,<payload>`.
fn decode_data_url(field: &str, url: &str) -> Result<(Option<String>, Vec<u8>)> {
	let rest = url.strip_prefix("data:").unwrap_or(url);
	let (header, payload) = rest.split_once(',').ok_or_else(|| {
		Error::InvalidParameter(format!("{}: malformed data URL", field))
	})?;
	let content_type = header.strip_suffix(";base64").ok_or_else(|| {
		Error::InvalidParameter(format!("{}: only base64 data URLs are supported", field))
	})?;
	let content_type = (!content_type.is_empty()).then(|| content_type.to_string());
	Ok((content_type, decode_base64(field, payload)?))
}

fn decode_base64(field: &str, payload: &str) -> Result<Vec<u8>> {
	STANDARD
		.decode(payload.trim())
		.map_err(|error| Error::InvalidParameter(format!("{}: invalid base64 payload: {}", field, error)))
}
