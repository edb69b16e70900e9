//! Field classification.

use indexmap::IndexMap;
use rivet_conf::Settings;
use rivet_db::ModelSchema;
use serde::Serialize;

/// What a field name refers to on a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
	Column,
	Method,
	Association,
	Attachment,
	RichText,
	/// Not known to the model; supplied by a serializer method or the client.
	Computed,
}

/// Name to [`FieldKind`] lookup, built once per model.
///
/// A name that is both a column and something else is a column. Attachments
/// and rich text fields only count while they are enabled in [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
	kinds: IndexMap<String, FieldKind>,
}

impl FieldTable {
	pub fn build(schema: &dyn ModelSchema, settings: &Settings) -> Self {
		let mut kinds = IndexMap::new();
		let mut add = |name: &str, kind: FieldKind| {
			kinds.entry(name.to_string()).or_insert(kind);
		};

		for column in schema.columns() {
			add(&column.name, FieldKind::Column);
		}
		for association in schema.associations() {
			add(&association.name, FieldKind::Association);
		}
		if settings.enable_attachments {
			for attachment in schema.attachments() {
				add(&attachment.name, FieldKind::Attachment);
			}
		}
		if settings.enable_rich_text {
			for field in schema.rich_text_fields() {
				add(field, FieldKind::RichText);
			}
		}
		for method in schema.methods() {
			add(method, FieldKind::Method);
		}

		Self { kinds }
	}

	pub fn kind(&self, name: &str) -> FieldKind {
		self.kinds.get(name).copied().unwrap_or(FieldKind::Computed)
	}

	pub fn names(&self, kind: FieldKind) -> impl Iterator<Item = &str> {
		self.kinds
			.iter()
			.filter(move |(_, candidate)| **candidate == kind)
			.map(|(name, _)| name.as_str())
	}
}
