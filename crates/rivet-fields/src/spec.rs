//! Declared field lists.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

const ONLY: &str = "only";
const INCLUDE: &str = "include";
const EXCLUDE: &str = "exclude";
const EXCEPT: &str = "except";

/// A plain list of field names, or a structured spec with `only`, `include`,
/// `exclude` and `except` keys.
///
/// Deserializes from either form:
///
/// ```toml
/// fields = ["id", "login"]
/// fields = { include = ["balance"], exclude = ["password_digest"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
	List(Vec<String>),
	Spec(IndexMap<String, Vec<String>>),
}

impl FieldSpec {
	pub fn list<I, S>(fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		FieldSpec::List(fields.into_iter().map(Into::into).collect())
	}

	/// Builder for the structured form.
	pub fn spec() -> Self {
		FieldSpec::Spec(IndexMap::new())
	}

	pub fn only<I, S>(self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.with_key(ONLY, fields)
	}

	pub fn include<I, S>(self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.with_key(INCLUDE, fields)
	}

	pub fn exclude<I, S>(self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.with_key(EXCLUDE, fields)
	}

	pub fn except<I, S>(self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.with_key(EXCEPT, fields)
	}

	fn with_key<I, S>(self, key: &str, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut map = match self {
			FieldSpec::Spec(map) => map,
			FieldSpec::List(list) => IndexMap::from([(ONLY.to_string(), list)]),
		};
		map.entry(key.to_string())
			.or_default()
			.extend(fields.into_iter().map(Into::into));
		FieldSpec::Spec(map)
	}

	/// Evaluates the spec: `(only | defaults) ∪ include − exclude − except`.
	///
	/// `defaults` is only computed when `only` is absent. Unknown keys are
	/// logged and otherwise ignored. The result keeps first-seen order and has
	/// no duplicates.
	///
	/// # Examples
	///
	/// ```
	/// use rivet_fields::FieldSpec;
	///
	/// let spec = FieldSpec::spec().include(["balance"]).exclude(["token"]);
	/// let fields = spec.resolve(|| vec!["id".into(), "login".into(), "token".into()]);
	/// assert_eq!(fields, vec!["id", "login", "balance"]);
	/// ```
	pub fn resolve(&self, defaults: impl FnOnce() -> Vec<String>) -> Vec<String> {
		let map = match self {
			FieldSpec::List(list) => return dedupe(list.iter().cloned()),
			FieldSpec::Spec(map) => map,
		};

		for key in map.keys() {
			if ![ONLY, INCLUDE, EXCLUDE, EXCEPT].contains(&key.as_str()) {
				tracing::warn!(key = %key, "unknown key in field spec ignored");
			}
		}

		let mut fields: IndexSet<String> = match map.get(ONLY) {
			Some(only) => only.iter().cloned().collect(),
			None => defaults().into_iter().collect(),
		};
		if let Some(include) = map.get(INCLUDE) {
			fields.extend(include.iter().cloned());
		}
		for key in [EXCLUDE, EXCEPT] {
			if let Some(removed) = map.get(key) {
				fields.retain(|field| !removed.contains(field));
			}
		}
		fields.into_iter().collect()
	}
}

fn dedupe(fields: impl Iterator<Item = String>) -> Vec<String> {
	fields.collect::<IndexSet<_>>().into_iter().collect()
}
