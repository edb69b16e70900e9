//! Query parameters as handed over by the web collaborator.
//!
//! Values are either a single string or a list of strings (`?tag=a&tag=b`).
//! Raw query-string decoding is the collaborator's job.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
	One(String),
	Many(Vec<String>),
}

impl ParamValue {
	/// First (or only) value.
	pub fn first(&self) -> Option<&str> {
		match self {
			ParamValue::One(value) => Some(value.as_str()),
			ParamValue::Many(values) => values.first().map(String::as_str),
		}
	}

	pub fn as_slice(&self) -> &[String] {
		match self {
			ParamValue::One(value) => std::slice::from_ref(value),
			ParamValue::Many(values) => values.as_slice(),
		}
	}
}

impl From<&str> for ParamValue {
	fn from(value: &str) -> Self {
		ParamValue::One(value.to_string())
	}
}

impl From<String> for ParamValue {
	fn from(value: String) -> Self {
		ParamValue::One(value)
	}
}

impl From<Vec<String>> for ParamValue {
	fn from(values: Vec<String>) -> Self {
		ParamValue::Many(values)
	}
}

/// Ordered mapping of query parameter names to values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(IndexMap<String, ParamValue>);

impl QueryParams {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert, replacing any previous value.
	///
	/// # Examples
	///
	/// ```
	/// use rivet_core::QueryParams;
	///
	/// let params = QueryParams::new().with("page", "2").with("ordering", "-login");
	/// assert_eq!(params.get_str("page"), Some("2"));
	/// ```
	pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
		self.insert(name, value);
		self
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
		self.0.insert(name.into(), value.into());
	}

	/// Appends a value, turning a single value into a list when the name repeats.
	pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let value = value.into();
		let entry = self.0.entry(name.into());
		match entry {
			indexmap::map::Entry::Occupied(mut occupied) => {
				let mut values = occupied.get().as_slice().to_vec();
				values.push(value);
				occupied.insert(ParamValue::Many(values));
			}
			indexmap::map::Entry::Vacant(vacant) => {
				vacant.insert(ParamValue::One(value));
			}
		}
	}

	pub fn get(&self, name: &str) -> Option<&ParamValue> {
		self.0.get(name)
	}

	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.0.get(name).and_then(ParamValue::first)
	}

	/// Non-blank value of `name` with surrounding whitespace removed.
	pub fn get_trimmed(&self, name: &str) -> Option<&str> {
		self.get_str(name)
			.map(str::trim)
			.filter(|value| !value.is_empty())
	}

	/// Comma-separated list stored under `name`, trimmed with blanks removed.
	///
	/// List values are flattened, so `?only=id,login&only=balance` yields three
	/// entries.
	pub fn get_csv(&self, name: &str) -> Option<Vec<String>> {
		let value = self.0.get(name)?;
		let items: Vec<String> = value
			.as_slice()
			.iter()
			.flat_map(|raw| raw.split(','))
			.map(str::trim)
			.filter(|item| !item.is_empty())
			.map(str::to_string)
			.collect();
		(!items.is_empty()).then_some(items)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
		self.0.iter().map(|(name, value)| (name.as_str(), value))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut params = QueryParams::new();
		for (name, value) in iter {
			params.append(name, value);
		}
		params
	}
}
