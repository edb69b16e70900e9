use http::Method;
use rivet_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Action type for controller operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
	List,
	Show,
	Create,
	Update,
	PartialUpdate,
	Destroy,
	Metadata,
}

impl ActionType {
	pub const ALL: [ActionType; 7] = [
		ActionType::List,
		ActionType::Show,
		ActionType::Create,
		ActionType::Update,
		ActionType::PartialUpdate,
		ActionType::Destroy,
		ActionType::Metadata,
	];

	/// Name used for action-keyed configuration.
	pub fn name(self) -> &'static str {
		match self {
			ActionType::List => "list",
			ActionType::Show => "show",
			ActionType::Create => "create",
			ActionType::Update => "update",
			ActionType::PartialUpdate => "partial_update",
			ActionType::Destroy => "destroy",
			ActionType::Metadata => "metadata",
		}
	}

	/// Whether this action operates on a single record
	pub fn is_detail(self) -> bool {
		matches!(
			self,
			ActionType::Show | ActionType::Update | ActionType::PartialUpdate | ActionType::Destroy
		)
	}

	/// Maps a method on a collection or detail route to its action.
	///
	/// # Examples
	///
	/// ```
	/// use http::Method;
	/// use rivet_views::ActionType;
	///
	/// assert_eq!(ActionType::route(&Method::GET, false).unwrap(), ActionType::List);
	/// assert_eq!(ActionType::route(&Method::PATCH, true).unwrap(), ActionType::PartialUpdate);
	/// assert!(ActionType::route(&Method::POST, true).is_err());
	/// ```
	pub fn route(method: &Method, detail: bool) -> Result<Self> {
		match (method.clone(), detail) {
			(Method::GET, false) => Ok(ActionType::List),
			(Method::GET, true) => Ok(ActionType::Show),
			(Method::POST, false) => Ok(ActionType::Create),
			(Method::PUT, true) => Ok(ActionType::Update),
			(Method::PATCH, true) => Ok(ActionType::PartialUpdate),
			(Method::DELETE, true) => Ok(ActionType::Destroy),
			(Method::OPTIONS, _) => Ok(ActionType::Metadata),
			(method, _) => Err(Error::MethodNotAllowed(method.to_string())),
		}
	}
}

/// The set of actions a controller serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(Vec<ActionType>);

impl Capabilities {
	pub fn new(actions: impl IntoIterator<Item = ActionType>) -> Self {
		let mut supported: Vec<ActionType> = Vec::new();
		for action in actions {
			if !supported.contains(&action) {
				supported.push(action);
			}
		}
		Self(supported)
	}

	pub fn all() -> Self {
		Self::new(ActionType::ALL)
	}

	/// List, show and metadata.
	pub fn read_only() -> Self {
		Self::new([ActionType::List, ActionType::Show, ActionType::Metadata])
	}

	pub fn supports(&self, action: ActionType) -> bool {
		self.0.contains(&action)
	}

	pub fn actions(&self) -> &[ActionType] {
		&self.0
	}
}

impl Default for Capabilities {
	fn default() -> Self {
		Self::all()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(Method::GET, false, ActionType::List)]
	#[case(Method::GET, true, ActionType::Show)]
	#[case(Method::POST, false, ActionType::Create)]
	#[case(Method::PUT, true, ActionType::Update)]
	#[case(Method::PATCH, true, ActionType::PartialUpdate)]
	#[case(Method::DELETE, true, ActionType::Destroy)]
	#[case(Method::OPTIONS, false, ActionType::Metadata)]
	fn test_route(#[case] method: Method, #[case] detail: bool, #[case] expected: ActionType) {
		assert_eq!(ActionType::route(&method, detail).unwrap(), expected);
		assert_eq!(expected.is_detail(), detail && expected != ActionType::Metadata);
	}

	#[rstest]
	#[case(Method::DELETE, false)]
	#[case(Method::PUT, false)]
	#[case(Method::HEAD, false)]
	fn test_route_rejects(#[case] method: Method, #[case] detail: bool) {
		assert!(matches!(
			ActionType::route(&method, detail),
			Err(Error::MethodNotAllowed(_))
		));
	}

	#[rstest]
	fn test_capabilities() {
		let read_only = Capabilities::read_only();
		assert!(read_only.supports(ActionType::Show));
		assert!(!read_only.supports(ActionType::Destroy));
		assert_eq!(Capabilities::new([ActionType::List, ActionType::List]).actions(), &[ActionType::List]);
		assert_eq!(
			serde_json::to_value(Capabilities::new([ActionType::PartialUpdate])).unwrap(),
			serde_json::json!(["partial_update"])
		);
	}
}
