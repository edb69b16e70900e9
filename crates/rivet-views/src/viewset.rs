use async_trait::async_trait;
use http::StatusCode;
use rivet_core::{Error, Result};
use std::sync::Arc;

use crate::actions::ActionType;
use crate::controller::Controller;
use crate::handlers::handler_for;
use crate::renderers::RenderFormat;
use crate::request::Request;
use crate::response::Response;

/// Entry point the web collaborator hands requests to.
#[async_trait]
pub trait ViewSet: Send + Sync {
	/// Get the basename for URL routing
	fn get_basename(&self) -> &str;

	/// Dispatch a request; failures are already rendered as error responses.
	async fn dispatch(&self, request: Request) -> Response;
}

/// Serves every action of a [`Controller`] its capability set allows.
pub struct ModelViewSet {
	controller: Arc<Controller>,
}

impl ModelViewSet {
	pub fn new(controller: Controller) -> Self {
		Self {
			controller: Arc::new(controller),
		}
	}

	pub fn from_arc(controller: Arc<Controller>) -> Self {
		Self { controller }
	}

	pub fn controller(&self) -> &Controller {
		&self.controller
	}

	/// Routes the request to its action and runs the handler.
	pub fn handle(&self, request: &Request) -> Result<Response> {
		let action = ActionType::route(&request.method, request.is_detail())?;
		if !self.controller.config().actions.supports(action) {
			return Err(Error::MethodNotAllowed(action.name().to_string()));
		}
		tracing::debug!(
			controller = self.controller.name(),
			action = action.name(),
			"dispatching"
		);
		handler_for(action)(&self.controller, request)
	}

	/// Renders an error as `{message, errors?, exception?}`.
	pub fn error_response(&self, error: &Error, format: RenderFormat) -> Response {
		let status = error.status_code();
		if error.is_server_error() {
			tracing::error!(controller = self.controller.name(), error = %error, "request failed");
		} else {
			tracing::debug!(controller = self.controller.name(), error = %error, "request rejected");
		}

		let body = error.to_body(self.controller.settings().debug);
		let rendered = serde_json::to_value(&body)
			.map_err(|e| Error::Configuration(e.to_string()))
			.and_then(|data| Response::new(status).with_data(&data, format));
		match rendered {
			Ok(response) => response,
			Err(render_error) => {
				tracing::error!(error = %render_error, "failed to render error body");
				Response::new(StatusCode::INTERNAL_SERVER_ERROR).with_body(body.message)
			}
		}
	}
}

#[async_trait]
impl ViewSet for ModelViewSet {
	fn get_basename(&self) -> &str {
		self.controller.name()
	}

	async fn dispatch(&self, request: Request) -> Response {
		match self.handle(&request) {
			Ok(response) => response,
			Err(error) => {
				let format = RenderFormat::negotiate(&request.query, request.accept());
				self.error_response(&error, format)
			}
		}
	}
}
