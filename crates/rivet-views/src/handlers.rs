//! Action handlers.
//!
//! Each handler is a plain function over a [`Controller`] and a [`Request`];
//! a controller's capability set decides which of them it serves.

use http::StatusCode;
use rivet_core::{Error, Result};
use rivet_pagination::{Paginated, PaginatedResponse};
use rivet_serializers::Serializer;
use serde_json::{Value, json};

use crate::actions::ActionType;
use crate::controller::Controller;
use crate::renderers::RenderFormat;
use crate::request::Request;
use crate::response::Response;

pub type Handler = fn(&Controller, &Request) -> Result<Response>;

/// The handler serving `action`.
pub fn handler_for(action: ActionType) -> Handler {
	match action {
		ActionType::List => list,
		ActionType::Show => show,
		ActionType::Create => create,
		ActionType::Update => update,
		ActionType::PartialUpdate => partial_update,
		ActionType::Destroy => destroy,
		ActionType::Metadata => metadata,
	}
}

fn format_of(request: &Request) -> RenderFormat {
	RenderFormat::negotiate(&request.query, request.accept())
}

/// Renders a payload as the response body.
///
/// An absent payload is a handler bug (a missing record must already have
/// failed with `RecordNotFound`) and fails with [`Error::NilPayload`].
pub fn emit(status: StatusCode, payload: Option<Value>, format: RenderFormat) -> Result<Response> {
	let payload = payload.ok_or(Error::NilPayload)?;
	Response::new(status).with_data(&payload, format)
}

pub fn list(controller: &Controller, request: &Request) -> Result<Response> {
	let action = ActionType::List;
	let serializer = controller.serializer(request, action);
	let queryset = serializer.prefetch(controller.filtered_queryset(request, action)?, true);
	let source = controller.source();

	let payload = match controller.config().paginator() {
		Some(paginator) => match paginator.paginate(source, &queryset, &request.query)? {
			Paginated::Page(page) => {
				let results = serializer.serialize_list(&page.object_list)?;
				let envelope = PaginatedResponse {
					count: page.count,
					page: page.number,
					page_size: page.page_size,
					total_pages: page.num_pages,
					results,
				};
				serde_json::to_value(envelope).map_err(|e| Error::Configuration(e.to_string()))?
			}
			Paginated::Unpaginated(records) => serializer.serialize_records(&records)?,
		},
		None => serializer.serialize_records(&source.fetch(&queryset)?)?,
	};
	emit(StatusCode::OK, Some(payload), format_of(request))
}

pub fn show(controller: &Controller, request: &Request) -> Result<Response> {
	let record = controller.get_record(request)?;
	let payload = controller
		.serializer(request, ActionType::Show)
		.serialize_record(&record)?;
	emit(StatusCode::OK, Some(payload), format_of(request))
}

pub fn create(controller: &Controller, request: &Request) -> Result<Response> {
	let action = ActionType::Create;
	let body = controller.get_body(request)?;
	let changes = controller.allowed_parameters(action)?.sanitize(&body)?;
	let schema = controller.schema();
	schema
		.validate(&changes.attributes, false)
		.map_err(Error::invalid)?;

	let record = controller.source().insert(schema, changes)?;
	tracing::debug!(controller = controller.name(), "record created");
	let payload = controller
		.serializer(request, action)
		.serialize(&Value::Object(record))?;
	emit(StatusCode::CREATED, Some(payload), format_of(request))
}

fn write(controller: &Controller, request: &Request, action: ActionType) -> Result<Response> {
	let record = controller.get_record(request)?;
	let key = controller.record_key(&record)?;
	let body = controller.get_body(request)?;
	let changes = controller.allowed_parameters(action)?.sanitize(&body)?;

	let schema = controller.schema();
	let mut merged = record;
	merged.extend(changes.attributes.clone());
	schema.validate(&merged, false).map_err(Error::invalid)?;

	let updated = controller.source().update(schema, &key, changes)?;
	let payload = controller
		.serializer(request, action)
		.serialize_record(&updated)?;
	emit(StatusCode::OK, Some(payload), format_of(request))
}

pub fn update(controller: &Controller, request: &Request) -> Result<Response> {
	write(controller, request, ActionType::Update)
}

pub fn partial_update(controller: &Controller, request: &Request) -> Result<Response> {
	write(controller, request, ActionType::PartialUpdate)
}

pub fn destroy(controller: &Controller, request: &Request) -> Result<Response> {
	let record = controller.get_record(request)?;
	let key = controller.record_key(&record)?;
	controller.source().delete(controller.schema(), &key)?;
	tracing::debug!(controller = controller.name(), key = %key, "record destroyed");
	Ok(Response::no_content())
}

/// Describes the controller: model, actions and field metadata.
pub fn metadata(controller: &Controller, request: &Request) -> Result<Response> {
	let schema = controller.schema();
	let fields = controller.get_fields(ActionType::List);
	let config = controller.config();
	let payload = json!({
		"name": controller.name(),
		"model": schema.name(),
		"primary_key": schema.primary_key(),
		"actions": config.actions,
		"filter_backends": config.filter_backends,
		"paginate": config.paginate,
		"fields": controller.resolver().resolve_field_metadata(&fields),
	});
	emit(StatusCode::OK, Some(payload), format_of(request))
}
