//! End-to-end requests through `ModelViewSet` over the in-memory data source.

use http::StatusCode;
use rivet::prelude::*;
use rivet::views::emit;
use rivet::{Error, RenderFormat};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use std::sync::Arc;

fn registry() -> Arc<SchemaRegistry> {
	Arc::new(
		SchemaRegistry::new()
			.register(
				TableSchema::new("User", "users")
					.column(Column::new("id", ColumnType::Integer).primary_key())
					.column(Column::new("login", ColumnType::String).not_null())
					.column(Column::new("balance", ColumnType::Integer))
					.association(Association::has_many("posts", "posts"))
					.method("display_name", |record| {
						json!(format!("@{}", record.get("login").and_then(Value::as_str).unwrap_or_default()))
					}),
			)
			.register(
				TableSchema::new("Post", "posts")
					.column(Column::new("id", ColumnType::Integer).primary_key())
					.column(Column::new("title", ColumnType::String).not_null()),
			),
	)
}

#[fixture]
fn source() -> Arc<MemoryDataSource> {
	let posts = |ids: &[i64]| -> Value {
		ids.iter()
			.map(|id| json!({"id": id, "title": format!("Post {id}")}))
			.collect()
	};
	Arc::new(MemoryDataSource::new().with_rows("users", vec![
		json!({"id": 1, "login": "ada", "balance": 50, "posts": posts(&[1, 2, 3])}),
		json!({"id": 2, "login": "bob", "balance": 5, "posts": posts(&[])}),
		json!({"id": 3, "login": "cy", "balance": 20, "posts": posts(&[4])}),
		json!({"id": 4, "login": "dee", "balance": 30, "posts": posts(&[])}),
		json!({"id": 5, "login": "eve", "balance": 15, "posts": posts(&[5, 6])}),
	]))
}

fn users(config: ControllerConfig, source: Arc<MemoryDataSource>) -> ModelViewSet {
	let settings = Arc::new(Settings::default());
	ModelViewSet::new(Controller::new(config, registry(), settings, source).unwrap())
}

fn config() -> ControllerConfig {
	ControllerConfig::new("users", &Settings::default())
		.fields(FieldSpec::list(["id", "login", "balance"]))
}

#[rstest]
#[tokio::test]
async fn test_filtered_ordered_page(source: Arc<MemoryDataSource>) {
	let viewset = users(config(), source);
	let request = Request::get()
		.with_query_param("balance_gt", "10")
		.with_query_param("ordering", "-login")
		.with_query_param("page", "1")
		.with_query_param("page_size", "2");

	let response = viewset.dispatch(request).await;

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(
		response.json().unwrap(),
		json!({
			"count": 4,
			"page": 1,
			"page_size": 2,
			"total_pages": 2,
			"results": [
				{"id": 5, "login": "eve", "balance": 15},
				{"id": 4, "login": "dee", "balance": 30},
			],
		})
	);
}

#[rstest]
#[tokio::test]
async fn test_last_page_and_search(source: Arc<MemoryDataSource>) {
	let viewset = users(config(), source);

	let last_page = viewset
		.dispatch(
			Request::get()
				.with_query_param("ordering", "id")
				.with_query_param("page", "3")
				.with_query_param("page_size", "2"),
		)
		.await
		.json()
		.unwrap();
	let searched = viewset
		.dispatch(Request::get().with_query_param("search", "e"))
		.await
		.json()
		.unwrap();

	assert_eq!(last_page["results"], json!([{"id": 5, "login": "eve", "balance": 15}]));
	assert_eq!(last_page["total_pages"], json!(3));
	assert_eq!(searched["count"], json!(2));
}

#[rstest]
#[tokio::test]
async fn test_unknown_parameters_are_ignored(source: Arc<MemoryDataSource>) {
	let viewset = users(config(), source);
	let request = Request::get()
		.with_query_param("nickname", "x")
		.with_query_param("ordering", "nickname,-id");

	let body = viewset.dispatch(request).await.json().unwrap();

	assert_eq!(body["count"], json!(5));
	assert_eq!(body["results"][0]["id"], json!(5));
}

#[rstest]
#[tokio::test]
async fn test_association_limit_and_count(source: Arc<MemoryDataSource>) {
	let serializer = SerializerOptions::new()
		.config(
			SerializerConfig::new()
				.only(["id", "login"])
				.include("posts", SerializerConfig::new().only(["id"]))
				.methods(["display_name"]),
		)
		.associations_limit(2)
		.include_associations_count(true);
	let viewset = users(config().paginate(false).serializer(serializer), source.clone());

	let body = viewset
		.dispatch(Request::get().with_query_param("login", "ada"))
		.await
		.json()
		.unwrap();

	assert_eq!(
		body,
		json!([{
			"id": 1,
			"login": "ada",
			"posts": [{"id": 1}, {"id": 2}],
			"posts.count": 3,
			"display_name": "@ada",
		}])
	);
	assert_eq!(source.related_fetch_count(), 1);
}

#[rstest]
#[tokio::test]
async fn test_create_whitelists_body(source: Arc<MemoryDataSource>) {
	let viewset = users(config().body_root("user"), source.clone());
	let request = Request::post().with_body(json!({
		"user": {"id": 99, "login": "fay", "balance": 1, "role": "admin"}
	}));

	let response = viewset.dispatch(request).await;

	assert_eq!(response.status, StatusCode::CREATED);
	assert_eq!(response.json().unwrap(), json!({"id": 6, "login": "fay", "balance": 1}));
	let stored = source.rows("users");
	assert!(!stored[5].contains_key("role"));
}

#[rstest]
#[case(json!({"account": {"login": "x"}}))]
#[case(json!({"user": null}))]
#[tokio::test]
async fn test_missing_body_root(source: Arc<MemoryDataSource>, #[case] body: Value) {
	let viewset = users(config().body_root("user"), source);

	let response = viewset.dispatch(Request::post().with_body(body)).await;

	assert_eq!(response.status, StatusCode::BAD_REQUEST);
	assert_eq!(
		response.json().unwrap(),
		json!({"message": "Missing required parameter `user`"})
	);
}

#[rstest]
#[tokio::test]
async fn test_update_then_destroy(source: Arc<MemoryDataSource>) {
	let viewset = users(config(), source.clone());

	let updated = viewset
		.dispatch(
			Request::patch()
				.with_path_param("id", "2")
				.with_body(json!({"balance": 500})),
		)
		.await;
	let destroyed = viewset.dispatch(Request::delete().with_path_param("id", "2")).await;
	let missing = viewset.dispatch(Request::get().with_path_param("id", "2")).await;

	assert_eq!(updated.json().unwrap()["balance"], json!(500));
	assert_eq!(destroyed.status, StatusCode::NO_CONTENT);
	assert_eq!(missing.status, StatusCode::NOT_FOUND);
	assert_eq!(source.rows("users").len(), 4);
}

#[rstest]
fn test_absent_payload_is_a_server_error() {
	let error = emit(StatusCode::OK, None, RenderFormat::Json).unwrap_err();

	assert!(matches!(error, Error::NilPayload));
	assert!(error.is_server_error());
}

#[rstest]
#[tokio::test]
async fn test_controller_from_settings(source: Arc<MemoryDataSource>) {
	let settings = Arc::new(
		Settings::from_toml_str(
			r#"
max_page_size = 3

[controllers.users]
fields = ["id", "login"]
actions = ["list", "show"]
ordering = ["-balance"]
lookup_field = "login"
"#,
		)
		.unwrap(),
	);
	let controller = Controller::from_settings("users", registry(), settings, source).unwrap();
	let viewset = ModelViewSet::new(controller);

	let listed = viewset
		.dispatch(Request::get().with_query_param("page_size", "100"))
		.await
		.json()
		.unwrap();
	let shown = viewset
		.dispatch(Request::get().with_path_param("id", "cy"))
		.await
		.json()
		.unwrap();
	let rejected = viewset.dispatch(Request::post().with_body(json!({"login": "z"}))).await;

	assert_eq!(listed["page_size"], json!(3));
	assert_eq!(listed["results"][0], json!({"id": 1, "login": "ada"}));
	assert_eq!(shown, json!({"id": 3, "login": "cy"}));
	assert_eq!(rejected.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[rstest]
fn test_unknown_model(source: Arc<MemoryDataSource>) {
	let config = ControllerConfig::new("invoices", &Settings::default());
	let result = Controller::new(config, registry(), Arc::new(Settings::default()), source);

	assert!(matches!(result, Err(Error::UnknownModel { .. })));
}
