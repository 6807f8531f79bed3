use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::error::LicensingError;
use super::repository::LicenceRepository;
use super::service::LicenceRequirementService;

/// Router exposing resolution, import and category listing under `/licences`.
pub fn licence_router<R>(service: Arc<LicenceRequirementService<R>>) -> Router
where
    R: LicenceRepository + 'static,
{
    Router::new()
        .route("/licences/health", get(health_handler))
        .route("/licences/requirements", get(requirements_handler::<R>))
        .route(
            "/licences/requirements-batch",
            get(requirements_batch_handler::<R>),
        )
        .route(
            "/licences/update-licence-requirements",
            post(update_handler::<R>),
        )
        .route("/licences/import", post(import_handler::<R>))
        .route("/licences/categories", get(categories_handler::<R>))
        .with_state(service)
}

/// Query parameters arrive as text; typing happens in the request parser.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RequirementsQuery {
    pub(crate) parent_category_id: Option<String>,
    pub(crate) sub_category_id: Option<String>,
    pub(crate) abn_kind: Option<String>,
    pub(crate) state: Option<String>,
}

impl RequirementsQuery {
    fn into_value(self) -> Value {
        let mut object = Map::new();
        if let Some(parent) = self.parent_category_id {
            let parent = match parent.trim().parse::<i64>() {
                Ok(id) => Value::from(id),
                Err(_) => Value::String(parent),
            };
            object.insert("parent_category_id".to_string(), parent);
        }
        if let Some(sub) = self.sub_category_id {
            object.insert("sub_category_id".to_string(), Value::String(sub));
        }
        if let Some(kind) = self.abn_kind {
            object.insert("abn_kind".to_string(), Value::String(kind));
        }
        if let Some(state) = self.state.filter(|state| !state.trim().is_empty()) {
            object.insert("state".to_string(), Value::String(state));
        }
        Value::Object(object)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BatchQuery {
    filter: Option<String>,
}

pub(crate) fn error_response(error: LicensingError) -> Response {
    let status = match &error {
        LicensingError::Validation(_) | LicensingError::Entity(_) => StatusCode::BAD_REQUEST,
        LicensingError::NotFound(_) => StatusCode::NOT_FOUND,
        LicensingError::Conflict(_) => StatusCode::CONFLICT,
        LicensingError::Reference(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LicensingError::Processing(_) | LicensingError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = match &error {
        LicensingError::Validation(errors) => json!({
            "error": error.to_string(),
            "errors": errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }),
        _ => json!({
            "error": error.to_string(),
        }),
    };
    (status, Json(payload)).into_response()
}

pub(crate) async fn health_handler() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

pub(crate) async fn requirements_handler<R>(
    State(service): State<Arc<LicenceRequirementService<R>>>,
    Query(query): Query<RequirementsQuery>,
) -> Response
where
    R: LicenceRepository + 'static,
{
    match service.requirements_from_value(&query.into_value()).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn requirements_batch_handler<R>(
    State(service): State<Arc<LicenceRequirementService<R>>>,
    Query(query): Query<BatchQuery>,
) -> Response
where
    R: LicenceRepository + 'static,
{
    let filter = query.filter.unwrap_or_default();
    match service.requirements_batch_filter(&filter).await {
        Ok(batch) => (StatusCode::OK, Json(batch)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_handler<R>(
    State(service): State<Arc<LicenceRequirementService<R>>>,
    Json(payload): Json<Value>,
) -> Response
where
    R: LicenceRepository + 'static,
{
    match service.update_requirements(&payload).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn import_handler<R>(
    State(service): State<Arc<LicenceRequirementService<R>>>,
    Json(payload): Json<Value>,
) -> Response
where
    R: LicenceRepository + 'static,
{
    match service.import_requirements(&payload).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn categories_handler<R>(
    State(service): State<Arc<LicenceRequirementService<R>>>,
) -> Response
where
    R: LicenceRepository + 'static,
{
    match service.categories().await {
        Ok(categories) => (StatusCode::OK, Json(categories)).into_response(),
        Err(error) => error_response(error),
    }
}
