use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

use crate::storage::{RecordStore, StorageResult};

use super::{
    error::ApiError,
    models::{ErrorResponse, HealthResponse, MessageResponse},
    AppState, CollectionState,
};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK".to_string(),
            message: "Embu County API is running".to_string(),
            environment: state.environment,
        }),
    )
}

pub async fn list_records<S: RecordStore + Clone + Send + Sync + 'static>(
    State(state): State<CollectionState<S>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let collection = state.collection;
    let records = run_blocking(state.storage, move |storage| storage.list(collection)).await?;
    Ok(Json(records.into_iter().map(|r| r.document).collect()))
}

pub async fn get_record<S: RecordStore + Clone + Send + Sync + 'static>(
    State(state): State<CollectionState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let collection = state.collection;
    let record = run_blocking(state.storage, move |storage| storage.get(collection, &id)).await?;
    Ok(Json(record.document))
}

pub async fn create_record<S: RecordStore + Clone + Send + Sync + 'static>(
    State(state): State<CollectionState<S>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(document) = payload.map_err(reject_body)?;
    let collection = state.collection;
    let id = document_id(&document)
        .ok_or_else(|| ApiError::BadRequest(format!("{} id is required", collection.label())))?;

    let record = run_blocking(state.storage, move |storage| {
        storage.insert(collection, &id, &document)
    })
    .await?;
    log::debug!("Created {} '{}'", collection, record.id);
    Ok((StatusCode::CREATED, Json(record.document)))
}

pub async fn replace_record<S: RecordStore + Clone + Send + Sync + 'static>(
    State(state): State<CollectionState<S>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(document) = payload.map_err(reject_body)?;
    let collection = state.collection;
    let record = run_blocking(state.storage, move |storage| {
        storage.replace(collection, &id, &document)
    })
    .await?;
    log::debug!("Replaced {} '{}'", collection, record.id);
    Ok(Json(record.document))
}

pub async fn delete_record<S: RecordStore + Clone + Send + Sync + 'static>(
    State(state): State<CollectionState<S>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let collection = state.collection;
    run_blocking(state.storage, move |storage| {
        storage.remove(collection, &id)?;
        log::debug!("Deleted {} '{}'", collection, id);
        Ok(())
    })
    .await?;
    Ok(Json(MessageResponse {
        message: format!("{} deleted", collection.label()),
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "endpoint not found".to_string(),
        }),
    )
}

/// SQLite calls block, so they run on the blocking pool instead of a
/// runtime worker.
async fn run_blocking<S, T, F>(storage: S, f: F) -> Result<T, ApiError>
where
    S: RecordStore + Send + 'static,
    T: Send + 'static,
    F: FnOnce(S) -> StorageResult<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(move || f(storage)).await??)
}

fn reject_body(rejection: JsonRejection) -> ApiError {
    ApiError::Rejected(rejection.status(), rejection.body_text())
}

/// The storage key carried by a document: its `id` field, text or number.
fn document_id(document: &Value) -> Option<String> {
    match document.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
