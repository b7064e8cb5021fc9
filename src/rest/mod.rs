use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::storage::{Collection, RecordStore};

mod error;
mod handlers;
mod models;

pub use error::ApiError;
pub use models::{ErrorResponse, HealthResponse, MessageResponse};

use handlers::{
    create_record, delete_record, get_record, health, list_records, not_found, replace_record,
};

/// Request bodies up to 50 MiB are accepted.
pub const JSON_BODY_LIMIT: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub environment: String,
}

#[derive(Clone)]
pub struct CollectionState<S: RecordStore> {
    pub storage: S,
    pub collection: Collection,
}

/// CRUD routes for a single collection, to be nested under `/api/{table}`.
pub fn collection_router<S: RecordStore + Clone + Send + Sync + 'static>(
    storage: S,
    collection: Collection,
) -> Router {
    Router::new()
        .route("/", get(list_records::<S>).post(create_record::<S>))
        .route(
            "/:id",
            get(get_record::<S>)
                .put(replace_record::<S>)
                .delete(delete_record::<S>),
        )
        .with_state(CollectionState {
            storage,
            collection,
        })
}

pub fn router<S: RecordStore + Clone + Send + Sync + 'static>(
    storage: S,
    environment: String,
    allowed_origins: &[String],
) -> Router {
    let mut app = Router::new()
        .route("/api/health", get(health))
        .with_state(AppState { environment });

    for collection in Collection::ALL {
        app = app.nest(
            &format!("/api/{}", collection.table()),
            collection_router(storage.clone(), collection),
        );
    }

    app.fallback(not_found)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(cors_layer(allowed_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(::tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(::tracing::Level::INFO)),
        )
}

/// An empty list or a `*` entry allows any origin. Credentials stay allowed
/// either way, so "any" mirrors the caller's origin instead of sending `*`.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(err) => {
                    log::warn!("Ignoring invalid allowed origin {}: {}", origin, err);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub async fn serve<S: RecordStore + Clone + Send + Sync + 'static>(
    addr: SocketAddr,
    storage: S,
    environment: String,
    allowed_origins: Vec<String>,
    shutdown: tokio_util::sync::CancellationToken,
) -> anyhow::Result<()> {
    let app = router(storage, environment, &allowed_origins);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("🌐 REST listening on http://{}/api", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            log::info!("🛑 REST shutdown requested");
        })
        .await?;
    log::info!("👋 REST server exited");
    Ok(())
}
