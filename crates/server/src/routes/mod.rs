use std::sync::Arc;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    routing::get,
    Json, Router,
};
use flatfile_storage::{ObjectGateway, ReconciliationEngine, RowStore};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{config::ServerConfig, error::ApiError};

pub mod database;
pub mod transactions;


#[derive(Clone)]
pub struct AppState {
    pub rows: RowStore,
    pub reconciler: ReconciliationEngine,
}

impl AppState {
    pub fn new(gateway: Arc<dyn ObjectGateway>) -> Self {
        let rows = RowStore::new(gateway);
        Self {
            reconciler: ReconciliationEngine::new(rows.clone()),
            rows,
        }
    }
}

pub fn app(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .merge(transactions::router())
        .merge(database::router())
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %Uuid::new_v4(),
            )
        }))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to flat-file-db API!" }))
}

/// Query parameters arrive as optional strings so a missing one produces the
/// same JSON error shape as every other failure.
pub(crate) fn required(name: &str, value: Option<String>) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(&format!("Missing query parameter: {name}")))
}
