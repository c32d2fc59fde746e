use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use crate::app::errors;
use crate::app::services::AppServices;

/// Queue entries processed per invocation unless the caller says otherwise.
const DEFAULT_QUEUE_BATCH: u32 = 10;

pub fn router() -> Router {
    Router::new()
        .route("/status", get(sync_status))
        .route("/run", post(run_sync))
        .route("/queue/run", post(run_queue))
}

pub async fn sync_status(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.engine.sync_status().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn run_sync(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let summary = services.engine.sync_all_pending().await;
    let status = if summary.error.is_some() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    (status, Json(summary)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct RunQueueParams {
    limit: Option<u32>,
}

pub async fn run_queue(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<RunQueueParams>,
) -> axum::response::Response {
    let limit = params.limit.unwrap_or(DEFAULT_QUEUE_BATCH);
    let summary = services.engine.process_queue(limit).await;
    let status = if summary.error.is_some() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    (status, Json(summary)).into_response()
}
