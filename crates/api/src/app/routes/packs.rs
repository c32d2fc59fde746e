use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use packsync_core::PackId;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/:id/sync", post(sync_pack))
        .route("/:id/archive", post(archive_pack))
}

/// Operator-forced sync of a single pack, bypassing the queue.
pub async fn sync_pack(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let pack_id: PackId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid pack id"),
    };

    let pack = match services.catalog.get(pack_id).await {
        Ok(Some(pack)) => pack,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "pack not found"),
        Err(e) => return errors::store_error_to_response(e),
    };

    let result = services.engine.sync_item(&pack).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(result)).into_response()
}

pub async fn archive_pack(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let pack_id: PackId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid pack id"),
    };

    match services.catalog.get(pack_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "pack not found"),
        Err(e) => return errors::store_error_to_response(e),
    }

    let outcome = services.engine.archive_remote_item(pack_id).await;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(outcome)).into_response()
}
