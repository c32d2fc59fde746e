use axum::Router;

pub mod packs;
pub mod sync;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .nest("/sync", sync::router())
        .nest("/packs", packs::router())
}
