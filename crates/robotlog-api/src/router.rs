//! Axum router construction for the registry API.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete router.
///
/// - `GET /robots` -- robot listing
/// - `GET /robots/{name}` -- attribute snapshot
/// - `PUT /robots/{name}` -- attribute upsert
/// - `GET /robots/{name}/history` -- change history
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/robots", get(handlers::list_robots))
        .route(
            "/robots/{name}",
            get(handlers::get_robot).put(handlers::put_robot),
        )
        .route("/robots/{name}/history", get(handlers::get_history))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
