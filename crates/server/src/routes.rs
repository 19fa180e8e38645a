//! HTTP route definitions.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health_check));

    // The metrics endpoint carries no authentication; restrict it at the
    // network level when enabled.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        // Chunk paths end in a hex identifier, so they never collide with
        // the named routes above.
        .fallback(handlers::dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
