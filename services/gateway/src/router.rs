use crate::handlers::{notify, ws};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new().route("/ws", get(ws::ws_handler));

    let notify_routes = Router::new()
        .route("/balance", post(notify::balance))
        .route("/payment", post(notify::payment))
        .route("/notification", post(notify::notification))
        .route("/order-status", post(notify::order_status))
        .route("/vendor-order", post(notify::vendor_order))
        .route("/order-ready", post(notify::order_ready))
        .route("/transaction", post(notify::transaction))
        .route("/announcement", post(notify::announcement));

    let internal_routes = Router::new()
        .nest("/notify", notify_routes)
        .route("/sessions/{user_id}/evict", post(notify::evict));

    Router::new()
        .route("/health", get(notify::health))
        .nest("/v1", api_routes)
        .nest("/internal", internal_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
