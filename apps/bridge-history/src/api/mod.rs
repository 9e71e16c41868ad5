use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod health;
pub mod history;
pub mod state;

pub use state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/deposits/{address}", get(history::deposits))
        .route("/withdrawals/{address}", get(history::withdrawals))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
