pub mod error;
pub mod extractors;
pub mod live;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    extract::State,
    http::HeaderValue,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    let consultation_routes = Router::new()
        .route(
            "/",
            get(routes::consultation::list).post(routes::consultation::create),
        )
        .route(
            "/{consultation_id}",
            get(routes::consultation::get)
                .patch(routes::consultation::update)
                .delete(routes::consultation::delete),
        )
        .route(
            "/{consultation_id}/feedback",
            post(routes::consultation::feedback),
        )
        .route(
            "/{consultation_id}/transcript",
            get(routes::consultation::transcript),
        )
        .route("/{consultation_id}/end", post(routes::consultation::end_call));

    let api = Router::new()
        .nest("/consultation", consultation_routes)
        .route("/sync-user", get(routes::user::sync))
        .route("/me", get(routes::user::me));

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route(
            "/ws/consultation/{consultation_id}",
            get(ws::handler::ws_upgrade),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "live_sessions": state.transcripts.active_session_count(),
    }))
}
