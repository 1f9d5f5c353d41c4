//! API router

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health, piles, requests, simulator, AppState};

/// Build the full HTTP surface: user/admin API, simulator callbacks, health
/// and metrics.
pub fn create_api_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/requests", post(requests::submit_request))
        .route(
            "/requests/:id",
            get(requests::get_request)
                .patch(requests::update_request)
                .delete(requests::cancel_request),
        )
        .route("/users/:user_id/requests", get(requests::request_history))
        .route(
            "/users/:user_id/requests/latest",
            get(requests::latest_request),
        )
        .route("/users/:user_id/bills", get(requests::user_bills))
        .route("/bills/:id", get(requests::get_bill))
        .route("/queue/status", get(requests::queue_status))
        .route("/piles", get(piles::list_piles))
        .route("/piles/:id", get(piles::get_pile))
        .route("/piles/:id/control", post(piles::control_pile))
        .route("/faults", get(piles::list_faults));

    let sim = Router::new()
        .route("/charging-progress", post(simulator::charging_progress))
        .route("/charging-complete", post(simulator::charging_complete))
        .route("/fault-report", post(simulator::fault_report))
        .route("/fault-recovery", post(simulator::fault_recovery))
        .route("/heartbeat", post(simulator::heartbeat));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(health::metrics))
        .nest("/api/v1", api)
        .nest("/api/simulator", sim)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
