use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{agent, health, licenses, mentors, signals, students, ws};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health::health))
        .route("/ws", get(ws::ws_handler))
        // Licenses
        .route("/api/licenses", post(licenses::issue).get(licenses::list))
        .route("/api/licenses/{key}/validate", get(licenses::validate))
        .route("/api/licenses/{key}/deactivate", post(licenses::deactivate))
        // Mentors
        .route("/api/mentors/register", post(mentors::register))
        .route("/api/mentors/verify", get(mentors::verify))
        // Signals
        .route("/api/signals", post(signals::submit).get(signals::list))
        .route("/api/signals/ea/{ea_id}", get(signals::by_ea))
        // Students
        .route("/api/students/register", post(students::register))
        .route("/api/students/{key}/start", post(students::start))
        .route("/api/students/{key}/stop", post(students::stop))
        .route("/api/students/{key}/status", get(students::status))
        // Agent
        .route("/api/agent/students", get(agent::students))
        .route("/api/agent/heartbeat", post(agent::heartbeat))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
