use axum::extract::State;
use serde::Serialize;

use crate::error::Success;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub signals: usize,
    pub subscribers: usize,
    pub licenses: usize,
    pub students: usize,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Success<HealthResponse> {
    let relay = &state.relay;
    Success::new(HealthResponse {
        status: "healthy",
        uptime_secs: state.uptime_secs(),
        signals: relay.feed.all().await.len(),
        subscribers: relay.feed.subscriber_count().await,
        licenses: relay.licenses.len().await,
        students: relay.students.len().await,
    })
}
