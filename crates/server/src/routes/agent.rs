//! Endpoints for the remote execution agent. Both need `X-Agent-Key`.

use axum::extract::State;
use common::RelayError;
use common::models::StudentState;
use serde::{Deserialize, Serialize};

use crate::error::{ApiJson, ApiQuery, ApiResult, Success};
use crate::extract::Identity;
use crate::routes::students::StudentResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StudentsQuery {
    pub mentor_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActiveStudentsResponse {
    pub count: usize,
    pub students: Vec<StudentState>,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub license_key: Option<String>,
    pub connected: Option<bool>,
}

/// `GET /api/agent/students?mentor_id=`
pub async fn students(
    State(state): State<AppState>,
    Identity(caller): Identity,
    ApiQuery(query): ApiQuery<StudentsQuery>,
) -> ApiResult<Success<ActiveStudentsResponse>> {
    let mentor_id = query.mentor_id.as_deref().filter(|m| !m.trim().is_empty());
    let students = state.relay.active_students(&caller, mentor_id).await?;
    Ok(Success::new(ActiveStudentsResponse {
        count: students.len(),
        students,
    }))
}

/// `POST /api/agent/heartbeat`
pub async fn heartbeat(
    State(state): State<AppState>,
    Identity(caller): Identity,
    ApiJson(req): ApiJson<HeartbeatRequest>,
) -> ApiResult<Success<StudentResponse>> {
    caller.require_agent()?;

    let mut missing = Vec::new();
    if req.license_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
        missing.push("license_key");
    }
    if req.connected.is_none() {
        missing.push("connected");
    }
    let (Some(license_key), Some(connected)) = (req.license_key, req.connected) else {
        return Err(RelayError::validation(missing).into());
    };
    if !missing.is_empty() {
        return Err(RelayError::validation(missing).into());
    }

    let student = state
        .relay
        .report_heartbeat(&caller, &license_key, connected)
        .await?;
    Ok(Success::new(StudentResponse { student }))
}
