use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::RelayError;
use common::models::{AccountCredentials, StudentState};
use serde::{Deserialize, Serialize};

use crate::error::{ApiJson, ApiResult, Success};
use crate::state::AppState;

/// Enrollment body. The license key is the only credential; the account
/// password is forwarded to the execution backend and dropped.
#[derive(Debug, Deserialize)]
pub struct RegisterStudentRequest {
    pub license_key: Option<String>,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub server: String,
    pub broker: Option<String>,
    pub lot_size: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub student: StudentState,
}

/// `POST /api/students/register`
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterStudentRequest>,
) -> ApiResult<(StatusCode, Success<StudentResponse>)> {
    let license_key = req
        .license_key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| RelayError::validation(["license_key"]))?;
    let credentials = AccountCredentials {
        login: req.login,
        password: req.password,
        server: req.server,
        broker: req.broker,
    };

    let student = state
        .relay
        .register_student(&license_key, credentials, req.lot_size)
        .await?;
    Ok((StatusCode::CREATED, Success::new(StudentResponse { student })))
}

/// `POST /api/students/{key}/start`
pub async fn start(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Success<StudentResponse>> {
    let student = state.relay.start_student(&key).await?;
    Ok(Success::new(StudentResponse { student }))
}

/// `POST /api/students/{key}/stop`
pub async fn stop(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Success<StudentResponse>> {
    let student = state.relay.stop_student(&key).await?;
    Ok(Success::new(StudentResponse { student }))
}

/// `GET /api/students/{key}/status`
pub async fn status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Success<StudentResponse>> {
    let student = state.relay.student_status(&key).await?;
    Ok(Success::new(StudentResponse { student }))
}
