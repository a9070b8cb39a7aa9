use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use common::RelayError;
use common::models::{Mentor, MentorRegistration};
use serde::{Deserialize, Serialize};

use crate::error::{ApiJson, ApiResult, Success};
use crate::extract::{MENTOR_ID_HEADER, header};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterMentorRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mentor_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub mentor: Mentor,
}

/// `POST /api/mentors/register`. 201 for a new mentor, 200 when the email was already known.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterMentorRequest>,
) -> ApiResult<(StatusCode, Success<MentorRegistration>)> {
    let registration = state
        .relay
        .register_mentor(
            req.name.as_deref().unwrap_or_default(),
            req.email.as_deref().unwrap_or_default(),
            req.mentor_id.as_deref(),
        )
        .await?;

    let status = if registration.already_registered {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Success::new(registration)))
}

/// `GET /api/mentors/verify` with the id in `X-Mentor-Id`. A missing header is
/// unauthorized; an unknown or inactive id is not found.
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Success<VerifyResponse>> {
    let mentor_id = header(&headers, MENTOR_ID_HEADER).ok_or(RelayError::Unauthorized)?;
    let mentor = state
        .relay
        .verify_mentor(mentor_id)
        .await
        .ok_or_else(|| RelayError::NotFound("mentor".into()))?;
    Ok(Success::new(VerifyResponse {
        valid: true,
        mentor,
    }))
}
