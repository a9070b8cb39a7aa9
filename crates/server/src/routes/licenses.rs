use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::models::{LicenseKey, LicenseValidation};
use serde::{Deserialize, Serialize};

use crate::error::{ApiJson, ApiResult, Success};
use crate::extract::Identity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IssueLicenseRequest {
    pub ea_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LicenseResponse {
    pub license: LicenseKey,
}

#[derive(Debug, Serialize)]
pub struct LicenseListResponse {
    pub count: usize,
    pub licenses: Vec<LicenseKey>,
}

/// `POST /api/licenses`
pub async fn issue(
    State(state): State<AppState>,
    Identity(caller): Identity,
    ApiJson(req): ApiJson<IssueLicenseRequest>,
) -> ApiResult<(StatusCode, Success<LicenseResponse>)> {
    let license = state
        .relay
        .issue_license(&caller, req.ea_id.as_deref().unwrap_or_default(), req.user_id)
        .await?;
    Ok((StatusCode::CREATED, Success::new(LicenseResponse { license })))
}

/// `GET /api/licenses`
pub async fn list(
    State(state): State<AppState>,
    Identity(caller): Identity,
) -> ApiResult<Success<LicenseListResponse>> {
    let licenses = state.relay.list_licenses(&caller).await?;
    Ok(Success::new(LicenseListResponse {
        count: licenses.len(),
        licenses,
    }))
}

/// `GET /api/licenses/{key}/validate`
pub async fn validate(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Success<LicenseValidation> {
    Success::new(state.relay.validate_license(&key).await)
}

/// `POST /api/licenses/{key}/deactivate`
pub async fn deactivate(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(key): Path<String>,
) -> ApiResult<Success<LicenseResponse>> {
    let license = state.relay.deactivate_license(&caller, &key).await?;
    Ok(Success::new(LicenseResponse { license }))
}
