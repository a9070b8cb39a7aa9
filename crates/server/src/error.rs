//! HTTP mapping of relay failures.
//!
//! Every failure becomes `{"success": false, "error": <reason>, ...}` with the
//! status matching the reason. Internal errors carry no detail.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, extract::FromRequest, extract::FromRequestParts};
use common::RelayError;
use serde::Serialize;
use tracing::{debug, error};

#[derive(Debug)]
pub struct ApiError(pub RelayError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected request body: {}", rejection.body_text());
        Self(RelayError::validation(["body"]))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query string: {}", rejection.body_text());
        Self(RelayError::validation(["query"]))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<String>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::Forbidden(_) => StatusCode::FORBIDDEN,
            RelayError::Validation { .. } => StatusCode::BAD_REQUEST,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Conflict(_) => StatusCode::CONFLICT,
            RelayError::Backend(_) => StatusCode::BAD_GATEWAY,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (detail, fields) = match &self.0 {
            RelayError::Validation { fields } => (None, Some(fields.clone())),
            RelayError::Internal(detail) => {
                error!("Internal error: {}", detail);
                (None, None)
            }
            other => (Some(other.to_string()), None),
        };

        let body = ErrorBody {
            success: false,
            error: self.0.reason(),
            detail,
            fields,
        };
        (status, Json(body)).into_response()
    }
}

/// `Json` whose rejection is an [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejection is an [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Successful body: `{"success": true, ...fields of T}`.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

impl<T: Serialize> Success<T> {
    pub fn new(body: T) -> Self {
        Self {
            success: true,
            body,
        }
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
