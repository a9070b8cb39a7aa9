use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::models::{NewSignal, Signal};
use serde::{Deserialize, Serialize};

use crate::error::{ApiJson, ApiQuery, ApiResult, Success};
use crate::extract::Identity;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SignalQuery {
    pub limit: Option<usize>,
    /// Only signals issued after this id.
    pub since: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignalResponse {
    pub signal: Signal,
}

#[derive(Debug, Serialize)]
pub struct SignalListResponse {
    pub count: usize,
    pub signals: Vec<Signal>,
}

impl From<Vec<Signal>> for SignalListResponse {
    fn from(signals: Vec<Signal>) -> Self {
        Self {
            count: signals.len(),
            signals,
        }
    }
}

/// `POST /api/signals`
pub async fn submit(
    State(state): State<AppState>,
    Identity(caller): Identity,
    ApiJson(input): ApiJson<NewSignal>,
) -> ApiResult<(StatusCode, Success<SignalResponse>)> {
    let signal = state.relay.submit_signal(&caller, input).await?;
    Ok((StatusCode::CREATED, Success::new(SignalResponse { signal })))
}

/// `GET /api/signals?limit=&since=`, newest first.
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SignalQuery>,
) -> ApiResult<Success<SignalListResponse>> {
    let signals = state
        .relay
        .signals(query.limit, query.since.as_deref())
        .await?;
    Ok(Success::new(signals.into()))
}

/// `GET /api/signals/ea/{ea_id}`
pub async fn by_ea(
    State(state): State<AppState>,
    Path(ea_id): Path<String>,
) -> Success<SignalListResponse> {
    Success::new(state.relay.signals_for_ea(&ea_id).await.into())
}
