use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::Caller;
use relay::Credentials;

use crate::error::ApiError;
use crate::state::AppState;

pub const MENTOR_ID_HEADER: &str = "x-mentor-id";
pub const AGENT_KEY_HEADER: &str = "x-agent-key";

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Identity(pub Caller);

impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let credentials = Credentials {
            bearer: header(headers, AUTHORIZATION.as_str()).map(|value| {
                value
                    .strip_prefix("Bearer ")
                    .unwrap_or(value)
                    .trim()
            }),
            mentor_id: header(headers, MENTOR_ID_HEADER),
            agent_key: header(headers, AGENT_KEY_HEADER),
        };

        let caller = state.relay.authenticate(&credentials).await?;
        Ok(Self(caller))
    }
}

/// A header that is present but not valid UTF-8 is kept as an empty credential
/// so it is rejected instead of ignored.
pub fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).map(|value| value.to_str().unwrap_or(""))
}
