use common::{Caller, RelayError, RelayResult};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::mentor_directory::MentorDirectory;

/// Raw credentials as presented on a request.
#[derive(Debug, Default, Clone, Copy)]
pub struct Credentials<'a> {
    pub bearer: Option<&'a str>,
    pub mentor_id: Option<&'a str>,
    pub agent_key: Option<&'a str>,
}

/// Turns presented credentials into a [`Caller`].
///
/// The first credential present decides; one that is present but does not
/// check out is rejected rather than treated as anonymous.
#[derive(Debug, Clone)]
pub struct Authenticator {
    legacy_token: Option<String>,
    legacy_mentor_id: String,
    agent_key: String,
}

impl Authenticator {
    pub fn new(agent_key: impl Into<String>) -> Self {
        Self {
            legacy_token: None,
            legacy_mentor_id: String::new(),
            agent_key: agent_key.into(),
        }
    }

    /// Accepts `token` as a bearer credential acting as `mentor_id`.
    pub fn with_legacy_mentor(mut self, token: impl Into<String>, mentor_id: impl Into<String>) -> Self {
        self.legacy_token = Some(token.into()).filter(|t: &String| !t.is_empty());
        self.legacy_mentor_id = mentor_id.into();
        self
    }

    /// Mentor id the legacy bearer token acts as, when one is configured.
    pub fn legacy_mentor_id(&self) -> Option<&str> {
        self.legacy_token
            .as_ref()
            .map(|_| self.legacy_mentor_id.as_str())
    }

    pub async fn resolve(
        &self,
        credentials: &Credentials<'_>,
        mentors: &MentorDirectory,
    ) -> RelayResult<Caller> {
        if let Some(token) = credentials.bearer {
            return match &self.legacy_token {
                Some(expected) if same_secret(token, expected) => {
                    Ok(Caller::Mentor(self.legacy_mentor_id.clone()))
                }
                _ => {
                    debug!("Rejected bearer token");
                    Err(RelayError::Unauthorized)
                }
            };
        }

        if let Some(mentor_id) = credentials.mentor_id {
            return match mentors.validate(mentor_id.trim()).await {
                Some(mentor) => Ok(Caller::Mentor(mentor.mentor_id)),
                None => {
                    debug!("Rejected unknown or inactive mentor {}", mentor_id);
                    Err(RelayError::Unauthorized)
                }
            };
        }

        if let Some(key) = credentials.agent_key {
            return if !self.agent_key.is_empty() && same_secret(key, &self.agent_key) {
                Ok(Caller::Agent)
            } else {
                debug!("Rejected agent key");
                Err(RelayError::Unauthorized)
            };
        }

        Ok(Caller::Anonymous)
    }
}

fn same_secret(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
