use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseKey {
    pub key: String,
    pub mentor_id: String,
    pub ea_id: String,
    pub user_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    Valid,
    InvalidFormat,
    NotFound,
    Inactive,
}

/// Outcome of a license lookup. Never an error: every failure is a reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseValidation {
    pub valid: bool,
    pub reason: ValidationReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseKey>,
}

impl LicenseValidation {
    pub fn valid(license: LicenseKey) -> Self {
        Self {
            valid: true,
            reason: ValidationReason::Valid,
            license: Some(license),
        }
    }

    pub fn rejected(reason: ValidationReason) -> Self {
        Self {
            valid: false,
            reason,
            license: None,
        }
    }
}
