use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Pending,
    Active,
    Stopped,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "stopped" => Ok(Self::Stopped),
            other => Err(format!("unknown student status {}", other)),
        }
    }
}

/// Login material handed to the execution backend once, never stored.
#[derive(Clone, Deserialize)]
pub struct AccountCredentials {
    pub login: String,
    pub password: String,
    pub server: String,
    pub broker: Option<String>,
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("login", &self.login)
            .field("password", &"***")
            .field("server", &self.server)
            .field("broker", &self.broker)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub license_key: String,
    pub account_ref: String,
    pub login: String,
    pub broker: Option<String>,
    pub server: String,
    pub lot_size: f64,
    pub status: StudentStatus,
    pub mentor_id: String,
    pub ea_id: String,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_reported_connected: Option<bool>,
}

/// Read projection of a student with liveness already evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentState {
    pub license_key: String,
    pub login: String,
    pub broker: Option<String>,
    pub server: String,
    pub status: StudentStatus,
    pub mentor_id: String,
    pub ea_id: String,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub connected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_password() {
        let creds = AccountCredentials {
            login: "5012345".into(),
            password: "hunter2".into(),
            server: "Broker-Demo".into(),
            broker: None,
        };
        let out = format!("{:?}", creds);
        assert!(out.contains("5012345"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            StudentStatus::Pending,
            StudentStatus::Active,
            StudentStatus::Stopped,
        ] {
            assert_eq!(status.as_str().parse::<StudentStatus>(), Ok(status));
        }
    }
}
