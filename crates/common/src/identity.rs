use std::fmt;

use crate::errors::{RelayError, RelayResult};

/// Who is calling, reduced to the capability it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Mentor(String),
    Agent,
    Anonymous,
}

impl Caller {
    /// Mentor capability; returns the mentor id the caller acts as.
    pub fn require_mentor(&self) -> RelayResult<&str> {
        match self {
            Self::Mentor(id) => Ok(id),
            _ => Err(RelayError::Unauthorized),
        }
    }

    pub fn require_agent(&self) -> RelayResult<()> {
        match self {
            Self::Agent => Ok(()),
            _ => Err(RelayError::Unauthorized),
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mentor(id) => write!(f, "mentor:{}", id),
            Self::Agent => write!(f, "agent"),
            Self::Anonymous => write!(f, "anonymous"),
        }
    }
}
