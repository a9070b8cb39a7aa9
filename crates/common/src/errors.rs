use thiserror::Error;

/// Failure taxonomy shared by every relay operation.
///
/// `reason()` is the stable machine-readable code surfaced to callers;
/// the `Display` text is the optional human-readable detail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("missing or invalid credential")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("invalid or missing fields: {}", fields.join(", "))]
    Validation { fields: Vec<String> },
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("backend failure: {0}")]
    Backend(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Validation { .. } => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Backend(_) => "backend_failure",
            Self::Internal(_) => "internal",
        }
    }

    pub fn validation<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Validation {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}
