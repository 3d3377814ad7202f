use thiserror::Error;

pub type TimetableResult<T> = Result<T, TimetableError>;

#[derive(Error, Debug)]
pub enum TimetableError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Course code already exists")]
    DuplicateCode,

    #[error("{0}")]
    InsufficientData(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TimetableError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status code this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_)
            | Self::DuplicateEmail
            | Self::DuplicateCode
            | Self::InsufficientData(_) => 400,
            Self::InvalidCredentials | Self::Unauthorized => 401,
            Self::InvalidToken | Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Solver(_) | Self::Internal(_) => 500,
        }
    }

    /// Message placed in the `error` field of a response body.
    /// Solver and internal failures get a fixed message; their detail
    /// travels separately (solver) or only to the logs (internal).
    pub fn public_message(&self) -> String {
        match self {
            Self::Solver(_) => "Solver error".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Optional `details` field of a response body.
    pub fn details(&self) -> Option<String> {
        match self {
            Self::Solver(detail) => Some(detail.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(TimetableError::validation("x").status_code(), 400);
        assert_eq!(TimetableError::DuplicateEmail.status_code(), 400);
        assert_eq!(TimetableError::DuplicateCode.status_code(), 400);
        assert_eq!(TimetableError::InsufficientData("x".into()).status_code(), 400);
        assert_eq!(TimetableError::InvalidCredentials.status_code(), 401);
        assert_eq!(TimetableError::Unauthorized.status_code(), 401);
        assert_eq!(TimetableError::InvalidToken.status_code(), 403);
        assert_eq!(TimetableError::forbidden("Admin only").status_code(), 403);
        assert_eq!(TimetableError::not_found("x").status_code(), 404);
        assert_eq!(TimetableError::Solver("down".into()).status_code(), 500);
        assert_eq!(TimetableError::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_internal_detail_is_not_public() {
        let err = TimetableError::internal("connection refused at 10.0.0.3");
        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.details().is_none());

        let err = TimetableError::Solver("No solution found".into());
        assert_eq!(err.public_message(), "Solver error");
        assert_eq!(err.details().as_deref(), Some("No solution found"));
    }
}
