use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for the whole service.
///
/// Every variant maps to exactly one HTTP status code, so handlers can bubble
/// errors up with `?` and let the server layer build the response.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection reset by peer")]
    ConnectionReset,
    #[error("No response from server")]
    NoResponse,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The HTTP status code this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::InvalidArgument(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::Conflict(_) => 409,
            Error::Database(_)
            | Error::Io(_)
            | Error::ConnectionReset
            | Error::NoResponse
            | Error::Internal(_) => 500,
        }
    }

    /// The message sent back to the caller.
    ///
    /// Client errors keep their payload. Internal failure details stay in the
    /// logs, the wire only carries a generic message.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            500 => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Validation("x".into()).status_code(), 400);
        assert_eq!(Error::InvalidArgument("x".into()).status_code(), 400);
        assert_eq!(Error::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(Error::Forbidden("x".into()).status_code(), 403);
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::Conflict("x".into()).status_code(), 409);
        assert_eq!(Error::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = Error::Internal("connection string was postgres://secret".into());
        assert_eq!(err.public_message(), "internal server error");

        let err = Error::NotFound("no order with id 42".into());
        assert!(err.public_message().contains("no order with id 42"));
    }
}
