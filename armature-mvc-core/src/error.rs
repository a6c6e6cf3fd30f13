// Error types for the Armature MVC layer

use http::StatusCode;
use thiserror::Error;

/// Errors raised while dispatching an action.
///
/// Variants fall into three groups: configuration errors (fail fast, never
/// retried), request-level errors that map onto a specific status code, and
/// failures raised by the action method or a filter hook.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    // Raised by action methods and filters
    #[error("{message}")]
    Action {
        message: String,
        status: Option<StatusCode>,
    },

    #[error("The request was aborted")]
    RequestAborted,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // 4xx Client Errors
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    // 5xx Server Errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for an action failure without an explicit status.
    pub fn action(message: impl Into<String>) -> Self {
        Error::Action {
            message: message.into(),
            status: None,
        }
    }

    /// Shorthand for an action failure that carries a status code.
    pub fn action_with_status(message: impl Into<String>, status: StatusCode) -> Self {
        Error::Action {
            message: message.into(),
            status: Some(status),
        }
    }

    /// The error raised by location-writing results when URL generation
    /// yields nothing.
    pub fn no_route_matches() -> Self {
        Error::InvalidOperation("No route matches the supplied values.".to_string())
    }

    /// The error raised when a collaborator was never registered.
    pub fn missing_service(service: &str) -> Self {
        Error::Configuration(format!(
            "No service for type '{}' has been registered.",
            service
        ))
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Action {
                status: Some(status),
                ..
            } => *status,

            // 4xx Client Errors
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,

            // Client went away; nobody will read the status anyway
            Error::RequestAborted => StatusCode::BAD_REQUEST,

            // Default to 500 for unmapped errors
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Short variant name, used by type-specific exception filters and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "Configuration",
            Error::InvalidOperation(_) => "InvalidOperation",
            Error::Action { .. } => "Action",
            Error::RequestAborted => "RequestAborted",
            Error::Serialization(_) => "Serialization",
            Error::Io(_) => "Io",
            Error::BadRequest(_) => "BadRequest",
            Error::NotFound(_) => "NotFound",
            Error::Conflict(_) => "Conflict",
            Error::PayloadTooLarge(_) => "PayloadTooLarge",
            Error::Internal(_) => "Internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::InvalidOperation("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::action_with_status("teapot", StatusCode::IM_A_TEAPOT).status_code(),
            StatusCode::IM_A_TEAPOT
        );
        assert_eq!(
            Error::action("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_client_server_classification() {
        let err = Error::Conflict("dup".into());
        assert!(err.is_client_error());
        assert!(!err.is_server_error());

        let err = Error::Internal("oops".into());
        assert!(err.is_server_error());
    }

    #[test]
    fn test_no_route_message() {
        let err = Error::no_route_matches();
        assert_eq!(err.kind(), "InvalidOperation");
        assert!(err.to_string().contains("No route matches the supplied values"));
    }
}
