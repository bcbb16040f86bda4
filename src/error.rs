//! Error types with HTTP status code mapping.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// Error type for the flavors service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Data errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported media type: expected {expected}")]
    UnsupportedMediaType { expected: String },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // System errors
    #[error("Invalid address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            // Startup configuration faults, never caused by a client
            Error::Config(_) | Error::AddrParse(_) => StatusCode::INTERNAL_SERVER_ERROR,

            Error::Io(_)
            | Error::Json(_)
            | Error::Database(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert error into HTTP response.
    ///
    /// Server-side failures are logged in full and answered with a generic
    /// message; client errors echo their own description.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status_code();
        let message = match &self {
            _ if status.is_server_error() => {
                tracing::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
            Error::NotFound(what) => format!("{what} not found"),
            _ => self.to_string(),
        };
        crate::response::error(status, &message)
    }
}

/// Result type alias using the crate's Error.
pub type Result<T> = std::result::Result<T, Error>;
