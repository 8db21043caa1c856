use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub status: String,
    pub error: String,
}

/// Failure talking to the content API or converting its payloads.
///
/// HTTP failures carry the status code and response body for diagnostics.
#[derive(Debug)]
pub enum RelayError {
    Auth { status: u16, body: String },
    NotFound { status: u16, body: String },
    Validation { status: u16, body: String },
    Network(String),
    Conversion(String),
}

impl RelayError {
    /// Code reported to clients in error frames and logs.
    pub fn code(&self) -> u16 {
        match self {
            RelayError::Auth { status, .. } => *status,
            RelayError::NotFound { status, .. } => *status,
            RelayError::Validation { status, .. } => *status,
            RelayError::Network(_) => 502,
            RelayError::Conversion(_) => 500,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Auth { status, body } => {
                write!(f, "content API rejected credential (status {}): {}", status, body)
            }
            RelayError::NotFound { status, body } => {
                write!(f, "page not found (status {}): {}", status, body)
            }
            RelayError::Validation { status, body } => {
                write!(f, "content API rejected payload (status {}): {}", status, body)
            }
            RelayError::Network(e) => write!(f, "content API unreachable: {}", e),
            RelayError::Conversion(e) => write!(f, "document conversion failed: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}
