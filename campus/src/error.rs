//! Client error taxonomy.
//!
//! DESIGN
//! ======
//! Errors are grouped by how the UI reacts to them rather than by where they
//! came from: validation errors are rendered next to form fields, busy errors
//! are retried, everything else becomes a dismissible alert. Precondition
//! failures (missing CSRF token, missing page element) indicate a markup or
//! integration defect and abort the action before any request is sent.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use std::collections::BTreeMap;

/// Errors produced by API calls and controllers.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server rejected one or more form fields.
    #[error("validation failed for {} field(s)", fields.len())]
    Validation { fields: BTreeMap<String, Vec<String>> },

    /// The record stayed locked by a concurrent operation after every attempt.
    #[error("resource busy after {attempts} attempt(s): {message}")]
    Busy { attempts: u32, message: String },

    /// The server answered `success: false` with a plain error message.
    #[error("request rejected: {message}")]
    Rejected { message: String, details: Option<String> },

    /// The addressed resource does not exist; carries the server message.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server returned a non-success status without a parseable envelope.
    #[error("http status {status}")]
    HttpStatus { status: u16, body: String },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// No CSRF token was available for a mutating request.
    #[error("missing CSRF token")]
    MissingCsrfToken,

    /// A page element the controller depends on is absent.
    #[error("missing page element: {0}")]
    MissingElement(&'static str),

    /// A caller-supplied argument was unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ClientError {
    /// Stable machine-readable code for logs and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "E_VALIDATION",
            Self::Busy { .. } => "E_BUSY",
            Self::Rejected { .. } => "E_REJECTED",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::HttpStatus { .. } => "E_HTTP_STATUS",
            Self::Network(_) => "E_NETWORK",
            Self::Parse(_) => "E_PARSE",
            Self::MissingCsrfToken => "E_MISSING_CSRF",
            Self::MissingElement(_) => "E_MISSING_ELEMENT",
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    /// True for integration defects that abort an action without user feedback.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingCsrfToken | Self::MissingElement(_))
    }

    /// Human-readable text for an alert region, when one applies.
    #[must_use]
    pub fn alert_message(&self) -> Option<String> {
        match self {
            Self::Rejected { message, .. } | Self::Busy { message, .. } | Self::NotFound(message) => {
                Some(message.clone())
            }
            Self::Validation { .. } | Self::MissingCsrfToken | Self::MissingElement(_) => None,
            other => Some(other.to_string()),
        }
    }
}
