use crate::core::error::ErrorKind;
use std::error::Error as StdError;
use std::fmt;

const MAX_DIALOG_CHARS: usize = 2000;

/// Errors produced by [`crate::api::WorksheetApi`] calls.
#[derive(Debug)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS, body read).
    Network(reqwest::Error),

    /// The server answered with a non-success status.
    Status {
        status: u16,
        /// Response body as text; the server puts validation messages here.
        body: String,
    },

    /// The worksheet (or other resource) does not exist.
    NotFound,

    /// The response body was not the JSON we expected.
    Decode(serde_json::Error),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network(_) => ErrorKind::TransientNetwork,
            ApiError::Status { .. } | ApiError::Decode(_) => ErrorKind::ServerValidation,
            ApiError::NotFound => ErrorKind::NotFound,
        }
    }

    /// Text suitable for the error dialog.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { body, status } if !body.trim().is_empty() => {
                let trimmed = body.trim();
                if trimmed.chars().count() > MAX_DIALOG_CHARS {
                    let head: String = trimmed.chars().take(MAX_DIALOG_CHARS).collect();
                    format!("{head}… (HTTP {status})")
                } else {
                    trimmed.to_string()
                }
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(source) => write!(f, "Network error: {source}"),
            ApiError::Status { status, body } => {
                if body.trim().is_empty() {
                    write!(f, "Server returned HTTP {status}")
                } else {
                    write!(f, "Server returned HTTP {status}: {}", body.trim())
                }
            }
            ApiError::NotFound => write!(f, "Not found"),
            ApiError::Decode(source) => write!(f, "Unexpected response from server: {source}"),
        }
    }
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ApiError::Network(source) => Some(source),
            ApiError::Decode(source) => Some(source),
            ApiError::Status { .. } | ApiError::NotFound => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        ApiError::Network(error)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Decode(error)
    }
}
