//! Error taxonomy shared by the API client and the streaming engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of engine errors for consistent handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// Read/connect failure or non-OK HTTP response
    Transport,
    /// Malformed or unrecognized event payload (absorbed inside the decoder)
    Protocol,
    /// Explicit `error` event from the agent
    Application,
    /// Tab capacity exceeded
    Capacity,
    /// User-initiated cancellation; not a failure
    Cancelled,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Transport => write!(f, "transport"),
            ApiErrorKind::Protocol => write!(f, "protocol"),
            ApiErrorKind::Application => write!(f, "application"),
            ApiErrorKind::Capacity => write!(f, "capacity"),
            ApiErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Structured error with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error category
    pub kind: ApiErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new error.
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an error with details attached.
    pub fn with_details(
        kind: ApiErrorKind,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Transport, message)
    }

    /// Creates a transport error from a non-OK HTTP response.
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}");
        let details = if body.is_empty() {
            None
        } else {
            // Try to extract a cleaner error message from JSON
            if let Ok(json) = serde_json::from_str::<Value>(body)
                && let Some(error_obj) = json.get("error")
                && let Some(msg) = error_obj.get("message").and_then(|v| v.as_str())
            {
                return Self {
                    kind: ApiErrorKind::Transport,
                    message: format!("HTTP {status}: {msg}"),
                    details: Some(body.to_string()),
                };
            }
            Some(body.to_string())
        };
        Self {
            kind: ApiErrorKind::Transport,
            message,
            details,
        }
    }

    /// Creates an application error (explicit `error` event from the agent).
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Application, message)
    }

    /// Creates a capacity error for the given tab limit.
    pub fn capacity(max_tabs: usize) -> Self {
        Self::new(
            ApiErrorKind::Capacity,
            format!("Tab limit reached ({max_tabs}); close a session first"),
        )
    }

    /// Returns true for user-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.kind == ApiErrorKind::Cancelled
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for API and engine operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
