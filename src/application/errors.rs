//! Error types for the dashboard engine.

use thiserror::Error;

/// Failures talking to the remote PSA API, classified into stable categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("authentication failed (HTTP {status})")]
    Authentication { status: u16 },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {reason}")]
    Connection { reason: String },

    #[error("rate limited by remote API")]
    RateLimited,

    #[error("remote API returned HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("could not decode remote response: {reason}")]
    Decode { reason: String },
}

impl ApiError {
    pub fn category(&self) -> &'static str {
        match self {
            ApiError::Authentication { .. } => "authentication",
            ApiError::NotFound { .. } => "not-found",
            ApiError::Timeout => "timeout",
            ApiError::Connection { .. } => "connection",
            ApiError::RateLimited => "rate-limit",
            ApiError::Server { .. } => "server",
            ApiError::Decode { .. } => "decode",
        }
    }

    /// Message safe to show an end user; never includes raw transport text.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Authentication { .. } => {
                "Authentication with the PSA API failed. Check the API credentials.".to_string()
            }
            ApiError::NotFound { resource } => format!("The requested {} was not found.", resource),
            ApiError::Timeout => "The PSA API did not respond in time.".to_string(),
            ApiError::Connection { .. } => "Could not connect to the PSA API.".to_string(),
            ApiError::RateLimited => {
                "The PSA API is rate limiting requests. Try again shortly.".to_string()
            }
            ApiError::Server { status, .. } => {
                format!("The PSA API returned an error (HTTP {}).", status)
            }
            ApiError::Decode { .. } => "The PSA API returned an unexpected response.".to_string(),
        }
    }
}

/// Operation-level failures that escalate out of an engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown dashboard layout '{name}'")]
    LayoutNotFound { name: String },

    #[error("unknown widget template '{name}'")]
    TemplateNotFound { name: String },

    #[error("no widgets requested")]
    NoWidgetsRequested,

    #[error("widget slot {slot} is outside the dashboard grid")]
    SlotOutOfRange { slot: usize },

    #[error("dashboard creation failed: {0}")]
    DashboardCreation(ApiError),
}

impl EngineError {
    pub fn user_message(&self) -> String {
        match self {
            EngineError::DashboardCreation(e) => {
                format!("Could not create the dashboard. {}", e.user_message())
            }
            other => other.to_string(),
        }
    }
}
