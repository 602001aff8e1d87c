use reqwest::StatusCode;

/// Why a request to Home Assistant produced no data.
///
/// Discovery collapses every variant into "nothing found"; callers that
/// need diagnostics can match on it.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Authentication rejected by server ({0})")]
    Unauthorized(StatusCode),

    #[error("Unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("Malformed JSON body: {0}")]
    Json(#[source] serde_json::Error),

    #[error("Unexpected response shape: {0}")]
    Shape(#[source] serde_json::Error),

    #[error("Invalid entity id '{0}'")]
    InvalidEntity(String),
}

impl SendError {
    /// Classify a reqwest failure, separating out deadline hits
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SendError::Timeout
        } else {
            SendError::Transport(e)
        }
    }

    /// Map a non-200 status to an error
    pub(crate) fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SendError::Unauthorized(status),
            _ => SendError::Status(status),
        }
    }

    /// Whether the server refused our credentials
    pub fn is_auth(&self) -> bool {
        matches!(self, SendError::Unauthorized(_))
    }
}
