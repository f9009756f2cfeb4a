/*
[INPUT]:  Error sources (HTTP, API, serialization, URL, WebSocket, session state)
[OUTPUT]: Structured transport error type with retry hints
[POS]:    Error handling layer - unified transport errors for the whole crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the tasker client
#[derive(Error, Debug)]
pub enum TaskerError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Task server answered with a non-success status
    #[error("API error (code {code}): {message}")]
    Api { code: i32, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Event server refused the namespace connection
    #[error("Subscription rejected: {0}")]
    ConnectRejected(String),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Caller supplied task data that is not a JSON object
    #[error("Invalid task data: {0}")]
    InvalidData(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Terminate called before the server assigned a task id
    #[error("Task not activated")]
    NotActivated,
}

impl TaskerError {
    /// Check if the error is retryable.
    ///
    /// Nothing in this crate retries; the hint is for callers owning a retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            TaskerError::Http(err) => err.is_timeout() || err.is_connect(),
            TaskerError::Api { code, .. } => *code == 429 || *code >= 500,
            TaskerError::WebSocket(_) | TaskerError::InvalidResponse(_) => true,
            _ => false,
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        TaskerError::Api {
            code: status.as_u16() as i32,
            message: message.into(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TaskerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TaskerError::WebSocket(err.to_string())
    }
}

/// Result type alias for tasker operations
pub type Result<T> = std::result::Result<T, TaskerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let server_err = TaskerError::api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(server_err.is_retryable());

        let throttled = TaskerError::api_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(throttled.is_retryable());

        assert!(!TaskerError::NotActivated.is_retryable());
        assert!(!TaskerError::api_error(StatusCode::BAD_REQUEST, "bad").is_retryable());
    }

    #[test]
    fn test_api_error_creation() {
        let err = TaskerError::api_error(StatusCode::NOT_FOUND, "no such task");
        match err {
            TaskerError::Api { code, message } => {
                assert_eq!(code, 404);
                assert_eq!(message, "no such task");
            }
            _ => panic!("Expected Api error variant"),
        }
    }

    #[test]
    fn test_not_activated_message() {
        assert_eq!(TaskerError::NotActivated.to_string(), "Task not activated");
    }
}
