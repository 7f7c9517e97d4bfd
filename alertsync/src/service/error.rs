//! Alert service error types

use thiserror::Error;

/// Errors that can occur during a remote fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_the_notification_error_text() {
        let err = FetchError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error 500: boom");
        assert_eq!(
            FetchError::Config("invalid base URL x".to_string()).to_string(),
            "Invalid configuration: invalid base URL x"
        );
    }
}
