//! Error types shared by the network-facing stages

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single remote call or local decode step.
///
/// None of these are fatal to the process: callers turn them into a
/// channel rejection or a failed operation.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("json handling failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("unexpected http status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("response missing `{0}`")]
    MissingField(&'static str),
    #[error("transaction signing failed: {0}")]
    Signing(String),
    #[error("invalid proxy `{proxy}`: {reason}")]
    Proxy { proxy: String, reason: String },
}

impl SwapError {
    pub fn signing(reason: impl std::fmt::Display) -> Self {
        Self::Signing(reason.to_string())
    }
}

pub type SwapResult<T> = Result<T, SwapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = SwapError::MissingField("quote");
        assert_eq!(err.to_string(), "response missing `quote`");
    }

    #[test]
    fn test_status_message_includes_body() {
        let err = SwapError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream".to_string(),
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("upstream"));
    }
}
