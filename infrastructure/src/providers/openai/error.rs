//! Mapping HTTP failures onto the port error types

use super::types::ErrorResponse;
use kbchat_application::{ModelError, RetrievalError};
use reqwest::StatusCode;
use std::time::Duration;

/// Whether a status is worth retrying.
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::CONFLICT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Map a non-success chat response.
pub fn model_status_error(status: StatusCode, body: &str) -> ModelError {
    let message = format!("{} ({})", ErrorResponse::message_from(body), status.as_u16());
    if is_transient(status) {
        ModelError::Transient(message)
    } else {
        ModelError::Unavailable(message)
    }
}

/// Map a transport-level chat failure.
pub fn model_transport_error(err: reqwest::Error) -> ModelError {
    if err.is_timeout() || err.is_connect() {
        ModelError::Transient(err.to_string())
    } else if err.is_decode() {
        ModelError::InvalidResponse(err.to_string())
    } else {
        ModelError::Unavailable(err.to_string())
    }
}

/// Map a non-success embeddings response.
pub fn embedding_status_error(status: StatusCode, body: &str) -> RetrievalError {
    RetrievalError::Unavailable(format!(
        "embedding request failed: {} ({})",
        ErrorResponse::message_from(body),
        status.as_u16()
    ))
}

/// Map a transport-level embeddings failure.
pub fn embedding_transport_error(err: reqwest::Error, timeout: Duration) -> RetrievalError {
    if err.is_timeout() {
        RetrievalError::Timeout(timeout)
    } else {
        RetrievalError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures_are_unavailable() {
        let err = model_status_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key"}}"#,
        );
        assert_eq!(
            err,
            ModelError::Unavailable("Incorrect API key (401)".into())
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rate_limits_and_server_errors_are_transient() {
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
            StatusCode::REQUEST_TIMEOUT,
        ] {
            assert!(model_status_error(status, "").is_retryable(), "{}", status);
        }
        assert!(!model_status_error(StatusCode::NOT_FOUND, "").is_retryable());
    }

    #[test]
    fn test_embedding_status_keeps_provider_message() {
        let err = embedding_status_error(StatusCode::BAD_REQUEST, "model not found");
        assert_eq!(
            err,
            RetrievalError::Unavailable("embedding request failed: model not found (400)".into())
        );
    }
}
