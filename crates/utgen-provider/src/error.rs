//! Completion provider errors
//!
//! Every failure is classified as transient (worth retrying) or permanent
//! (the unit fails). Classification happens here, at the transport boundary,
//! so the pipeline never inspects backend-specific details.

use reqwest::StatusCode;

/// Provider failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Timeout, refused connection, rate limit, server error, unusable response
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Malformed request, authentication, unsupported configuration
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

impl ProviderError {
    /// Create transient error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Create permanent error
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    /// Check if error is worth retrying
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify a non-success HTTP status
    ///
    /// 408, 429 and 5xx are transient. Everything else (notably 400, 401,
    /// 403, 404, 422) is permanent.
    #[must_use]
    pub fn from_status(backend: &str, status: StatusCode, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        let message = format!("{backend} returned {status}: {snippet}");
        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            Self::Transient(message)
        } else {
            Self::Permanent(message)
        }
    }

    /// Classify a transport-level failure
    #[must_use]
    pub fn from_transport(backend: &str, err: &reqwest::Error) -> Self {
        let message = format!("{backend} request failed: {err}");
        if err.is_builder() {
            Self::Permanent(message)
        } else if let Some(status) = err.status() {
            Self::from_status(backend, status, "")
        } else {
            // timeouts, refused connections, resets and undecodable bodies
            Self::Transient(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        for code in [408u16, 429, 500, 502, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(ProviderError::from_status("ollama", status, "").is_transient(), "{code}");
        }
        for code in [400u16, 401, 403, 404, 422] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(!ProviderError::from_status("ollama", status, "").is_transient(), "{code}");
        }
    }

    #[test]
    fn status_message_truncates_body() {
        let body = "x".repeat(1000);
        let err = ProviderError::from_status("github", StatusCode::BAD_REQUEST, &body);
        assert!(err.to_string().len() < 300);
        assert!(err.to_string().contains("github returned 400"));
    }
}
