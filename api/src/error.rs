/// Failure reported by a [`crate::CompletionApi`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never reached the server (offline, DNS, connection reset).
    #[error("network failure: {0}")]
    Network(String),
    /// No answer within the client's request timeout.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The server answered with a non-success status.
    #[error("server rejected request ({status}): {message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    /// Whether repeating the same request can reasonably succeed.
    ///
    /// Client errors (4xx) are final; everything else is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout { .. } => true,
            ApiError::Server { status, .. } => *status >= 500 || *status == 429,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout { .. })
    }
}
