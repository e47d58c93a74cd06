use thiserror::Error;

/// Errors raised by a [`crate::Source`] implementation.
///
/// The collector branches on [`SourceError::is_permanent`] to decide whether
/// the credential that produced it needs marking `needs-reauth`/`blocked`
/// (§4.1, §4.4) or whether the failure is just this tick's bad luck.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("channel no longer reachable: {0}")]
    ChannelGone(String),

    #[error("malformed response from platform: {0}")]
    Protocol(String),
}

impl SourceError {
    /// Transient failures (network blips, rate limits) get retried on a
    /// later tick with the same credential. Permanent failures mean the
    /// credential itself needs operator attention.
    pub fn is_permanent(&self) -> bool {
        matches!(self, SourceError::AuthFailed(_) | SourceError::ChannelGone(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            SourceError::ConnectionFailed(_) => "SOURCE_CONNECTION_FAILED",
            SourceError::Timeout { .. } => "SOURCE_TIMEOUT",
            SourceError::RateLimited { .. } => "SOURCE_RATE_LIMITED",
            SourceError::AuthFailed(_) => "SOURCE_AUTH_FAILED",
            SourceError::ChannelGone(_) => "SOURCE_CHANNEL_GONE",
            SourceError::Protocol(_) => "SOURCE_PROTOCOL_ERROR",
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout { ms: 0 }
        } else {
            SourceError::ConnectionFailed(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
