use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmError {
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("http error: {status} {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed model response: {0}")]
    Malformed(String),
}

impl LmError {
    /// 5xx and timeouts are retried; 4xx (other than 429) is not (§4.2).
    pub fn is_retryable(&self) -> bool {
        match self {
            LmError::Timeout { .. } | LmError::RateLimited { .. } | LmError::Transport(_) => true,
            LmError::Http { status, .. } => *status >= 500,
            LmError::Malformed(_) => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LmError::Timeout { .. } => "LLM_TIMEOUT",
            LmError::RateLimited { .. } => "LLM_RATE_LIMITED",
            LmError::Http { .. } => "LLM_HTTP_ERROR",
            LmError::Transport(_) => "LLM_TRANSPORT_ERROR",
            LmError::Malformed(_) => "LLM_MALFORMED_RESPONSE",
        }
    }
}

pub type Result<T> = std::result::Result<T, LmError>;
