use thiserror::Error;

/// Crate-wide error type for ambient concerns (config, generic internal
/// failures). Domain crates (store, source, llm, notify, scheduler, server)
/// define their own error enums grounded in their own failure modes and
/// wrap this one where they need to surface a config/internal failure.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
