use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] leadscout_store::StoreError),

    #[error("source error: {0}")]
    Source(#[from] leadscout_source::SourceError),

    #[error("lm error: {0}")]
    Lm(#[from] leadscout_llm::LmError),

    #[error("notify error: {0}")]
    Notify(#[from] leadscout_notify::NotifyError),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Store(_) => "ENGINE_STORE_ERROR",
            EngineError::Source(_) => "ENGINE_SOURCE_ERROR",
            EngineError::Lm(_) => "ENGINE_LM_ERROR",
            EngineError::Notify(_) => "ENGINE_NOTIFY_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
