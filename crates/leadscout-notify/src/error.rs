use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("store error: {0}")]
    Store(#[from] leadscout_store::StoreError),

    #[error("email send failed: {0}")]
    Email(String),

    #[error("bot push failed: {0}")]
    BotPush(String),
}

impl NotifyError {
    pub fn code(&self) -> &'static str {
        match self {
            NotifyError::Store(_) => "NOTIFY_STORE_ERROR",
            NotifyError::Email(_) => "NOTIFY_EMAIL_FAILED",
            NotifyError::BotPush(_) => "NOTIFY_BOT_PUSH_FAILED",
        }
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
