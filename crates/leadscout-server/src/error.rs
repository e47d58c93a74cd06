use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store error: {0}")]
    Store(#[from] leadscout_store::StoreError),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl ServerError {
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Store(_) => "SERVER_STORE_ERROR",
            ServerError::BadRequest(_) => "SERVER_BAD_REQUEST",
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
