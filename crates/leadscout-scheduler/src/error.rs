use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("a tick is already in progress")]
    TickInProgress,
}

impl SchedulerError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::TickInProgress => "SCHEDULER_TICK_IN_PROGRESS",
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
