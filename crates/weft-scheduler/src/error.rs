use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron expression could not be parsed.
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    /// A job interval must be non-zero.
    #[error("Job '{0}' has a zero interval")]
    ZeroInterval(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
