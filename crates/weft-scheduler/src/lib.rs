//! Trigger scheduling for Weft.
//!
//! The engine binds each enabled workflow to a firing policy (a fixed
//! repeating interval or a cron expression) through the [`Scheduler`]
//! trait. [`TokioScheduler`] is the shipped implementation: one timer task
//! per job on the tokio runtime. Tests substitute their own recording
//! implementations; the trait is the seam.

pub mod cron;

mod error;
mod scheduler;
mod tokio_scheduler;

pub use self::cron::is_cron_expression_valid;
pub use error::{Result, SchedulerError};
pub use scheduler::{FiringPolicy, JobAction, JobSpec, Scheduler};
pub use tokio_scheduler::TokioScheduler;
