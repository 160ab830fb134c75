//! The scheduling seam between the engine and a timer backend.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// What fires a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiringPolicy {
    /// Fire immediately, then every `Duration`, forever.
    Every(Duration),
    /// Fire at each occurrence of the cron expression.
    Cron(String),
}

/// The work a job performs when it fires. Errors are logged by the
/// scheduler and swallowed; the next firing proceeds normally.
pub type JobAction = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// A job to install: identity, trigger identity, policy, and action.
#[derive(Clone)]
pub struct JobSpec {
    /// Unique job identity. Scheduling a second job with the same identity
    /// replaces the first.
    pub job_id: String,
    /// Trigger identity, carried for diagnostics.
    pub trigger_id: String,
    pub policy: FiringPolicy,
    pub action: JobAction,
}

impl std::fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSpec")
            .field("job_id", &self.job_id)
            .field("trigger_id", &self.trigger_id)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// A timer backend that fires installed jobs.
///
/// Implementations have two states, Stopped and Started. Jobs may be
/// installed in either; they only fire while the scheduler is Started.
/// The engine receives its scheduler as a constructor dependency so tests
/// can substitute a recording or virtual-time implementation.
pub trait Scheduler: Send + Sync {
    /// Install `job`, replacing any existing job with the same identity.
    fn schedule(&self, job: JobSpec) -> Result<()>;

    /// Remove the job with this identity, cancelling its pending firings.
    /// Returns whether a job was removed.
    fn unschedule(&self, job_id: &str) -> bool;

    /// Whether a job with this identity is installed.
    fn contains(&self, job_id: &str) -> bool;

    /// Identities of all installed jobs.
    fn job_ids(&self) -> Vec<String>;

    /// Begin firing. Starting a Started scheduler is a no-op.
    fn start(&self);

    /// Stop firing and cancel every pending firing.
    fn shutdown(&self);

    /// Whether the scheduler is Started.
    fn is_started(&self) -> bool;
}
