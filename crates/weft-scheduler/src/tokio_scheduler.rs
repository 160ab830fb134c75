//! Tokio-backed scheduler: one timer task per installed job.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cron;
use crate::error::{Result, SchedulerError};
use crate::scheduler::{FiringPolicy, JobSpec, Scheduler};

/// A [`Scheduler`] that drives jobs with tokio timers.
///
/// Interval jobs fire immediately and then every period; cron jobs sleep
/// until each next occurrence of their expression. Jobs installed while the
/// scheduler is Stopped are held and begin firing on [`Scheduler::start`].
///
/// Must be constructed inside a tokio runtime; the runtime handle is
/// captured so jobs can be scheduled from non-async threads afterwards.
pub struct TokioScheduler {
    handle: Handle,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    started: bool,
    jobs: HashMap<String, JobEntry>,
}

struct JobEntry {
    spec: JobSpec,
    timer: Option<JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            handle: Handle::current(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn spawn_timer(handle: &Handle, spec: &JobSpec) -> JoinHandle<()> {
        let job_id = spec.job_id.clone();
        let action = spec.action.clone();

        match &spec.policy {
            FiringPolicy::Every(period) => {
                let period = *period;
                handle.spawn(async move {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    loop {
                        interval.tick().await;
                        debug!("Job fired: {}", job_id);
                        if let Err(e) = (action)() {
                            warn!("Job '{}' firing failed: {:#}", job_id, e);
                        }
                    }
                })
            }
            FiringPolicy::Cron(expression) => {
                let expression = expression.clone();
                handle.spawn(async move {
                    // Validated at schedule time; a parse failure here means
                    // the expression changed semantics between versions.
                    let schedule = match cron::parse(&expression) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("Job '{}' has unusable cron expression: {}", job_id, e);
                            return;
                        }
                    };
                    loop {
                        let now = Utc::now();
                        let Some(next) = schedule.after(&now).next() else {
                            info!("Job '{}' has no further occurrences", job_id);
                            return;
                        };
                        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
                        tokio::time::sleep(delay).await;
                        debug!("Job fired: {}", job_id);
                        if let Err(e) = (action)() {
                            warn!("Job '{}' firing failed: {:#}", job_id, e);
                        }
                    }
                })
            }
        }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, job: JobSpec) -> Result<()> {
        match &job.policy {
            FiringPolicy::Every(period) => {
                if period.is_zero() {
                    return Err(SchedulerError::ZeroInterval(job.job_id));
                }
            }
            FiringPolicy::Cron(expression) => {
                cron::parse(expression)?;
            }
        }

        let mut inner = self.inner.lock();

        // Same identity: tear the old job down first.
        if let Some(old) = inner.jobs.remove(&job.job_id) {
            if let Some(timer) = old.timer {
                timer.abort();
            }
            debug!("Replaced job: {}", job.job_id);
        }

        let timer = if inner.started {
            Some(Self::spawn_timer(&self.handle, &job))
        } else {
            None
        };
        info!("Job scheduled: {} ({})", job.job_id, job.trigger_id);
        inner.jobs.insert(job.job_id.clone(), JobEntry { spec: job, timer });
        Ok(())
    }

    fn unschedule(&self, job_id: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.jobs.remove(job_id) {
            Some(entry) => {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                info!("Job unscheduled: {}", job_id);
                true
            }
            None => false,
        }
    }

    fn contains(&self, job_id: &str) -> bool {
        self.inner.lock().jobs.contains_key(job_id)
    }

    fn job_ids(&self) -> Vec<String> {
        self.inner.lock().jobs.keys().cloned().collect()
    }

    fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.started {
            return;
        }
        inner.started = true;

        let handle = self.handle.clone();
        for entry in inner.jobs.values_mut() {
            if entry.timer.is_none() {
                entry.timer = Some(Self::spawn_timer(&handle, &entry.spec));
            }
        }
        info!("Scheduler started with {} jobs", inner.jobs.len());
    }

    fn shutdown(&self) {
        let mut inner = self.inner.lock();
        for (_, entry) in inner.jobs.drain() {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
        inner.started = false;
        info!("Scheduler shut down");
    }

    fn is_started(&self) -> bool {
        self.inner.lock().started
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        for (_, entry) in inner.jobs.drain() {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }
}
