//! The task-execution seam.
//!
//! The engine decides *when* a workflow runs; a [`TaskExecutor`] decides
//! *how* its tasks run. The shipped [`NoopExecutor`] only logs; real
//! deployments plug in their own interpreter.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use weft_store::{LaunchKind, Store};

use crate::definition::TaskDefinition;

/// Cancellation and pause signals for one workflow run.
///
/// Executors should call [`RunSignals::checkpoint`] between tasks: it
/// returns `false` once the run has been stopped, and parks the run while
/// it is suspended.
pub struct RunSignals {
    cancel: CancellationToken,
    paused: watch::Receiver<bool>,
}

impl RunSignals {
    pub(crate) fn new(cancel: CancellationToken, paused: watch::Receiver<bool>) -> Self {
        Self { cancel, paused }
    }

    /// Signals that are never cancelled or paused, for executors driven
    /// outside a workflow run (tests, ad-hoc tools).
    pub fn detached() -> Self {
        // The sender can drop: a closed channel reads as never-paused.
        let (_tx, rx) = watch::channel(false);
        Self {
            cancel: CancellationToken::new(),
            paused: rx,
        }
    }

    /// Whether the run has been stopped.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait out a suspension, then report whether the run may continue.
    ///
    /// Returns `true` to proceed with the next task, `false` once the run
    /// has been stopped (including while suspended).
    pub async fn checkpoint(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if *self.paused.borrow() {
            debug!("Run suspended; waiting for resume");
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                changed = self.paused.wait_for(|paused| !paused) => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
        !self.cancel.is_cancelled()
    }

    /// Resolves when the run is stopped.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Everything an executor needs for one run.
pub struct RunContext {
    pub workflow_id: i32,
    pub workflow_name: String,
    pub launch_kind: LaunchKind,
    /// The validated task graph.
    pub tasks: Vec<TaskDefinition>,
    /// Scratch directory for intermediate artifacts.
    pub temp_dir: PathBuf,
    /// Persistence handle for recording entries and counters.
    pub store: Arc<dyn Store>,
    pub signals: RunSignals,
}

/// Interprets a workflow's tasks. Implementations run on the workflow's
/// own tokio task; returning an error marks the run as failed and is
/// logged by the workflow, never propagated to the engine.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, ctx: RunContext) -> anyhow::Result<()>;
}

/// An executor that performs no work.
///
/// Walks the checkpoint protocol and logs each task, which makes it useful
/// for wiring an engine before a real interpreter exists and for tests.
#[derive(Debug, Default)]
pub struct NoopExecutor;

#[async_trait]
impl TaskExecutor for NoopExecutor {
    async fn execute(&self, mut ctx: RunContext) -> anyhow::Result<()> {
        for task in &ctx.tasks {
            if !ctx.signals.checkpoint().await {
                debug!(
                    "Run of workflow {} stopped before task '{}'",
                    ctx.workflow_id, task.id
                );
                return Ok(());
            }
            debug!(
                "Workflow {} task '{}' ({}): noop",
                ctx.workflow_id, task.id, task.kind
            );
        }
        Ok(())
    }
}
