//! The runtime workflow handle and its lifecycle state machine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use weft_store::Store;

use crate::definition::{LaunchType, WorkflowDefinition};
use crate::executor::{RunContext, RunSignals, TaskExecutor};

/// Lifecycle state of a workflow.
///
/// ```text
///       start                 suspend            resume
///  Idle ─────► Running ◄────────────────────► Suspended
///   ▲             │ stop                         │ stop
///   └─────────────┴─────────────────────────────┘
/// ```
///
/// Task completion also returns the workflow to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStatus {
    #[default]
    Idle,
    Running,
    Suspended,
}

/// A loaded workflow.
///
/// Cheap to clone; all clones share one state machine. The engine keeps
/// one handle in its registry and the scheduler's job action keeps
/// another.
#[derive(Clone)]
pub struct Workflow {
    inner: Arc<Inner>,
}

struct Inner {
    definition: WorkflowDefinition,
    file_path: PathBuf,
    temp_dir: PathBuf,
    store: Arc<dyn Store>,
    executor: Arc<dyn TaskExecutor>,
    run: Mutex<RunState>,
}

#[derive(Default)]
struct RunState {
    status: ExecutionStatus,
    /// Bumped on every start and stop so a finishing run can tell whether
    /// it is still the current one.
    epoch: u64,
    cancel: Option<CancellationToken>,
    pause: Option<watch::Sender<bool>>,
}

impl Workflow {
    /// Wrap a validated definition in a runtime handle.
    pub fn new(
        definition: WorkflowDefinition,
        file_path: PathBuf,
        temp_dir: PathBuf,
        store: Arc<dyn Store>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                definition,
                file_path,
                temp_dir,
                store,
                executor,
                run: Mutex::new(RunState::default()),
            }),
        }
    }

    pub fn id(&self) -> i32 {
        self.inner.definition.id
    }

    pub fn name(&self) -> &str {
        &self.inner.definition.name
    }

    pub fn enabled(&self) -> bool {
        self.inner.definition.enabled
    }

    pub fn launch_type(&self) -> &LaunchType {
        &self.inner.definition.launch
    }

    /// The definition file this workflow was loaded from; the join key
    /// against watcher events.
    pub fn file_path(&self) -> &Path {
        &self.inner.file_path
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.inner.definition
    }

    pub fn status(&self) -> ExecutionStatus {
        self.inner.run.lock().status
    }

    /// Whether a run is in flight (running or suspended).
    pub fn is_running(&self) -> bool {
        self.status() != ExecutionStatus::Idle
    }

    /// Launch a run on a workflow-owned tokio task and return immediately.
    ///
    /// No-op (returning `false`) when the workflow is disabled or a run is
    /// already in flight. Executor failures are logged, never propagated.
    pub fn start(&self) -> bool {
        if !self.enabled() {
            debug!("Workflow {} ({}) is disabled; not starting", self.id(), self.name());
            return false;
        }

        let epoch;
        let signals;
        {
            let mut run = self.inner.run.lock();
            if run.status != ExecutionStatus::Idle {
                debug!("Workflow {} ({}) is already running", self.id(), self.name());
                return false;
            }
            let cancel = CancellationToken::new();
            let (pause_tx, pause_rx) = watch::channel(false);
            run.status = ExecutionStatus::Running;
            run.epoch += 1;
            epoch = run.epoch;
            run.cancel = Some(cancel.clone());
            run.pause = Some(pause_tx);
            signals = RunSignals::new(cancel, pause_rx);
        }

        info!("Workflow started: {} ({})", self.name(), self.id());

        let workflow = self.clone();
        tokio::spawn(async move {
            let ctx = RunContext {
                workflow_id: workflow.id(),
                workflow_name: workflow.name().to_string(),
                launch_kind: workflow.launch_type().kind(),
                tasks: workflow.inner.definition.tasks.clone(),
                temp_dir: workflow.inner.temp_dir.clone(),
                store: workflow.inner.store.clone(),
                signals,
            };
            match workflow.inner.executor.execute(ctx).await {
                Ok(()) => info!("Workflow finished: {} ({})", workflow.name(), workflow.id()),
                Err(e) => error!(
                    "Workflow {} ({}) run failed: {:#}",
                    workflow.name(),
                    workflow.id(),
                    e
                ),
            }
            workflow.finish(epoch);
        });

        true
    }

    /// Stop the in-flight run, if any. Best-effort: cancels the run token
    /// and returns promptly without waiting for the task to drain.
    pub fn stop(&self) -> bool {
        if !self.enabled() {
            return false;
        }
        let mut run = self.inner.run.lock();
        if run.status == ExecutionStatus::Idle {
            return false;
        }
        if let Some(cancel) = run.cancel.take() {
            cancel.cancel();
        }
        // Release a parked checkpoint so it can observe the cancellation.
        if let Some(pause) = run.pause.take() {
            let _ = pause.send(false);
        }
        run.status = ExecutionStatus::Idle;
        run.epoch += 1;
        info!("Workflow stopped: {} ({})", self.name(), self.id());
        true
    }

    /// Running → Suspended. The executor parks at its next checkpoint.
    pub fn suspend(&self) -> bool {
        if !self.enabled() {
            return false;
        }
        let mut run = self.inner.run.lock();
        if run.status != ExecutionStatus::Running {
            return false;
        }
        if let Some(pause) = &run.pause {
            let _ = pause.send(true);
        }
        run.status = ExecutionStatus::Suspended;
        info!("Workflow suspended: {} ({})", self.name(), self.id());
        true
    }

    /// Suspended → Running.
    pub fn resume(&self) -> bool {
        if !self.enabled() {
            return false;
        }
        let mut run = self.inner.run.lock();
        if run.status != ExecutionStatus::Suspended {
            return false;
        }
        if let Some(pause) = &run.pause {
            let _ = pause.send(false);
        }
        run.status = ExecutionStatus::Running;
        info!("Workflow resumed: {} ({})", self.name(), self.id());
        true
    }

    /// Called by the run task when the executor returns. Only clears state
    /// if this run is still the current one (a stop/start pair may have
    /// superseded it).
    fn finish(&self, epoch: u64) {
        let mut run = self.inner.run.lock();
        if run.epoch == epoch {
            run.status = ExecutionStatus::Idle;
            run.cancel = None;
            run.pause = None;
        }
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("enabled", &self.enabled())
            .field("file_path", &self.file_path())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
