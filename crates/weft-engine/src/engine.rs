//! The engine façade: boot, reconciliation, lifecycle control, shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use weft_config::Settings;
use weft_scheduler::{FiringPolicy, JobSpec, Scheduler};
use weft_store::{Entry, EntryQuery, HistoryEntry, StatusCount, Store, User};
use weft_workflow::{LaunchType, LoaderConfig, TaskExecutor, Workflow, WorkflowLoader};

use crate::error::Result;
use crate::registry::Registry;
use crate::watcher::{is_definition_file, DirEvent, DirWatcher, WatcherHandle};

/// Scheduler job identity for a workflow id.
pub fn job_id_for(workflow_id: i32) -> String {
    format!("Workflow Job {}", workflow_id)
}

/// Scheduler trigger identity for a workflow id.
pub fn trigger_id_for(workflow_id: i32) -> String {
    format!("Workflow Trigger {}", workflow_id)
}

/// Registry, scheduler, and loader: everything the reconciler touches.
///
/// The registry mutex is the engine's single critical section: every
/// scheduler mutation happens while it is held, which is what keeps the
/// set of installed jobs consistent with the registry. The event rate is
/// human-scale, so one coarse lock beats two subtle ones.
struct Core {
    registry: Mutex<Registry>,
    scheduler: Arc<dyn Scheduler>,
    loader: WorkflowLoader,
}

impl Core {
    /// Apply one watcher event to the registry and the scheduler.
    fn apply_event(&self, event: DirEvent) {
        match event {
            DirEvent::Created(path) => self.on_created(&path),
            DirEvent::Changed(path) => self.on_changed(&path),
            DirEvent::Deleted(path) => self.on_deleted(&path),
        }
    }

    fn on_created(&self, path: &Path) {
        // Load outside the lock: nothing observable exists yet, and
        // parsing is blocking filesystem work.
        let workflow = match self.loader.load(path) {
            Ok(w) => w,
            Err(e) => {
                error!("Failed to load workflow {}: {}", path.display(), e);
                return;
            }
        };

        let mut registry = self.registry.lock();
        self.admit(&mut registry, workflow, path);
    }

    fn on_deleted(&self, path: &Path) {
        let mut registry = self.registry.lock();
        let Some(workflow) = registry.remove_by_path(path) else {
            // The file may never have loaded successfully.
            debug!("No workflow registered for deleted file {}", path.display());
            return;
        };

        workflow.stop();
        self.scheduler.unschedule(&job_id_for(workflow.id()));
        info!(
            "Workflow removed: {} ({}) after {} was deleted",
            workflow.name(),
            workflow.id(),
            path.display()
        );
    }

    /// A change is a remove followed by a fresh load. The whole sequence
    /// holds the lock so a control operation issued after the event
    /// observes the reloaded workflow, never the half-replaced state.
    fn on_changed(&self, path: &Path) {
        let mut registry = self.registry.lock();

        if let Some(old) = registry.remove_by_path(path) {
            old.stop();
            self.scheduler.unschedule(&job_id_for(old.id()));
            info!(
                "Reloading workflow {} ({}) from {}",
                old.name(),
                old.id(),
                path.display()
            );
        }

        let workflow = match self.loader.load(path) {
            Ok(w) => w,
            Err(e) => {
                // Gone until the next change or a manual re-save.
                error!("Failed to reload workflow {}: {}", path.display(), e);
                return;
            }
        };

        self.admit(&mut registry, workflow, path);
    }

    /// Insert and schedule a freshly loaded workflow. On an id or path
    /// collision the new arrival loses and is dropped.
    fn admit(&self, registry: &mut Registry, workflow: Workflow, path: &Path) {
        if let Err(conflict) = registry.insert(workflow.clone()) {
            error!("Discarding workflow from {}: {}", path.display(), conflict);
            return;
        }
        info!(
            "Workflow registered: {} ({}) from {}",
            workflow.name(),
            workflow.id(),
            path.display()
        );
        self.schedule_workflow(&workflow);
    }

    /// Bind one workflow to its launch policy. Must be called with the
    /// registry lock held.
    fn schedule_workflow(&self, workflow: &Workflow) {
        if !workflow.enabled() {
            debug!(
                "Workflow {} ({}) is disabled; not scheduling",
                workflow.id(),
                workflow.name()
            );
            return;
        }

        match workflow.launch_type() {
            LaunchType::Startup => {
                workflow.start();
            }
            LaunchType::Periodic { every } => {
                self.install_job(workflow, FiringPolicy::Every(*every));
            }
            LaunchType::Cron { expression } => {
                self.install_job(workflow, FiringPolicy::Cron(expression.clone()));
            }
        }
    }

    fn install_job(&self, workflow: &Workflow, policy: FiringPolicy) {
        let handle = workflow.clone();
        let spec = JobSpec {
            job_id: job_id_for(workflow.id()),
            trigger_id: trigger_id_for(workflow.id()),
            policy,
            action: Arc::new(move || {
                handle.start();
                Ok(())
            }),
        };
        if let Err(e) = self.scheduler.schedule(spec) {
            error!(
                "Failed to schedule workflow {} ({}): {}",
                workflow.id(),
                workflow.name(),
                e
            );
        }
    }
}

/// The workflow engine.
///
/// Boot loads every definition file into the registry; [`Engine::run`]
/// binds the enabled workflows to their triggers, starts the scheduler,
/// and begins reconciling filesystem events. Collaborators (scheduler,
/// store, executor) are constructor dependencies so tests can substitute
/// fakes.
pub struct Engine {
    settings: Settings,
    store: Arc<dyn Store>,
    core: Arc<Core>,
    watcher: Mutex<Option<WatcherHandle>>,
}

impl Engine {
    /// Build an engine: initialize the store and load every workflow
    /// definition from the workflows folder.
    ///
    /// Load failures and id collisions are logged and skipped; one bad
    /// definition never prevents boot.
    pub fn new(
        settings: Settings,
        scheduler: Arc<dyn Scheduler>,
        store: Arc<dyn Store>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<Self> {
        store.init()?;

        let loader = WorkflowLoader::new(
            LoaderConfig {
                temp_dir: settings.temp_dir(),
                schema_path: PathBuf::from(&settings.xsd),
                tasks_names_file: PathBuf::from(&settings.tasks_names_file),
                tasks_settings_file: PathBuf::from(&settings.tasks_settings_file),
            },
            store.clone(),
            executor,
        );

        let engine = Self {
            settings,
            store,
            core: Arc::new(Core {
                registry: Mutex::new(Registry::new()),
                scheduler,
                loader,
            }),
            watcher: Mutex::new(None),
        };
        engine.load_workflows();
        Ok(engine)
    }

    fn load_workflows(&self) {
        let dir = self.settings.workflows_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read workflows folder {}: {}", dir.display(), e);
                return;
            }
        };

        let mut registry = self.core.registry.lock();
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_definition_file(&path) {
                continue;
            }
            match self.core.loader.load(&path) {
                Ok(workflow) => {
                    if let Err(conflict) = registry.insert(workflow) {
                        error!("Skipping {}: {}", path.display(), conflict);
                    }
                }
                Err(e) => error!("Failed to load workflow {}: {}", path.display(), e),
            }
        }
        info!("Loaded {} workflows from {}", registry.len(), dir.display());
    }

    /// Schedule every enabled workflow, start the scheduler, and begin
    /// watching the workflows folder. Idempotent.
    pub fn run(&self) -> Result<()> {
        {
            let registry = self.core.registry.lock();
            for workflow in registry.workflows() {
                self.core.schedule_workflow(&workflow);
            }
            self.core.scheduler.start();
        }

        let mut watcher_slot = self.watcher.lock();
        if watcher_slot.is_none() {
            let watcher = DirWatcher::new(self.settings.workflows_dir());
            let (mut events, handle) = watcher.watch()?;
            *watcher_slot = Some(handle);

            // Single consumer: watcher events are serialized here instead
            // of racing over the registry from notify callbacks.
            let core = self.core.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    core.apply_event(event);
                }
                debug!("Reconciler task exiting");
            });

            info!("Engine running");
        }
        Ok(())
    }

    /// Shut the engine down.
    ///
    /// The scheduler is stopped first (when requested) so no firing races
    /// the per-workflow stops that follow. `clear_state` additionally
    /// purges status counters and live entries.
    pub fn stop(&self, stop_scheduler: bool, clear_state: bool) {
        {
            let registry = self.core.registry.lock();
            if stop_scheduler {
                self.core.scheduler.shutdown();
            }
            for workflow in registry.workflows() {
                if workflow.is_running() {
                    workflow.stop();
                }
            }
        }

        if clear_state {
            if let Err(e) = self.store.clear_status_count() {
                error!("Failed to clear status counters: {}", e);
            }
            if let Err(e) = self.store.clear_entries() {
                error!("Failed to clear entries: {}", e);
            }
        }
        info!("Engine stopped");
    }

    /// Feed one filesystem event through the reconciler.
    ///
    /// `run` wires the directory watcher to this; tests and embedders can
    /// call it directly with synthetic events.
    pub fn apply_event(&self, event: DirEvent) {
        self.core.apply_event(event);
    }

    // ── Lifecycle control ───────────────────────────────────────────

    /// Shared prologue for the per-workflow control operations: look the
    /// workflow up, skip disabled ones, then run `op` on it.
    fn with_workflow(&self, id: i32, op_name: &str, op: impl FnOnce(&Workflow) -> bool) {
        let registry = self.core.registry.lock();
        let Some(workflow) = registry.get(id) else {
            error!("Cannot {} workflow {}: not in registry", op_name, id);
            return;
        };
        if !workflow.enabled() {
            debug!("Workflow {} is disabled; ignoring {}", id, op_name);
            return;
        }
        op(workflow);
    }

    /// Look up a workflow by id.
    pub fn get_workflow(&self, id: i32) -> Option<Workflow> {
        let registry = self.core.registry.lock();
        let workflow = registry.get(id).cloned();
        if workflow.is_none() {
            error!("Workflow {} not in registry", id);
        }
        workflow
    }

    /// Snapshot of every registered workflow.
    pub fn workflows(&self) -> Vec<Workflow> {
        self.core.registry.lock().workflows()
    }

    pub fn start_workflow(&self, id: i32) {
        self.with_workflow(id, "start", |w| w.start());
    }

    pub fn stop_workflow(&self, id: i32) {
        self.with_workflow(id, "stop", |w| w.stop());
    }

    pub fn suspend_workflow(&self, id: i32) {
        self.with_workflow(id, "suspend", |w| w.suspend());
    }

    pub fn resume_workflow(&self, id: i32) {
        self.with_workflow(id, "resume", |w| w.resume());
    }

    // ── Query pass-through ──────────────────────────────────────────
    // Thin delegation to the persistence collaborator.

    pub fn status_count(&self) -> weft_store::Result<StatusCount> {
        self.store.status_count()
    }

    pub fn entries(&self, query: &EntryQuery) -> weft_store::Result<Vec<Entry>> {
        self.store.entries(query)
    }

    pub fn entries_count(&self, query: &EntryQuery) -> weft_store::Result<u64> {
        self.store.entries_count(query)
    }

    pub fn entry_status_date_min(&self) -> weft_store::Result<Option<DateTime<Utc>>> {
        self.store.entry_status_date_min()
    }

    pub fn entry_status_date_max(&self) -> weft_store::Result<Option<DateTime<Utc>>> {
        self.store.entry_status_date_max()
    }

    pub fn history_entries(&self, query: &EntryQuery) -> weft_store::Result<Vec<HistoryEntry>> {
        self.store.history_entries(query)
    }

    pub fn history_entries_count(&self, query: &EntryQuery) -> weft_store::Result<u64> {
        self.store.history_entries_count(query)
    }

    pub fn history_entry_status_date_min(&self) -> weft_store::Result<Option<DateTime<Utc>>> {
        self.store.history_entry_status_date_min()
    }

    pub fn history_entry_status_date_max(&self) -> weft_store::Result<Option<DateTime<Utc>>> {
        self.store.history_entry_status_date_max()
    }

    pub fn insert_user(&self, user: &User) -> weft_store::Result<()> {
        self.store.insert_user(user)
    }

    pub fn get_user(&self, name: &str) -> weft_store::Result<Option<User>> {
        self.store.get_user(name)
    }

    pub fn get_password(&self, name: &str) -> weft_store::Result<Option<String>> {
        self.store.get_password(name)
    }
}
