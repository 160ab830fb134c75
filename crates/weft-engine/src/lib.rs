//! Orchestration core of the Weft workflow engine.
//!
//! Three concurrent subsystems meet over one shared registry:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Engine                                                  │
//! │                                                          │
//! │  DirWatcher ──events──► reconciler task ─┐               │
//! │  Scheduler firings ──────────────────────┼─► registry +  │
//! │  operator control ops ───────────────────┘   scheduler   │
//! │                                              (one lock)  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Definition files are the source of truth: a created file loads and
//! schedules a workflow, a changed file tears the old one down and loads
//! it fresh, a deleted file removes it. Workflow ids and file paths stay
//! unique in the registry, and a registered workflow has at most one
//! scheduler job, identified by `"Workflow Job <id>"`.
//!
//! # Boot
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use weft_config::Settings;
//! use weft_engine::Engine;
//! use weft_scheduler::TokioScheduler;
//! use weft_store::SqliteStore;
//! use weft_workflow::NoopExecutor;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load(Path::new("/etc/weft/weft.toml"));
//! let store = Arc::new(SqliteStore::open(Path::new(&settings.connection_string))?);
//! let engine = Engine::new(
//!     settings,
//!     Arc::new(TokioScheduler::new()),
//!     store,
//!     Arc::new(NoopExecutor),
//! )?;
//! engine.run()?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod registry;
mod watcher;

pub use engine::{job_id_for, trigger_id_for, Engine};
pub use error::{EngineError, Result};
pub use registry::{Registry, RegistryConflict};
pub use watcher::{DirEvent, DirWatcher, WatcherConfig, WatcherHandle, DEFAULT_DEBOUNCE_MS};
