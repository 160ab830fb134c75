//! The persistence seam between the engine, the task executor, and a
//! concrete backend.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Entry, EntryQuery, HistoryEntry, Status, StatusCount, User};

/// Storage operations the orchestration engine and the task executor rely
/// on. Implementations must be thread-safe; the engine calls from the
/// reconciler task, scheduler firings, and operator threads.
///
/// The engine itself only calls `init`, the two `clear_*` operations, and
/// the query surface. The insert and increment operations exist for the
/// task-executor collaborator, which records run lifecycles.
pub trait Store: Send + Sync {
    /// Prepare the backend (create the schema, open files, ...). Called
    /// once at engine boot, before any other operation.
    fn init(&self) -> Result<()>;

    // ── Status counters ─────────────────────────────────────────────

    /// Current aggregate counters.
    fn status_count(&self) -> Result<StatusCount>;

    /// Add one to the counter for `status`.
    fn increment_status(&self, status: Status) -> Result<()>;

    /// Reset every counter to zero.
    fn clear_status_count(&self) -> Result<()>;

    // ── Entries ─────────────────────────────────────────────────────

    /// Record a new live entry, returning its row id.
    fn insert_entry(&self, entry: &Entry) -> Result<i64>;

    /// Live entries matching `query`.
    fn entries(&self, query: &EntryQuery) -> Result<Vec<Entry>>;

    /// Number of live entries matching `query`, ignoring paging.
    fn entries_count(&self, query: &EntryQuery) -> Result<u64>;

    /// Remove all live entries.
    fn clear_entries(&self) -> Result<()>;

    /// Earliest `status_date` among live entries.
    fn entry_status_date_min(&self) -> Result<Option<DateTime<Utc>>>;

    /// Latest `status_date` among live entries.
    fn entry_status_date_max(&self) -> Result<Option<DateTime<Utc>>>;

    // ── History ─────────────────────────────────────────────────────

    /// Record a finished run in the permanent log.
    fn insert_history_entry(&self, entry: &HistoryEntry) -> Result<i64>;

    /// History entries matching `query`.
    fn history_entries(&self, query: &EntryQuery) -> Result<Vec<HistoryEntry>>;

    /// Number of history entries matching `query`, ignoring paging.
    fn history_entries_count(&self, query: &EntryQuery) -> Result<u64>;

    /// Earliest `status_date` in the history log.
    fn history_entry_status_date_min(&self) -> Result<Option<DateTime<Utc>>>;

    /// Latest `status_date` in the history log.
    fn history_entry_status_date_max(&self) -> Result<Option<DateTime<Utc>>>;

    // ── Users ───────────────────────────────────────────────────────

    /// Create or replace an operator account.
    fn insert_user(&self, user: &User) -> Result<()>;

    /// Look up an account by name.
    fn get_user(&self, name: &str) -> Result<Option<User>>;

    /// Look up just the stored password for `name`.
    fn get_password(&self, name: &str) -> Result<Option<String>>;
}
