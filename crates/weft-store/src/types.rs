//! Record types for entries, history, counters, and users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final or current status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Running,
    Done,
    Failed,
    Warning,
    Disabled,
    Stopped,
}

impl Status {
    /// Stable text form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Done => "done",
            Status::Failed => "failed",
            Status::Warning => "warning",
            Status::Disabled => "disabled",
            Status::Stopped => "stopped",
        }
    }

    /// Parse the database text form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Status::Pending),
            "running" => Some(Status::Running),
            "done" => Some(Status::Done),
            "failed" => Some(Status::Failed),
            "warning" => Some(Status::Warning),
            "disabled" => Some(Status::Disabled),
            "stopped" => Some(Status::Stopped),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a workflow is launched. Recorded with each entry so history queries
/// can distinguish scheduled runs from operator-initiated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchKind {
    Startup,
    Periodic,
    Cron,
}

impl LaunchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchKind::Startup => "startup",
            LaunchKind::Periodic => "periodic",
            LaunchKind::Cron => "cron",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "startup" => Some(LaunchKind::Startup),
            "periodic" => Some(LaunchKind::Periodic),
            "cron" => Some(LaunchKind::Cron),
            _ => None,
        }
    }
}

impl std::fmt::Display for LaunchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live status record for a workflow, one per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub workflow_id: i32,
    pub name: String,
    pub launch_type: LaunchKind,
    pub status: Status,
    pub status_date: DateTime<Utc>,
}

/// Permanent log record for a finished run. Same shape as [`Entry`] but
/// kept in its own table so live entries can be cleared independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub workflow_id: i32,
    pub name: String,
    pub launch_type: LaunchKind,
    pub status: Status,
    pub status_date: DateTime<Utc>,
}

/// Aggregate run counters, one per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub pending: u64,
    pub running: u64,
    pub done: u64,
    pub failed: u64,
    pub warning: u64,
    pub disabled: u64,
    pub stopped: u64,
}

/// An operator account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub password: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            email: None,
            created_at: Utc::now(),
        }
    }
}

/// Sort order for entry and history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrder {
    StatusDateAsc,
    StatusDateDesc,
    NameAsc,
    NameDesc,
    WorkflowIdAsc,
    WorkflowIdDesc,
    StatusAsc,
    StatusDesc,
}

impl EntryOrder {
    /// The ORDER BY fragment for this order.
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            EntryOrder::StatusDateAsc => "status_date ASC",
            EntryOrder::StatusDateDesc => "status_date DESC",
            EntryOrder::NameAsc => "name ASC",
            EntryOrder::NameDesc => "name DESC",
            EntryOrder::WorkflowIdAsc => "workflow_id ASC",
            EntryOrder::WorkflowIdDesc => "workflow_id DESC",
            EntryOrder::StatusAsc => "status ASC",
            EntryOrder::StatusDesc => "status DESC",
        }
    }
}

impl Default for EntryOrder {
    fn default() -> Self {
        EntryOrder::StatusDateDesc
    }
}

/// Filter, window, and order for entry and history queries.
///
/// The default query matches everything, newest first, unpaged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryQuery {
    /// Case-insensitive substring match on the workflow name.
    pub keyword: Option<String>,
    /// Inclusive lower bound on `status_date`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `status_date`.
    pub to: Option<DateTime<Utc>>,
    /// 1-based page index. `None` disables paging.
    pub page: Option<u32>,
    /// Page size; only meaningful with `page`.
    pub page_size: u32,
    pub order: EntryOrder,
}

impl EntryQuery {
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = page_size;
        self
    }

    pub fn order(mut self, order: EntryOrder) -> Self {
        self.order = order;
        self
    }
}
