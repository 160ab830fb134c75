//! SQLite backend.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::Store;
use crate::types::{Entry, EntryQuery, HistoryEntry, LaunchKind, Status, StatusCount, User};

/// SQLite-backed [`Store`].
///
/// Thread-safe via an internal `Mutex<Connection>`. The schema is
/// bootstrapped on `init` with `CREATE TABLE IF NOT EXISTS`, so opening an
/// existing database is a no-op.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        info!("Opened store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Shared SELECT for the entries and history_entries tables.
    fn select_entries(&self, table: &str, query: &EntryQuery) -> Result<Vec<Entry>> {
        let (where_sql, params) = build_filter(query);
        let mut sql = format!(
            "SELECT id, workflow_id, name, launch_type, status, status_date FROM {}{} ORDER BY {}",
            table,
            where_sql,
            query.order.sql()
        );
        if let Some(page) = query.page {
            let offset = (page.saturating_sub(1) as u64) * query.page_size as u64;
            sql.push_str(&format!(" LIMIT {} OFFSET {}", query.page_size, offset));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let iter = stmt.query_map(refs.as_slice(), row_to_entry)?;

        let mut rows = Vec::new();
        for r in iter {
            rows.push(r?);
        }
        Ok(rows)
    }

    fn count_entries(&self, table: &str, query: &EntryQuery) -> Result<u64> {
        let (where_sql, params) = build_filter(query);
        let sql = format!("SELECT COUNT(*) FROM {}{}", table, where_sql);
        let conn = self.conn();
        let refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let count: i64 = conn.query_row(&sql, refs.as_slice(), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn status_date_bound(&self, table: &str, agg: &str) -> Result<Option<DateTime<Utc>>> {
        let sql = format!("SELECT {}(status_date) FROM {}", agg, table);
        let value: Option<String> = self.conn().query_row(&sql, [], |row| row.get(0))?;
        match value {
            Some(s) => Ok(Some(parse_dt(0, &s)?)),
            None => Ok(None),
        }
    }

    fn insert_run_record(
        &self,
        table: &str,
        workflow_id: i32,
        name: &str,
        launch_type: LaunchKind,
        status: Status,
        status_date: DateTime<Utc>,
    ) -> Result<i64> {
        let sql = format!(
            "INSERT INTO {} (workflow_id, name, launch_type, status, status_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            table
        );
        let conn = self.conn();
        conn.execute(
            &sql,
            params![
                workflow_id,
                name,
                launch_type.as_str(),
                status.as_str(),
                fmt_dt(status_date)
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

impl Store for SqliteStore {
    fn init(&self) -> Result<()> {
        self.conn().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                launch_type TEXT NOT NULL,
                status TEXT NOT NULL,
                status_date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_entries_status_date ON entries(status_date);

            CREATE TABLE IF NOT EXISTS history_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                launch_type TEXT NOT NULL,
                status TEXT NOT NULL,
                status_date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_status_date ON history_entries(status_date);

            CREATE TABLE IF NOT EXISTS status_count (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                pending INTEGER NOT NULL DEFAULT 0,
                running INTEGER NOT NULL DEFAULT 0,
                done INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                warning INTEGER NOT NULL DEFAULT 0,
                disabled INTEGER NOT NULL DEFAULT 0,
                stopped INTEGER NOT NULL DEFAULT 0
            );
            INSERT OR IGNORE INTO status_count (id) VALUES (1);

            CREATE TABLE IF NOT EXISTS users (
                name TEXT PRIMARY KEY,
                password TEXT NOT NULL,
                email TEXT,
                created_at TEXT NOT NULL
            );
            ",
        )?;
        debug!("Store schema ready");
        Ok(())
    }

    fn status_count(&self) -> Result<StatusCount> {
        let count = self.conn().query_row(
            "SELECT pending, running, done, failed, warning, disabled, stopped
             FROM status_count WHERE id = 1",
            [],
            |row| {
                Ok(StatusCount {
                    pending: row.get::<_, i64>(0)? as u64,
                    running: row.get::<_, i64>(1)? as u64,
                    done: row.get::<_, i64>(2)? as u64,
                    failed: row.get::<_, i64>(3)? as u64,
                    warning: row.get::<_, i64>(4)? as u64,
                    disabled: row.get::<_, i64>(5)? as u64,
                    stopped: row.get::<_, i64>(6)? as u64,
                })
            },
        )?;
        Ok(count)
    }

    fn increment_status(&self, status: Status) -> Result<()> {
        // Column names are fixed by the Status enum, never user input.
        let sql = format!(
            "UPDATE status_count SET {col} = {col} + 1 WHERE id = 1",
            col = status.as_str()
        );
        self.conn().execute(&sql, [])?;
        Ok(())
    }

    fn clear_status_count(&self) -> Result<()> {
        self.conn().execute(
            "UPDATE status_count
             SET pending = 0, running = 0, done = 0, failed = 0,
                 warning = 0, disabled = 0, stopped = 0
             WHERE id = 1",
            [],
        )?;
        Ok(())
    }

    fn insert_entry(&self, entry: &Entry) -> Result<i64> {
        self.insert_run_record(
            "entries",
            entry.workflow_id,
            &entry.name,
            entry.launch_type,
            entry.status,
            entry.status_date,
        )
    }

    fn entries(&self, query: &EntryQuery) -> Result<Vec<Entry>> {
        self.select_entries("entries", query)
    }

    fn entries_count(&self, query: &EntryQuery) -> Result<u64> {
        self.count_entries("entries", query)
    }

    fn clear_entries(&self) -> Result<()> {
        self.conn().execute("DELETE FROM entries", [])?;
        Ok(())
    }

    fn entry_status_date_min(&self) -> Result<Option<DateTime<Utc>>> {
        self.status_date_bound("entries", "MIN")
    }

    fn entry_status_date_max(&self) -> Result<Option<DateTime<Utc>>> {
        self.status_date_bound("entries", "MAX")
    }

    fn insert_history_entry(&self, entry: &HistoryEntry) -> Result<i64> {
        self.insert_run_record(
            "history_entries",
            entry.workflow_id,
            &entry.name,
            entry.launch_type,
            entry.status,
            entry.status_date,
        )
    }

    fn history_entries(&self, query: &EntryQuery) -> Result<Vec<HistoryEntry>> {
        let rows = self.select_entries("history_entries", query)?;
        Ok(rows
            .into_iter()
            .map(|e| HistoryEntry {
                id: e.id,
                workflow_id: e.workflow_id,
                name: e.name,
                launch_type: e.launch_type,
                status: e.status,
                status_date: e.status_date,
            })
            .collect())
    }

    fn history_entries_count(&self, query: &EntryQuery) -> Result<u64> {
        self.count_entries("history_entries", query)
    }

    fn history_entry_status_date_min(&self) -> Result<Option<DateTime<Utc>>> {
        self.status_date_bound("history_entries", "MIN")
    }

    fn history_entry_status_date_max(&self) -> Result<Option<DateTime<Utc>>> {
        self.status_date_bound("history_entries", "MAX")
    }

    fn insert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO users (name, password, email, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user.name,
                user.password,
                user.email,
                fmt_dt(user.created_at)
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, name: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                "SELECT name, password, email, created_at FROM users WHERE name = ?1",
                params![name],
                |row| {
                    Ok(User {
                        name: row.get(0)?,
                        password: row.get(1)?,
                        email: row.get(2)?,
                        created_at: parse_dt(3, &row.get::<_, String>(3)?)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn get_password(&self, name: &str) -> Result<Option<String>> {
        let password = self
            .conn()
            .query_row(
                "SELECT password FROM users WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(password)
    }
}

/// Build the WHERE clause and parameter list for an [`EntryQuery`].
fn build_filter(query: &EntryQuery) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(keyword) = &query.keyword {
        params.push(Box::new(format!("%{}%", keyword.to_lowercase())));
        clauses.push(format!("LOWER(name) LIKE ?{}", params.len()));
    }
    if let Some(from) = query.from {
        params.push(Box::new(fmt_dt(from)));
        clauses.push(format!("status_date >= ?{}", params.len()));
    }
    if let Some(to) = query.to {
        params.push(Box::new(fmt_dt(to)));
        clauses.push(format!("status_date <= ?{}", params.len()));
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// Fixed-width RFC 3339 so lexicographic and chronological order agree.
fn fmt_dt(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_dt(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    let launch_raw: String = row.get(3)?;
    let status_raw: String = row.get(4)?;
    Ok(Entry {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        name: row.get(2)?,
        launch_type: LaunchKind::parse(&launch_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(BadColumn(launch_raw)))
        })?,
        status: Status::parse(&status_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(BadColumn(status_raw)))
        })?,
        status_date: parse_dt(5, &row.get::<_, String>(5)?)?,
    })
}

/// Column held a value outside the expected enum.
#[derive(Debug)]
struct BadColumn(String);

impl std::fmt::Display for BadColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unexpected value: {}", self.0)
    }
}

impl std::error::Error for BadColumn {}
