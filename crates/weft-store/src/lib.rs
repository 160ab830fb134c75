//! Persistence layer for the Weft workflow engine.
//!
//! The engine records workflow runs as entries (live status) and history
//! entries (the permanent log), keeps aggregate status counters, and stores
//! operator accounts. The [`Store`] trait is the seam the engine and the
//! task executor talk through; [`SqliteStore`] is the shipped backend.

mod error;
mod sqlite;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use sqlite::SqliteStore;
pub use store::Store;
pub use types::{
    Entry, EntryOrder, EntryQuery, HistoryEntry, LaunchKind, Status, StatusCount, User,
};
