use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The file watcher could not be created.
    #[error("Failed to create file watcher: {0}")]
    WatcherInit(String),

    /// A path could not be put under watch.
    #[error("Failed to watch {path}: {error}")]
    WatchFailed { path: PathBuf, error: String },

    /// The persistence layer refused to initialize.
    #[error("Store initialization failed: {0}")]
    StoreInit(#[from] weft_store::StoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
