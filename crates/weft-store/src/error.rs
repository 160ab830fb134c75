use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value in column {column}: {value}")]
    InvalidColumn { column: String, value: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
