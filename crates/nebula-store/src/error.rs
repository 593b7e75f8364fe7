use std::fmt;

use nebula_core::ImportError;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    InvalidData(String),
    /// An import payload was rejected; nothing was written.
    Import(ImportError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "SQLite error: {e}"),
            StoreError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            StoreError::Import(e) => write!(f, "import rejected: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<ImportError> for StoreError {
    fn from(e: ImportError) -> Self {
        StoreError::Import(e)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
