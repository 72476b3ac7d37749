//! Error types for hvacmon-store.

use std::path::PathBuf;

/// Result type for hvacmon-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in hvacmon-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Unit not found in database.
    #[error("Unit not found: {0}")]
    UnitNotFound(i64),

    /// Reading not found in database.
    #[error("Reading not found: {0}")]
    ReadingNotFound(i64),

    /// Threshold config not found in database.
    #[error("Threshold config not found: {0}")]
    ThresholdNotFound(i64),

    /// Maintenance record not found in database.
    #[error("Maintenance record not found: {0}")]
    MaintenanceNotFound(i64),

    /// User not found in database.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Username already taken.
    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    /// Threshold bounds rejected at write time.
    #[error(transparent)]
    InvalidThresholds(#[from] hvacmon_types::InvalidThresholds),

    /// Password hashing failure.
    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    /// CSV export error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Timestamp formatting error.
    #[error("Time formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
