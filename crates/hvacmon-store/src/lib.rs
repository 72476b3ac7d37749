//! SQLite persistence for facility monitoring data.
//!
//! This crate stores the AC units under monitoring, their temperature
//! and humidity readings, threshold configs, the maintenance log and
//! dashboard accounts.
//!
//! # Features
//!
//! - Unit registry with cascading deletes for dependent rows
//! - Readings queryable by unit and time range, with pagination
//! - Threshold configs, global or scoped to a single unit
//! - Maintenance log with optional image attachments
//! - Accounts with bcrypt password hashes and roles
//! - CSV export of readings
//!
//! # Example
//!
//! ```no_run
//! use hvacmon_store::{Store, ReadingQuery};
//!
//! let store = Store::open_default()?;
//!
//! let query = ReadingQuery::new().unit(1).limit(10);
//! let readings = store.query_readings(&query)?;
//! # Ok::<(), hvacmon_store::Error>(())
//! ```

mod error;
mod export;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{NewMaintenance, NewReading, NewThreshold, NewUnit, NewUser, User, UserUpdate};
pub use queries::ReadingQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/hvacmon/data.db`
/// - macOS: `~/Library/Application Support/hvacmon/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\hvacmon\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("hvacmon")
        .join("data.db")
}
