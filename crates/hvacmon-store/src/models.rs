//! Input models for writes and the stored user account.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use hvacmon_types::{Attachment, Role, ThresholdScope};

time::serde::format_description!(date_ymd, Date, "[year]-[month]-[day]");

/// Fields for creating or replacing a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUnit {
    pub name: String,
    pub location: String,
    #[serde(with = "date_ymd")]
    pub installed_on: Date,
}

/// Fields for inserting a reading.
///
/// When `recorded_at` is omitted the insert time is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReading {
    pub unit_id: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub recorded_at: Option<OffsetDateTime>,
    pub temperature: f64,
    pub humidity: f64,
}

/// Fields for creating or replacing a threshold config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewThreshold {
    pub name: String,
    #[serde(default = "default_scope")]
    pub scope: ThresholdScope,
    pub temp_min: f64,
    pub temp_max: f64,
    pub hum_min: f64,
    pub hum_max: f64,
    #[serde(default = "default_true")]
    pub notify_enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_scope() -> ThresholdScope {
    ThresholdScope::Global
}

/// Fields for recording a maintenance intervention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMaintenance {
    pub unit_id: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub performed_at: Option<OffsetDateTime>,
    pub kind: String,
    pub description: String,
    pub technician: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

/// A dashboard account stored in the database.
///
/// The password hash never leaves the store in serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub full_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields for creating an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Partial update of an account. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub full_name: Option<String>,
}
