//! Core data types for units, readings, thresholds, and maintenance.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::error::InvalidThresholds;

time::serde::format_description!(date_ymd, Date, "[year]-[month]-[day]");

/// A monitored air-conditioning unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Database row ID.
    pub id: i64,
    /// Display name, e.g. "AC-3 North Wing".
    pub name: String,
    /// Free-form location label used for location rollups.
    pub location: String,
    /// Installation date.
    #[serde(with = "date_ymd")]
    pub installed_on: Date,
}

/// One timestamped temperature/humidity observation for a unit.
///
/// Readings are immutable once recorded; the only mutation is deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Database row ID.
    pub id: i64,
    /// Owning unit.
    pub unit_id: i64,
    /// When the observation was taken.
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity percentage.
    pub humidity: f64,
}

/// Which units a threshold configuration applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "unit_id", rename_all = "snake_case")]
pub enum ThresholdScope {
    /// Applies to every unit.
    Global,
    /// Applies to a single unit.
    Unit(i64),
}

impl ThresholdScope {
    /// The unit this scope is bound to, if any.
    pub fn unit_id(&self) -> Option<i64> {
        match self {
            ThresholdScope::Global => None,
            ThresholdScope::Unit(id) => Some(*id),
        }
    }

    /// Whether this config applies to readings from `unit_id`.
    pub fn applies_to(&self, unit_id: i64) -> bool {
        match self {
            ThresholdScope::Global => true,
            ThresholdScope::Unit(id) => *id == unit_id,
        }
    }
}

/// A named min/max band for temperature and humidity.
///
/// Scope and unit binding are fixed at creation; updates may only change
/// the name, the bounds, and the notify flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Database row ID.
    pub id: i64,
    /// Descriptive name shown in alerts.
    pub name: String,
    /// Global or bound to one unit.
    pub scope: ThresholdScope,
    /// Lowest acceptable temperature (Celsius).
    pub temp_min: f64,
    /// Highest acceptable temperature (Celsius).
    pub temp_max: f64,
    /// Lowest acceptable humidity (percent).
    pub hum_min: f64,
    /// Highest acceptable humidity (percent).
    pub hum_max: f64,
    /// Whether violations of this config produce alerts.
    pub notify_enabled: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
}

impl ThresholdConfig {
    /// Validate a set of bounds without constructing a config.
    ///
    /// Both bands must be non-empty: `temp_min < temp_max` and
    /// `hum_min < hum_max`.
    pub fn validate_bounds(
        temp_min: f64,
        temp_max: f64,
        hum_min: f64,
        hum_max: f64,
    ) -> Result<(), InvalidThresholds> {
        if temp_min >= temp_max {
            return Err(InvalidThresholds::Temperature {
                min: temp_min,
                max: temp_max,
            });
        }
        if hum_min >= hum_max {
            return Err(InvalidThresholds::Humidity {
                min: hum_min,
                max: hum_max,
            });
        }
        Ok(())
    }
}

/// A file attached to a maintenance record, stored inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name.
    pub filename: String,
    /// MIME type, e.g. "image/jpeg".
    pub content_type: String,
    /// Raw file bytes.
    #[serde(skip_serializing)]
    #[serde(default)]
    pub data: Vec<u8>,
}

/// A maintenance event performed on a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    /// Database row ID.
    pub id: i64,
    /// Unit the maintenance was performed on.
    pub unit_id: i64,
    /// When the maintenance was performed.
    #[serde(with = "time::serde::rfc3339")]
    pub performed_at: OffsetDateTime,
    /// Kind of maintenance, e.g. "Preventive" or "Filter replacement".
    pub kind: String,
    /// Detailed description.
    pub description: String,
    /// Technician who performed the work.
    pub technician: String,
    /// Optional photo or report attached to the record.
    pub attachment: Option<Attachment>,
}

/// User role, ordered by capability.
///
/// `Operator < Supervisor < Admin`; route access checks compare roles
/// with `>=`, so an Admin passes every gate a Supervisor does.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Records readings and views dashboards.
    Operator,
    /// Manages units, thresholds, and maintenance.
    Supervisor,
    /// Manages users; full access.
    Admin,
}

impl Role {
    /// Parse a role from its storage form.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "operator" => Some(Role::Operator),
            "supervisor" => Some(Role::Supervisor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Storage form of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Operator => "operator",
            Role::Supervisor => "supervisor",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_validate_bounds_accepts_proper_bands() {
        assert!(ThresholdConfig::validate_bounds(18.0, 24.0, 30.0, 70.0).is_ok());
    }

    #[test]
    fn test_validate_bounds_rejects_inverted_temperature() {
        let err = ThresholdConfig::validate_bounds(24.0, 18.0, 30.0, 70.0).unwrap_err();
        assert!(matches!(err, InvalidThresholds::Temperature { .. }));
    }

    #[test]
    fn test_validate_bounds_rejects_equal_temperature() {
        assert!(ThresholdConfig::validate_bounds(20.0, 20.0, 30.0, 70.0).is_err());
    }

    #[test]
    fn test_validate_bounds_rejects_inverted_humidity() {
        let err = ThresholdConfig::validate_bounds(18.0, 24.0, 70.0, 30.0).unwrap_err();
        assert!(matches!(err, InvalidThresholds::Humidity { .. }));
    }

    #[test]
    fn test_scope_applies_to() {
        assert!(ThresholdScope::Global.applies_to(1));
        assert!(ThresholdScope::Global.applies_to(42));
        assert!(ThresholdScope::Unit(7).applies_to(7));
        assert!(!ThresholdScope::Unit(7).applies_to(8));
    }

    #[test]
    fn test_scope_unit_id() {
        assert_eq!(ThresholdScope::Global.unit_id(), None);
        assert_eq!(ThresholdScope::Unit(3).unit_id(), Some(3));
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Operator < Role::Supervisor);
        assert!(Role::Supervisor < Role::Admin);
        assert!(Role::Admin >= Role::Supervisor);
    }

    #[test]
    fn test_role_parse_round_trip() {
        for role in [Role::Operator, Role::Supervisor, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn test_unit_serde_date_format() {
        let unit = Unit {
            id: 1,
            name: "AC-1".to_string(),
            location: "Server Room".to_string(),
            installed_on: date!(2023 - 05 - 17),
        };

        let json = serde_json::to_string(&unit).unwrap();
        assert!(json.contains("\"2023-05-17\""));

        let back: Unit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unit);
    }

    #[test]
    fn test_reading_serde_rfc3339() {
        let reading = Reading {
            id: 5,
            unit_id: 2,
            recorded_at: datetime!(2024-01-15 10:30:00 UTC),
            temperature: 22.5,
            humidity: 45.0,
        };

        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("2024-01-15T10:30:00Z"));
    }

    #[test]
    fn test_attachment_data_not_serialized() {
        let attachment = Attachment {
            filename: "compressor.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            data: vec![0xFF, 0xD8, 0xFF],
        };

        let json = serde_json::to_string(&attachment).unwrap();
        assert!(json.contains("compressor.jpg"));
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_threshold_scope_serde() {
        let global = serde_json::to_value(ThresholdScope::Global).unwrap();
        assert_eq!(global["kind"], "global");

        let scoped = serde_json::to_value(ThresholdScope::Unit(4)).unwrap();
        assert_eq!(scoped["kind"], "unit");
        assert_eq!(scoped["unit_id"], 4);
    }
}
