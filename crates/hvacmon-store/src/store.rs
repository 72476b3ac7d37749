//! Main store implementation.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use time::{Date, OffsetDateTime, macros::format_description};
use tracing::{debug, info};

use hvacmon_types::{
    Attachment, MaintenanceRecord, Reading, Role, ThresholdConfig, ThresholdScope, Unit,
};

use crate::error::{Error, Result};
use crate::models::{NewMaintenance, NewReading, NewThreshold, NewUnit, NewUser, User, UserUpdate};
use crate::queries::ReadingQuery;
use crate::schema;

pub(crate) const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day]");

/// SQLite-based store for facility monitoring data.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better performance
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

fn unit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Unit> {
    Ok(Unit {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        installed_on: Date::parse(&row.get::<_, String>(3)?, DATE_FORMAT).unwrap(),
    })
}

fn reading_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reading> {
    Ok(Reading {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        recorded_at: OffsetDateTime::from_unix_timestamp(row.get(2)?).unwrap(),
        temperature: row.get(3)?,
        humidity: row.get(4)?,
    })
}

fn threshold_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThresholdConfig> {
    let scope = match row.get::<_, Option<i64>>(2)? {
        Some(unit_id) => ThresholdScope::Unit(unit_id),
        None => ThresholdScope::Global,
    };
    Ok(ThresholdConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        scope,
        temp_min: row.get(3)?,
        temp_max: row.get(4)?,
        hum_min: row.get(5)?,
        hum_max: row.get(6)?,
        notify_enabled: row.get(7)?,
        created_at: OffsetDateTime::from_unix_timestamp(row.get(8)?).unwrap(),
        modified_at: OffsetDateTime::from_unix_timestamp(row.get(9)?).unwrap(),
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: Role::parse(&row.get::<_, String>(3)?).unwrap_or(Role::Operator),
        full_name: row.get(4)?,
        created_at: OffsetDateTime::from_unix_timestamp(row.get(5)?).unwrap(),
    })
}

// Unit operations
impl Store {
    /// Register a new unit.
    pub fn create_unit(&self, unit: &NewUnit) -> Result<Unit> {
        self.conn.execute(
            "INSERT INTO units (name, location, installed_on) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                unit.name,
                unit.location,
                unit.installed_on.format(DATE_FORMAT).unwrap(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        self.get_unit(id)?.ok_or(Error::UnitNotFound(id))
    }

    /// Get a unit by id.
    pub fn get_unit(&self, id: i64) -> Result<Option<Unit>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, location, installed_on FROM units WHERE id = ?")?;

        let unit = stmt.query_row([id], unit_from_row).optional()?;

        Ok(unit)
    }

    /// List all units ordered by location then name.
    pub fn list_units(&self) -> Result<Vec<Unit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, location, installed_on FROM units ORDER BY location, name",
        )?;

        let units = stmt
            .query_map([], unit_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(units)
    }

    /// Replace a unit's fields.
    pub fn update_unit(&self, id: i64, unit: &NewUnit) -> Result<Unit> {
        let updated = self.conn.execute(
            "UPDATE units SET name = ?2, location = ?3, installed_on = ?4 WHERE id = ?1",
            rusqlite::params![
                id,
                unit.name,
                unit.location,
                unit.installed_on.format(DATE_FORMAT).unwrap(),
            ],
        )?;

        if updated == 0 {
            return Err(Error::UnitNotFound(id));
        }
        self.get_unit(id)?.ok_or(Error::UnitNotFound(id))
    }

    /// Distinct locations that have at least one unit, sorted.
    pub fn list_locations(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT location FROM units WHERE location != '' ORDER BY location",
        )?;

        let locations = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(locations)
    }

    /// List the units at one location, ordered by name.
    pub fn list_units_by_location(&self, location: &str) -> Result<Vec<Unit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, location, installed_on FROM units WHERE location = ? ORDER BY name",
        )?;

        let units = stmt
            .query_map([location], unit_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(units)
    }

    /// Delete a unit along with its readings, maintenance log and
    /// unit-scoped threshold configs.
    pub fn delete_unit(&self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM units WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(Error::UnitNotFound(id));
        }
        info!("Deleted unit {} and its dependent rows", id);
        Ok(())
    }
}

// Reading operations
impl Store {
    /// Insert a reading for an existing unit.
    pub fn insert_reading(&self, reading: &NewReading) -> Result<Reading> {
        if self.get_unit(reading.unit_id)?.is_none() {
            return Err(Error::UnitNotFound(reading.unit_id));
        }

        let recorded_at = reading
            .recorded_at
            .unwrap_or_else(OffsetDateTime::now_utc)
            .unix_timestamp();

        self.conn.execute(
            "INSERT INTO readings (unit_id, recorded_at, temperature, humidity)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                reading.unit_id,
                recorded_at,
                reading.temperature,
                reading.humidity,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        Ok(Reading {
            id,
            unit_id: reading.unit_id,
            recorded_at: OffsetDateTime::from_unix_timestamp(recorded_at).unwrap(),
            temperature: reading.temperature,
            humidity: reading.humidity,
        })
    }

    /// Query readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<Reading>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let readings = stmt
            .query_map(params_ref.as_slice(), reading_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Get the latest reading for a unit.
    pub fn latest_reading(&self, unit_id: i64) -> Result<Option<Reading>> {
        let query = ReadingQuery::new().unit(unit_id).limit(1);
        let mut readings = self.query_readings(&query)?;
        Ok(readings.pop())
    }

    /// Delete a single reading.
    pub fn delete_reading(&self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM readings WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(Error::ReadingNotFound(id));
        }
        Ok(())
    }

    /// Count readings, optionally for a single unit.
    pub fn count_readings(&self, unit_id: Option<i64>) -> Result<u64> {
        let count: i64 = match unit_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM readings WHERE unit_id = ?",
                [id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?,
        };

        Ok(count as u64)
    }
}

const THRESHOLD_COLUMNS: &str = "id, name, unit_id, temp_min, temp_max, hum_min, hum_max, \
     notify_enabled, created_at, modified_at";

// Threshold operations
impl Store {
    /// Create a threshold config. Bounds are validated before the write;
    /// a config whose minimum is not strictly below its maximum is
    /// rejected.
    pub fn create_threshold(&self, threshold: &NewThreshold) -> Result<ThresholdConfig> {
        ThresholdConfig::validate_bounds(
            threshold.temp_min,
            threshold.temp_max,
            threshold.hum_min,
            threshold.hum_max,
        )?;

        if let Some(unit_id) = threshold.scope.unit_id() {
            if self.get_unit(unit_id)?.is_none() {
                return Err(Error::UnitNotFound(unit_id));
            }
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.conn.execute(
            "INSERT INTO thresholds (name, unit_id, temp_min, temp_max, hum_min, hum_max,
             notify_enabled, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            rusqlite::params![
                threshold.name,
                threshold.scope.unit_id(),
                threshold.temp_min,
                threshold.temp_max,
                threshold.hum_min,
                threshold.hum_max,
                threshold.notify_enabled,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        self.get_threshold(id)?.ok_or(Error::ThresholdNotFound(id))
    }

    /// Get a threshold config by id.
    pub fn get_threshold(&self, id: i64) -> Result<Option<ThresholdConfig>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM thresholds WHERE id = ?",
            THRESHOLD_COLUMNS
        ))?;

        let threshold = stmt.query_row([id], threshold_from_row).optional()?;

        Ok(threshold)
    }

    /// List all threshold configs.
    pub fn list_thresholds(&self) -> Result<Vec<ThresholdConfig>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM thresholds ORDER BY id",
            THRESHOLD_COLUMNS
        ))?;

        let thresholds = stmt
            .query_map([], threshold_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(thresholds)
    }

    /// List only the global configs (no unit scope).
    pub fn list_global_thresholds(&self) -> Result<Vec<ThresholdConfig>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM thresholds WHERE unit_id IS NULL ORDER BY id",
            THRESHOLD_COLUMNS
        ))?;

        let thresholds = stmt
            .query_map([], threshold_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(thresholds)
    }

    /// Configs applicable to a unit: every global config plus the
    /// configs scoped to that unit.
    pub fn thresholds_for_unit(&self, unit_id: i64) -> Result<Vec<ThresholdConfig>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM thresholds WHERE unit_id IS NULL OR unit_id = ? ORDER BY id",
            THRESHOLD_COLUMNS
        ))?;

        let thresholds = stmt
            .query_map([unit_id], threshold_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(thresholds)
    }

    /// Replace a threshold config. `created_at` is preserved,
    /// `modified_at` is bumped.
    pub fn update_threshold(&self, id: i64, threshold: &NewThreshold) -> Result<ThresholdConfig> {
        ThresholdConfig::validate_bounds(
            threshold.temp_min,
            threshold.temp_max,
            threshold.hum_min,
            threshold.hum_max,
        )?;

        if let Some(unit_id) = threshold.scope.unit_id() {
            if self.get_unit(unit_id)?.is_none() {
                return Err(Error::UnitNotFound(unit_id));
            }
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let updated = self.conn.execute(
            "UPDATE thresholds SET name = ?2, unit_id = ?3, temp_min = ?4, temp_max = ?5,
             hum_min = ?6, hum_max = ?7, notify_enabled = ?8, modified_at = ?9
             WHERE id = ?1",
            rusqlite::params![
                id,
                threshold.name,
                threshold.scope.unit_id(),
                threshold.temp_min,
                threshold.temp_max,
                threshold.hum_min,
                threshold.hum_max,
                threshold.notify_enabled,
                now,
            ],
        )?;

        if updated == 0 {
            return Err(Error::ThresholdNotFound(id));
        }
        self.get_threshold(id)?.ok_or(Error::ThresholdNotFound(id))
    }

    /// Delete a threshold config.
    pub fn delete_threshold(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM thresholds WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(Error::ThresholdNotFound(id));
        }
        Ok(())
    }
}

// Maintenance operations
impl Store {
    /// Record a maintenance intervention for an existing unit.
    pub fn insert_maintenance(&self, record: &NewMaintenance) -> Result<MaintenanceRecord> {
        if self.get_unit(record.unit_id)?.is_none() {
            return Err(Error::UnitNotFound(record.unit_id));
        }

        let performed_at = record
            .performed_at
            .unwrap_or_else(OffsetDateTime::now_utc)
            .unix_timestamp();

        let (name, content_type, data) = match &record.attachment {
            Some(a) => (
                Some(a.filename.as_str()),
                Some(a.content_type.as_str()),
                Some(a.data.as_slice()),
            ),
            None => (None, None, None),
        };

        self.conn.execute(
            "INSERT INTO maintenance (unit_id, performed_at, kind, description, technician,
             attachment_name, attachment_type, attachment_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                record.unit_id,
                performed_at,
                record.kind,
                record.description,
                record.technician,
                name,
                content_type,
                data,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        self.get_maintenance(id)?
            .ok_or(Error::MaintenanceNotFound(id))
    }

    /// Get a maintenance record by id. The attachment, when present,
    /// carries only its metadata; fetch the bytes with
    /// [`Store::get_maintenance_attachment`].
    pub fn get_maintenance(&self, id: i64) -> Result<Option<MaintenanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, unit_id, performed_at, kind, description, technician,
             attachment_name, attachment_type
             FROM maintenance WHERE id = ?",
        )?;

        let record = stmt.query_row([id], maintenance_from_row).optional()?;

        Ok(record)
    }

    /// List maintenance records, newest first, optionally for one unit.
    pub fn list_maintenance(&self, unit_id: Option<i64>) -> Result<Vec<MaintenanceRecord>> {
        let columns = "id, unit_id, performed_at, kind, description, technician, \
             attachment_name, attachment_type";

        let records = match unit_id {
            Some(unit) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM maintenance WHERE unit_id = ? ORDER BY performed_at DESC",
                    columns
                ))?;
                stmt.query_map([unit], maintenance_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM maintenance ORDER BY performed_at DESC",
                    columns
                ))?;
                stmt.query_map([], maintenance_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        Ok(records)
    }

    /// Fetch the attachment bytes for a maintenance record.
    ///
    /// Returns `None` when the record has no attachment.
    pub fn get_maintenance_attachment(&self, id: i64) -> Result<Option<Attachment>> {
        let mut stmt = self.conn.prepare(
            "SELECT attachment_name, attachment_type, attachment_data
             FROM maintenance WHERE id = ?",
        )?;

        let row = stmt
            .query_row([id], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<Vec<u8>>>(2)?,
                ))
            })
            .optional()?;

        match row {
            None => Err(Error::MaintenanceNotFound(id)),
            Some((Some(filename), Some(content_type), Some(data))) => Ok(Some(Attachment {
                filename,
                content_type,
                data,
            })),
            Some(_) => Ok(None),
        }
    }

    /// Delete a maintenance record.
    pub fn delete_maintenance(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM maintenance WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(Error::MaintenanceNotFound(id));
        }
        Ok(())
    }
}

fn maintenance_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MaintenanceRecord> {
    let attachment = match (
        row.get::<_, Option<String>>(6)?,
        row.get::<_, Option<String>>(7)?,
    ) {
        (Some(filename), Some(content_type)) => Some(Attachment {
            filename,
            content_type,
            data: Vec::new(),
        }),
        _ => None,
    };
    Ok(MaintenanceRecord {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        performed_at: OffsetDateTime::from_unix_timestamp(row.get(2)?).unwrap(),
        kind: row.get(3)?,
        description: row.get(4)?,
        technician: row.get(5)?,
        attachment,
    })
}

const USER_COLUMNS: &str = "id, username, password_hash, role, full_name, created_at";

// User operations
impl Store {
    /// Create an account with a freshly hashed password.
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        if self.get_user(&user.username)?.is_some() {
            return Err(Error::DuplicateUsername(user.username.clone()));
        }

        let hash = bcrypt::hash(&user.password, bcrypt::DEFAULT_COST)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();

        self.conn.execute(
            "INSERT INTO users (username, password_hash, role, full_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![user.username, hash, user.role.as_str(), user.full_name, now],
        )?;

        info!("Created user {} with role {}", user.username, user.role);
        self.get_user(&user.username)?
            .ok_or_else(|| Error::UserNotFound(user.username.clone()))
    }

    /// Get an account by username.
    pub fn get_user(&self, username: &str) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))?;

        let user = stmt.query_row([username], user_from_row).optional()?;

        Ok(user)
    }

    /// List all accounts.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))?;

        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Check a username and password pair.
    ///
    /// Returns the account on success, `None` for both an unknown
    /// username and a wrong password.
    pub fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.get_user(username)? else {
            return Ok(None);
        };

        if bcrypt::verify(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Apply a partial update to an account.
    pub fn update_user(&self, username: &str, update: &UserUpdate) -> Result<User> {
        let user = self
            .get_user(username)?
            .ok_or_else(|| Error::UserNotFound(username.to_string()))?;

        let hash = match &update.password {
            Some(password) => bcrypt::hash(password, bcrypt::DEFAULT_COST)?,
            None => user.password_hash.clone(),
        };
        let role = update.role.unwrap_or(user.role);
        let full_name = update.full_name.clone().or(user.full_name.clone());

        self.conn.execute(
            "UPDATE users SET password_hash = ?2, role = ?3, full_name = ?4 WHERE username = ?1",
            rusqlite::params![username, hash, role.as_str(), full_name],
        )?;

        self.get_user(username)?
            .ok_or_else(|| Error::UserNotFound(username.to_string()))
    }

    /// Delete an account.
    pub fn delete_user(&self, username: &str) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM users WHERE username = ?", [username])?;
        if deleted == 0 {
            return Err(Error::UserNotFound(username.to_string()));
        }
        Ok(())
    }

    /// Create the bootstrap admin account if no users exist yet.
    ///
    /// Returns `true` when the account was created on this call.
    pub fn ensure_default_admin(&self, username: &str, password: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(false);
        }

        self.create_user(&NewUser {
            username: username.to_string(),
            password: password.to_string(),
            role: Role::Admin,
            full_name: None,
        })?;
        info!("Created bootstrap admin account {}", username);
        Ok(true)
    }
}
