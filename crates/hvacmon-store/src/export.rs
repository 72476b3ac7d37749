//! CSV export of stored readings.

use std::collections::HashMap;

use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::error::{Error, Result};
use crate::queries::ReadingQuery;
use crate::store::Store;

impl Store {
    /// Export the readings matched by `query` as CSV.
    ///
    /// Columns: id, unit_id, unit_name, location, recorded_at,
    /// temperature, humidity. Rows come out in the query's order;
    /// readings whose unit has been deleted keep an empty name and
    /// location.
    pub fn export_readings_csv(&self, query: &ReadingQuery) -> Result<String> {
        let readings = self.query_readings(query)?;
        let units: HashMap<i64, (String, String)> = self
            .list_units()?
            .into_iter()
            .map(|u| (u.id, (u.name, u.location)))
            .collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "id",
            "unit_id",
            "unit_name",
            "location",
            "recorded_at",
            "temperature",
            "humidity",
        ])?;

        for reading in &readings {
            let (name, location) = units
                .get(&reading.unit_id)
                .map(|(n, l)| (n.as_str(), l.as_str()))
                .unwrap_or(("", ""));
            writer.write_record([
                reading.id.to_string(),
                reading.unit_id.to_string(),
                name.to_string(),
                location.to_string(),
                reading.recorded_at.format(&Rfc3339)?,
                format!("{:.2}", reading.temperature),
                format!("{:.2}", reading.humidity),
            ])?;
        }

        let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        info!("Exported {} readings to CSV", readings.len());
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Export the unit registry as CSV.
    pub fn export_units_csv(&self) -> Result<String> {
        let units = self.list_units()?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["id", "name", "location", "installed_on"])?;
        for unit in &units {
            writer.write_record([
                unit.id.to_string(),
                unit.name.clone(),
                unit.location.clone(),
                unit.installed_on.format(crate::store::DATE_FORMAT)?,
            ])?;
        }

        let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Export the maintenance log as CSV, optionally for one unit.
    ///
    /// Attachment bytes are excluded; only the file name is carried.
    pub fn export_maintenance_csv(&self, unit_id: Option<i64>) -> Result<String> {
        let records = self.list_maintenance(unit_id)?;
        let units: HashMap<i64, String> = self
            .list_units()?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "id",
            "unit_id",
            "unit_name",
            "performed_at",
            "kind",
            "description",
            "technician",
            "attachment",
        ])?;
        for record in &records {
            writer.write_record([
                record.id.to_string(),
                record.unit_id.to_string(),
                units.get(&record.unit_id).cloned().unwrap_or_default(),
                record.performed_at.format(&Rfc3339)?,
                record.kind.clone(),
                record.description.clone(),
                record.technician.clone(),
                record
                    .attachment
                    .as_ref()
                    .map(|a| a.filename.clone())
                    .unwrap_or_default(),
            ])?;
        }

        let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        info!("Exported {} maintenance records to CSV", records.len());
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewReading, NewUnit};
    use time::OffsetDateTime;
    use time::macros::date;

    #[test]
    fn test_export_empty_store_has_header_only() {
        let store = Store::open_in_memory().unwrap();
        let csv = store.export_readings_csv(&ReadingQuery::new()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("id,unit_id,unit_name"));
    }

    #[test]
    fn test_export_includes_unit_name_and_values() {
        let store = Store::open_in_memory().unwrap();
        let unit = store
            .create_unit(&NewUnit {
                name: "AC-1".to_string(),
                location: "Lobby".to_string(),
                installed_on: date!(2022 - 06 - 01),
            })
            .unwrap();
        store
            .insert_reading(&NewReading {
                unit_id: unit.id,
                recorded_at: Some(OffsetDateTime::now_utc()),
                temperature: 21.456,
                humidity: 48.0,
            })
            .unwrap();

        let csv = store.export_readings_csv(&ReadingQuery::new()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("AC-1"));
        assert!(lines[1].contains("Lobby"));
        assert!(lines[1].contains("21.46"));
    }

    #[test]
    fn test_export_units_csv() {
        let store = Store::open_in_memory().unwrap();
        store
            .create_unit(&NewUnit {
                name: "AC-1".to_string(),
                location: "Lobby".to_string(),
                installed_on: date!(2022 - 06 - 01),
            })
            .unwrap();

        let csv = store.export_units_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,name,location,installed_on");
        assert!(lines[1].ends_with("AC-1,Lobby,2022-06-01"));
    }

    #[test]
    fn test_export_maintenance_csv_excludes_attachment_bytes() {
        let store = Store::open_in_memory().unwrap();
        let unit = store
            .create_unit(&NewUnit {
                name: "AC-1".to_string(),
                location: "Lobby".to_string(),
                installed_on: date!(2022 - 06 - 01),
            })
            .unwrap();
        store
            .insert_maintenance(&crate::models::NewMaintenance {
                unit_id: unit.id,
                performed_at: None,
                kind: "inspection".to_string(),
                description: "Routine check".to_string(),
                technician: "J. Doe".to_string(),
                attachment: Some(hvacmon_types::Attachment {
                    filename: "report.pdf".to_string(),
                    content_type: "application/pdf".to_string(),
                    data: vec![1, 2, 3],
                }),
            })
            .unwrap();

        let csv = store.export_maintenance_csv(None).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("report.pdf"));
        assert!(lines[1].contains("inspection"));
    }

    #[test]
    fn test_export_respects_query_filter() {
        let store = Store::open_in_memory().unwrap();
        let a = store
            .create_unit(&NewUnit {
                name: "AC-1".to_string(),
                location: "Lobby".to_string(),
                installed_on: date!(2022 - 06 - 01),
            })
            .unwrap();
        let b = store
            .create_unit(&NewUnit {
                name: "AC-2".to_string(),
                location: "Roof".to_string(),
                installed_on: date!(2022 - 06 - 01),
            })
            .unwrap();
        for unit_id in [a.id, b.id] {
            store
                .insert_reading(&NewReading {
                    unit_id,
                    recorded_at: Some(OffsetDateTime::now_utc()),
                    temperature: 20.0,
                    humidity: 50.0,
                })
                .unwrap();
        }

        let csv = store
            .export_readings_csv(&ReadingQuery::new().unit(a.id))
            .unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(!csv.contains("AC-2"));
    }
}
