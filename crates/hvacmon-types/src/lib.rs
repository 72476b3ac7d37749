//! Shared data types for the hvacmon facility-monitoring service.
//!
//! This crate holds the plain typed records that flow between the
//! persistence layer, the aggregation engine, and the HTTP API:
//! readings, units, threshold configurations, maintenance records,
//! and user roles.
//!
//! Rows coming out of the store are always materialized into these
//! structs so that downstream code works with named fields instead of
//! column-indexed tuples.

pub mod error;
pub mod types;

pub use error::InvalidThresholds;
pub use types::{
    Attachment, MaintenanceRecord, Reading, Role, ThresholdConfig, ThresholdScope, Unit,
};
