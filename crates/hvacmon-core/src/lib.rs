//! Statistics and threshold evaluation for hvacmon readings.
//!
//! This crate is the aggregation engine of the system: it reduces slices
//! of [`Reading`](hvacmon_types::Reading)s into descriptive statistics
//! grouped by unit or location, filters readings by a relative time
//! period, and evaluates single observations against configured
//! thresholds.
//!
//! Everything here is a pure function over plain data. The engine holds
//! no state, performs no I/O, and never sees a database handle; callers
//! fetch rows from the store and hand them in.
//!
//! # Example
//!
//! ```
//! use hvacmon_core::{aggregate_global, filter_by_period, Period};
//! use time::OffsetDateTime;
//!
//! let readings = vec![];
//! let recent = filter_by_period(&readings, Period::Week, OffsetDateTime::now_utc());
//! let stats = aggregate_global(&recent);
//! assert_eq!(stats.count, 0);
//! ```

pub mod period;
pub mod stats;
pub mod thresholds;

pub use period::{Period, filter_by_period};
pub use stats::{
    AggregateStats, VariableStats, aggregate_by, aggregate_by_location, aggregate_by_unit,
    aggregate_global,
};
pub use thresholds::{Alert, Bound, ThresholdCheck, Variable, evaluate_thresholds};
