//! Grouped descriptive statistics over reading sets.
//!
//! Statistics are computed in a single pass with Welford's online
//! algorithm, so full precision is kept internally; rounding to two
//! decimals is a presentation concern applied via [`AggregateStats::rounded`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hvacmon_types::{Reading, Unit};

/// Summary statistics for one measured variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableStats {
    /// Arithmetic mean.
    pub mean: f64,
    /// Smallest observed value.
    pub min: f64,
    /// Largest observed value.
    pub max: f64,
    /// Sample standard deviation (N-1). Defined as 0 for fewer than
    /// two observations, never NaN.
    pub stddev: f64,
}

impl VariableStats {
    /// All-zero stats, used for empty reading sets.
    pub fn zeroed() -> Self {
        Self {
            mean: 0.0,
            min: 0.0,
            max: 0.0,
            stddev: 0.0,
        }
    }

    /// Presentation form with every field rounded to two decimals.
    pub fn rounded(&self) -> Self {
        Self {
            mean: round2(self.mean),
            min: round2(self.min),
            max: round2(self.max),
            stddev: round2(self.stddev),
        }
    }
}

/// Temperature and humidity statistics over one group of readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Number of readings in the group.
    pub count: u64,
    /// Temperature statistics.
    pub temperature: VariableStats,
    /// Humidity statistics.
    pub humidity: VariableStats,
}

impl AggregateStats {
    /// Zero-count stats for an empty reading set. Not an error value;
    /// callers must treat `count == 0` as "no data".
    pub fn empty() -> Self {
        Self {
            count: 0,
            temperature: VariableStats::zeroed(),
            humidity: VariableStats::zeroed(),
        }
    }

    /// Presentation form with all variable stats rounded to two decimals.
    pub fn rounded(&self) -> Self {
        Self {
            count: self.count,
            temperature: self.temperature.rounded(),
            humidity: self.humidity.rounded(),
        }
    }
}

/// Welford accumulator for one variable.
#[derive(Debug, Clone, Copy, Default)]
struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Welford {
    fn push(&mut self, x: f64) {
        if self.count == 0 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn finish(&self) -> VariableStats {
        if self.count == 0 {
            return VariableStats::zeroed();
        }
        let stddev = if self.count >= 2 {
            (self.m2 / (self.count - 1) as f64).sqrt()
        } else {
            0.0
        };
        VariableStats {
            mean: self.mean,
            min: self.min,
            max: self.max,
            stddev,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    temperature: Welford,
    humidity: Welford,
}

impl Accumulator {
    fn push(&mut self, reading: &Reading) {
        self.temperature.push(reading.temperature);
        self.humidity.push(reading.humidity);
    }

    fn finish(&self) -> AggregateStats {
        AggregateStats {
            count: self.temperature.count,
            temperature: self.temperature.finish(),
            humidity: self.humidity.finish(),
        }
    }
}

/// Reduce readings into per-group statistics using an arbitrary key
/// extractor.
///
/// Readings for which the extractor returns `None` are skipped. Only
/// keys with at least one reading appear in the output; a group is
/// never emitted empty.
pub fn aggregate_by<K, F>(readings: &[Reading], key: F) -> BTreeMap<K, AggregateStats>
where
    K: Ord,
    F: Fn(&Reading) -> Option<K>,
{
    let mut groups: BTreeMap<K, Accumulator> = BTreeMap::new();
    for reading in readings {
        if let Some(k) = key(reading) {
            groups.entry(k).or_default().push(reading);
        }
    }
    groups.into_iter().map(|(k, acc)| (k, acc.finish())).collect()
}

/// Per-unit statistics, keyed by unit id.
pub fn aggregate_by_unit(readings: &[Reading]) -> BTreeMap<i64, AggregateStats> {
    aggregate_by(readings, |r| Some(r.unit_id))
}

/// Per-location statistics, joining readings with their owning unit.
///
/// Readings whose unit id does not appear in `units` are skipped.
pub fn aggregate_by_location(
    readings: &[Reading],
    units: &[Unit],
) -> BTreeMap<String, AggregateStats> {
    let locations: BTreeMap<i64, &str> = units
        .iter()
        .map(|u| (u.id, u.location.as_str()))
        .collect();
    aggregate_by(readings, |r| {
        locations.get(&r.unit_id).map(|loc| loc.to_string())
    })
}

/// Statistics over the whole reading set as a single implicit group.
///
/// An empty input yields [`AggregateStats::empty`], not an error.
pub fn aggregate_global(readings: &[Reading]) -> AggregateStats {
    let mut acc = Accumulator::default();
    for reading in readings {
        acc.push(reading);
    }
    acc.finish()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
