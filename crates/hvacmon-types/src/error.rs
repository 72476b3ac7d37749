//! Validation errors for hvacmon-types.

/// Rejected threshold bounds.
///
/// A [`ThresholdConfig`](crate::ThresholdConfig) must satisfy
/// `temp_min < temp_max` and `hum_min < hum_max` at creation and update
/// time. Violating configs are rejected outright, never clamped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidThresholds {
    /// Temperature band is empty or inverted.
    #[error("temperature bounds invalid: min ({min}) must be below max ({max})")]
    Temperature { min: f64, max: f64 },

    /// Humidity band is empty or inverted.
    #[error("humidity bounds invalid: min ({min}) must be below max ({max})")]
    Humidity { min: f64, max: f64 },
}
