//! Threshold violation checks for incoming readings.

use serde::{Deserialize, Serialize};

use hvacmon_types::{Reading, ThresholdConfig};

/// Which measured variable an alert refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    Temperature,
    Humidity,
}

impl Variable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::Temperature => "temperature",
            Variable::Humidity => "humidity",
        }
    }
}

/// Which side of the configured range was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// Value fell below the configured minimum.
    Below,
    /// Value rose above the configured maximum.
    Above,
}

/// A single threshold violation raised by one config for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub config_id: i64,
    pub config_name: String,
    pub variable: Variable,
    pub violated_bound: Bound,
    /// The measured value that violated the bound.
    pub value: f64,
    /// The configured limit that was crossed.
    pub limit: f64,
    pub message: String,
}

/// The outcome of evaluating one reading against a set of configs.
///
/// `within_limits` holds exactly when `alerts` is empty; with no
/// applicable configs at all the reading counts as within limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCheck {
    pub within_limits: bool,
    pub alerts: Vec<Alert>,
}

/// Evaluate a reading against every applicable threshold config.
///
/// Configs with notifications disabled are skipped, as are configs
/// scoped to a different unit. Each config contributes at most one
/// alert per variable: a value below the minimum wins over the
/// maximum check. Checks are independent across configs, so a reading
/// can raise several alerts for the same variable.
pub fn evaluate_thresholds(reading: &Reading, configs: &[ThresholdConfig]) -> ThresholdCheck {
    let mut alerts = Vec::new();
    for config in configs {
        if !config.notify_enabled || !config.scope.applies_to(reading.unit_id) {
            continue;
        }
        check_variable(
            &mut alerts,
            config,
            Variable::Temperature,
            reading.temperature,
            config.temp_min,
            config.temp_max,
        );
        check_variable(
            &mut alerts,
            config,
            Variable::Humidity,
            reading.humidity,
            config.hum_min,
            config.hum_max,
        );
    }
    ThresholdCheck {
        within_limits: alerts.is_empty(),
        alerts,
    }
}

fn check_variable(
    alerts: &mut Vec<Alert>,
    config: &ThresholdConfig,
    variable: Variable,
    value: f64,
    min: f64,
    max: f64,
) {
    let (bound, limit) = if value < min {
        (Bound::Below, min)
    } else if value > max {
        (Bound::Above, max)
    } else {
        return;
    };
    let message = match bound {
        Bound::Below => format!(
            "{} {value:.1} below minimum {limit:.1} ({})",
            variable.as_str(),
            config.name
        ),
        Bound::Above => format!(
            "{} {value:.1} above maximum {limit:.1} ({})",
            variable.as_str(),
            config.name
        ),
    };
    alerts.push(Alert {
        config_id: config.id,
        config_name: config.name.clone(),
        variable,
        violated_bound: bound,
        value,
        limit,
        message,
    });
}
