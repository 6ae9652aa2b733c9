use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::db_types::Money;

pub const DEFAULT_PREMIUM_RATE_BPS: i64 = 500;
pub const DEFAULT_POLICY_DAYS: i64 = 30;
/// Ten years.
pub const MAX_POLICY_DAYS: i64 = 3650;

/// A customer's request to insure an order. Rate and duration fall back to the [`InsuranceConfig`] defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub provider: String,
    pub coverage_amount: Money,
    /// Premium as a percentage of the coverage, e.g. `5.0` or `2.5`.
    #[serde(default)]
    pub premium_rate_percent: Option<f64>,
    #[serde(default)]
    pub duration_days: Option<i64>,
}

impl PolicyRequest {
    pub fn new<S: Into<String>>(provider: S, coverage_amount: Money) -> Self {
        Self { provider: provider.into(), coverage_amount, premium_rate_percent: None, duration_days: None }
    }

    pub fn with_rate(mut self, percent: f64) -> Self {
        self.premium_rate_percent = Some(percent);
        self
    }

    pub fn with_duration_days(mut self, days: i64) -> Self {
        self.duration_days = Some(days);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsuranceConfig {
    pub default_rate_bps: i64,
    pub default_duration: Duration,
}

impl Default for InsuranceConfig {
    fn default() -> Self {
        Self { default_rate_bps: DEFAULT_PREMIUM_RATE_BPS, default_duration: Duration::days(DEFAULT_POLICY_DAYS) }
    }
}

impl InsuranceConfig {
    /// Builds a config from a percentage rate. Rates are kept to two decimal places.
    pub fn with_rate_percent(mut self, percent: f64) -> Self {
        self.default_rate_bps = percent_to_bps(percent);
        self
    }
}

#[allow(clippy::cast_possible_truncation)]
pub fn percent_to_bps(percent: f64) -> i64 {
    (percent * 100.0).round() as i64
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rates() {
        assert_eq!(percent_to_bps(5.0), 500);
        assert_eq!(percent_to_bps(2.5), 250);
        assert_eq!(percent_to_bps(0.125), 13);
        let config = InsuranceConfig::default().with_rate_percent(7.5);
        assert_eq!(config.default_rate_bps, 750);
        assert_eq!(config.default_duration, Duration::days(30));
    }
}
