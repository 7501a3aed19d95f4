//! Target outlier detection
//!
//! Bounds are computed on the raw values; rows outside them are dropped by
//! cleaning.

use crate::error::{PredictorError, Result};
use crate::utils::stats::{mean, quantile_sorted, std_dev};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Method for outlier detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    /// Interquartile range: keep values in [Q1 - k*IQR, Q3 + k*IQR]
    Iqr,
    /// Z-score: keep values with |z| <= k
    ZScore,
}

impl Default for OutlierMethod {
    fn default() -> Self {
        OutlierMethod::Iqr
    }
}

impl FromStr for OutlierMethod {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" | "z_score" => Ok(OutlierMethod::ZScore),
            other => Err(PredictorError::Config(format!(
                "Unknown outlier method: {} (expected iqr or zscore)",
                other
            ))),
        }
    }
}

/// Fitted inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Compute keep-bounds for `values` under `method` with factor `threshold`.
pub fn compute_bounds(values: &[f64], method: OutlierMethod, threshold: f64) -> OutlierBounds {
    if values.is_empty() {
        return OutlierBounds {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        };
    }

    match method {
        OutlierMethod::Iqr => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let q1 = quantile_sorted(&sorted, 0.25);
            let q3 = quantile_sorted(&sorted, 0.75);
            let iqr = q3 - q1;
            OutlierBounds {
                lower: q1 - threshold * iqr,
                upper: q3 + threshold * iqr,
            }
        }
        OutlierMethod::ZScore => {
            let m = mean(values);
            let std = std_dev(values, 1);
            if std == 0.0 {
                return OutlierBounds {
                    lower: f64::NEG_INFINITY,
                    upper: f64::INFINITY,
                };
            }
            OutlierBounds {
                lower: m - threshold * std,
                upper: m + threshold * std,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iqr_bounds() {
        let values = [10.0, 12.0, 14.0, 16.0, 18.0];
        let bounds = compute_bounds(&values, OutlierMethod::Iqr, 1.5);
        // Q1 = 12, Q3 = 16, IQR = 4
        assert_eq!(bounds.lower, 6.0);
        assert_eq!(bounds.upper, 22.0);
    }

    #[test]
    fn test_iqr_detects_extreme_salary() {
        let values = [50_000.0, 52_000.0, 55_000.0, 58_000.0, 60_000.0, 1_000_000.0];
        let bounds = compute_bounds(&values, OutlierMethod::Iqr, 1.5);
        assert!(!bounds.contains(1_000_000.0));
        assert!(values[..5].iter().all(|v| bounds.contains(*v)));
    }

    #[test]
    fn test_zscore_constant_keeps_everything() {
        let values = [3.0; 10];
        let bounds = compute_bounds(&values, OutlierMethod::ZScore, 3.0);
        assert!(values.iter().all(|v| bounds.contains(*v)));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("IQR".parse::<OutlierMethod>().unwrap(), OutlierMethod::Iqr);
        assert_eq!("zscore".parse::<OutlierMethod>().unwrap(), OutlierMethod::ZScore);
        assert!("isolation_forest".parse::<OutlierMethod>().is_err());
    }
}
