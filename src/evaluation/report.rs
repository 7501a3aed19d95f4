//! Markdown evaluation reports and currency formatting

use super::{EvaluationResult, FeatureImportance};
use crate::training::ModelVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Number of features listed in a report.
pub const TOP_FEATURES: usize = 5;

/// Qualitative reading of a test R²
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceBand {
    Excellent,
    Good,
    Moderate,
}

impl PerformanceBand {
    pub fn from_r2(r2: f64) -> Self {
        if r2 >= 0.8 {
            PerformanceBand::Excellent
        } else if r2 >= 0.6 {
            PerformanceBand::Good
        } else {
            PerformanceBand::Moderate
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PerformanceBand::Excellent => {
                "**Excellent model performance** with high predictive accuracy."
            }
            PerformanceBand::Good => {
                "**Good model performance** with reasonable predictive accuracy."
            }
            PerformanceBand::Moderate => {
                "**Moderate model performance**; consider feature engineering or different algorithms."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    Inr,
    Usd,
}

/// `₹1.2Cr`, `₹4.5L` or `₹12,345` for rupees; `$12,345` otherwise.
pub fn format_currency(amount: f64, currency: Currency) -> String {
    match currency {
        Currency::Inr if amount >= 10_000_000.0 => format!("₹{:.1}Cr", amount / 10_000_000.0),
        Currency::Inr if amount >= 100_000.0 => format!("₹{:.1}L", amount / 100_000.0),
        Currency::Inr => format!("₹{}", group_thousands(amount, 0)),
        Currency::Usd => format!("${}", group_thousands(amount, 0)),
    }
}

/// Fixed-point formatting with `,` between groups of three digits.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 4);
    if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        grouped.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

/// Render the evaluation report of one variant.
pub fn render_report(
    variant: ModelVariant,
    result: &EvaluationResult,
    importances: Option<&[FeatureImportance]>,
    evaluated_at: DateTime<Utc>,
) -> String {
    let m = &result.metrics;
    let mut report = String::new();

    // writing to a String cannot fail
    let _ = writeln!(report, "# Model Evaluation Report: {}\n", variant);
    let _ = writeln!(report, "## Performance Metrics");
    let _ = writeln!(report, "- **R² Score**: {:.4}", m.r2);
    let _ = writeln!(report, "- **RMSE**: ${}", group_thousands(m.rmse, 2));
    let _ = writeln!(report, "- **MAE**: ${}", group_thousands(m.mae, 2));
    let _ = writeln!(report, "- **MSE**: ${}", group_thousands(m.mse, 2));
    let _ = writeln!(report, "- **MAPE**: {:.2}%\n", m.mape);

    let _ = writeln!(report, "## Residuals Analysis");
    let _ = writeln!(report, "- **Residual Mean**: {:.2}", m.residual_mean);
    let _ = writeln!(report, "- **Residual Std**: {:.2}\n", m.residual_std);

    let _ = writeln!(report, "## Model Interpretation");
    let _ = writeln!(report, "- {}", PerformanceBand::from_r2(m.r2).description());

    if let Some(importances) = importances {
        let _ = writeln!(report, "\n## Top {} Most Important Features", TOP_FEATURES);
        for fi in importances.iter().take(TOP_FEATURES) {
            let _ = writeln!(report, "- **{}**: {:.4}", fi.feature, fi.importance);
        }
    }

    let _ = writeln!(report, "\n## Evaluation Date");
    let _ = writeln!(report, "{}", evaluated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::RegressionMetrics;
    use ndarray::array;

    #[test]
    fn test_bands() {
        assert_eq!(PerformanceBand::from_r2(0.8), PerformanceBand::Excellent);
        assert_eq!(PerformanceBand::from_r2(0.79), PerformanceBand::Good);
        assert_eq!(PerformanceBand::from_r2(0.6), PerformanceBand::Good);
        assert_eq!(PerformanceBand::from_r2(-1.0), PerformanceBand::Moderate);
    }

    #[test]
    fn test_currency() {
        assert_eq!(format_currency(25_000_000.0, Currency::Inr), "₹2.5Cr");
        assert_eq!(format_currency(450_000.0, Currency::Inr), "₹4.5L");
        assert_eq!(format_currency(12_345.0, Currency::Inr), "₹12,345");
        assert_eq!(format_currency(1_234_567.4, Currency::Usd), "$1,234,567");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0.0, 2), "0.00");
        assert_eq!(group_thousands(999.0, 0), "999");
        assert_eq!(group_thousands(1000.0, 0), "1,000");
        assert_eq!(group_thousands(-1234.5, 2), "-1,234.50");
        assert_eq!(group_thousands(123456.789, 2), "123,456.79");
    }

    #[test]
    fn test_report_sections() {
        let y = array![100.0, 200.0, 300.0];
        let p = array![110.0, 190.0, 300.0];
        let result = EvaluationResult::new(&y, p);
        let importances = vec![
            FeatureImportance {
                feature: "experience_years".to_string(),
                importance: 0.7,
            },
            FeatureImportance {
                feature: "remote_ratio".to_string(),
                importance: 0.3,
            },
        ];
        let report = render_report(
            ModelVariant::RandomForest,
            &result,
            Some(&importances),
            Utc::now(),
        );

        assert!(report.starts_with("# Model Evaluation Report: random_forest"));
        assert!(report.contains("**Excellent model performance**"));
        assert!(report.contains("- **experience_years**: 0.7000"));
        assert!(report.contains("## Evaluation Date"));
        assert_eq!(result.metrics, RegressionMetrics::compute(&y, &result.predictions));
    }
}
