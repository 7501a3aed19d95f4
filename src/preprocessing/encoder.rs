//! Label encoding for categorical features

use crate::error::{PredictorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordinal encoder over the sorted distinct values seen during fit.
///
/// Values never seen during fit map to the fallback class, `classes[0]`.
/// This substitution is silent and intentional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit over the observed values. Fails when nothing was observed.
    pub fn fit<I, S>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();

        if classes.is_empty() {
            return Err(PredictorError::Data(
                "Cannot fit a label encoder on an empty column".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn fallback_class(&self) -> &str {
        &self.classes[0]
    }

    /// Code for a seen value, `None` otherwise.
    pub fn code_of(&self, value: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
    }

    /// Code for `value`, substituting the fallback class for unseen values.
    pub fn encode(&self, value: &str) -> usize {
        self.code_of(value).unwrap_or(0)
    }

    /// Encode a JSON value by its textual form; numbers and booleans match
    /// the text a CSV column of the same values would carry.
    pub fn encode_json(&self, value: &Value) -> usize {
        match value {
            Value::String(s) => self.encode(s),
            Value::Null => 0,
            other => self.encode(&other.to_string()),
        }
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sorted_codes() {
        let enc = LabelEncoder::fit(["Startup", "Large", "Medium", "Large"]).unwrap();
        assert_eq!(enc.classes(), &["Large", "Medium", "Startup"]);
        assert_eq!(enc.encode("Medium"), 1);
        assert_eq!(enc.decode(2), Some("Startup"));
    }

    #[test]
    fn test_unseen_value_uses_fallback() {
        let enc = LabelEncoder::fit(["Bachelor", "Master", "PhD"]).unwrap();
        assert_eq!(enc.fallback_class(), "Bachelor");
        assert_eq!(enc.code_of("Diploma"), None);
        assert_eq!(enc.encode("Diploma"), 0);
        assert_eq!(enc.encode_json(&json!(["not", "a", "string"])), 0);
    }

    #[test]
    fn test_numeric_json_matches_text() {
        let enc = LabelEncoder::fit(["2021", "2022", "2023"]).unwrap();
        assert_eq!(enc.encode_json(&json!(2022)), 1);
        assert_eq!(enc.encode_json(&json!("2023")), 2);
    }

    #[test]
    fn test_empty_fit_fails() {
        assert!(LabelEncoder::fit(Vec::<String>::new()).is_err());
    }
}
