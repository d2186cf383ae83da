// ABOUTME: Table comparison options and their backend wire form
// ABOUTME: Validates sampling, tolerance and precision settings before submission

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{DiffError, Result};

pub const DEFAULT_KEY_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Auto,
    #[serde(rename = "hashdiff", alias = "hash")]
    HashDiff,
    #[serde(rename = "joindiff", alias = "join")]
    JoinDiff,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMethod {
    #[default]
    Deterministic,
    System,
    Bernoulli,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSize {
    Rows(u64),
    Percent(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOptions {
    pub enabled: bool,
    pub size: SampleSize,
    pub method: SamplingMethod,
    pub confidence_level: f64,
    pub margin_of_error: f64,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            size: SampleSize::Percent(10.0),
            method: SamplingMethod::Deterministic,
            confidence_level: 0.95,
            margin_of_error: 0.01,
        }
    }
}

impl SamplingOptions {
    fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.size {
            SampleSize::Rows(0) => {
                return Err(DiffError::InvalidOptions(
                    "sample size must be at least one row".to_string(),
                ))
            }
            SampleSize::Percent(p) if !(p > 0.0 && p <= 100.0) => {
                return Err(DiffError::InvalidOptions(format!(
                    "sample percentage {} is outside (0, 100]",
                    p
                )))
            }
            _ => {}
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(DiffError::InvalidOptions(format!(
                "confidence level {} is outside (0, 1)",
                self.confidence_level
            )));
        }
        if !(self.margin_of_error > 0.0 && self.margin_of_error < 1.0) {
            return Err(DiffError::InvalidOptions(format!(
                "margin of error {} is outside (0, 1)",
                self.margin_of_error
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonComparisonMode {
    #[default]
    Exact,
    Normalized,
    Semantic,
    KeysOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableComparisonOptions {
    /// Defaults to `["id"]` when absent or empty.
    pub key_columns: Option<Vec<String>>,
    /// Columns to compare besides the keys; empty means all.
    pub columns: Vec<String>,
    pub where_condition: Option<String>,
    pub algorithm: Algorithm,
    pub sampling: Option<SamplingOptions>,
    pub float_tolerance: Option<f64>,
    /// Fractional-second digits kept when comparing timestamps (0-9).
    pub timestamp_precision: Option<u8>,
    pub json_mode: JsonComparisonMode,
    /// Source column name to target column name.
    pub column_remapping: BTreeMap<String, String>,
    pub enable_classification: bool,
    pub materialize_results: bool,
    pub callback_url: Option<String>,
}

impl TableComparisonOptions {
    pub fn effective_key_columns(&self) -> Vec<String> {
        match &self.key_columns {
            Some(keys) if !keys.is_empty() => keys.clone(),
            _ => vec![DEFAULT_KEY_COLUMN.to_string()],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(keys) = &self.key_columns {
            if keys.iter().any(|k| k.trim().is_empty()) {
                return Err(DiffError::InvalidOptions(
                    "key columns must not be blank".to_string(),
                ));
            }
        }
        if let Some(tolerance) = self.float_tolerance {
            if !(tolerance >= 0.0 && tolerance.is_finite()) {
                return Err(DiffError::InvalidOptions(format!(
                    "float tolerance {} must be a finite non-negative number",
                    tolerance
                )));
            }
        }
        if let Some(precision) = self.timestamp_precision {
            if precision > 9 {
                return Err(DiffError::InvalidOptions(format!(
                    "timestamp precision {} is outside 0-9",
                    precision
                )));
            }
        }
        if let Some(sampling) = &self.sampling {
            sampling.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_percent: Option<f64>,
    pub method: SamplingMethod,
    pub confidence_level: f64,
    pub margin_of_error: f64,
}

impl From<&SamplingOptions> for SamplingConfig {
    fn from(options: &SamplingOptions) -> Self {
        let (sample_size, sample_percent) = match options.size {
            SampleSize::Rows(rows) => (Some(rows), None),
            SampleSize::Percent(percent) => (None, Some(percent)),
        };
        Self {
            enabled: options.enabled,
            sample_size,
            sample_percent,
            method: options.method,
            confidence_level: options.confidence_level,
            margin_of_error: options.margin_of_error,
        }
    }
}

/// The `comparison_config` block of a table comparison submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonConfig {
    pub source_table: String,
    pub target_table: String,
    pub key_columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns_to_compare: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub where_condition: Option<String>,
    pub algorithm: Algorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub float_tolerance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_precision: Option<u8>,
    pub json_comparison_mode: JsonComparisonMode,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub column_remapping: BTreeMap<String, String>,
    pub enable_classification: bool,
    pub materialize_results: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl ComparisonConfig {
    pub fn build(
        source_table: String,
        target_table: String,
        options: &TableComparisonOptions,
        callback_url: Option<String>,
    ) -> Self {
        Self {
            source_table,
            target_table,
            key_columns: options.effective_key_columns(),
            columns_to_compare: options.columns.clone(),
            where_condition: options.where_condition.clone().filter(|w| !w.trim().is_empty()),
            algorithm: options.algorithm,
            sampling: options
                .sampling
                .as_ref()
                .filter(|s| s.enabled)
                .map(SamplingConfig::from),
            float_tolerance: options.float_tolerance,
            timestamp_precision: options.timestamp_precision,
            json_comparison_mode: options.json_mode,
            column_remapping: options.column_remapping.clone(),
            enable_classification: options.enable_classification,
            materialize_results: options.materialize_results,
            callback_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_columns_default_to_id() {
        let options = TableComparisonOptions::default();
        assert_eq!(options.effective_key_columns(), vec!["id"]);

        let empty = TableComparisonOptions {
            key_columns: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(empty.effective_key_columns(), vec!["id"]);
    }

    #[test]
    fn test_wire_form() {
        let options = TableComparisonOptions {
            key_columns: Some(vec!["order_id".into()]),
            algorithm: Algorithm::JoinDiff,
            json_mode: JsonComparisonMode::KeysOnly,
            sampling: Some(SamplingOptions {
                size: SampleSize::Rows(5000),
                method: SamplingMethod::Bernoulli,
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = ComparisonConfig::build("public.a".into(), "s.b".into(), &options, None);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["algorithm"], json!("joindiff"));
        assert_eq!(value["json_comparison_mode"], json!("keys_only"));
        assert_eq!(value["sampling"]["sample_size"], json!(5000));
        assert_eq!(value["sampling"]["method"], json!("bernoulli"));
        assert!(value["sampling"].get("sample_percent").is_none());
        assert!(value.get("columns_to_compare").is_none());
        assert!(value.get("callback_url").is_none());
    }

    #[test]
    fn test_disabled_sampling_is_omitted() {
        let options = TableComparisonOptions {
            sampling: Some(SamplingOptions {
                enabled: false,
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = ComparisonConfig::build("a".into(), "b".into(), &options, None);
        assert!(config.sampling.is_none());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_percent = TableComparisonOptions {
            sampling: Some(SamplingOptions {
                size: SampleSize::Percent(150.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(bad_percent.validate(), Err(DiffError::InvalidOptions(_))));

        let bad_precision = TableComparisonOptions {
            timestamp_precision: Some(12),
            ..Default::default()
        };
        assert!(bad_precision.validate().is_err());

        let bad_tolerance = TableComparisonOptions {
            float_tolerance: Some(-1.0),
            ..Default::default()
        };
        assert!(bad_tolerance.validate().is_err());

        assert!(TableComparisonOptions::default().validate().is_ok());
    }

    #[test]
    fn test_options_deserialize_from_partial_json() {
        let options: TableComparisonOptions = serde_json::from_value(json!({
            "algorithm": "hash",
            "columns": ["amount"],
            "sampling": {"size": {"percent": 5.0}, "method": "system"}
        }))
        .unwrap();
        assert_eq!(options.algorithm, Algorithm::HashDiff);
        assert_eq!(options.key_columns, None);
        let sampling = options.sampling.unwrap();
        assert_eq!(sampling.size, SampleSize::Percent(5.0));
        assert_eq!(sampling.confidence_level, 0.95);
    }
}
