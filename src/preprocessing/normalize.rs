// src/preprocessing/normalize.rs
//
// Turns raw survey input into canonical rows whose cells follow the schema order.

use anyhow::anyhow;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::models::artifact::{FeatureKind, FeatureSchema};
use crate::models::survey::SurveyResponse;
use crate::utils::constants::UNKNOWN_CATEGORY;

// One number with optional comma/underscore thousands groups and decimals.
static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?(?:\d{1,3}(?:[,_]\d{3})+|\d+)(?:\.\d+)?")
        .expect("numeric token pattern is valid")
});

/// One cell of a canonical row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum CellValue {
    Numeric(f64),
    Category(String),
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            Self::Category(s) => Some(s),
            Self::Numeric(_) => None,
        }
    }
}

/// A row of cells in exactly the order of the schema it was built against.
pub type CanonicalRow = Vec<CellValue>;

/// What a missing numeric field becomes at inference time.
///
/// Training always imputes the column median; `Zero` keeps the historical inference
/// behaviour, `TrainingMedian` reuses the stored training medians instead.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericDefault {
    #[default]
    Zero,
    TrainingMedian,
}

impl fmt::Display for NumericDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => write!(f, "zero"),
            Self::TrainingMedian => write!(f, "median"),
        }
    }
}

impl FromStr for NumericDefault {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zero" | "0" => Ok(Self::Zero),
            "median" | "training_median" => Ok(Self::TrainingMedian),
            other => Err(anyhow!("Unknown numeric default '{}'", other)),
        }
    }
}

/// Parses free-form numeric text such as `"29"`, `" 1,200 "` or `"$50,000"`.
///
/// Text around the number is tolerated as long as it holds no other digits, so
/// `"25 to 30"` or `"5 years 6 months"` are rejected instead of being merged into one value.
pub fn parse_numeric_str(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Some(value).filter(|v| v.is_finite());
    }

    let token = NUMERIC_TOKEN.find(trimmed)?;
    let (prefix, suffix) = (&trimmed[..token.start()], &trimmed[token.end()..]);
    let stray_digit = |s: &str| s.chars().any(|c| c.is_ascii_digit());
    if stray_digit(prefix) || stray_digit(suffix) {
        return None;
    }

    let digits: String = token.as_str().chars().filter(|c| *c != ',' && *c != '_').collect();
    let value = digits.parse::<f64>().ok()?;
    // "-$50"
    let value = if prefix.trim_start().starts_with('-') && value > 0.0 {
        -value
    } else {
        value
    };
    Some(value).filter(|v| v.is_finite())
}

pub fn numeric_value(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        JsonValue::String(s) => parse_numeric_str(s),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub fn categorical_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        JsonValue::Bool(true) => Some("Yes".to_string()),
        JsonValue::Bool(false) => Some("No".to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Builds the canonical row for one survey submission. Never fails: every schema column
/// gets a value, falling back to a numeric default or the `"Unknown"` category.
pub fn normalize(
    response: &SurveyResponse,
    schema: &FeatureSchema,
    numeric_default: NumericDefault,
    training_medians: &BTreeMap<String, f64>,
) -> CanonicalRow {
    schema
        .columns()
        .iter()
        .map(|column| {
            let raw = response.get(&column.name);
            match column.kind {
                FeatureKind::Numeric => {
                    let value = raw.and_then(numeric_value).unwrap_or_else(|| match numeric_default {
                        NumericDefault::Zero => 0.0,
                        NumericDefault::TrainingMedian => {
                            training_medians.get(&column.name).copied().unwrap_or(0.0)
                        }
                    });
                    CellValue::Numeric(value)
                }
                FeatureKind::Categorical => CellValue::Category(
                    raw.and_then(categorical_value)
                        .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
                ),
            }
        })
        .collect()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Converts raw training records (cells in schema order) into canonical rows.
/// Numeric gaps take the column median, categorical gaps take `"Unknown"`.
/// Returns the rows together with the medians that were used.
pub fn impute_training_rows(
    schema: &FeatureSchema,
    records: &[Vec<Option<String>>],
) -> (Vec<CanonicalRow>, BTreeMap<String, f64>) {
    let mut medians = BTreeMap::new();
    for (idx, column) in schema.columns().iter().enumerate() {
        if column.kind != FeatureKind::Numeric {
            continue;
        }
        let mut observed: Vec<f64> = records
            .iter()
            .filter_map(|r| r.get(idx).and_then(|c| c.as_deref()).and_then(parse_numeric_str))
            .collect();
        medians.insert(column.name.clone(), median(&mut observed).unwrap_or(0.0));
    }

    let rows = records
        .iter()
        .map(|record| {
            schema
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    let raw = record.get(idx).and_then(|c| c.as_deref());
                    match column.kind {
                        FeatureKind::Numeric => CellValue::Numeric(
                            raw.and_then(parse_numeric_str).unwrap_or_else(|| {
                                medians.get(&column.name).copied().unwrap_or(0.0)
                            }),
                        ),
                        FeatureKind::Categorical => CellValue::Category(
                            raw.map(str::trim)
                                .filter(|s| !s.is_empty())
                                .unwrap_or(UNKNOWN_CATEGORY)
                                .to_string(),
                        ),
                    }
                })
                .collect()
        })
        .collect();

    (rows, medians)
}
