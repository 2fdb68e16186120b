// src/models/survey.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::utils::constants::SURVEY_FIELDS;

/// Financial health category predicted for a business.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FinancialHealth {
    Low,
    Medium,
    High,
}

impl FinancialHealth {
    pub const ALL: [FinancialHealth; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// Dense class index used as the classifier's target value.
    pub fn index(&self) -> u32 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

impl fmt::Display for FinancialHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FinancialHealth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| anyhow!("Unrecognized financial health label '{}'", s))
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace(['-', ' '], "_")
}

fn is_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// One raw survey submission. Untrusted: any field may be missing, null or oddly formatted.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct SurveyResponse {
    fields: BTreeMap<String, JsonValue>,
}

impl SurveyResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: JsonValue =
            serde_json::from_str(raw).context("Survey submission is not valid JSON")?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(map) => Ok(Self {
                fields: map.into_iter().collect(),
            }),
            other => Err(anyhow!(
                "Survey submission must be a JSON object, got {}",
                other
            )),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<JsonValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<JsonValue>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Looks up a field by exact name, then by a case and separator insensitive name.
    /// Null and blank values count as absent.
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        let value = match self.fields.get(field) {
            Some(v) => Some(v),
            None => {
                let wanted = normalize_key(field);
                self.fields
                    .iter()
                    .find(|(k, _)| normalize_key(k) == wanted)
                    .map(|(_, v)| v)
            }
        };
        value.filter(|v| !is_blank(v))
    }

    /// Survey fields that are absent, null or empty. Used by callers that want to reject
    /// incomplete submissions; the preprocessing engine itself accepts them.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        SURVEY_FIELDS
            .iter()
            .filter(|f| self.get(f).is_none())
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Outcome of one assessment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub predicted_category: FinancialHealth,
    pub confidence_scores: BTreeMap<FinancialHealth, f64>,
    pub recommendation: String,
}

impl PredictionResult {
    pub fn max_confidence(&self) -> f64 {
        self.confidence_scores
            .values()
            .copied()
            .fold(0.0_f64, f64::max)
    }
}

/// Two representative businesses for smoke-testing a model.
pub fn sample_survey_responses() -> Vec<SurveyResponse> {
    let samples = [
        json!({
            "country": "zimbabwe",
            "owner_age": 35,
            "owner_sex": "Female",
            "business_age_years": 5,
            "business_age_months": 6,
            "covid_essential_service": "Yes",
            "personal_income": 50000,
            "business_expenses": 25000,
            "business_turnover": 80000,
            "keeps_financial_records": "Yes, always",
            "has_mobile_money": "Have now",
            "has_insurance": "Yes",
            "future_risk_theft_stock": "No",
            "attitude_stable_business_environment": "Yes",
            "compliance_income_tax": "Yes",
            "has_cellphone": "Yes",
            "motivation_make_more_money": "Yes"
        }),
        json!({
            "country": "malawi",
            "owner_age": 28,
            "owner_sex": "Male",
            "business_age_years": 2,
            "business_age_months": 0,
            "covid_essential_service": "No",
            "personal_income": 15000,
            "business_expenses": 12000,
            "business_turnover": 20000,
            "keeps_financial_records": "Yes, sometimes",
            "has_mobile_money": "Never had",
            "has_insurance": "No",
            "future_risk_theft_stock": "Yes",
            "attitude_stable_business_environment": "Don't know or N/A",
            "compliance_income_tax": "No",
            "has_cellphone": "Yes",
            "motivation_make_more_money": "Yes"
        }),
    ];

    samples
        .into_iter()
        .filter_map(|v| SurveyResponse::from_json_value(v).ok())
        .collect()
}
