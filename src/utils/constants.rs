// src/utils/constants.rs

/// Every field a survey submission may carry, in the order the training pipeline
/// prefers them.
pub const SURVEY_FIELDS: [&str; 17] = [
    "country",
    "owner_age",
    "owner_sex",
    "business_age_years",
    "business_age_months",
    "covid_essential_service",
    "personal_income",
    "business_expenses",
    "business_turnover",
    "keeps_financial_records",
    "has_mobile_money",
    "has_insurance",
    "future_risk_theft_stock",
    "attitude_stable_business_environment",
    "compliance_income_tax",
    "has_cellphone",
    "motivation_make_more_money",
];

/// Fixed feature list used when training on the synthetic fallback dataset.
pub const FALLBACK_FEATURES: [&str; 15] = [
    "country",
    "owner_age",
    "owner_sex",
    "business_age_years",
    "covid_essential_service",
    "personal_income",
    "business_expenses",
    "business_turnover",
    "keeps_financial_records",
    "has_mobile_money",
    "has_insurance",
    "compliance_income_tax",
    "has_cellphone",
    "attitude_stable_business_environment",
    "future_risk_theft_stock",
];

/// Schema of the last-resort model that is fit on random vectors.
pub const MINIMAL_FEATURES: [&str; 6] = [
    "country",
    "owner_age",
    "business_age_years",
    "personal_income",
    "business_turnover",
    "has_insurance",
];

/// Fields treated as numbers; everything else is categorical.
pub const NUMERIC_FIELDS: [&str; 6] = [
    "personal_income",
    "business_expenses",
    "business_turnover",
    "owner_age",
    "business_age_years",
    "business_age_months",
];

pub const LABEL_COLUMN: &str = "Target";
pub const UNKNOWN_CATEGORY: &str = "Unknown";

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;
pub const LOW_CONFIDENCE_CAVEAT: &str = " Note: Prediction confidence is moderate. Consider providing more detailed financial information.";

pub const MINIMAL_SAMPLE_COUNT: usize = 100;
/// Class prior (Low, Medium, High) used to label the minimal model's random samples.
pub const MINIMAL_CLASS_PRIOR: [f64; 3] = [0.6, 0.3, 0.1];

pub const DEFAULT_RANDOM_SEED: u64 = 42;

pub fn is_numeric_field(name: &str) -> bool {
    NUMERIC_FIELDS.contains(&name)
}

pub fn is_survey_field(name: &str) -> bool {
    SURVEY_FIELDS.contains(&name)
}
