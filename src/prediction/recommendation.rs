// src/prediction/recommendation.rs
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::models::survey::FinancialHealth;
use crate::utils::constants::LOW_CONFIDENCE_CAVEAT;

static RECOMMENDATIONS: Lazy<BTreeMap<FinancialHealth, &'static str>> = Lazy::new(|| {
    [
        (
            FinancialHealth::High,
            "Excellent financial health! Continue current practices and consider expansion opportunities.",
        ),
        (
            FinancialHealth::Medium,
            "Good financial health with room for improvement. Focus on increasing revenue and managing expenses.",
        ),
        (
            FinancialHealth::Low,
            "Financial health needs attention. Consider financial planning, expense reduction, and revenue diversification.",
        ),
    ]
    .into_iter()
    .collect()
});

const GENERIC_RECOMMENDATION: &str = "Financial health assessment completed.";

/// Advisory text for a predicted label. A caveat is appended when the most likely class
/// has probability below `confidence_threshold`.
pub fn recommendation(
    label: FinancialHealth,
    distribution: &BTreeMap<FinancialHealth, f64>,
    confidence_threshold: f64,
) -> String {
    let mut text = RECOMMENDATIONS
        .get(&label)
        .copied()
        .unwrap_or(GENERIC_RECOMMENDATION)
        .to_string();

    let confidence = distribution.values().copied().fold(0.0_f64, f64::max);
    if confidence < confidence_threshold {
        text.push_str(LOW_CONFIDENCE_CAVEAT);
    }
    text
}
