// src/prediction/engine.rs
use log::debug;
use std::collections::BTreeMap;
use std::fmt;

use crate::classifier::Classifier;
use crate::models::artifact::ModelArtifact;
use crate::models::survey::{FinancialHealth, PredictionResult, SurveyResponse};
use crate::preprocessing::normalize::NumericDefault;
use crate::prediction::recommendation::recommendation;
use crate::utils::constants::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::utils::model_config::ModelConfig;

#[derive(Debug)]
pub enum PredictionError {
    /// The artifact was never trained; the lifecycle manager was bypassed.
    NotTrained,
    DimensionMismatch { expected: usize, actual: usize },
    Classifier(anyhow::Error),
}

impl fmt::Display for PredictionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionError::NotTrained => {
                write!(f, "Model must be trained before making predictions")
            }
            PredictionError::DimensionMismatch { expected, actual } => write!(
                f,
                "Encoded row has {} features but the model expects {}",
                actual, expected
            ),
            PredictionError::Classifier(e) => write!(f, "Classifier failed: {}", e),
        }
    }
}

impl std::error::Error for PredictionError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionOptions {
    pub confidence_threshold: f64,
    pub numeric_default: NumericDefault,
}

impl Default for PredictionOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            numeric_default: NumericDefault::Zero,
        }
    }
}

impl From<&ModelConfig> for PredictionOptions {
    fn from(config: &ModelConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            numeric_default: config.numeric_default,
        }
    }
}

fn clean_distribution(raw: Vec<(FinancialHealth, f64)>) -> BTreeMap<FinancialHealth, f64> {
    let clamped: Vec<(FinancialHealth, f64)> = raw
        .into_iter()
        .map(|(c, p)| (c, if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }))
        .collect();
    let total: f64 = clamped.iter().map(|(_, p)| p).sum();
    if total <= 0.0 {
        let uniform = 1.0 / clamped.len().max(1) as f64;
        return clamped.into_iter().map(|(c, _)| (c, uniform)).collect();
    }
    clamped.into_iter().map(|(c, p)| (c, p / total)).collect()
}

/// Runs the classifier on an already encoded row.
pub fn predict(
    artifact: &ModelArtifact,
    encoded: &[f64],
    confidence_threshold: f64,
) -> Result<PredictionResult, PredictionError> {
    if !artifact.is_trained() {
        return Err(PredictionError::NotTrained);
    }
    let expected = artifact.schema().len();
    if encoded.len() != expected {
        return Err(PredictionError::DimensionMismatch {
            expected,
            actual: encoded.len(),
        });
    }

    let classifier = artifact.classifier();
    let predicted_category = classifier
        .predict(encoded)
        .map_err(PredictionError::Classifier)?;
    let confidence_scores = clean_distribution(
        classifier
            .predict_proba(encoded)
            .map_err(PredictionError::Classifier)?,
    );
    debug!(
        "Predicted {} with distribution {:?}",
        predicted_category, confidence_scores
    );

    let recommendation = recommendation(predicted_category, &confidence_scores, confidence_threshold);
    Ok(PredictionResult {
        predicted_category,
        confidence_scores,
        recommendation,
    })
}

/// Full request path: preprocess one survey against the artifact and predict.
pub fn assess(
    artifact: &ModelArtifact,
    survey: &SurveyResponse,
    options: &PredictionOptions,
) -> Result<PredictionResult, PredictionError> {
    if !artifact.is_trained() {
        return Err(PredictionError::NotTrained);
    }
    let encoded = artifact.encode_survey(survey, options.numeric_default);
    predict(artifact, &encoded, options.confidence_threshold)
}
