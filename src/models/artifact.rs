// src/models/artifact.rs
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::classifier::{Classifier, ClassifierModel};
use crate::models::survey::{FinancialHealth, SurveyResponse};
use crate::preprocessing::normalize::{normalize, NumericDefault};
use crate::preprocessing::{EncodingTables, ScalingParameters};
use crate::utils::constants::{is_numeric_field, is_survey_field};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FeatureColumn {
    pub name: String,
    pub kind: FeatureKind,
}

/// Ordered canonical features. The order is the column order of every vector the
/// classifier sees.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let columns = names
            .iter()
            .map(|n| {
                let name = n.as_ref().to_string();
                let kind = if is_numeric_field(&name) {
                    FeatureKind::Numeric
                } else {
                    FeatureKind::Categorical
                };
                FeatureColumn { name, kind }
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn categorical_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind == FeatureKind::Categorical)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Everything needed to serve predictions. Immutable once built; a retrain builds a
/// new artifact rather than touching this one.
#[derive(Serialize, Deserialize, Debug)]
pub struct ModelArtifact {
    artifact_id: Uuid,
    trained_at: DateTime<Utc>,
    schema: FeatureSchema,
    encoders: EncodingTables,
    scaling: ScalingParameters,
    /// Column medians seen during training, available as an inference default.
    #[serde(default)]
    training_medians: BTreeMap<String, f64>,
    classifier: ClassifierModel,
    is_trained: bool,
}

/// Human-readable description of an artifact.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtifactSummary {
    pub artifact_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub is_trained: bool,
    pub feature_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub target_classes: Vec<FinancialHealth>,
    pub classifier: String,
}

impl ModelArtifact {
    /// Assembles and validates a trained artifact.
    pub fn new(
        schema: FeatureSchema,
        encoders: EncodingTables,
        scaling: ScalingParameters,
        training_medians: BTreeMap<String, f64>,
        classifier: ClassifierModel,
    ) -> Result<Self> {
        let artifact = Self {
            artifact_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            schema,
            encoders,
            scaling,
            training_medians,
            classifier,
            is_trained: true,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn artifact_id(&self) -> Uuid {
        self.artifact_id
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encoders(&self) -> &EncodingTables {
        &self.encoders
    }

    pub fn scaling(&self) -> &ScalingParameters {
        &self.scaling
    }

    pub fn classifier(&self) -> &ClassifierModel {
        &self.classifier
    }

    pub fn is_trained(&self) -> bool {
        self.is_trained
    }

    /// Checks the structural invariants an artifact must hold before it may be served.
    pub fn validate(&self) -> Result<()> {
        if !self.is_trained {
            return Err(anyhow!("Artifact is not marked as trained"));
        }
        if self.schema.is_empty() {
            return Err(anyhow!("Artifact has an empty feature schema"));
        }
        match self.classifier.n_features() {
            Some(n) if n == self.schema.len() => {}
            Some(n) => {
                return Err(anyhow!(
                    "Feature schema has {} columns but the classifier expects {}",
                    self.schema.len(),
                    n
                ))
            }
            None => return Err(anyhow!("Classifier has not been fitted")),
        }
        let names = self.schema.names();
        if let Some(stray) = self
            .encoders
            .feature_names()
            .chain(self.scaling.feature_names())
            .find(|f| !names.contains(f))
        {
            return Err(anyhow!(
                "Preprocessing parameters reference '{}', which is not in the schema",
                stray
            ));
        }
        Ok(())
    }

    /// Validation plus the checks that only apply to artifacts read from disk:
    /// every column must still be a field this build knows how to read from a survey,
    /// with the kind this build assigns to it.
    pub fn validate_against_survey_fields(&self) -> Result<()> {
        self.validate()?;
        let current = FeatureSchema::from_names(&self.schema.names());
        if let Some(column) = self
            .schema
            .columns()
            .iter()
            .zip(current.columns())
            .find(|(stored, now)| !is_survey_field(&stored.name) || stored.kind != now.kind)
            .map(|(stored, _)| stored)
        {
            return Err(anyhow!(
                "Persisted schema column '{}' ({:?}) does not match the current survey fields",
                column.name,
                column.kind
            ));
        }
        Ok(())
    }

    /// Normalizes, encodes and scales one survey into the classifier's input vector.
    pub fn encode_survey(&self, survey: &SurveyResponse, numeric_default: NumericDefault) -> Vec<f64> {
        let row = normalize(survey, &self.schema, numeric_default, &self.training_medians);
        let mut encoded = self.encoders.encode_row(&self.schema, &row);
        self.scaling.apply_row(&self.schema, &mut encoded);
        encoded
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            artifact_id: self.artifact_id,
            trained_at: self.trained_at,
            is_trained: self.is_trained,
            feature_columns: self.schema.names().into_iter().map(String::from).collect(),
            categorical_columns: self
                .schema
                .categorical_names()
                .into_iter()
                .map(String::from)
                .collect(),
            target_classes: self.classifier.classes().to_vec(),
            classifier: self.classifier.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::prior::PriorClassifier;
    use crate::preprocessing::normalize::CellValue;
    use crate::utils::constants::MINIMAL_FEATURES;
    use ndarray::Array2;

    fn prior_classifier(n_features: usize) -> ClassifierModel {
        let mut prior = PriorClassifier::new();
        let x = Array2::zeros((3, n_features));
        prior
            .fit(
                &x,
                &[FinancialHealth::Low, FinancialHealth::Low, FinancialHealth::High],
            )
            .unwrap();
        ClassifierModel::Prior(prior)
    }

    #[test]
    fn test_schema_kinds() {
        let schema = FeatureSchema::from_names(&MINIMAL_FEATURES);
        assert_eq!(schema.len(), 6);
        assert_eq!(schema.columns()[1].kind, FeatureKind::Numeric);
        assert_eq!(schema.categorical_names(), vec!["country", "has_insurance"]);
    }

    #[test]
    fn test_schema_length_must_match_classifier() {
        let schema = FeatureSchema::from_names(&MINIMAL_FEATURES);
        let result = ModelArtifact::new(
            schema,
            EncodingTables::new(),
            ScalingParameters::none(),
            BTreeMap::new(),
            prior_classifier(4),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unfitted_classifier_is_rejected() {
        let schema = FeatureSchema::from_names(&MINIMAL_FEATURES);
        let result = ModelArtifact::new(
            schema,
            EncodingTables::new(),
            ScalingParameters::none(),
            BTreeMap::new(),
            ClassifierModel::Prior(PriorClassifier::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_preprocessing_outside_schema_is_rejected() {
        let other = FeatureSchema::from_names(&["owner_sex"]);
        let (encoders, _) =
            EncodingTables::fit(&other, &[vec![CellValue::Category("Male".into())]]).unwrap();
        let result = ModelArtifact::new(
            FeatureSchema::from_names(&MINIMAL_FEATURES),
            encoders,
            ScalingParameters::none(),
            BTreeMap::new(),
            prior_classifier(6),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_foreign_column_fails_survey_check() {
        let artifact = ModelArtifact::new(
            FeatureSchema::from_names(&["country", "favourite_colour"]),
            EncodingTables::new(),
            ScalingParameters::none(),
            BTreeMap::new(),
            prior_classifier(2),
        )
        .unwrap();
        assert!(artifact.validate().is_ok());
        assert!(artifact.validate_against_survey_fields().is_err());
    }

    #[test]
    fn test_encode_survey_matches_schema_length() {
        let artifact = ModelArtifact::new(
            FeatureSchema::from_names(&MINIMAL_FEATURES),
            EncodingTables::new(),
            ScalingParameters::none(),
            BTreeMap::new(),
            prior_classifier(6),
        )
        .unwrap();
        let survey = SurveyResponse::new().with("owner_age", "29").with("extra", "ignored");
        let encoded = artifact.encode_survey(&survey, NumericDefault::Zero);
        assert_eq!(encoded, vec![0.0, 29.0, 0.0, 0.0, 0.0, 0.0]);

        let summary = artifact.summary();
        assert_eq!(summary.feature_columns.len(), 6);
        assert_eq!(summary.target_classes, vec![FinancialHealth::Low, FinancialHealth::High]);
    }
}
