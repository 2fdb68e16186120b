// src/lifecycle/training.rs
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use ndarray::{Array2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classifier::{Classifier, ClassifierModel, ForestParams, PriorClassifier, SurveyForest};
use crate::lifecycle::dataset::TrainingDataset;
use crate::models::artifact::{FeatureSchema, ModelArtifact};
use crate::models::survey::FinancialHealth;
use crate::preprocessing::normalize::impute_training_rows;
use crate::preprocessing::{EncodingTables, ScalingParameters};
use crate::utils::constants::{MINIMAL_CLASS_PRIOR, MINIMAL_FEATURES, MINIMAL_SAMPLE_COUNT};
use crate::utils::model_config::ModelConfig;
use crate::utils::progress_config::training_progress_bar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingOptions {
    pub forest: ForestParams,
    /// Share of each class held out for evaluation. Zero trains on every row.
    pub holdout_fraction: f64,
    pub seed: u64,
    pub show_progress: bool,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        let forest = ForestParams::default();
        Self {
            forest,
            holdout_fraction: 0.2,
            seed: forest.seed,
            show_progress: false,
        }
    }
}

impl From<&ModelConfig> for TrainingOptions {
    fn from(config: &ModelConfig) -> Self {
        Self {
            forest: config.forest,
            holdout_fraction: config.holdout_fraction,
            seed: config.random_seed,
            show_progress: config.show_progress,
        }
    }
}

impl TrainingOptions {
    pub fn without_holdout(mut self) -> Self {
        self.holdout_fraction = 0.0;
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Outcome of a training run. Metrics are present only when a holdout was evaluated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub n_samples: usize,
    pub n_train: usize,
    pub n_holdout: usize,
    pub feature_columns: Vec<String>,
    pub class_counts: BTreeMap<FinancialHealth, usize>,
    pub accuracy: Option<f64>,
    pub per_class: BTreeMap<FinancialHealth, ClassMetrics>,
}

impl TrainingReport {
    pub fn log_summary(&self) {
        info!(
            "📊 Trained on {} of {} rows ({} held out), {} features",
            self.n_train,
            self.n_samples,
            self.n_holdout,
            self.feature_columns.len()
        );
        match self.accuracy {
            Some(accuracy) => {
                info!("   Holdout accuracy: {:.2}%", accuracy * 100.0);
                for (class, m) in &self.per_class {
                    info!(
                        "   {:<6} precision {:.3} recall {:.3} f1 {:.3} support {}",
                        class.as_str(),
                        m.precision,
                        m.recall,
                        m.f1,
                        m.support
                    );
                }
            }
            None => info!("   No holdout evaluation was run"),
        }
    }
}

/// Splits row indices per class so each class keeps its share in the holdout.
/// Classes with a single row stay entirely in training.
fn stratified_split(
    labels: &[FinancialHealth],
    holdout_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut by_class: BTreeMap<FinancialHealth, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate() {
        by_class.entry(*label).or_default().push(idx);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut holdout = Vec::new();
    for (_, mut indices) in by_class {
        indices.shuffle(&mut rng);
        let n_holdout = if indices.len() < 2 {
            0
        } else {
            ((indices.len() as f64 * holdout_fraction).round() as usize).min(indices.len() - 1)
        };
        holdout.extend_from_slice(&indices[..n_holdout]);
        train.extend_from_slice(&indices[n_holdout..]);
    }
    train.sort_unstable();
    holdout.sort_unstable();
    (train, holdout)
}

pub(crate) fn evaluate(
    truth: &[FinancialHealth],
    predicted: &[FinancialHealth],
) -> (f64, BTreeMap<FinancialHealth, ClassMetrics>) {
    let total = truth.len().max(1) as f64;
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();

    let per_class = FinancialHealth::ALL
        .iter()
        .filter(|c| truth.contains(*c) || predicted.contains(*c))
        .map(|class| {
            let tp = truth
                .iter()
                .zip(predicted)
                .filter(|(t, p)| *t == class && *p == class)
                .count() as f64;
            let predicted_n = predicted.iter().filter(|p| *p == class).count() as f64;
            let support = truth.iter().filter(|t| *t == class).count();
            let precision = if predicted_n > 0.0 { tp / predicted_n } else { 0.0 };
            let recall = if support > 0 { tp / support as f64 } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            (
                *class,
                ClassMetrics {
                    precision,
                    recall,
                    f1,
                    support,
                },
            )
        })
        .collect();

    (correct as f64 / total, per_class)
}

/// Fits preprocessing and a forest on a labelled dataset and assembles a servable artifact.
pub fn train_artifact(
    dataset: &TrainingDataset,
    options: &TrainingOptions,
) -> Result<(ModelArtifact, TrainingReport)> {
    if dataset.is_empty() {
        return Err(anyhow!("Cannot train on an empty dataset"));
    }
    let schema = dataset.schema().clone();
    let labels = dataset.labels();

    let (rows, medians) = impute_training_rows(&schema, dataset.records());
    debug!("Imputed training medians: {:?}", medians);

    let (encoders, mut matrix) =
        EncodingTables::fit(&schema, &rows).context("Failed to fit categorical encoders")?;
    let scaling = ScalingParameters::fit(&schema, &matrix);
    scaling.apply_matrix(&schema, &mut matrix);

    let (train_idx, holdout_idx) = if options.holdout_fraction > 0.0 {
        stratified_split(labels, options.holdout_fraction, options.seed)
    } else {
        ((0..labels.len()).collect(), Vec::new())
    };
    let x_train = matrix.select(Axis(0), &train_idx);
    let y_train: Vec<FinancialHealth> = train_idx.iter().map(|&i| labels[i]).collect();

    let mut forest_params = options.forest;
    forest_params.seed = options.seed;
    let progress = training_progress_bar(
        options.show_progress,
        forest_params.n_trees as u64,
        "fitting decision trees",
    );
    let mut forest = SurveyForest::new(forest_params).with_progress(progress);
    forest
        .fit(&x_train, &y_train)
        .context("Failed to fit the survey forest")?;

    let (accuracy, per_class) = if holdout_idx.is_empty() {
        (None, BTreeMap::new())
    } else {
        let x_holdout = matrix.select(Axis(0), &holdout_idx);
        let y_holdout: Vec<FinancialHealth> = holdout_idx.iter().map(|&i| labels[i]).collect();
        let predicted = forest.predict_batch(&x_holdout)?;
        let (accuracy, per_class) = evaluate(&y_holdout, &predicted);
        (Some(accuracy), per_class)
    };

    let report = TrainingReport {
        n_samples: labels.len(),
        n_train: train_idx.len(),
        n_holdout: holdout_idx.len(),
        feature_columns: schema.names().into_iter().map(String::from).collect(),
        class_counts: dataset.class_counts(),
        accuracy,
        per_class,
    };

    let artifact = ModelArtifact::new(
        schema,
        encoders,
        scaling,
        medians,
        ClassifierModel::Forest(forest),
    )?;
    Ok((artifact, report))
}

/// The last-resort model: a class-prior classifier fit on seeded random vectors over
/// the minimal schema. Needs no external input.
pub fn build_minimal_artifact(seed: u64) -> Result<ModelArtifact> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_features = MINIMAL_FEATURES.len();

    let x = Array2::from_shape_fn((MINIMAL_SAMPLE_COUNT, n_features), |_| rng.gen::<f64>());
    let weights = WeightedIndex::new(MINIMAL_CLASS_PRIOR)
        .map_err(|e| anyhow!("Invalid minimal class prior: {}", e))?;
    let labels: Vec<FinancialHealth> = (0..MINIMAL_SAMPLE_COUNT)
        .filter_map(|_| FinancialHealth::from_index(weights.sample(&mut rng) as u32))
        .collect();

    let mut prior = PriorClassifier::new();
    prior.fit(&x, &labels)?;
    if prior.classes().len() < FinancialHealth::ALL.len() {
        warn!(
            "Minimal model only saw {:?} in its random sample",
            prior.classes()
        );
    }

    ModelArtifact::new(
        FeatureSchema::from_names(&MINIMAL_FEATURES),
        EncodingTables::new(),
        ScalingParameters::none(),
        BTreeMap::new(),
        ClassifierModel::Prior(prior),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::dataset::FeatureSelection;
    use crate::models::survey::SurveyResponse;
    use crate::prediction::{assess, PredictionOptions};
    use crate::utils::constants::SURVEY_FIELDS;
    use FinancialHealth::*;

    fn synthetic_csv(rows: usize) -> String {
        let mut csv = String::from("country,owner_age,personal_income,has_insurance,Target\n");
        for i in 0..rows {
            let (country, income, insured, target) = match i % 3 {
                0 => ("malawi", 200 + i, "No", "Low"),
                1 => ("lesotho", 5_000 + i, "Yes", "Medium"),
                _ => ("eswatini", 50_000 + i, "Yes", "High"),
            };
            let age = if i % 7 == 0 { String::new() } else { (25 + i % 30).to_string() };
            csv.push_str(&format!("{},{},{},{},{}\n", country, age, income, insured, target));
        }
        csv
    }

    fn fast_options() -> TrainingOptions {
        TrainingOptions {
            forest: ForestParams {
                n_trees: 10,
                max_depth: 6,
                min_samples_split: 2,
                min_samples_leaf: 1,
                seed: 3,
            },
            holdout_fraction: 0.2,
            seed: 3,
            show_progress: false,
        }
    }

    #[test]
    fn test_stratified_split_keeps_every_class_in_training() {
        let labels = vec![Low, Low, Low, Low, Low, Medium, Medium, High];
        let (train, holdout) = stratified_split(&labels, 0.4, 1);
        assert_eq!(train.len() + holdout.len(), labels.len());
        for class in [Low, Medium, High] {
            assert!(train.iter().any(|&i| labels[i] == class));
        }
        assert_eq!(holdout.iter().filter(|&&i| labels[i] == Low).count(), 2);
        assert!(holdout.iter().all(|&i| labels[i] != High));
        assert_eq!(stratified_split(&labels, 0.4, 1), (train, holdout));
    }

    #[test]
    fn test_evaluate_metrics() {
        let truth = [Low, Low, High, High];
        let predicted = [Low, High, High, High];
        let (accuracy, per_class) = evaluate(&truth, &predicted);
        assert_eq!(accuracy, 0.75);
        assert_eq!(per_class[&Low].precision, 1.0);
        assert_eq!(per_class[&Low].recall, 0.5);
        assert_eq!(per_class[&High].support, 2);
        assert!(!per_class.contains_key(&Medium));
    }

    #[test]
    fn test_train_artifact_end_to_end() {
        let csv = synthetic_csv(90);
        let dataset =
            TrainingDataset::from_reader(csv.as_bytes(), FeatureSelection::Available(&SURVEY_FIELDS))
                .unwrap();
        let (artifact, report) = train_artifact(&dataset, &fast_options()).unwrap();

        assert_eq!(report.n_samples, 90);
        assert_eq!(report.n_holdout, 18);
        assert_eq!(report.n_train, 72);
        assert!(report.accuracy.unwrap() > 0.8);
        assert_eq!(report.feature_columns.len(), 4);
        assert!(artifact.validate().is_ok());
        assert!(artifact.encoders().get("country").is_some());
        assert!(artifact.scaling().get("personal_income").is_some());

        let survey = SurveyResponse::new()
            .with("country", "eswatini")
            .with("owner_age", 40)
            .with("personal_income", 50_050)
            .with("has_insurance", "Yes");
        let result = assess(&artifact, &survey, &PredictionOptions::default()).unwrap();
        assert_eq!(result.predicted_category, High);
    }

    #[test]
    fn test_sparse_lowercase_survey_against_trained_model() {
        let csv = synthetic_csv(60);
        let dataset =
            TrainingDataset::from_reader(csv.as_bytes(), FeatureSelection::Available(&SURVEY_FIELDS))
                .unwrap();
        let (artifact, _) = train_artifact(&dataset, &fast_options()).unwrap();
        let survey = SurveyResponse::new()
            .with("owner_age", "29")
            .with("has_insurance", "yes");

        let row = crate::preprocessing::normalize(
            &survey,
            artifact.schema(),
            crate::preprocessing::NumericDefault::Zero,
            &BTreeMap::new(),
        );
        assert_eq!(row[0], crate::preprocessing::CellValue::Category("Unknown".to_string()));
        assert_eq!(row[1], crate::preprocessing::CellValue::Numeric(29.0));

        let encoded = artifact.encode_survey(&survey, crate::preprocessing::NumericDefault::Zero);
        assert_eq!(encoded.len(), artifact.schema().len());
        let insurance = artifact.encoders().get("has_insurance").unwrap();
        assert_eq!(encoded[3], insurance.encode("Yes") as f64);

        let result = assess(&artifact, &survey, &PredictionOptions::default()).unwrap();
        assert!(FinancialHealth::ALL.contains(&result.predicted_category));
        assert_eq!(result.confidence_scores.len(), 3);
    }

    #[test]
    fn test_train_without_holdout_has_no_metrics() {
        let csv = synthetic_csv(30);
        let dataset =
            TrainingDataset::from_reader(csv.as_bytes(), FeatureSelection::Available(&SURVEY_FIELDS))
                .unwrap();
        let (_, report) = train_artifact(&dataset, &fast_options().without_holdout()).unwrap();
        assert_eq!(report.n_train, 30);
        assert!(report.accuracy.is_none());
        assert!(report.per_class.is_empty());
    }

    #[test]
    fn test_imbalanced_and_single_class_datasets_train() {
        let mut csv = String::from("country,owner_age,Target\n");
        for i in 0..40 {
            csv.push_str(&format!("malawi,{},Low\n", 20 + i));
        }
        csv.push_str("lesotho,70,High\n");
        let dataset =
            TrainingDataset::from_reader(csv.as_bytes(), FeatureSelection::Available(&SURVEY_FIELDS))
                .unwrap();
        let (artifact, report) = train_artifact(&dataset, &fast_options().without_holdout()).unwrap();
        assert_eq!(report.n_train, 41);
        assert_eq!(artifact.classifier().classes(), &[Low, High]);

        let (_, report) = train_artifact(&dataset, &fast_options()).unwrap();
        assert_eq!(report.n_holdout, 8);

        let single: String = std::iter::once("country,owner_age,Target\n".to_string())
            .chain((0..10).map(|i| format!("malawi,{},Low\n", 30 + i)))
            .collect();
        let dataset = TrainingDataset::from_reader(
            single.as_bytes(),
            FeatureSelection::Available(&SURVEY_FIELDS),
        )
        .unwrap();
        let (artifact, _) = train_artifact(&dataset, &fast_options()).unwrap();
        let result = assess(&artifact, &SurveyResponse::new(), &PredictionOptions::default()).unwrap();
        assert_eq!(result.predicted_category, Low);
        assert_eq!(result.confidence_scores[&Low], 1.0);
    }

    #[test]
    fn test_minimal_artifact() {
        let artifact = build_minimal_artifact(42).unwrap();
        assert!(artifact.is_trained());
        assert_eq!(artifact.schema().len(), MINIMAL_FEATURES.len());
        assert!(artifact.classifier().classes().contains(&Low));

        let result =
            assess(&artifact, &SurveyResponse::new(), &PredictionOptions::default()).unwrap();
        assert_eq!(result.predicted_category, Low);
        let sum: f64 = result.confidence_scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);

        let again = build_minimal_artifact(42).unwrap();
        assert_eq!(
            again.classifier().predict_proba(&[0.0; 6]).unwrap(),
            artifact.classifier().predict_proba(&[0.0; 6]).unwrap()
        );
    }
}
