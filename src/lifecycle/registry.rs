// src/lifecycle/registry.rs
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::lifecycle::dataset::{FeatureSelection, TrainingDataset};
use crate::lifecycle::manager::initialize;
use crate::lifecycle::persistence::save_artifact;
use crate::lifecycle::training::{train_artifact, TrainingOptions, TrainingReport};
use crate::models::artifact::ModelArtifact;
use crate::models::survey::{PredictionResult, SurveyResponse};
use crate::prediction::{assess, PredictionError, PredictionOptions};
use crate::utils::constants::SURVEY_FIELDS;
use crate::utils::model_config::ModelConfig;

/// Process-wide holder of the artifact being served.
///
/// Readers take an `Arc` snapshot and work against it for the whole request, so a
/// concurrent retrain can only ever be observed as a swap between two complete
/// artifacts. Retrains are serialized among themselves.
pub struct ModelRegistry {
    current: RwLock<Arc<ModelArtifact>>,
    retrain_lock: Mutex<()>,
    config: ModelConfig,
}

impl ModelRegistry {
    pub fn new(artifact: ModelArtifact, config: ModelConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(artifact)),
            retrain_lock: Mutex::new(()),
            config,
        }
    }

    /// Runs model acquisition and wraps the result.
    pub fn initialize(config: ModelConfig) -> Result<Self> {
        let artifact = initialize(&config)?;
        Ok(Self::new(artifact, config))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<ModelArtifact> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replaces the served artifact in one step and returns the one it replaced.
    pub fn publish(&self, artifact: ModelArtifact) -> Arc<ModelArtifact> {
        let next = Arc::new(artifact);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Trains a new artifact from `dataset_path` and publishes it. On any error the
    /// served artifact is left untouched.
    pub fn retrain(&self, dataset_path: &Path) -> Result<TrainingReport> {
        let _serial = self.retrain_lock.lock().unwrap_or_else(PoisonError::into_inner);
        info!("🔁 Retraining from {}", dataset_path.display());

        let dataset = TrainingDataset::from_csv(dataset_path, FeatureSelection::Available(&SURVEY_FIELDS))
            .context("Retrain aborted, previous model kept")?;
        let (artifact, report) = train_artifact(&dataset, &TrainingOptions::from(&self.config))
            .context("Retrain aborted, previous model kept")?;
        report.log_summary();

        let new_id = artifact.artifact_id();
        let previous = self.publish(artifact);
        info!(
            "✅ Published model {} (replaced {})",
            new_id,
            previous.artifact_id()
        );
        Ok(report)
    }

    /// Writes the currently served artifact to the configured model path.
    pub fn save_current(&self) -> Result<()> {
        save_artifact(&self.snapshot(), &self.config.model_path)
    }

    pub fn assess(&self, survey: &SurveyResponse) -> Result<PredictionResult, PredictionError> {
        let artifact = self.snapshot();
        let result = assess(&artifact, survey, &PredictionOptions::from(&self.config));
        if let Err(e) = &result {
            warn!("Prediction against model {} failed: {}", artifact.artifact_id(), e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ForestParams;
    use crate::lifecycle::test_support::write_survey_csv;
    use crate::lifecycle::training::build_minimal_artifact;
    use crate::models::survey::sample_survey_responses;
    use crate::utils::constants::MINIMAL_FEATURES;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use tempfile::tempdir;

    fn small_config(dir: &Path) -> ModelConfig {
        ModelConfig {
            model_path: dir.join("model.json"),
            fallback_dataset_path: dir.join("missing.csv"),
            forest: ForestParams {
                n_trees: 8,
                max_depth: 6,
                min_samples_split: 2,
                min_samples_leaf: 1,
                seed: 11,
            },
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_retrain_publishes_new_artifact() {
        let dir = tempdir().unwrap();
        let config = small_config(dir.path());
        let registry = ModelRegistry::initialize(config).unwrap();
        let before = registry.snapshot();
        assert_eq!(before.schema().len(), MINIMAL_FEATURES.len());

        let data = dir.path().join("Train.csv");
        write_survey_csv(&data, &SURVEY_FIELDS, 90);
        let report = registry.retrain(&data).unwrap();
        assert_eq!(report.feature_columns.len(), SURVEY_FIELDS.len());
        assert!(report.accuracy.is_some());

        let after = registry.snapshot();
        assert_ne!(after.artifact_id(), before.artifact_id());
        assert_eq!(after.schema().len(), SURVEY_FIELDS.len());
        // the old snapshot is still whole
        assert_eq!(before.schema().len(), MINIMAL_FEATURES.len());
    }

    #[test]
    fn test_failed_retrain_keeps_previous_artifact() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new(build_minimal_artifact(3).unwrap(), small_config(dir.path()));
        let before = registry.snapshot().artifact_id();

        assert!(registry.retrain(&dir.path().join("nope.csv")).is_err());

        let bad = dir.path().join("bad.csv");
        std::fs::write(&bad, "country,Target\nmalawi,Excellent\n").unwrap();
        assert!(registry.retrain(&bad).is_err());

        assert_eq!(registry.snapshot().artifact_id(), before);
        assert!(registry.assess(&SurveyResponse::new()).is_ok());
    }

    fn assert_whole(artifact: &ModelArtifact) {
        let names = artifact.schema().names();
        assert!(artifact.encoders().feature_names().all(|f| names.contains(&f)));
        assert!(artifact.scaling().feature_names().all(|f| names.contains(&f)));
    }

    #[test]
    fn test_readers_see_whole_artifacts_during_retrain() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new(build_minimal_artifact(3).unwrap(), small_config(dir.path()));
        let initial_id = registry.snapshot().artifact_id();
        let data = dir.path().join("Train.csv");
        write_survey_csv(&data, &SURVEY_FIELDS, 60);
        let surveys = sample_survey_responses();
        let retrain_done = AtomicBool::new(false);

        let saw_swap = thread::scope(|scope| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let mut reads = 0usize;
                        loop {
                            // read the flag first: once it is set the publish already happened
                            let finished = retrain_done.load(Ordering::SeqCst);
                            let artifact = registry.snapshot();
                            assert_whole(&artifact);
                            for survey in &surveys {
                                let encoded = artifact
                                    .encode_survey(survey, registry.config().numeric_default);
                                assert_eq!(encoded.len(), artifact.schema().len());
                                assert!(crate::prediction::predict(&artifact, &encoded, 0.6).is_ok());
                            }
                            reads += 1;
                            if artifact.artifact_id() != initial_id {
                                return Some(reads);
                            }
                            if finished {
                                return None;
                            }
                        }
                    })
                })
                .collect();
            let result = registry.retrain(&data);
            retrain_done.store(true, Ordering::SeqCst);
            assert!(result.is_ok());
            readers
                .into_iter()
                .map(|reader| reader.join().unwrap())
                .collect::<Vec<_>>()
        });

        // every reader kept reading until it observed the published artifact
        assert!(saw_swap.iter().all(Option::is_some));
        let current = registry.snapshot();
        assert_eq!(current.schema().len(), SURVEY_FIELDS.len());
        assert_whole(&current);
    }

    #[test]
    fn test_save_current_round_trips() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::new(build_minimal_artifact(3).unwrap(), small_config(dir.path()));
        registry.save_current().unwrap();
        let reloaded = ModelRegistry::initialize(registry.config().clone()).unwrap();
        assert_eq!(
            reloaded.snapshot().artifact_id(),
            registry.snapshot().artifact_id()
        );
    }
}
