// src/lifecycle/manager.rs
//
// Acquires a trained artifact at startup. Tiers are tried in order and each one
// either produces an artifact or hands over to the next:
//
//   Unloaded ──load ok──────────────▶ Loaded
//      │ missing / corrupt / schema mismatch
//      ▼
//   FallbackTrain ──train ok─────────▶ Loaded   (optionally persisted)
//      │ dataset missing / training failed
//      ▼
//   Minimal ─────────────────────────▶ Loaded

use anyhow::{Context, Result};
use log::{info, warn};
use std::fmt;

use crate::lifecycle::dataset::{FeatureSelection, TrainingDataset};
use crate::lifecycle::persistence::{load_artifact, save_artifact};
use crate::lifecycle::training::{build_minimal_artifact, train_artifact, TrainingOptions};
use crate::models::artifact::ModelArtifact;
use crate::utils::constants::FALLBACK_FEATURES;
use crate::utils::model_config::ModelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Unloaded,
    FallbackTrain,
    Minimal,
}

/// Which tier produced the artifact. Only used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArtifactSource {
    Persisted,
    FallbackTrained,
    Minimal,
}

impl fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactSource::Persisted => "persisted model",
            ArtifactSource::FallbackTrained => "fallback-trained model",
            ArtifactSource::Minimal => "minimal model",
        };
        write!(f, "{}", name)
    }
}

enum Transition {
    Loaded(ModelArtifact, ArtifactSource),
    Next(AcquisitionState),
}

pub struct LifecycleManager<'a> {
    config: &'a ModelConfig,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(config: &'a ModelConfig) -> Self {
        Self { config }
    }

    /// Runs the tier chain to completion. Always yields a trained artifact unless the
    /// minimal tier itself is broken.
    pub fn acquire(&self) -> Result<ModelArtifact> {
        self.run().map(|(artifact, _)| artifact)
    }

    pub(crate) fn run(&self) -> Result<(ModelArtifact, ArtifactSource)> {
        let mut state = AcquisitionState::Unloaded;
        loop {
            match self.step(state)? {
                Transition::Loaded(artifact, source) => {
                    info!(
                        "✅ Serving {} {} ({} features)",
                        source,
                        artifact.artifact_id(),
                        artifact.schema().len()
                    );
                    return Ok((artifact, source));
                }
                Transition::Next(next) => {
                    info!("🔄 Model acquisition: {:?} -> {:?}", state, next);
                    state = next;
                }
            }
        }
    }

    fn step(&self, state: AcquisitionState) -> Result<Transition> {
        match state {
            AcquisitionState::Unloaded => Ok(match self.load_persisted() {
                Ok(artifact) => Transition::Loaded(artifact, ArtifactSource::Persisted),
                Err(e) => {
                    warn!("Could not load persisted model: {:#}", e);
                    Transition::Next(AcquisitionState::FallbackTrain)
                }
            }),
            AcquisitionState::FallbackTrain => Ok(match self.train_fallback() {
                Ok(artifact) => Transition::Loaded(artifact, ArtifactSource::FallbackTrained),
                Err(e) => {
                    warn!("Fallback training failed: {:#}", e);
                    Transition::Next(AcquisitionState::Minimal)
                }
            }),
            AcquisitionState::Minimal => {
                let artifact = self.build_minimal()?;
                Ok(Transition::Loaded(artifact, ArtifactSource::Minimal))
            }
        }
    }

    pub(crate) fn load_persisted(&self) -> Result<ModelArtifact> {
        let path = &self.config.model_path;
        info!("📂 Loading persisted model from {}", path.display());
        load_artifact(path)
    }

    /// Trains on the secondary dataset with the fixed fallback feature list. Persisting
    /// the result is best effort.
    pub(crate) fn train_fallback(&self) -> Result<ModelArtifact> {
        let path = &self.config.fallback_dataset_path;
        info!("🏋️ Training on fallback dataset {}", path.display());
        let dataset = TrainingDataset::from_csv(path, FeatureSelection::Required(&FALLBACK_FEATURES))?;
        let options = TrainingOptions::from(self.config).without_holdout();
        let (artifact, report) =
            train_artifact(&dataset, &options).context("Training on fallback dataset failed")?;
        report.log_summary();

        if self.config.persist_fallback_model {
            if let Err(e) = save_artifact(&artifact, &self.config.model_path) {
                warn!("Could not persist fallback model: {:#}", e);
            }
        }
        Ok(artifact)
    }

    pub(crate) fn build_minimal(&self) -> Result<ModelArtifact> {
        warn!("⚠️ No real training data available, building minimal model");
        build_minimal_artifact(self.config.random_seed)
    }
}

/// Acquires the artifact a process starts serving with.
pub fn initialize(config: &ModelConfig) -> Result<ModelArtifact> {
    LifecycleManager::new(config).acquire()
}
