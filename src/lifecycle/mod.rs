// src/lifecycle/mod.rs
pub mod dataset;
pub mod manager;
pub mod persistence;
pub mod registry;
pub mod training;

#[cfg(test)]
pub(crate) mod test_support;

pub use dataset::{FeatureSelection, TrainingDataset};
pub use manager::{initialize, AcquisitionState, LifecycleManager};
pub use persistence::{load_artifact, save_artifact};
pub use registry::ModelRegistry;
pub use training::{build_minimal_artifact, train_artifact, ClassMetrics, TrainingOptions, TrainingReport};
