//! Runtime configuration for model acquisition, training and prediction.
//! Everything is read from environment variables so deployments can tune it without a rebuild.

use log::{info, warn};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::classifier::forest::ForestParams;
use crate::preprocessing::normalize::NumericDefault;
use crate::utils::constants::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_RANDOM_SEED};

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub primary_dataset_path: PathBuf,
    pub fallback_dataset_path: PathBuf,
    /// Whether an artifact produced by fallback training is written to `model_path`.
    pub persist_fallback_model: bool,
    pub confidence_threshold: f64,
    /// What a missing numeric survey field becomes at inference time.
    pub numeric_default: NumericDefault,
    pub forest: ForestParams,
    pub holdout_fraction: f64,
    pub random_seed: u64,
    pub show_progress: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("trained_financial_health_model.json"),
            primary_dataset_path: PathBuf::from("Train.csv"),
            fallback_dataset_path: PathBuf::from("Train_dummy.csv"),
            persist_fallback_model: false,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            numeric_default: NumericDefault::Zero,
            forest: ForestParams::default(),
            holdout_fraction: 0.2,
            random_seed: DEFAULT_RANDOM_SEED,
            show_progress: false,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "Invalid value '{}' for {}, falling back to default {}",
                    raw, key, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

fn env_path_or(key: &str, default: PathBuf) -> PathBuf {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

impl ModelConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let confidence_threshold = env_or("CONFIDENCE_THRESHOLD", defaults.confidence_threshold);
        let confidence_threshold = if (0.0..=1.0).contains(&confidence_threshold) {
            confidence_threshold
        } else {
            warn!(
                "CONFIDENCE_THRESHOLD {} is outside [0, 1], using {}",
                confidence_threshold, defaults.confidence_threshold
            );
            defaults.confidence_threshold
        };

        let holdout_fraction = env_or("HOLDOUT_FRACTION", defaults.holdout_fraction);
        let holdout_fraction = if (0.0..1.0).contains(&holdout_fraction) {
            holdout_fraction
        } else {
            warn!(
                "HOLDOUT_FRACTION {} is outside [0, 1), using {}",
                holdout_fraction, defaults.holdout_fraction
            );
            defaults.holdout_fraction
        };

        let random_seed = env_or("RANDOM_SEED", defaults.random_seed);
        let forest = ForestParams {
            n_trees: env_or("FOREST_N_TREES", defaults.forest.n_trees).max(1),
            max_depth: env_or("FOREST_MAX_DEPTH", defaults.forest.max_depth),
            min_samples_split: env_or("FOREST_MIN_SAMPLES_SPLIT", defaults.forest.min_samples_split),
            min_samples_leaf: env_or("FOREST_MIN_SAMPLES_LEAF", defaults.forest.min_samples_leaf),
            seed: random_seed,
        };

        Self {
            model_path: env_path_or("MODEL_PATH", defaults.model_path),
            primary_dataset_path: env_path_or("PRIMARY_DATASET_PATH", defaults.primary_dataset_path),
            fallback_dataset_path: env_path_or("FALLBACK_DATASET_PATH", defaults.fallback_dataset_path),
            persist_fallback_model: env_or("PERSIST_FALLBACK_MODEL", defaults.persist_fallback_model),
            confidence_threshold,
            numeric_default: env_or("NUMERIC_INFERENCE_DEFAULT", defaults.numeric_default),
            forest,
            holdout_fraction,
            random_seed,
            show_progress: env_or("TRAINING_PROGRESS", defaults.show_progress),
        }
    }

    /// Log the current configuration
    pub fn log_config(&self) {
        info!("⚙️  Model configuration");
        info!("   Persisted model: {}", self.model_path.display());
        info!("   Primary dataset: {}", self.primary_dataset_path.display());
        info!("   Fallback dataset: {}", self.fallback_dataset_path.display());
        info!(
            "   Forest: {} trees, max depth {}, min split {}, min leaf {}",
            self.forest.n_trees,
            self.forest.max_depth,
            self.forest.min_samples_split,
            self.forest.min_samples_leaf
        );
        info!(
            "   Confidence threshold: {:.2}, missing numeric input -> {}",
            self.confidence_threshold, self.numeric_default
        );
        if self.numeric_default == NumericDefault::Zero {
            info!("   Note: training imputes numeric gaps with the median, inference uses zero");
        }
    }
}
