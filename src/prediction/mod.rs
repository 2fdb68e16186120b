// src/prediction/mod.rs
pub mod engine;
pub mod recommendation;

pub use engine::{assess, predict, PredictionError, PredictionOptions};
pub use recommendation::recommendation;
