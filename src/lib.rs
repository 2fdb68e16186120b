pub mod classifier;
pub mod lifecycle;
pub mod models;
pub mod prediction;
pub mod preprocessing;
pub mod utils;
