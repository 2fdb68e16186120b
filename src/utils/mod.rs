pub mod constants;
pub mod env;
pub mod model_config;
pub mod progress_config;
