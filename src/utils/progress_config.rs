// src/utils/progress_config.rs

use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

/// Creates the progress bar shown while fitting an ensemble.
/// Returns a hidden bar when progress output is disabled so callers can report unconditionally.
pub fn training_progress_bar(enabled: bool, total: u64, message: &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => warn!("Failed to set progress bar style: {}", e),
    }
    pb.set_message(message.to_string());
    pb
}
