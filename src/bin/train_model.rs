// src/bin/train_model.rs
//
// Offline training: fits a model on the primary dataset, reports holdout metrics and
// writes the artifact to MODEL_PATH.

use anyhow::{Context, Result};
use clap::Parser;
use financial_health_lib::lifecycle::{
    save_artifact, train_artifact, FeatureSelection, TrainingDataset, TrainingOptions,
    TrainingReport,
};
use financial_health_lib::models::ArtifactSummary;
use financial_health_lib::utils::constants::SURVEY_FIELDS;
use financial_health_lib::utils::env::load_env;
use financial_health_lib::utils::model_config::ModelConfig;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct TrainArgs {
    /// Labelled CSV; defaults to PRIMARY_DATASET_PATH
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Where to write the model; defaults to MODEL_PATH
    #[arg(long)]
    output: Option<PathBuf>,

    /// Train and report without writing the model
    #[arg(long)]
    dry_run: bool,

    /// Show a progress bar while fitting trees
    #[arg(long)]
    progress: bool,
}

fn print_training_summary(report: &TrainingReport, summary: &ArtifactSummary, saved_to: Option<&PathBuf>) {
    println!("\n=== TRAINING SUMMARY ===");
    println!("Model: {}", summary.artifact_id);
    println!("Trained at: {}", summary.trained_at);
    println!("Classifier: {}", summary.classifier);
    println!(
        "Rows: {} ({} train, {} holdout)",
        report.n_samples, report.n_train, report.n_holdout
    );
    println!("Features ({}): {}", summary.feature_columns.len(), summary.feature_columns.join(", "));
    println!("Categorical: {}", summary.categorical_columns.join(", "));
    for (class, count) in &report.class_counts {
        println!("  {:<6} {} rows", class.as_str(), count);
    }
    if let Some(accuracy) = report.accuracy {
        println!("\n=== HOLDOUT EVALUATION ===");
        println!("Accuracy: {:.2}%", accuracy * 100.0);
        println!("{:<8}{:>10}{:>10}{:>10}{:>10}", "class", "precision", "recall", "f1", "support");
        for (class, m) in &report.per_class {
            println!(
                "{:<8}{:>10.3}{:>10.3}{:>10.3}{:>10}",
                class.as_str(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            );
        }
    }
    match saved_to {
        Some(path) => println!("\nSaved to {}", path.display()),
        None => println!("\nDry run: model was not saved"),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = TrainArgs::parse();

    let mut config = ModelConfig::from_env();
    if args.progress {
        config.show_progress = true;
    }
    config.log_config();

    let dataset_path = args.dataset.unwrap_or_else(|| config.primary_dataset_path.clone());
    let output = args.output.unwrap_or_else(|| config.model_path.clone());

    let start = Instant::now();
    let dataset = TrainingDataset::from_csv(&dataset_path, FeatureSelection::Available(&SURVEY_FIELDS))?;
    if dataset.schema().len() < SURVEY_FIELDS.len() {
        warn!(
            "Dataset has {} of {} survey fields; training on the ones present",
            dataset.schema().len(),
            SURVEY_FIELDS.len()
        );
    }

    let (artifact, report) = train_artifact(&dataset, &TrainingOptions::from(&config))
        .with_context(|| format!("Training on {} failed", dataset_path.display()))?;
    report.log_summary();
    info!("Training finished in {:.2?}", start.elapsed());

    let saved_to = if args.dry_run {
        warn!("DRY RUN MODE: the model will not be written.");
        None
    } else {
        save_artifact(&artifact, &output)?;
        Some(&output)
    };
    print_training_summary(&report, &artifact.summary(), saved_to);
    Ok(())
}
