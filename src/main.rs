use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use financial_health_lib::lifecycle::ModelRegistry;
use financial_health_lib::models::{sample_survey_responses, PredictionResult, SurveyResponse};
use financial_health_lib::utils::env::load_env;
use financial_health_lib::utils::model_config::ModelConfig;
use log::{info, warn};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assess one survey response given as a JSON object
    Predict {
        /// JSON file, or `-` for stdin
        #[arg(long, default_value = "-")]
        input: String,

        /// Reject surveys that leave any known field unanswered
        #[arg(long)]
        strict: bool,
    },
    /// Run the built-in sample surveys through the model
    Demo,
    /// Show which model is being served
    Status,
    /// Retrain from a labelled CSV and optionally persist the result
    Retrain {
        /// Defaults to PRIMARY_DATASET_PATH
        #[arg(long)]
        dataset: Option<PathBuf>,

        #[arg(long)]
        save: bool,
    },
}

fn read_survey(input: &str) -> Result<SurveyResponse> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read survey from stdin")?;
        buf
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read survey file {}", input))?
    };
    SurveyResponse::from_json_str(&raw)
}

fn print_result(result: &PredictionResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let cli = Cli::parse();

    let config = ModelConfig::from_env();
    config.log_config();

    let start = Instant::now();
    let registry = ModelRegistry::initialize(config)?;
    info!("Model ready in {:.2?}", start.elapsed());

    match cli.command {
        Command::Predict { input, strict } => {
            let survey = read_survey(&input)?;
            let missing = survey.missing_fields();
            if !missing.is_empty() {
                if strict {
                    return Err(anyhow!("Survey is missing fields: {}", missing.join(", ")));
                }
                warn!("Survey is missing {} fields: {}", missing.len(), missing.join(", "));
            }
            let result = registry.assess(&survey)?;
            print_result(&result)?;
        }
        Command::Demo => {
            for (idx, survey) in sample_survey_responses().iter().enumerate() {
                let result = registry.assess(survey)?;
                println!("\n=== SAMPLE BUSINESS {} ===", idx + 1);
                println!("Category: {}", result.predicted_category);
                println!("Confidence: {:.1}%", result.max_confidence() * 100.0);
                for (class, p) in &result.confidence_scores {
                    println!("  {:<6} {:.3}", class.as_str(), p);
                }
                println!("Recommendation: {}", result.recommendation);
            }
        }
        Command::Status => {
            let summary = registry.snapshot().summary();
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Retrain { dataset, save } => {
            let path = dataset.unwrap_or_else(|| registry.config().primary_dataset_path.clone());
            let report = registry.retrain(&path)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if save {
                registry.save_current()?;
            }
        }
    }
    Ok(())
}
