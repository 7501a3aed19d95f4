//! Salary predictor CLI
//!
//! Command-line interface for processing data, training, evaluation,
//! prediction and serving.

use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::artifacts::ArtifactStore;
use crate::config::{AppConfig, ConfigOverrides, Environment};
use crate::evaluation::{format_currency, Currency, ModelEvaluator, PerformanceBand};
use crate::inference::InferenceService;
use crate::pipeline::{PipelineReport, TrainingPipeline};
use crate::training::VariantOutcome;
use crate::utils::{column_values, load_csv, ColumnStatistics, Timer};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn band_label(r2: f64) -> ColoredString {
    match PerformanceBand::from_r2(r2) {
        PerformanceBand::Excellent => ok("excellent"),
        PerformanceBand::Good => accent("good"),
        PerformanceBand::Moderate => "moderate".yellow(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "salary-predictor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Salary prediction pipeline: train, evaluate and serve regression models")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON file with configuration overrides
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Environment preset (development, production)
    #[arg(long, global = true)]
    pub env: Option<Environment>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clean, encode, split and scale the raw dataset
    Process,

    /// Run the full pipeline: process, then train every model variant
    Train,

    /// Evaluate persisted models on the processed test split
    Evaluate,

    /// Predict salaries for records in a JSON file
    Predict {
        /// JSON file holding one record or an array of records
        #[arg(short, long)]
        input: PathBuf,

        /// Model variant to use (defaults to the configured default model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Show dataset shape and column statistics
    Info {
        /// CSV file (defaults to the configured raw data path)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Start the prediction API server
    Serve {
        /// Server host
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Defaults, then environment variables, then the environment preset, then
/// the override file.
pub fn load_config(
    config_path: Option<&Path>,
    environment: Option<Environment>,
) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::from_env()?;
    if let Some(environment) = environment {
        config.merge(environment.overrides());
    }
    if let Some(path) = config_path {
        config.merge(ConfigOverrides::from_file(path)?);
    }
    config.validate()?;
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn print_pipeline_report(report: &PipelineReport) {
    let c = &report.cleaning;
    println!();
    println!("  {:<22} {}", muted("Rows before cleaning"), c.rows_before);
    println!("  {:<22} {}", muted("Duplicates removed"), c.duplicates_removed);
    println!("  {:<22} {}", muted("Null rows removed"), c.nulls_removed);
    println!("  {:<22} {}", muted("Outliers removed"), c.outliers_removed);
    println!("  {:<22} {} / {}", muted("Train / test rows"), report.n_train, report.n_test);
    println!("  {:<22} {}", muted("Features"), report.feature_columns.join(", "));
    println!("  {:<22} {}", muted("Generation"), report.generation);
}

pub fn cmd_process(config: AppConfig) -> anyhow::Result<()> {
    section("Process");
    config.create_directories()?;

    step_run("Processing raw data");
    let pipeline = TrainingPipeline::new(config);
    let report = pipeline.process()?;
    step_done(&format!("{:.2}s", report.elapsed_secs));

    print_pipeline_report(&report);
    println!();
    Ok(())
}

pub fn cmd_train(config: AppConfig) -> anyhow::Result<()> {
    section("Train");
    config.create_directories()?;

    step_run("Running training pipeline");
    let pipeline = TrainingPipeline::new(config);
    let report = pipeline.run()?;
    step_done(&format!("{:.2}s", report.elapsed_secs));

    print_pipeline_report(&report);

    let Some(summary) = &report.training else {
        return Ok(());
    };

    println!();
    println!(
        "  {:<20} {:>9} {:>9} {:>12} {:>9}",
        muted("Model"),
        muted("Train R²"),
        muted("Test R²"),
        muted("Test RMSE"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(64)));

    for outcome in &summary.outcomes {
        match outcome {
            VariantOutcome::Trained { record, became_best } => {
                let marker = if *became_best { ok(" ★") } else { "".normal() };
                println!(
                    "  {:<20} {:>9.4} {:>9.4} {:>12.2} {:>8.2}s{}",
                    record.variant.as_str(),
                    record.train_r2,
                    record.test_r2,
                    record.test_rmse,
                    record.training_time,
                    marker
                );
            }
            VariantOutcome::Failed { variant, reason } => {
                println!("  {:<20} {}", variant.as_str(), format!("failed: {}", reason).red());
            }
        }
    }
    println!("  {}", dim(&"─".repeat(64)));

    match &summary.best {
        Some(best) => {
            println!();
            println!(
                "  {} {} {} {:.4} ({})",
                ok("best"),
                best.variant.as_str().white().bold(),
                muted("R²:"),
                best.score,
                band_label(best.score)
            );
        }
        None => println!("\n  {}", "No model trained successfully".red()),
    }
    println!();
    Ok(())
}

pub fn cmd_evaluate(config: AppConfig) -> anyhow::Result<()> {
    section("Evaluate");

    let store = ArtifactStore::open(&config.data.models_dir)?;
    let evaluator = ModelEvaluator::new(store);

    step_run("Evaluating persisted models");
    let timer = Timer::start();
    let evaluations = evaluator.evaluate_all()?;
    step_done(&format!("{} models in {:.2}s", evaluations.len(), timer.elapsed_secs()));

    println!();
    println!(
        "  {:<20} {:>9} {:>12} {:>12} {:>8}",
        muted("Model"),
        muted("R²"),
        muted("RMSE"),
        muted("MAE"),
        muted("MAPE")
    );
    println!("  {}", dim(&"─".repeat(64)));
    for e in &evaluations {
        let m = &e.result.metrics;
        println!(
            "  {:<20} {:>9.4} {:>12} {:>12} {:>7.2}%",
            e.variant.as_str(),
            m.r2,
            format_currency(m.rmse, Currency::Usd),
            format_currency(m.mae, Currency::Usd),
            m.mape
        );
    }
    println!();
    println!("  {} {}", muted("Reports written to"), config.data.models_dir.display());
    println!();
    Ok(())
}

pub fn cmd_predict(config: AppConfig, input: &Path, model: Option<&str>) -> anyhow::Result<()> {
    section("Predict");

    let raw = std::fs::read_to_string(input)?;
    let value: Value = serde_json::from_str(&raw)?;
    let records = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let model_name = model.unwrap_or(&config.api.default_model);
    step_run(&format!("Loading {}", model_name.cyan()));
    let mut service = InferenceService::from_models_dir(&config.data.models_dir)?;
    service.load_by_name(model_name)?;
    step_done("");

    println!();
    for (i, result) in service.predict_batch(&records).iter().enumerate() {
        match result {
            Ok(p) => {
                let interval = p
                    .confidence_interval
                    .map(|ci| {
                        format!(
                            "  [{} .. {}]",
                            format_currency(ci.lower, Currency::Usd),
                            format_currency(ci.upper, Currency::Usd)
                        )
                    })
                    .unwrap_or_default();
                println!(
                    "  {:>3}  {}{}",
                    i + 1,
                    format_currency(p.predicted_salary, Currency::Usd).white().bold(),
                    dim(&interval)
                );
            }
            Err(e) => println!("  {:>3}  {}", i + 1, e.to_string().red()),
        }
    }
    println!();
    Ok(())
}

pub fn cmd_info(config: AppConfig, data: Option<&Path>) -> anyhow::Result<()> {
    section("Data Info");

    let path = data.unwrap_or(&config.data.raw_data_path);
    let df = load_csv(path)?;

    println!("  {:<12} {}", muted("File"), path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!();

    println!(
        "  {:<20} {:>6} {:>12} {:>12} {:>12} {:>8}",
        muted("Column"),
        muted("Nulls"),
        muted("Mean"),
        muted("Median"),
        muted("Std"),
        muted("Skew")
    );
    println!("  {}", dim(&"─".repeat(76)));

    for col in df.get_columns() {
        let dtype = col.dtype();
        let stats = if dtype.is_float() || dtype.is_integer() {
            let values: Vec<f64> = col
                .cast(&polars::prelude::DataType::Float64)?
                .as_materialized_series()
                .f64()?
                .into_iter()
                .flatten()
                .collect();
            ColumnStatistics::from_values(&values)
        } else {
            None
        };

        match stats {
            Some(s) => println!(
                "  {:<20} {:>6} {:>12.2} {:>12.2} {:>12.2} {:>8.3}",
                col.name().as_str(),
                col.null_count(),
                s.mean,
                s.median,
                s.std,
                s.skewness
            ),
            None => println!(
                "  {:<20} {:>6} {}",
                col.name().as_str(),
                col.null_count(),
                dim(&format!("{:?}, {} unique", dtype, col.as_materialized_series().n_unique().unwrap_or(0)))
            ),
        }
    }

    if let Ok(target) = column_values(&df, &config.data.target_column) {
        if let Some(s) = ColumnStatistics::from_values(&target) {
            println!();
            println!(
                "  {} {} .. {} (IQR {})",
                muted(&format!("{} range", config.data.target_column)),
                format_currency(s.min, Currency::Usd),
                format_currency(s.max, Currency::Usd),
                format_currency(s.iqr, Currency::Usd)
            );
        }
    }

    println!();
    Ok(())
}

pub async fn cmd_serve(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.api.host = host;
    }
    if let Some(port) = port {
        config.api.port = port;
    }
    config.validate()?;
    config.create_directories()?;

    let (host, port) = (config.api.host.clone(), config.api.port);
    println!();
    line_box_top();
    line_box(&format!("{}", "Salary Prediction API".white().bold()));
    line_box(&kv("Health ", &format!("http://{}:{}/health", host, port)));
    line_box(&kv("Predict", &format!("http://{}:{}/predict", host, port)));
    line_box(&kv("Model  ", &config.api.default_model));
    line_box(&format!("{}", dim("ctrl+c to stop")));
    line_box_bottom();
    println!();

    crate::server::run_server(config).await
}
