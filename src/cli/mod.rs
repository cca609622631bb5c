//! Command-line interface for the deployment and training pipelines.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;

use crate::config::PipelineConfig;
use crate::deployment::ModelDeployer;
use crate::error::Result;
use crate::pipeline::{
    continuous_deployment_pipeline, inference_pipeline, train_pipeline, InferenceInput,
};
use crate::tracking::{ExperimentTracker, LoggingSink, MetricsSink, RunStatus};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

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

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "satisfaction-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Customer satisfaction training and continuous deployment pipelines")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Which pipelines `run-deployment` executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Continuous deployment pipeline only
    Deploy,
    /// Inference pipeline only
    Predict,
    /// Both, deployment first
    #[value(name = "deploy_and_predict")]
    DeployAndPredict,
}

impl RunMode {
    fn deploys(self) -> bool {
        matches!(self, RunMode::Deploy | RunMode::DeployAndPredict)
    }

    fn predicts(self) -> bool {
        matches!(self, RunMode::Predict | RunMode::DeployAndPredict)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the continuous deployment and/or inference pipelines
    RunDeployment {
        /// Pipelines to run
        #[arg(short, long, value_enum, default_value = "deploy_and_predict")]
        config: RunMode,

        /// Minimum R2 required to deploy
        #[arg(long)]
        min_accuracy: Option<f64>,

        /// Input data file (CSV)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Pipeline settings file (JSON)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Workers recorded for the prediction service
        #[arg(long)]
        workers: Option<usize>,

        /// Service timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// JSON records to predict; defaults to a sample of the dataset
        #[arg(long)]
        records: Option<PathBuf>,

        /// Rows sampled when no records file is given
        #[arg(long, default_value = "10")]
        sample: usize,
    },

    /// Train and evaluate a model without deploying it
    Train {
        /// Input data file (CSV)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Pipeline settings file (JSON)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
}

/// Options of the `run-deployment` command
#[derive(Debug, Clone)]
pub struct RunDeploymentArgs {
    pub mode: RunMode,
    pub min_accuracy: Option<f64>,
    pub data: Option<PathBuf>,
    pub settings: Option<PathBuf>,
    pub workers: Option<usize>,
    pub timeout: Option<u64>,
    pub records: Option<PathBuf>,
    pub sample: usize,
}

// ─── Configuration ─────────────────────────────────────────────────────────────

/// Settings file (or defaults) with command-line overrides applied
pub fn resolve_config(
    settings: Option<&Path>,
    data: Option<&Path>,
    min_accuracy: Option<f64>,
    workers: Option<usize>,
    timeout: Option<u64>,
) -> Result<PipelineConfig> {
    let mut config = match settings {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(path) = data {
        config = config.with_data_path(path);
    }
    if let Some(min_accuracy) = min_accuracy {
        config = config.with_min_accuracy(min_accuracy);
    }
    if let Some(workers) = workers {
        config = config.with_workers(workers);
    }
    if let Some(timeout) = timeout {
        config = config.with_timeout_secs(timeout);
    }
    config.validate()?;
    Ok(config)
}

/// Run `f` inside a tracked run when tracking is enabled, else against the log.
///
/// Returns the tracking URI alongside the result when a run was recorded.
fn with_tracking<T>(
    config: &PipelineConfig,
    run_name: &str,
    f: impl FnOnce(&dyn MetricsSink) -> Result<T>,
) -> anyhow::Result<(T, Option<String>)> {
    if !config.tracking.enabled {
        return Ok((f(&LoggingSink)?, None));
    }

    let tracker = ExperimentTracker::new(config.tracking.clone())?;
    tracker.start_run(run_name)?;
    tracker.log_param("data_path", config.ingest.data_path.display())?;
    tracker.log_param("target_column", &config.divide.target_column)?;
    tracker.log_param("test_size", config.divide.test_size)?;
    tracker.log_param("random_state", config.divide.random_state)?;
    tracker.log_param("fit_intercept", config.model.fit_intercept)?;
    tracker.log_param("normalize", config.model.normalize)?;
    tracker.log_param("min_accuracy", config.trigger.min_accuracy)?;

    let outcome = f(&tracker);
    let status = if outcome.is_ok() { RunStatus::Finished } else { RunStatus::Failed };
    tracker.end_run(status)?;

    Ok((outcome?, Some(tracker.tracking_uri())))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run_deployment(args: &RunDeploymentArgs) -> anyhow::Result<()> {
    let config = resolve_config(
        args.settings.as_deref(),
        args.data.as_deref(),
        args.min_accuracy,
        args.workers,
        args.timeout,
    )?;
    let deployer = ModelDeployer::new(config.deployment.clone());

    if args.mode.deploys() {
        section("Deploy");
        step_run("Running continuous deployment pipeline");
        let start = Instant::now();
        let (summary, tracking_uri) = with_tracking(&config, &config.pipeline_name, |sink| {
            continuous_deployment_pipeline(&config, sink, &deployer)
        })?;
        step_done(&format!("{:?}", start.elapsed()));

        println!();
        if let Some(uri) = &tracking_uri {
            kv("Tracking URI", uri);
        }
        kv("Rows", &format!("{} train / {} test", summary.n_train, summary.n_test));
        kv("MSE", &format!("{:.4}", summary.scores.mse));
        kv("RMSE", &format!("{:.4}", summary.scores.rmse));
        kv("R²", &format!("{:.4}", summary.scores.r2));
        kv("Min accuracy", &format!("{:.4}", config.trigger.min_accuracy));
        match &summary.deployment {
            Some(record) => {
                println!("  {} deployed version {}", ok("✓"), record.version);
                kv("Service", &record.service_id);
            }
            None => println!(
                "  {} R² below threshold, deployment skipped",
                "!".yellow()
            ),
        }
    }

    if args.mode.predicts() {
        section("Predict");
        match deployer.find_model_server(&config.pipeline_name, false)? {
            Some(service) if service.is_running() => {
                kv("Service", service.service_id());
                kv("Workers", &service.record().workers.to_string());
                kv("Registry", &deployer.registry_dir().display().to_string());
            }
            Some(service) => {
                println!(
                    "  {} service {} is stopped",
                    "!".yellow(),
                    service.service_id()
                );
                println!();
                return Ok(());
            }
            None => {
                println!(
                    "  {} no prediction service for '{}'; run with --config deploy first",
                    "!".yellow(),
                    config.pipeline_name
                );
                println!();
                return Ok(());
            }
        }

        let input = match &args.records {
            Some(path) => InferenceInput::Json(path.clone()),
            None => InferenceInput::Sample { rows: args.sample },
        };

        step_run("Running inference pipeline");
        let start = Instant::now();
        let predictions = inference_pipeline(&config, &deployer, &input)?;
        step_done(&format!("{} predictions in {:?}", predictions.len(), start.elapsed()));

        println!();
        for (i, p) in predictions.iter().take(10).enumerate() {
            println!("  {:<6} {}", muted(&format!("#{}", i)), format!("{:.4}", p).white());
        }
        if predictions.len() > 10 {
            println!("  {}", dim(&format!("… {} more", predictions.len() - 10)));
        }
    }

    println!();
    Ok(())
}

pub fn cmd_train(data: Option<&Path>, settings: Option<&Path>) -> anyhow::Result<()> {
    let config = resolve_config(settings, data, None, None, None)?;

    section("Train");
    step_run(&format!("Training {}", "linear_regression".cyan()));
    let start = Instant::now();
    let (outcome, tracking_uri) =
        with_tracking(&config, "train_pipeline", |sink| train_pipeline(&config, sink))?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    if let Some(uri) = &tracking_uri {
        kv("Tracking URI", uri);
    }
    kv("Rows", &format!("{} train / {} test", outcome.n_train, outcome.n_test));
    kv("Features", &outcome.model.feature_names.len().to_string());
    kv("MSE", &format!("{:.4}", outcome.scores.mse));
    kv("RMSE", &format!("{:.4}", outcome.scores.rmse));
    println!("  {:<16} {}", muted("R²"), format!("{:.4}", outcome.scores.r2).white().bold());
    kv("Time", &format!("{:.3}s", outcome.model.training_time_secs));
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_deployment_defaults() {
        let cli = Cli::try_parse_from(["satisfaction-pipeline", "run-deployment"]).unwrap();
        match cli.command {
            Commands::RunDeployment { config, min_accuracy, sample, .. } => {
                assert_eq!(config, RunMode::DeployAndPredict);
                assert!(min_accuracy.is_none());
                assert_eq!(sample, 10);
            }
            _ => panic!("expected run-deployment"),
        }
    }

    #[test]
    fn test_parse_run_mode() {
        let cli = Cli::try_parse_from([
            "satisfaction-pipeline",
            "run-deployment",
            "-c",
            "predict",
            "--min-accuracy",
            "0.5",
        ])
        .unwrap();
        match cli.command {
            Commands::RunDeployment { config, min_accuracy, .. } => {
                assert_eq!(config, RunMode::Predict);
                assert!(!config.deploys());
                assert_eq!(min_accuracy, Some(0.5));
            }
            _ => panic!("expected run-deployment"),
        }
        assert!(Cli::try_parse_from(["satisfaction-pipeline", "run-deployment", "-c", "both"]).is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let config = resolve_config(None, Some(Path::new("x.csv")), Some(0.3), Some(4), Some(5)).unwrap();
        assert_eq!(config.ingest.data_path, PathBuf::from("x.csv"));
        assert_eq!(config.trigger.min_accuracy, 0.3);
        assert_eq!(config.deployment.workers, 4);
        assert_eq!(config.deployment.timeout_secs, 5);

        assert!(resolve_config(None, None, None, Some(0), None).is_err());
    }
}
