//! Command-line interface for model selection and prediction

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use ndarray::{s, Array1, Array2};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::TrainerError;
use crate::selection::{ModelArtifact, ModelTrainer, RefitStrategy, TrainerConfig, TrainingOutcome};
use crate::training::{format_params, RegressionMetrics};
use crate::utils::{save_predictions, DataLoader};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
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

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "model-trainer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pick, tune and persist the best regression model for a train/test split")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// How the selected model is refit before it is saved
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RefitArg {
    /// Keep the hyperparameters found by the grid search
    BestParams,
    /// Refit with library defaults
    Defaults,
}

impl From<RefitArg> for RefitStrategy {
    fn from(arg: RefitArg) -> Self {
        match arg {
            RefitArg::BestParams => RefitStrategy::BestParams,
            RefitArg::Defaults => RefitStrategy::Defaults,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select the best regressor; the last CSV column is the target
    Train {
        /// Training CSV
        #[arg(long)]
        train: PathBuf,

        /// Test CSV with the same columns
        #[arg(long)]
        test: PathBuf,

        /// Where to write the selected model
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// Minimum test R² to accept a model
        #[arg(long)]
        min_score: Option<f64>,

        /// Number of cross-validation folds
        #[arg(long)]
        cv_folds: Option<usize>,

        #[arg(long, value_enum)]
        refit: Option<RefitArg>,

        /// JSON trainer configuration; flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Predict with a saved model
    Predict {
        /// Saved model artifact
        #[arg(short, long)]
        model: PathBuf,

        /// Input CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Output predictions CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// The last column of the input is the true target
        #[arg(long)]
        has_target: bool,
    },

    /// Show what a saved model contains
    Info {
        /// Saved model artifact
        #[arg(short, long)]
        model: PathBuf,
    },
}

/// Start from the config file (or defaults) and apply any flags
pub fn resolve_config(
    config_path: Option<&Path>,
    artifact: Option<PathBuf>,
    min_score: Option<f64>,
    cv_folds: Option<usize>,
    refit: Option<RefitArg>,
) -> anyhow::Result<TrainerConfig> {
    let mut config = match config_path {
        Some(path) => TrainerConfig::from_file(path)?,
        None => TrainerConfig::default(),
    };
    if let Some(path) = artifact {
        config = config.with_artifact_path(path);
    }
    if let Some(score) = min_score {
        config = config.with_min_score(score);
    }
    if let Some(folds) = cv_folds {
        config = config.with_cv_folds(folds);
    }
    if let Some(refit) = refit {
        config = config.with_refit(refit.into());
    }
    config.validate()?;
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(train_path: &Path, test_path: &Path, config: TrainerConfig) -> anyhow::Result<()> {
    section("Train");

    let loader = DataLoader::new();
    step_run("Loading data");
    let start = Instant::now();
    let train = loader.load_matrix(train_path)?;
    let test = loader.load_matrix(test_path)?;
    step_done(&format!(
        "{} train / {} test rows × {} cols in {:?}",
        train.nrows(),
        test.nrows(),
        train.ncols(),
        start.elapsed()
    ));

    step_run("Selecting model");
    let start = Instant::now();
    let trainer = ModelTrainer::new(config);
    match trainer.train(&train, &test) {
        Ok(outcome) => {
            step_done(&format!("{:?}", start.elapsed()));
            print_outcome(&outcome);
            Ok(())
        }
        Err(e @ TrainerError::NoBestModel { .. }) => {
            println!("{}", "rejected".red());
            println!();
            println!("  {}", e.to_string().yellow());
            println!();
            Err(e.into())
        }
        Err(e) => {
            println!("{}", "failed".red());
            Err(e.into())
        }
    }
}

fn print_outcome(outcome: &TrainingOutcome) {
    println!();
    println!("  {:<26} {:>17} {:>10}", muted("Model"), muted("CV R²"), muted("Test R²"));
    println!("  {}", dim(&"─".repeat(55)));
    for row in &outcome.leaderboard {
        let cv = match (row.cv_score, row.cv_std) {
            (Some(mean), Some(std)) => format!("{:.4} ± {:.4}", mean, std),
            (Some(mean), None) => format!("{:.4}", mean),
            _ => "-".to_string(),
        };
        let line = format!("{:<26} {:>17} {:>10.4}", row.name, cv, row.test_score);
        if row.name == outcome.model_name {
            println!("  {}", line.white().bold());
        } else {
            println!("  {}", line);
        }
    }
    println!("  {}", dim(&"─".repeat(55)));

    println!();
    println!("  {} {}", ok("best"), outcome.model_name.white().bold());
    kv("R²", &format!("{:.4}", outcome.r2_score));
    kv("Params", &format_params(&outcome.params));
    kv("Saved", &outcome.artifact_path.display().to_string());
    println!();
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
    has_target: bool,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let artifact = ModelArtifact::load(model_path)?;
    step_done(&artifact.model_name);

    step_run("Loading data");
    let data = DataLoader::new().load_matrix(data_path)?;
    step_done(&format!("{} rows × {} cols", data.nrows(), data.ncols()));

    let (x, y): (Array2<f64>, Option<Array1<f64>>) = if has_target {
        if data.ncols() < 2 {
            anyhow::bail!("--has-target needs at least one feature column and the target");
        }
        let target = data.ncols() - 1;
        (data.slice(s![.., ..target]).to_owned(), Some(data.column(target).to_owned()))
    } else {
        (data, None)
    };

    step_run("Predicting");
    let start = Instant::now();
    let predictions = artifact.predict(&x)?;
    step_done(&format!("{} rows in {:?}", predictions.len(), start.elapsed()));

    println!();
    if let Some(y) = &y {
        let metrics = RegressionMetrics::compute(y, &predictions)?;
        kv("R²", &format!("{:.4}", metrics.r2));
        kv("RMSE", &format!("{:.4}", metrics.rmse));
        kv("MAE", &format!("{:.4}", metrics.mae));
    }

    match output {
        Some(path) => {
            save_predictions(path, &predictions, y.as_ref())?;
            kv("Saved", &path.display().to_string());
        }
        None => {
            for (i, p) in predictions.iter().take(10).enumerate() {
                println!("  {:>4}  {:.4}", muted(&i.to_string()), p);
            }
            if predictions.len() > 10 {
                println!("  {}", dim(&format!("… {} more", predictions.len() - 10)));
            }
        }
    }
    println!();
    Ok(())
}

pub fn cmd_info(model_path: &Path) -> anyhow::Result<()> {
    section("Model");
    let artifact = ModelArtifact::load(model_path)?;
    kv("Name", &artifact.model_name);
    kv("Saved at", &artifact.saved_at.to_rfc3339());
    kv("Test R²", &format!("{:.4}", artifact.r2_score));
    kv("Features", &artifact.n_features.to_string());
    kv("Params", &format_params(&artifact.params));
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train_flags() {
        let cli = Cli::parse_from([
            "model-trainer", "train", "--train", "a.csv", "--test", "b.csv", "--refit", "defaults", "--cv-folds", "5",
        ]);
        match cli.command {
            Commands::Train { refit, cv_folds, .. } => {
                assert_eq!(refit, Some(RefitArg::Defaults));
                assert_eq!(cv_folds, Some(5));
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = resolve_config(None, Some("out/m.json".into()), Some(0.8), None, Some(RefitArg::Defaults)).unwrap();
        assert_eq!(config.min_score, 0.8);
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.refit, RefitStrategy::Defaults);
        assert_eq!(config.artifact_path, PathBuf::from("out/m.json"));
        assert!(resolve_config(None, None, None, Some(1), None).is_err());
    }
}
