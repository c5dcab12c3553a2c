//! Model selection entry point

use std::path::PathBuf;
use std::time::Instant;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use super::artifact::ModelArtifact;
use super::catalog::ModelCatalog;
use super::config::{RefitStrategy, TrainerConfig};
use super::evaluator::{Evaluator, GridSearchEvaluator, SplitData};
use crate::error::{ModelError, TrainerError};
use crate::training::{format_params, r2_score, ParamSet};

/// One line of the leaderboard, in catalog order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub name: String,
    pub test_score: f64,
    /// Mean cross-validated R², when CV ran
    pub cv_score: Option<f64>,
    /// Standard deviation of the fold scores
    pub cv_std: Option<f64>,
    pub best_params: ParamSet,
}

/// What a successful [`ModelTrainer::train`] call produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    /// Test R² of the persisted model
    pub r2_score: f64,
    pub model_name: String,
    /// Hyperparameters of the persisted model
    pub params: ParamSet,
    pub artifact_path: PathBuf,
    pub leaderboard: Vec<ModelScore>,
}

/// Picks, tunes and persists the best regressor for a train/test pair
pub struct ModelTrainer {
    config: TrainerConfig,
    catalog: ModelCatalog,
    evaluator: Box<dyn Evaluator>,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new(TrainerConfig::default())
    }
}

impl ModelTrainer {
    /// Trainer over the builtin catalog with a grid-search evaluator
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            catalog: ModelCatalog::builtin_with_seed(config.random_state),
            evaluator: Box::new(GridSearchEvaluator::new(config.cv_folds)),
            config,
        }
    }

    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Select the best model for `train`/`test`, whose last column is the target.
    ///
    /// Fails with [`TrainerError::NoBestModel`] when the best test R² is below
    /// the configured minimum; nothing is written in that case. Every other
    /// failure is returned as [`TrainerError::Training`].
    #[instrument(
        name = "train",
        skip_all,
        fields(train_rows = train.nrows(), test_rows = test.nrows(), artifact = %self.config.artifact_path.display())
    )]
    pub fn train(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<TrainingOutcome, TrainerError> {
        let start = Instant::now();
        let result = self.run(train, test);
        match &result {
            Ok(outcome) => info!(
                model = %outcome.model_name,
                r2 = outcome.r2_score,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Training finished"
            ),
            Err(e @ TrainerError::NoBestModel { .. }) => warn!(error = %e, "Rejected best model"),
            Err(e) => error!(error = %e, "Training failed"),
        }
        result
    }

    fn run(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<TrainingOutcome, TrainerError> {
        self.config.validate()?;
        if self.catalog.is_empty() {
            return Err(ModelError::ConfigError("model catalog is empty".into()).into());
        }

        info!("Splitting training and test input data");
        let data = SplitData::from_arrays(train, test)?;

        info!(candidates = self.catalog.len(), "Evaluating models");
        let evaluation = self.evaluator.evaluate(&data, &self.catalog)?;

        let leaderboard: Vec<ModelScore> = evaluation
            .reports()
            .iter()
            .map(|r| ModelScore {
                name: r.name.clone(),
                test_score: r.test_score,
                cv_score: r.cv_score(),
                cv_std: r.cv_std(),
                best_params: r.best_params.clone(),
            })
            .collect();

        let best = evaluation
            .into_best()
            .ok_or_else(|| ModelError::TrainingError("evaluator returned no reports".into()))?;
        info!(model = %best.name, score = best.test_score, "Best model found");

        if !(best.test_score >= self.config.min_score) {
            return Err(TrainerError::NoBestModel {
                model_name: best.name.clone(),
                score: best.test_score,
                threshold: self.config.min_score,
            });
        }

        // The evaluator already fitted the tuned estimator on the full training split
        let model = match self.config.refit {
            RefitStrategy::BestParams => best.estimator,
            RefitStrategy::Defaults => {
                let entry = self
                    .catalog
                    .get(&best.name)
                    .ok_or_else(|| ModelError::UnknownModel(best.name.clone()))?;
                let mut model = entry.build();
                model.fit(&data.x_train, &data.y_train)?;
                model
            }
        };
        let r2 = r2_score(&data.y_test, &model.predict(&data.x_test)?)?;
        info!(
            model = %best.name,
            refit = ?self.config.refit,
            params = %format_params(&model.params()),
            r2,
            "Prepared best model"
        );

        let artifact = ModelArtifact::new(best.name.clone(), r2, data.n_features(), &*model)?;
        artifact.save(&self.config.artifact_path)?;
        info!(path = %self.config.artifact_path.display(), "Saved model artifact");

        Ok(TrainingOutcome {
            r2_score: r2,
            model_name: best.name,
            params: artifact.params,
            artifact_path: self.config.artifact_path.clone(),
            leaderboard,
        })
    }
}
