//! Regression model selection
//!
//! Given a training and a test matrix whose last column is the target, this
//! crate tunes a fixed set of regressors by cross-validated grid search,
//! scores each on the test split, keeps the best one if its R² clears a
//! threshold, and saves it as JSON.
//!
//! # Modules
//!
//! - [`selection`] - Model catalog, grid-search evaluator and the trainer
//! - [`training`] - Regressors, hyperparameter grids, cross-validation, metrics
//! - [`utils`] - CSV loading and JSON persistence
//! - [`cli`] - Command-line interface
//!
//! ```no_run
//! use model_trainer::selection::{ModelTrainer, TrainerConfig};
//! # fn demo(train: ndarray::Array2<f64>, test: ndarray::Array2<f64>) -> Result<(), model_trainer::TrainerError> {
//! let trainer = ModelTrainer::new(TrainerConfig::default().with_artifact_path("artifacts/model.json"));
//! let outcome = trainer.train(&train, &test)?;
//! println!("{} scored {:.3}", outcome.model_name, outcome.r2_score);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod training;
pub mod selection;
pub mod utils;
pub mod cli;

pub use error::{ModelError, Result, TrainerError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{ModelError, Result, TrainerError};

    pub use crate::selection::{
        CatalogEntry, Evaluation, Evaluator, GridSearchEvaluator, ModelArtifact, ModelCatalog, ModelReport,
        ModelTrainer, RefitStrategy, SplitData, TrainerConfig, TrainingOutcome,
    };

    pub use crate::training::{
        r2_score, Estimator, ParamGrid, ParamSet, ParamValue, RegressionMetrics, Regressor,
    };

    pub use crate::utils::{load_object, save_object, DataLoader};
}
