//! Regression model selection
//!
//! [`ModelTrainer`] splits the target off the train and test matrices, asks an
//! [`Evaluator`] to tune and score every entry of a [`ModelCatalog`], keeps the
//! best candidate if it clears the configured R² threshold, refits it and
//! writes it to disk as a [`ModelArtifact`].

mod artifact;
mod catalog;
mod config;
mod evaluator;
mod trainer;

pub use artifact::ModelArtifact;
pub use catalog::{CatalogEntry, EstimatorFactory, ModelCatalog};
pub use config::{RefitStrategy, TrainerConfig};
pub use evaluator::{Evaluation, Evaluator, GridSearchEvaluator, ModelReport, SplitData};
pub use trainer::{ModelScore, ModelTrainer, TrainingOutcome};
