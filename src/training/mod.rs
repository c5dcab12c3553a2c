//! Regression estimators and the pieces used to tune them
//!
//! Provides the builtin regressors:
//! - Decision trees and Random Forests
//! - Gradient boosting, CatBoost-style oblivious boosting, AdaBoost.R2
//! - Ordinary least squares
//! - K-Nearest Neighbors
//!
//! plus hyperparameter grids, k-fold splitting and regression metrics.

pub mod params;
pub mod metrics;
pub mod cross_validation;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;
pub mod knn;
pub mod catboost;
pub mod adaboost;
pub mod estimator;

pub use params::{format_params, ParamGrid, ParamSet, ParamValue};
pub use metrics::{r2_score, RegressionMetrics};
pub use cross_validation::{CrossValidator, CVStrategy, CVSplit, CVResults};
pub use linear_models::LinearRegression;
pub use decision_tree::{DecisionTreeRegressor, TreeNode, Criterion};
pub use random_forest::{RandomForestRegressor, MaxFeatures};
pub use gradient_boosting::{GradientBoostingRegressor, GradientBoostingConfig};
pub use knn::{KNeighborsRegressor, KNNConfig, DistanceMetric, WeightScheme};
pub use catboost::{CatBoostRegressor, CatBoostConfig};
pub use adaboost::{AdaBoostRegressor, AdaBoostLoss};
pub use estimator::Estimator;

use crate::error::Result;
use ndarray::{Array1, Array2};

/// Common interface for every regressor the selector can tune
pub trait Regressor: Send + Sync + std::fmt::Debug {
    /// Fit the model on a feature matrix and target vector
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Apply a single hyperparameter. Unknown names and mistyped values are rejected.
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Current hyperparameter values
    fn params(&self) -> ParamSet;

    fn boxed_clone(&self) -> Box<dyn Regressor>;

    /// Serialized model state
    fn to_json(&self) -> Result<serde_json::Value>;

    /// Apply every entry of an assignment in order
    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params {
            self.set_param(name, value)?;
        }
        Ok(())
    }
}

impl Clone for Box<dyn Regressor> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}
