//! Gradient Boosting implementation
//!
//! Least-squares gradient boosting over shallow regression trees. Each stage
//! fits a tree to the current residuals, optionally on a row subsample
//! (stochastic gradient boosting), and adds its shrunken output to the ensemble.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::{Criterion, DecisionTreeRegressor};
use super::params::{invalid, ParamSet, ParamValue};
use super::Regressor;
use crate::error::{ModelError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    pub config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.config.n_estimators == 0 {
            return Err(ModelError::ValidationError("n_estimators must be at least 1".into()));
        }
        if !(self.config.learning_rate > 0.0) {
            return Err(ModelError::ValidationError("learning_rate must be positive".into()));
        }
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(ModelError::ValidationError("subsample must be in (0, 1]".into()));
        }
        Ok(())
    }

    /// Fit the gradient boosting model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ModelError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ModelError::TrainingError("Empty dataset".into()));
        }
        self.validate()?;

        self.trees.clear();
        self.n_features = n_features;
        self.initial_prediction = y.mean().unwrap_or(0.0);

        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let residuals = y - &predictions;

            let sample_indices = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &sample_indices);
            let r_sub = residuals.select(Axis(0), &sample_indices);

            let mut tree = DecisionTreeRegressor::new()
                .with_criterion(Criterion::FriedmanMse)
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &r_sub)?;

            // Every row moves, including the ones left out of this stage's subsample
            let tree_pred = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &tree_pred);

            if let Some(tree_importance) = tree.feature_importances() {
                for (total, &imp) in self.feature_importances.iter_mut().zip(tree_importance.iter()) {
                    *total += imp;
                }
            }

            self.trees.push(tree);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ModelError::ModelNotFitted);
        }

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            let tree_pred = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &tree_pred);
        }

        Ok(predictions)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingRegressor::predict(self, x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.config.n_estimators = value.as_usize(name)?,
            "learning_rate" => self.config.learning_rate = value.as_f64(name)?,
            "subsample" => self.config.subsample = value.as_f64(name)?,
            "max_depth" => self.config.max_depth = value.as_usize(name)?,
            "min_samples_leaf" => self.config.min_samples_leaf = value.as_usize(name)?,
            "random_state" => self.config.random_state = Some(value.as_usize(name)? as u64),
            _ => return Err(invalid(name, value, "unknown parameter for GradientBoostingRegressor")),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("n_estimators".into(), self.config.n_estimators.into());
        params.insert("learning_rate".into(), self.config.learning_rate.into());
        params.insert("subsample".into(), self.config.subsample.into());
        params.insert("max_depth".into(), self.config.max_depth.into());
        params
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
