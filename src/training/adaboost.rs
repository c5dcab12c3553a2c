//! AdaBoost regressor (AdaBoost.R2)
//!
//! Each round draws a weighted bootstrap sample, fits a shallow regression
//! tree, and re-weights the training rows so that poorly predicted rows are
//! drawn more often. Predictions are the weighted median of the trees.

use crate::error::{ModelError, Result};
use super::decision_tree::DecisionTreeRegressor;
use super::params::{invalid, ParamSet, ParamValue};
use super::Regressor;
use ndarray::{Array1, Array2, Axis};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Shape of the per-sample loss used to re-weight rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaBoostLoss {
    #[default]
    Linear,
    Square,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: AdaBoostLoss,
    /// Depth of each base tree
    pub base_max_depth: usize,
    pub random_state: Option<u64>,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            loss: AdaBoostLoss::Linear,
            base_max_depth: 3,
            random_state: Some(42),
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
        }
    }

    pub fn with_loss(mut self, loss: AdaBoostLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(ModelError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ModelError::TrainingError("Empty dataset".into()));
        }
        if self.n_estimators == 0 || !(self.learning_rate > 0.0) {
            return Err(ModelError::ValidationError(
                "n_estimators and learning_rate must be positive".into(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42));
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        self.estimators.clear();
        self.estimator_weights.clear();

        for round in 0..self.n_estimators {
            let sampler = WeightedIndex::new(weights.iter())
                .map_err(|e| ModelError::ComputationError(format!("Invalid sample weights: {}", e)))?;
            let sample: Vec<usize> = (0..n_samples).map(|_| sampler.sample(&mut rng)).collect();

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(self.base_max_depth)
                .with_random_state(rng.next_u64());
            tree.fit(&x.select(Axis(0), &sample), &y.select(Axis(0), &sample))?;

            let predictions = tree.predict(x)?;
            let mut errors = (&predictions - y).mapv(f64::abs);
            let max_error = errors.fold(0.0f64, |m, &e| m.max(e));
            if max_error > 0.0 {
                errors /= max_error;
            }
            match self.loss {
                AdaBoostLoss::Linear => {}
                AdaBoostLoss::Square => errors.mapv_inplace(|e| e * e),
                AdaBoostLoss::Exponential => errors.mapv_inplace(|e| 1.0 - (-e).exp()),
            }

            let avg_loss = weights.dot(&errors);

            // A perfect fit ends boosting with this tree alone carrying weight
            if avg_loss <= 0.0 {
                self.estimators.push(tree);
                self.estimator_weights.push(1.0);
                break;
            }

            // Worse than chance: keep the first tree so the model is usable, stop otherwise
            if avg_loss >= 0.5 {
                if round == 0 {
                    self.estimators.push(tree);
                    self.estimator_weights.push(1.0);
                }
                break;
            }

            let beta = avg_loss / (1.0 - avg_loss);
            let estimator_weight = self.learning_rate * (1.0 / beta).ln();

            if round + 1 < self.n_estimators {
                for (w, e) in weights.iter_mut().zip(errors.iter()) {
                    *w *= beta.powf((1.0 - e) * self.learning_rate);
                }
                let total = weights.sum();
                if !(total > 0.0) {
                    self.estimators.push(tree);
                    self.estimator_weights.push(estimator_weight);
                    break;
                }
                weights /= total;
            }

            self.estimators.push(tree);
            self.estimator_weights.push(estimator_weight);
        }

        Ok(self)
    }

    /// Weighted median of the per-tree predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(ModelError::ModelNotFitted);
        }

        let per_tree: Vec<Array1<f64>> = self
            .estimators
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let half = self.estimator_weights.iter().sum::<f64>() / 2.0;

        Ok((0..x.nrows())
            .map(|i| {
                let mut ranked: Vec<(f64, f64)> = per_tree
                    .iter()
                    .zip(self.estimator_weights.iter())
                    .map(|(p, &w)| (p[i], w))
                    .collect();
                ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

                let mut cumulative = 0.0;
                for &(pred, w) in &ranked {
                    cumulative += w;
                    if cumulative >= half {
                        return pred;
                    }
                }
                ranked.last().map_or(0.0, |&(pred, _)| pred)
            })
            .collect())
    }

    pub fn n_fitted_estimators(&self) -> usize {
        self.estimators.len()
    }
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        AdaBoostRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        AdaBoostRegressor::predict(self, x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "learning_rate" => self.learning_rate = value.as_f64(name)?,
            "loss" => {
                self.loss = match value.as_str(name)? {
                    "linear" => AdaBoostLoss::Linear,
                    "square" => AdaBoostLoss::Square,
                    "exponential" => AdaBoostLoss::Exponential,
                    _ => return Err(invalid(name, value, "expected linear, square or exponential")),
                };
            }
            "random_state" => self.random_state = Some(value.as_usize(name)? as u64),
            _ => return Err(invalid(name, value, "unknown parameter for AdaBoostRegressor")),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("n_estimators".into(), self.n_estimators.into());
        params.insert("learning_rate".into(), self.learning_rate.into());
        let loss = match self.loss {
            AdaBoostLoss::Linear => "linear",
            AdaBoostLoss::Square => "square",
            AdaBoostLoss::Exponential => "exponential",
        };
        params.insert("loss".into(), loss.into());
        params
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
