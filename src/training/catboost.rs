//! CatBoost-style gradient boosting over symmetric (oblivious) trees
//!
//! Every level of a symmetric tree applies the same feature/threshold test to
//! all nodes, so a tree of depth d is just d splits plus 2^d leaf values.

use crate::error::{ModelError, Result};
use super::params::{invalid, ParamSet, ParamValue};
use super::Regressor;
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Upper bound on candidate thresholds scanned per feature and level
const MAX_BORDERS: usize = 254;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatBoostConfig {
    /// Boosting rounds
    pub iterations: usize,
    pub learning_rate: f64,
    /// Depth of every symmetric tree
    pub depth: usize,
    /// L2 regularization on leaf values
    pub l2_leaf_reg: f64,
    /// Row fraction per tree
    pub subsample: f64,
    pub random_seed: Option<u64>,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            learning_rate: 0.03,
            depth: 6,
            l2_leaf_reg: 3.0,
            subsample: 1.0,
            random_seed: Some(0),
        }
    }
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>,
    leaf_values: Vec<f64>,
}

impl SymmetricTree {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut idx = 0usize;
        for &(feature, threshold) in &self.splits {
            idx = idx * 2 + usize::from(sample[feature] > threshold);
        }
        self.leaf_values[idx]
    }
}

fn build_symmetric_tree(
    x: &Array2<f64>,
    residuals: &[f64],
    indices: &[usize],
    depth: usize,
    l2_leaf_reg: f64,
) -> SymmetricTree {
    let n_features = x.ncols();
    let mut splits = Vec::with_capacity(depth);
    let mut buckets: Vec<Vec<usize>> = vec![indices.to_vec()];

    for _level in 0..depth {
        // Best split shared by all buckets at this level
        let best = (0..n_features)
            .into_par_iter()
            .filter_map(|feat| {
                let mut borders: Vec<f64> = indices.iter().map(|&i| x[[i, feat]]).collect();
                borders.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                borders.dedup();
                if borders.len() < 2 {
                    return None;
                }

                let step = (borders.len() / MAX_BORDERS).max(1);
                let mut best_gain = 0.0;
                let mut best_thr = None;

                for i in (0..borders.len() - 1).step_by(step) {
                    let thr = (borders[i] + borders[i + 1]) / 2.0;
                    let mut gain = 0.0;

                    for bucket in &buckets {
                        let (lg, ln, rg, rn) = bucket.iter().fold((0.0, 0.0, 0.0, 0.0), |(lg, ln, rg, rn), &idx| {
                            if x[[idx, feat]] <= thr {
                                (lg + residuals[idx], ln + 1.0, rg, rn)
                            } else {
                                (lg, ln, rg + residuals[idx], rn + 1.0)
                            }
                        });
                        let parent = (lg + rg) * (lg + rg) / (ln + rn + l2_leaf_reg);
                        gain += lg * lg / (ln + l2_leaf_reg) + rg * rg / (rn + l2_leaf_reg) - parent;
                    }

                    if gain > best_gain {
                        best_gain = gain;
                        best_thr = Some(thr);
                    }
                }

                best_thr.map(|thr| (feat, thr, best_gain))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .fold(None::<(usize, f64, f64)>, |acc, c| match acc {
                Some(a) if a.2 >= c.2 => Some(a),
                _ => Some(c),
            });

        match best {
            Some((feat, thr, _)) => {
                splits.push((feat, thr));
                let mut next = Vec::with_capacity(buckets.len() * 2);
                for bucket in &buckets {
                    let (left, right): (Vec<usize>, Vec<usize>) =
                        bucket.iter().partition(|&&i| x[[i, feat]] <= thr);
                    next.push(left);
                    next.push(right);
                }
                buckets = next;
            }
            None => break,
        }
    }

    let leaf_values = buckets
        .iter()
        .map(|bucket| {
            let g: f64 = bucket.iter().map(|&i| residuals[i]).sum();
            g / (bucket.len() as f64 + l2_leaf_reg)
        })
        .collect();

    SymmetricTree { splits, leaf_values }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
}

impl Default for CatBoostRegressor {
    fn default() -> Self {
        Self::new(CatBoostConfig::default())
    }
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(ModelError::TrainingError("Empty dataset".into()));
        }
        if n != y.len() {
            return Err(ModelError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.config.iterations == 0 || !(self.config.learning_rate > 0.0) {
            return Err(ModelError::ValidationError(
                "iterations and learning_rate must be positive".into(),
            ));
        }
        if self.config.depth > 16 {
            return Err(ModelError::ValidationError("depth must be at most 16".into()));
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_seed.unwrap_or(0));
        self.trees.clear();
        self.n_features = x.ncols();
        self.base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n, self.base_prediction);

        for _ in 0..self.config.iterations {
            let residuals: Vec<f64> = y.iter().zip(predictions.iter()).map(|(&yi, &p)| yi - p).collect();

            let indices: Vec<usize> = if self.config.subsample < 1.0 {
                let k = ((n as f64 * self.config.subsample).ceil() as usize).max(1);
                rand::seq::index::sample(&mut rng, n, k).into_vec()
            } else {
                (0..n).collect()
            };

            let tree = build_symmetric_tree(x, &residuals, &indices, self.config.depth, self.config.l2_leaf_reg);

            for (i, row) in x.rows().into_iter().enumerate() {
                predictions[i] += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ModelError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ModelError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_prediction
                    + self.config.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
            })
            .collect())
    }
}

impl Regressor for CatBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        CatBoostRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        CatBoostRegressor::predict(self, x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "iterations" | "n_estimators" => self.config.iterations = value.as_usize(name)?,
            "learning_rate" => self.config.learning_rate = value.as_f64(name)?,
            "depth" | "max_depth" => self.config.depth = value.as_usize(name)?,
            "l2_leaf_reg" => self.config.l2_leaf_reg = value.as_f64(name)?,
            "subsample" => self.config.subsample = value.as_f64(name)?,
            "random_seed" => self.config.random_seed = Some(value.as_usize(name)? as u64),
            _ => return Err(invalid(name, value, "unknown parameter for CatBoostRegressor")),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("iterations".into(), self.config.iterations.into());
        params.insert("learning_rate".into(), self.config.learning_rate.into());
        params.insert("depth".into(), self.config.depth.into());
        params.insert("l2_leaf_reg".into(), self.config.l2_leaf_reg.into());
        params
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::metrics::r2_score;

    fn make_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((100, 3), |(i, j)| ((i * (j + 3) * 7) % 100) as f64 / 100.0);
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(2).mapv(|v| v * v) + 0.1;
        (x, y)
    }

    #[test]
    fn test_catboost_regressor() {
        let (x, y) = make_regression_data();
        let config = CatBoostConfig { iterations: 100, depth: 4, learning_rate: 0.1, ..Default::default() };
        let mut model = CatBoostRegressor::new(config);
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        assert_eq!(preds.len(), 100);
        assert!(r2_score(&y, &preds).unwrap() > 0.9);
    }

    #[test]
    fn test_catboost_symmetric_tree() {
        let (x, y) = make_regression_data();
        let config = CatBoostConfig { iterations: 5, depth: 3, ..Default::default() };
        let mut model = CatBoostRegressor::new(config);
        model.fit(&x, &y).unwrap();
        for tree in &model.trees {
            assert!(tree.leaf_values.len() <= 8);
            assert!(tree.splits.len() <= 3);
            assert_eq!(tree.leaf_values.len(), 1 << tree.splits.len());
        }
    }

    #[test]
    fn test_grid_param_names() {
        let mut model = CatBoostRegressor::default();
        Regressor::set_param(&mut model, "depth", &ParamValue::Int(8)).unwrap();
        Regressor::set_param(&mut model, "iterations", &ParamValue::Int(30)).unwrap();
        Regressor::set_param(&mut model, "learning_rate", &ParamValue::Float(0.05)).unwrap();
        assert_eq!(model.config.depth, 8);
        assert_eq!(model.config.iterations, 30);
        assert_eq!(model.config.learning_rate, 0.05);
        assert!(Regressor::set_param(&mut model, "criterion", &"poisson".into()).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let model = CatBoostRegressor::default();
        assert!(model.predict(&Array2::zeros((1, 3))).is_err());
    }
}
