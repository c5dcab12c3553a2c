//! Random Forest regressor

use crate::error::{ModelError, Result};
use super::decision_tree::{Criterion, DecisionTreeRegressor};
use super::params::{invalid, ParamSet, ParamValue};
use super::Regressor;
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

/// Bagged ensemble of regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<DecisionTreeRegressor>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features per split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Split criterion shared by every tree
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            criterion: Criterion::SquaredError,
            random_state: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
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
        if self.n_estimators == 0 {
            return Err(ModelError::ValidationError("n_estimators must be at least 1".into()));
        }

        self.n_features = n_features;
        let max_features = self.compute_max_features(n_features);
        let base_seed = self.random_state.unwrap_or(42);

        // Build trees in parallel; each tree owns a seed derived from its index
        let trees: Vec<DecisionTreeRegressor> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTreeRegressor::new()
                    .with_criterion(self.criterion)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(seed);
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *total += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Mean prediction over all trees
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ModelError::ModelNotFitted);
        }

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut sum = Array1::zeros(x.nrows());
        for preds in &all_predictions {
            sum += preds;
        }
        Ok(sum / all_predictions.len() as f64)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForestRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForestRegressor::predict(self, x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "max_depth" => self.max_depth = Some(value.as_usize(name)?),
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?,
            "criterion" => {
                self.criterion = Criterion::parse(value.as_str(name)?)
                    .ok_or_else(|| invalid(name, value, "unknown criterion"))?;
            }
            "max_features" => {
                self.max_features = match value {
                    ParamValue::Text(s) if s == "sqrt" => MaxFeatures::Sqrt,
                    ParamValue::Text(s) if s == "log2" => MaxFeatures::Log2,
                    ParamValue::Int(n) if *n > 0 => MaxFeatures::Fixed(*n as usize),
                    ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => MaxFeatures::Fraction(*f),
                    _ => return Err(invalid(name, value, "expected sqrt, log2, a count or a fraction")),
                };
            }
            "random_state" => self.random_state = Some(value.as_usize(name)? as u64),
            _ => return Err(invalid(name, value, "unknown parameter for RandomForestRegressor")),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("n_estimators".into(), self.n_estimators.into());
        params.insert("criterion".into(), self.criterion.as_str().into());
        if let Some(d) = self.max_depth {
            params.insert("max_depth".into(), d.into());
        }
        params
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
