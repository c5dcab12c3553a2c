//! Regression tree (CART) implementation

use crate::error::{ModelError, Result};
use super::params::{invalid, ParamSet, ParamValue};
use super::Regressor;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node, stored in a flat arena; children are arena indices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
        gain: f64,
    },
}

/// Split quality criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Variance reduction, mean leaves
    SquaredError,
    /// Friedman's improvement score, mean leaves
    FriedmanMse,
    /// Absolute deviation around the median, median leaves
    AbsoluteError,
    /// Half Poisson deviance, mean leaves; targets must be non-negative
    Poisson,
}

impl Criterion {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "squared_error" => Some(Criterion::SquaredError),
            "friedman_mse" => Some(Criterion::FriedmanMse),
            "absolute_error" => Some(Criterion::AbsoluteError),
            "poisson" => Some(Criterion::Poisson),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::SquaredError => "squared_error",
            Criterion::FriedmanMse => "friedman_mse",
            Criterion::AbsoluteError => "absolute_error",
            Criterion::Poisson => "poisson",
        }
    }
}

/// Running sums over a set of targets
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    n: f64,
    sum: f64,
    sq_sum: f64,
    ylogy_sum: f64,
}

impl Stats {
    fn push(&mut self, y: f64) {
        self.n += 1.0;
        self.sum += y;
        self.sq_sum += y * y;
        self.ylogy_sum += xlogx(y);
    }

    fn minus(&self, other: &Stats) -> Stats {
        Stats {
            n: self.n - other.n,
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
            ylogy_sum: self.ylogy_sum - other.ylogy_sum,
        }
    }

    /// Sum of squared deviations from the mean
    fn sse(&self) -> f64 {
        if self.n == 0.0 {
            return 0.0;
        }
        (self.sq_sum - self.sum * self.sum / self.n).max(0.0)
    }

    /// Half Poisson deviance times n; None when the node sum is not positive
    fn poisson_deviance(&self) -> Option<f64> {
        if self.sum <= 0.0 {
            return None;
        }
        Some(self.ylogy_sum - self.sum * (self.sum / self.n).ln())
    }

    fn mean(&self) -> f64 {
        if self.n == 0.0 { 0.0 } else { self.sum / self.n }
    }
}

fn xlogx(v: f64) -> f64 {
    if v > 0.0 { v * v.ln() } else { 0.0 }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn absolute_deviation(values: &mut [f64]) -> f64 {
    let m = median(values);
    values.iter().map(|v| (v - m).abs()).sum()
}

/// Best split found for one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    /// Nodes in build order; the root is at index 0, empty until fitted
    nodes: Vec<TreeNode>,
    /// Split quality criterion
    pub criterion: Criterion,
    /// Maximum depth (unbounded when None)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (all when None)
    pub max_features: Option<usize>,
    /// Seed for feature subsampling
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            criterion: Criterion::SquaredError,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Limit the number of features scanned per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
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
        if self.min_samples_split < 2 || self.min_samples_leaf < 1 {
            return Err(ModelError::ValidationError(
                "min_samples_split must be >= 2 and min_samples_leaf >= 1".to_string(),
            ));
        }
        if self.criterion == Criterion::Poisson {
            if y.iter().any(|&v| v < 0.0) {
                return Err(ModelError::TrainingError(
                    "Some value(s) of y are negative which is not allowed for Poisson regression".to_string(),
                ));
            }
            if y.sum() <= 0.0 {
                return Err(ModelError::TrainingError(
                    "Sum of y is not positive which is necessary for Poisson regression".to_string(),
                ));
            }
        }

        self.n_features = n_features;

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let mut nodes = Vec::new();
        self.build_tree(x, y, &indices, 0, &mut nodes, &mut importances, &mut rng);
        self.nodes = nodes;

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<TreeNode>,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let n_samples = indices.len();
        let id = nodes.len();
        nodes.push(TreeNode::Leaf {
            value: self.leaf_value(y, indices),
            n_samples,
        });

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure(y, indices);

        if should_stop {
            return id;
        }

        let features = self.candidate_features(x.ncols(), rng);
        let best = features
            .par_iter()
            .filter_map(|&feature_idx| self.best_split_for_feature(x, y, indices, feature_idx))
            .collect::<Vec<_>>()
            .into_iter()
            // keep the lowest feature index on ties so results do not depend on scheduling
            .fold(None::<SplitCandidate>, |acc, c| match acc {
                Some(a) if a.gain > c.gain || (a.gain == c.gain && a.feature_idx < c.feature_idx) => Some(a),
                _ => Some(c),
            });

        let Some(split) = best else {
            return id;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return id;
        }

        importances[split.feature_idx] += split.gain;

        let left = self.build_tree(x, y, &left_indices, depth + 1, nodes, importances, rng);
        let right = self.build_tree(x, y, &right_indices, depth + 1, nodes, importances, rng);

        nodes[id] = TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
            gain: split.gain,
        };
        id
    }

    fn candidate_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < n_features => {
                let mut picked = rand::seq::index::sample(rng, n_features, k.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..n_features).collect(),
        }
    }

    /// Scan every threshold of one feature, sweeping samples in sorted order
    fn best_split_for_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature_idx: usize,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<usize> = indices.to_vec();
        order.sort_by(|&a, &b| {
            x[[a, feature_idx]]
                .partial_cmp(&x[[b, feature_idx]])
                .unwrap_or(Ordering::Equal)
        });

        let n = order.len();
        let min_leaf = self.min_samples_leaf;

        let mut total = Stats::default();
        for &i in &order {
            total.push(y[i]);
        }
        let parent_sse = total.sse();
        let parent_abs = if self.criterion == Criterion::AbsoluteError {
            let mut vals: Vec<f64> = order.iter().map(|&i| y[i]).collect();
            absolute_deviation(&mut vals)
        } else {
            0.0
        };

        let mut left = Stats::default();
        let mut best: Option<SplitCandidate> = None;

        for pos in 1..n {
            left.push(y[order[pos - 1]]);

            let lo = x[[order[pos - 1], feature_idx]];
            let hi = x[[order[pos], feature_idx]];
            if hi <= lo || pos < min_leaf || n - pos < min_leaf {
                continue;
            }

            let right = total.minus(&left);
            let gain = match self.criterion {
                Criterion::SquaredError => parent_sse - left.sse() - right.sse(),
                Criterion::FriedmanMse => {
                    let diff = left.mean() - right.mean();
                    left.n * right.n / total.n * diff * diff
                }
                Criterion::Poisson => {
                    match (total.poisson_deviance(), left.poisson_deviance(), right.poisson_deviance()) {
                        (Some(p), Some(l), Some(r)) => p - l - r,
                        _ => continue,
                    }
                }
                Criterion::AbsoluteError => {
                    let mut lv: Vec<f64> = order[..pos].iter().map(|&i| y[i]).collect();
                    let mut rv: Vec<f64> = order[pos..].iter().map(|&i| y[i]).collect();
                    parent_abs - absolute_deviation(&mut lv) - absolute_deviation(&mut rv)
                }
            };

            if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold: (lo + hi) / 2.0,
                    gain,
                });
            }
        }

        best
    }

    fn leaf_value(&self, y: &Array1<f64>, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        match self.criterion {
            Criterion::AbsoluteError => {
                let mut vals: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
                median(&mut vals)
            }
            _ => indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64,
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.nodes.is_empty() {
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
            .map(|row| predict_sample(&self.nodes, |f| row[f]))
            .collect())
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth (a lone leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let TreeNode::Split { left, right, .. } = self.nodes[id] {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        max_depth
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, TreeNode::Leaf { .. }))
            .count()
    }
}

fn is_pure(y: &Array1<f64>, indices: &[usize]) -> bool {
    let first = y[indices[0]];
    indices.iter().all(|&i| (y[i] - first).abs() < 1e-10)
}

fn predict_sample(nodes: &[TreeNode], feature: impl Fn(usize) -> f64) -> f64 {
    let mut id = 0;
    loop {
        match &nodes[id] {
            TreeNode::Leaf { value, .. } => return *value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                id = if feature(*feature_idx) <= *threshold { *left } else { *right };
            }
        }
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        DecisionTreeRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        DecisionTreeRegressor::predict(self, x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "criterion" => {
                self.criterion = Criterion::parse(value.as_str(name)?)
                    .ok_or_else(|| invalid(name, value, "unknown criterion"))?;
            }
            "max_depth" => self.max_depth = Some(value.as_usize(name)?),
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?,
            "max_features" => self.max_features = Some(value.as_usize(name)?),
            "random_state" => self.random_state = Some(value.as_usize(name)? as u64),
            _ => return Err(invalid(name, value, "unknown parameter for DecisionTreeRegressor")),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("criterion".into(), self.criterion.as_str().into());
        if let Some(d) = self.max_depth {
            params.insert("max_depth".into(), d.into());
        }
        params.insert("min_samples_split".into(), self.min_samples_split.into());
        params.insert("min_samples_leaf".into(), self.min_samples_leaf.into());
        params
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
