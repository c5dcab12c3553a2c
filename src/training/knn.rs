//! K-Nearest Neighbors regressor

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::params::{invalid, ParamSet, ParamValue};
use super::Regressor;
use crate::error::{ModelError, Result};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNeighborsRegressor {
    pub config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNeighborsRegressor {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNeighborsRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    /// Fit the regressor (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ModelError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.config.n_neighbors == 0 {
            return Err(ModelError::ValidationError("n_neighbors must be at least 1".into()));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Predict target values (parallelized over query rows)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(ModelError::ModelNotFitted),
        };
        let k = self.config.n_neighbors;

        if k > x_train.nrows() {
            return Err(ModelError::ValidationError(format!(
                "Expected n_neighbors <= n_samples_fit, but n_neighbors = {}, n_samples_fit = {}",
                k,
                x_train.nrows()
            )));
        }
        if x.ncols() != x_train.ncols() {
            return Err(ModelError::ShapeError {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let metric = self.config.metric;
        let weights = self.config.weights;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k, metric);
                weighted_mean(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }
}

/// Max-heap entry keeping the k smallest distances
#[derive(PartialEq)]
struct DistLabel(f64, f64);

impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, &label) in x_train.rows().into_iter().zip(y_train.iter()) {
        let dist = compute_distance(point, row, metric);
        if heap.len() < k {
            heap.push(DistLabel(dist, label));
        } else if let Some(top) = heap.peek() {
            // strict comparison keeps the earliest training rows on distance ties
            if dist < top.0 {
                heap.pop();
                heap.push(DistLabel(dist, label));
            }
        }
    }

    heap.into_iter().map(|DistLabel(d, l)| (d, l)).collect()
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
        DistanceMetric::Minkowski(p) => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p),
    }
}

fn weighted_mean(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    match weights {
        WeightScheme::Uniform => {
            neighbors.iter().map(|(_, l)| l).sum::<f64>() / neighbors.len() as f64
        }
        WeightScheme::Distance => {
            // exact matches take all the weight
            let exact: Vec<f64> = neighbors
                .iter()
                .filter(|(d, _)| *d == 0.0)
                .map(|(_, l)| *l)
                .collect();
            if !exact.is_empty() {
                return exact.iter().sum::<f64>() / exact.len() as f64;
            }
            let (num, den) = neighbors.iter().fold((0.0, 0.0), |(num, den), (d, l)| {
                (num + l / d, den + 1.0 / d)
            });
            num / den
        }
    }
}

impl Regressor for KNeighborsRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        KNeighborsRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KNeighborsRegressor::predict(self, x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_neighbors" => self.config.n_neighbors = value.as_usize(name)?,
            "weights" => {
                self.config.weights = match value.as_str(name)? {
                    "uniform" => WeightScheme::Uniform,
                    "distance" => WeightScheme::Distance,
                    _ => return Err(invalid(name, value, "expected uniform or distance")),
                };
            }
            "p" => {
                self.config.metric = match value.as_f64(name)? {
                    p if p == 1.0 => DistanceMetric::Manhattan,
                    p if p == 2.0 => DistanceMetric::Euclidean,
                    p if p > 0.0 => DistanceMetric::Minkowski(p),
                    _ => return Err(invalid(name, value, "p must be positive")),
                };
            }
            _ => return Err(invalid(name, value, "unknown parameter for KNeighborsRegressor")),
        }
        Ok(())
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("n_neighbors".into(), self.config.n_neighbors.into());
        let weights = match self.config.weights {
            WeightScheme::Uniform => "uniform",
            WeightScheme::Distance => "distance",
        };
        params.insert("weights".into(), weights.into());
        let p = match self.config.metric {
            DistanceMetric::Manhattan => 1.0,
            DistanceMetric::Euclidean => 2.0,
            DistanceMetric::Minkowski(p) => p,
        };
        params.insert("p".into(), p.into());
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
    use ndarray::array;

    #[test]
    fn test_knn_regressor_uniform() {
        let x = array![[0.0], [1.0], [2.0], [10.0], [11.0]];
        let y = array![1.0, 2.0, 3.0, 10.0, 20.0];

        let mut model = KNeighborsRegressor::with_k(3);
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&array![[1.0], [10.5]]).unwrap();
        assert!((preds[0] - 2.0).abs() < 1e-12);
        // neighbours of 10.5: 10, 11 and 2
        assert!((preds[1] - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_knn_distance_weights_exact_match() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![5.0, 7.0, 9.0];

        let mut model = KNeighborsRegressor::new(KNNConfig {
            n_neighbors: 2,
            weights: WeightScheme::Distance,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&array![[1.0]]).unwrap();
        assert_eq!(preds[0], 7.0);
    }

    #[test]
    fn test_too_many_neighbors() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        let mut model = KNeighborsRegressor::default();
        model.fit(&x, &y).unwrap();
        assert!(model.predict(&x).is_err());
    }

    #[test]
    fn test_distances() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_eq!(compute_distance(a.view(), b.view(), DistanceMetric::Euclidean), 5.0);
        assert_eq!(compute_distance(a.view(), b.view(), DistanceMetric::Manhattan), 7.0);
    }

    #[test]
    fn test_params_describe_metric() {
        let mut model = KNeighborsRegressor::default();
        assert_eq!(model.params()["p"], ParamValue::Float(2.0));

        model.set_param("p", &ParamValue::Float(3.0)).unwrap();
        assert_eq!(model.config.metric, DistanceMetric::Minkowski(3.0));

        let mut restored = KNeighborsRegressor::default();
        restored.set_params(&model.params()).unwrap();
        assert_eq!(restored.config, model.config);

        model.set_param("p", &ParamValue::Float(1.0)).unwrap();
        assert_eq!(model.params()["p"], ParamValue::Float(1.0));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = KNeighborsRegressor::default();
        assert!(matches!(model.predict(&array![[1.0]]), Err(ModelError::ModelNotFitted)));
    }
}
