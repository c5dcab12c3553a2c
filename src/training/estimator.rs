//! Closed set of builtin regressors
//!
//! [`Estimator`] wraps every regressor the crate ships so fitted models can be
//! written to and read back from a single JSON document.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::adaboost::AdaBoostRegressor;
use super::catboost::CatBoostRegressor;
use super::decision_tree::DecisionTreeRegressor;
use super::gradient_boosting::GradientBoostingRegressor;
use super::knn::KNeighborsRegressor;
use super::linear_models::LinearRegression;
use super::params::{ParamSet, ParamValue};
use super::random_forest::RandomForestRegressor;
use super::Regressor;
use crate::error::{ModelError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum Estimator {
    RandomForest(RandomForestRegressor),
    DecisionTree(DecisionTreeRegressor),
    GradientBoosting(GradientBoostingRegressor),
    LinearRegression(LinearRegression),
    KNeighbors(KNeighborsRegressor),
    CatBoost(CatBoostRegressor),
    AdaBoost(AdaBoostRegressor),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            Estimator::RandomForest($m) => $body,
            Estimator::DecisionTree($m) => $body,
            Estimator::GradientBoosting($m) => $body,
            Estimator::LinearRegression($m) => $body,
            Estimator::KNeighbors($m) => $body,
            Estimator::CatBoost($m) => $body,
            Estimator::AdaBoost($m) => $body,
        }
    };
}

impl Estimator {
    /// Unfitted estimator with library defaults, looked up by its serialized kind
    pub fn from_kind(kind: &str) -> Result<Self> {
        Ok(match kind {
            "random_forest" => Estimator::RandomForest(RandomForestRegressor::default()),
            "decision_tree" => Estimator::DecisionTree(DecisionTreeRegressor::default()),
            "gradient_boosting" => Estimator::GradientBoosting(GradientBoostingRegressor::default()),
            "linear_regression" => Estimator::LinearRegression(LinearRegression::default()),
            "k_neighbors" => Estimator::KNeighbors(KNeighborsRegressor::default()),
            "cat_boost" => Estimator::CatBoost(CatBoostRegressor::default()),
            "ada_boost" => Estimator::AdaBoost(AdaBoostRegressor::default()),
            other => return Err(ModelError::UnknownModel(other.to_string())),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::RandomForest(_) => "random_forest",
            Estimator::DecisionTree(_) => "decision_tree",
            Estimator::GradientBoosting(_) => "gradient_boosting",
            Estimator::LinearRegression(_) => "linear_regression",
            Estimator::KNeighbors(_) => "k_neighbors",
            Estimator::CatBoost(_) => "cat_boost",
            Estimator::AdaBoost(_) => "ada_boost",
        }
    }

    /// Rebuild an estimator from the JSON written by [`Regressor::to_json`]
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        dispatch!(self, m => Regressor::fit(m, x, y))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        dispatch!(self, m => Regressor::predict(m, x))
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        dispatch!(self, m => m.set_param(name, value))
    }

    fn params(&self) -> ParamSet {
        dispatch!(self, m => m.params())
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }

    // Tagged so the kind survives the round trip
    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
