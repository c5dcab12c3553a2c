//! Hyperparameter values and search grids

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Read as a non-negative integer
    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            other => Err(invalid(name, other, "expected a non-negative integer")),
        }
    }

    /// Read as a float; integers are widened
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(invalid(name, other, "expected a number")),
        }
    }

    /// Read as a string
    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Text(s) => Ok(s),
            other => Err(invalid(name, other, "expected a string")),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Build an [`ModelError::InvalidParameter`] for a rejected value
pub fn invalid(name: &str, value: &ParamValue, reason: &str) -> ModelError {
    ModelError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// One concrete hyperparameter assignment
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Candidate values per hyperparameter. An empty grid means "defaults only".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add candidate values for a hyperparameter
    pub fn with<V: Into<ParamValue>>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.params
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of combinations the grid expands to
    pub fn n_combinations(&self) -> usize {
        self.params.values().map(|v| v.len()).product()
    }

    /// Cartesian product of all candidate values.
    ///
    /// Keys are visited in sorted order and the last key varies fastest. An
    /// empty grid yields a single empty assignment.
    pub fn combinations(&self) -> Vec<ParamSet> {
        let mut combos: Vec<ParamSet> = vec![ParamSet::new()];
        for (name, values) in &self.params {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    let mut c = combo.clone();
                    c.insert(name.clone(), value.clone());
                    next.push(c);
                }
            }
            combos = next;
        }
        combos
    }
}

/// Render an assignment as `a=1, b=0.1` for logs
pub fn format_params(params: &ParamSet) -> String {
    if params.is_empty() {
        return "defaults".to_string();
    }
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_grid_yields_defaults() {
        let grid = ParamGrid::new();
        let combos = grid.combinations();
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
        assert_eq!(grid.n_combinations(), 1);
    }

    #[test]
    fn test_grid_expansion_order() {
        let grid = ParamGrid::new()
            .with("n_estimators", [8usize, 16])
            .with("learning_rate", [0.1, 0.01, 0.5]);

        let combos = grid.combinations();
        assert_eq!(combos.len(), 6);
        assert_eq!(grid.n_combinations(), 6);
        assert_eq!(combos[0]["learning_rate"], ParamValue::Float(0.1));
        assert_eq!(combos[0]["n_estimators"], ParamValue::Int(8));
        assert_eq!(combos[1]["n_estimators"], ParamValue::Int(16));
        assert_eq!(combos[2]["learning_rate"], ParamValue::Float(0.01));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(ParamValue::Int(3).as_usize("k").unwrap(), 3);
        assert_eq!(ParamValue::Int(3).as_f64("lr").unwrap(), 3.0);
        assert!(ParamValue::Int(-1).as_usize("k").is_err());
        assert!(ParamValue::Float(0.5).as_usize("k").is_err());
        assert!(ParamValue::Text("x".into()).as_f64("lr").is_err());
        assert_eq!(ParamValue::from("poisson").as_str("criterion").unwrap(), "poisson");
    }

    #[test]
    fn test_untagged_json() {
        let set: ParamSet = serde_json::from_str(r#"{"a": 8, "b": 0.5, "c": "poisson"}"#).unwrap();
        assert_eq!(set["a"], ParamValue::Int(8));
        assert_eq!(set["b"], ParamValue::Float(0.5));
        assert_eq!(set["c"], ParamValue::Text("poisson".into()));
        assert_eq!(format_params(&set), "a=8, b=0.5, c=poisson");
    }
}
