//! Persisted form of the selected model

use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::training::{Estimator, ParamSet, Regressor};
use crate::utils::persistence::{load_object, save_object};

/// JSON document written for the winning model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Catalog name, e.g. "Linear Regression"
    pub model_name: String,
    pub saved_at: DateTime<Utc>,
    /// Test R² of the persisted estimator
    pub r2_score: f64,
    /// Hyperparameters the estimator was fitted with
    pub params: ParamSet,
    pub n_features: usize,
    /// Fitted estimator state as produced by [`Regressor::to_json`]
    pub estimator: serde_json::Value,
}

impl ModelArtifact {
    pub fn new(
        model_name: impl Into<String>,
        r2_score: f64,
        n_features: usize,
        estimator: &dyn Regressor,
    ) -> Result<Self> {
        Ok(Self {
            model_name: model_name.into(),
            saved_at: Utc::now(),
            r2_score,
            params: estimator.params(),
            n_features,
            estimator: estimator.to_json()?,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_object(path, self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_object(path)
    }

    /// Rebuild the fitted estimator. Only builtin estimators can be restored.
    pub fn to_estimator(&self) -> Result<Estimator> {
        Estimator::from_json(self.estimator.clone())
    }

    /// Predict with the stored estimator
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(ModelError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        self.to_estimator()?.predict(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::LinearRegression;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn fitted() -> Estimator {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];
        let mut model = Estimator::LinearRegression(LinearRegression::new());
        model.fit(&x, &y).unwrap();
        model
    }

    #[test]
    fn test_save_and_predict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts/model.json");

        let model = fitted();
        ModelArtifact::new("Linear Regression", 1.0, 1, &model).unwrap().save(&path).unwrap();

        let artifact = ModelArtifact::load(&path).unwrap();
        assert_eq!(artifact.model_name, "Linear Regression");
        assert_eq!(artifact.n_features, 1);
        let preds = artifact.predict(&array![[10.0]]).unwrap();
        assert!((preds[0] - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_every_builtin_estimator_reloads() {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| ((i * (j + 2) + j) % 17) as f64 / 4.0);
        let y = x.column(0).mapv(|v| v * v) + x.column(1).mapv(f64::sin) * 3.0 - x.column(2);

        let dir = tempfile::tempdir().unwrap();
        for kind in [
            "random_forest",
            "decision_tree",
            "gradient_boosting",
            "linear_regression",
            "k_neighbors",
            "cat_boost",
            "ada_boost",
        ] {
            let mut model = Estimator::from_kind(kind).unwrap();
            model.fit(&x, &y).unwrap();
            let before = model.predict(&x).unwrap();

            let path = dir.path().join(format!("{kind}.json"));
            ModelArtifact::new(kind, 0.9, 3, &model).unwrap().save(&path).unwrap();
            let artifact = ModelArtifact::load(&path).unwrap();

            assert_eq!(artifact.to_estimator().unwrap().kind(), kind);
            assert_eq!(artifact.params, model.params(), "{kind}");
            let after = artifact.predict(&x).unwrap();
            for (a, b) in after.iter().zip(before.iter()) {
                assert_relative_eq!(*a, *b, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_deep_tree_artifact_reloads() {
        // exponential targets grow a tree far deeper than serde_json's nesting limit
        let x = Array2::from_shape_fn((200, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(200, |i| 1.5f64.powi(i as i32));
        let mut model = Estimator::from_kind("decision_tree").unwrap();
        model.fit(&x, &y).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        ModelArtifact::new("Decision Tree", 1.0, 1, &model).unwrap().save(&path).unwrap();

        let artifact = ModelArtifact::load(&path).unwrap();
        assert_eq!(artifact.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn test_feature_count_checked() {
        let artifact = ModelArtifact::new("Linear Regression", 1.0, 1, &fitted()).unwrap();
        assert!(matches!(
            artifact.predict(&array![[1.0, 2.0]]),
            Err(ModelError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_non_builtin_state_is_rejected() {
        let mut artifact = ModelArtifact::new("Linear Regression", 1.0, 1, &fitted()).unwrap();
        artifact.estimator = serde_json::json!({ "kind": "svm", "model": {} });
        assert!(artifact.to_estimator().is_err());
    }
}
