//! Trainer configuration

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the winning model is rebuilt before it is scored and persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefitStrategy {
    /// Refit with the hyperparameters chosen by the search
    #[default]
    BestParams,
    /// Refit a fresh estimator with library defaults, ignoring the search
    Defaults,
}

/// Configuration for [`ModelTrainer`](super::ModelTrainer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Where the winning model is written
    pub artifact_path: PathBuf,

    /// Minimum held-out R² a model needs to be accepted
    pub min_score: f64,

    /// Folds used when scoring each hyperparameter combination
    pub cv_folds: usize,

    pub refit: RefitStrategy,

    /// Seed applied to every estimator that accepts one
    pub random_state: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("artifacts").join("model.json"),
            min_score: 0.6,
            cv_folds: 3,
            refit: RefitStrategy::BestParams,
            random_state: 42,
        }
    }
}

impl TrainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_cv_folds(mut self, cv_folds: usize) -> Self {
        self.cv_folds = cv_folds;
        self
    }

    pub fn with_refit(mut self, refit: RefitStrategy) -> Self {
        self.refit = refit;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(ModelError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !self.min_score.is_finite() {
            return Err(ModelError::ConfigError("min_score must be finite".into()));
        }
        if self.artifact_path.as_os_str().is_empty() {
            return Err(ModelError::ConfigError("artifact_path is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainerConfig::default();
        assert_eq!(config.min_score, 0.6);
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.refit, RefitStrategy::BestParams);
        assert!(config.artifact_path.ends_with("model.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trainer.json");
        std::fs::write(&path, r#"{"min_score": 0.8, "refit": "defaults"}"#).unwrap();

        let config = TrainerConfig::from_file(&path).unwrap();
        assert_eq!(config.min_score, 0.8);
        assert_eq!(config.refit, RefitStrategy::Defaults);
        assert_eq!(config.cv_folds, 3);
    }

    #[test]
    fn test_invalid_folds() {
        let config = TrainerConfig::new().with_cv_folds(1);
        assert!(matches!(config.validate(), Err(ModelError::ConfigError(_))));
    }
}
