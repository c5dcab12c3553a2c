//! Candidate models and their hyperparameter grids

use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, Result};
use crate::training::{
    AdaBoostRegressor, CatBoostRegressor, DecisionTreeRegressor, Estimator, GradientBoostingRegressor,
    KNeighborsRegressor, LinearRegression, ParamGrid, RandomForestRegressor, Regressor,
};

/// Builds a fresh, unfitted estimator
pub type EstimatorFactory = Arc<dyn Fn() -> Box<dyn Regressor> + Send + Sync>;

/// One candidate: a display name, how to build it, and what to tune
#[derive(Clone)]
pub struct CatalogEntry {
    pub name: String,
    factory: EstimatorFactory,
    pub grid: ParamGrid,
}

impl CatalogEntry {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Regressor> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            grid: ParamGrid::new(),
        }
    }

    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = grid;
        self
    }

    /// A new unfitted estimator with default hyperparameters
    pub fn build(&self) -> Box<dyn Regressor> {
        (self.factory)()
    }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.name)
            .field("grid", &self.grid)
            .finish_non_exhaustive()
    }
}

/// Ordered set of candidates. Order decides ties between equal scores.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    entries: Vec<CatalogEntry>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The seven builtin regressors, seeded with 42
    pub fn builtin() -> Self {
        Self::builtin_with_seed(42)
    }

    /// The seven builtin regressors, in tie-breaking order
    pub fn builtin_with_seed(seed: u64) -> Self {
        let entries = vec![
            CatalogEntry::new("Random Forest", move || {
                Box::new(Estimator::RandomForest(RandomForestRegressor::default().with_random_state(seed)))
                    as Box<dyn Regressor>
            })
            .with_grid(ParamGrid::new().with("n_estimators", [8usize, 16, 32, 64, 128, 256])),
            CatalogEntry::new("Decision Tree", move || {
                Box::new(Estimator::DecisionTree(DecisionTreeRegressor::new().with_random_state(seed)))
                    as Box<dyn Regressor>
            })
            .with_grid(ParamGrid::new().with(
                "criterion",
                ["squared_error", "friedman_mse", "absolute_error", "poisson"],
            )),
            CatalogEntry::new("Gradient Boosting", move || {
                let mut model = GradientBoostingRegressor::default();
                model.config.random_state = Some(seed);
                Box::new(Estimator::GradientBoosting(model)) as Box<dyn Regressor>
            })
            .with_grid(
                ParamGrid::new()
                    .with("learning_rate", [0.1, 0.01, 0.05, 0.001])
                    .with("subsample", [0.6, 0.7, 0.75, 0.8, 0.85, 0.9])
                    .with("n_estimators", [8usize, 16, 32, 64, 128, 256]),
            ),
            CatalogEntry::new("Linear Regression", || {
                Box::new(Estimator::LinearRegression(LinearRegression::new())) as Box<dyn Regressor>
            }),
            CatalogEntry::new("K-Neighbours Regressor", || {
                Box::new(Estimator::KNeighbors(KNeighborsRegressor::default())) as Box<dyn Regressor>
            }),
            CatalogEntry::new("CatBoosting Regressor", move || {
                let mut model = CatBoostRegressor::default();
                model.config.random_seed = Some(seed);
                Box::new(Estimator::CatBoost(model)) as Box<dyn Regressor>
            })
            .with_grid(
                ParamGrid::new()
                    .with("depth", [6usize, 8, 10])
                    .with("learning_rate", [0.01, 0.05, 0.1])
                    .with("iterations", [30usize, 50, 100]),
            ),
            CatalogEntry::new("AdaBoost Regressor", move || {
                Box::new(Estimator::AdaBoost(AdaBoostRegressor::default().with_random_state(seed)))
                    as Box<dyn Regressor>
            })
            .with_grid(
                ParamGrid::new()
                    .with("learning_rate", [0.1, 0.01, 0.5, 0.001])
                    .with("n_estimators", [8usize, 16, 32, 64, 128, 256]),
            ),
        ];
        Self { entries }
    }

    /// Append a candidate; names must be unique
    pub fn push(&mut self, entry: CatalogEntry) -> Result<()> {
        if self.get(&entry.name).is_some() {
            return Err(ModelError::ConfigError(format!(
                "duplicate model name in catalog: {}",
                entry.name
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn with_entry(mut self, entry: CatalogEntry) -> Result<Self> {
        self.push(entry)?;
        Ok(self)
    }

    /// Replace the grid of an existing entry
    pub fn set_grid(&mut self, name: &str, grid: ParamGrid) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| ModelError::UnknownModel(name.to_string()))?;
        entry.grid = grid;
        Ok(())
    }

    /// Keep only the named entries, preserving catalog order
    pub fn retain(&mut self, names: &[&str]) {
        self.entries.retain(|e| names.contains(&e.name.as_str()));
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
