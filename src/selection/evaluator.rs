//! Hyperparameter search and held-out scoring of catalog candidates

use std::time::Instant;

use ndarray::{s, Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::catalog::{CatalogEntry, ModelCatalog};
use crate::error::{ModelError, Result};
use crate::training::{format_params, r2_score, CVResults, CVSplit, CrossValidator, ParamSet, Regressor};

/// Train/test features and targets, split off the last column of each matrix
#[derive(Debug, Clone)]
pub struct SplitData {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

impl SplitData {
    /// Split `train` and `test` so that the last column becomes the target
    pub fn from_arrays(train: &Array2<f64>, test: &Array2<f64>) -> Result<Self> {
        if train.ncols() != test.ncols() {
            return Err(ModelError::ShapeError {
                expected: format!("{} columns in the test set", train.ncols()),
                actual: format!("{} columns", test.ncols()),
            });
        }
        if train.ncols() < 2 {
            return Err(ModelError::DataError(
                "Need at least one feature column and a target column".to_string(),
            ));
        }
        if train.nrows() == 0 || test.nrows() == 0 {
            return Err(ModelError::DataError(format!(
                "Train and test sets must be non-empty (got {} and {} rows)",
                train.nrows(),
                test.nrows()
            )));
        }

        let target = train.ncols() - 1;
        Ok(Self {
            x_train: train.slice(s![.., ..target]).to_owned(),
            y_train: train.column(target).to_owned(),
            x_test: test.slice(s![.., ..target]).to_owned(),
            y_test: test.column(target).to_owned(),
        })
    }

    pub fn n_features(&self) -> usize {
        self.x_train.ncols()
    }
}

/// Outcome of tuning and scoring one candidate
#[derive(Debug)]
pub struct ModelReport {
    pub name: String,
    /// Winning assignment from the search; empty when defaults were used
    pub best_params: ParamSet,
    /// Per-fold R² of the winning assignment, when CV ran
    pub cv: Option<CVResults>,
    /// R² on the test split
    pub test_score: f64,
    /// Estimator fitted on the full training split with `best_params`
    pub estimator: Box<dyn Regressor>,
}

impl ModelReport {
    /// Mean cross-validated R²
    pub fn cv_score(&self) -> Option<f64> {
        self.cv.as_ref().map(|cv| cv.mean_score)
    }

    /// Standard deviation of the fold scores
    pub fn cv_std(&self) -> Option<f64> {
        self.cv.as_ref().map(|cv| cv.std_score)
    }
}

/// Reports for every candidate, in catalog order
#[derive(Debug, Default)]
pub struct Evaluation {
    reports: Vec<ModelReport>,
}

impl Evaluation {
    pub fn new(reports: Vec<ModelReport>) -> Self {
        Self { reports }
    }

    /// Highest test score; the earliest report wins a tie
    pub fn best(&self) -> Option<&ModelReport> {
        self.best_index().map(|i| &self.reports[i])
    }

    /// Take ownership of the winning report
    pub fn into_best(mut self) -> Option<ModelReport> {
        let i = self.best_index()?;
        Some(self.reports.swap_remove(i))
    }

    fn best_index(&self) -> Option<usize> {
        // NaN never wins
        let score = |r: &ModelReport| if r.test_score.is_nan() { f64::NEG_INFINITY } else { r.test_score };
        let mut best: Option<usize> = None;
        for (i, report) in self.reports.iter().enumerate() {
            if best.map_or(true, |b| score(report) > score(&self.reports[b])) {
                best = Some(i);
            }
        }
        best
    }

    pub fn get(&self, name: &str) -> Option<&ModelReport> {
        self.reports.iter().find(|r| r.name == name)
    }

    pub fn reports(&self) -> &[ModelReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// Tunes, fits and scores every candidate of a catalog
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, data: &SplitData, catalog: &ModelCatalog) -> Result<Evaluation>;
}

/// Exhaustive grid search scored by k-fold cross-validated R²
#[derive(Debug, Clone)]
pub struct GridSearchEvaluator {
    cv: CrossValidator,
}

impl Default for GridSearchEvaluator {
    fn default() -> Self {
        Self::new(3)
    }
}

impl GridSearchEvaluator {
    pub fn new(cv_folds: usize) -> Self {
        Self {
            cv: CrossValidator::k_fold(cv_folds),
        }
    }

    /// R² of every fold for one assignment
    fn cross_validate(
        &self,
        entry: &CatalogEntry,
        params: &ParamSet,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CVSplit],
    ) -> Result<CVResults> {
        let mut scores = Vec::with_capacity(splits.len());
        for split in splits {
            let mut model = entry.build();
            model.set_params(params)?;
            model.fit(
                &x.select(Axis(0), &split.train_indices),
                &y.select(Axis(0), &split.train_indices),
            )?;
            let preds = model.predict(&x.select(Axis(0), &split.test_indices))?;
            scores.push(r2_score(&y.select(Axis(0), &split.test_indices), &preds)?);
        }
        let results = CVResults::from_scores(scores);
        if results.mean_score.is_nan() {
            return Err(ModelError::ComputationError("cross-validated score is NaN".into()));
        }
        Ok(results)
    }

    /// Best assignment for one candidate and its fold scores
    fn search(&self, entry: &CatalogEntry, data: &SplitData) -> Result<(ParamSet, Option<CVResults>)> {
        let combos = entry.grid.combinations();
        if combos.len() <= 1 {
            return Ok((combos.into_iter().next().unwrap_or_default(), None));
        }

        let n_rows = data.x_train.nrows();
        if n_rows < self.cv.n_splits() {
            warn!(
                model = %entry.name,
                rows = n_rows,
                folds = self.cv.n_splits(),
                "Too few rows to cross-validate, using the first grid combination"
            );
            return Ok((combos.into_iter().next().unwrap_or_default(), None));
        }

        let splits = self.cv.split(n_rows)?;

        let mut results: Vec<Option<CVResults>> = combos
            .par_iter()
            .map(|params| {
                match self.cross_validate(entry, params, &data.x_train, &data.y_train, &splits) {
                    Ok(cv) => {
                        debug!(
                            model = %entry.name,
                            params = %format_params(params),
                            score = cv.mean_score,
                            std = cv.std_score,
                            "Scored combination"
                        );
                        Some(cv)
                    }
                    Err(e) => {
                        warn!(model = %entry.name, params = %format_params(params), error = %e, "Skipping combination");
                        None
                    }
                }
            })
            .collect();

        // First best in expansion order
        let mut best: Option<(usize, f64)> = None;
        for (i, cv) in results.iter().enumerate() {
            if let Some(cv) = cv {
                if best.map_or(true, |(_, b)| cv.mean_score > b) {
                    best = Some((i, cv.mean_score));
                }
            }
        }

        match best {
            Some((i, _)) => Ok((combos[i].clone(), results[i].take())),
            None => {
                warn!(model = %entry.name, "Every combination failed, falling back to defaults");
                Ok((ParamSet::new(), None))
            }
        }
    }

    fn evaluate_entry(&self, entry: &CatalogEntry, data: &SplitData) -> Result<ModelReport> {
        let start = Instant::now();
        let (best_params, cv) = self.search(entry, data)?;

        let mut estimator = entry.build();
        estimator.set_params(&best_params)?;
        estimator.fit(&data.x_train, &data.y_train)?;
        let test_score = r2_score(&data.y_test, &estimator.predict(&data.x_test)?)?;

        info!(
            model = %entry.name,
            params = %format_params(&best_params),
            cv_score = cv.as_ref().map_or(f64::NAN, |c| c.mean_score),
            test_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evaluated model"
        );

        Ok(ModelReport {
            name: entry.name.clone(),
            best_params,
            cv,
            test_score,
            estimator,
        })
    }
}

impl Evaluator for GridSearchEvaluator {
    fn evaluate(&self, data: &SplitData, catalog: &ModelCatalog) -> Result<Evaluation> {
        let reports = catalog
            .entries()
            .iter()
            .map(|entry| {
                self.evaluate_entry(entry, data).map_err(|e| {
                    ModelError::TrainingError(format!("{} failed: {}", entry.name, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Evaluation::new(reports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{DecisionTreeRegressor, LinearRegression, ParamGrid, ParamValue};
    use ndarray::{concatenate, Array2};

    fn linear_matrix(n: usize, offset: usize) -> Array2<f64> {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i + offset) * (j + 2) % 17) as f64);
        let y = x.column(0).mapv(|v| 2.0 * v) - x.column(1) + 1.0;
        concatenate![Axis(1), x, y.insert_axis(Axis(1))]
    }

    fn catalog() -> ModelCatalog {
        ModelCatalog::new()
            .with_entry(
                CatalogEntry::new("Tree", || Box::new(DecisionTreeRegressor::new()) as Box<dyn Regressor>)
                    .with_grid(ParamGrid::new().with("max_depth", [1usize, 8]).with("criterion", ["squared_error"])),
            )
            .unwrap()
            .with_entry(CatalogEntry::new("Linear", || Box::new(LinearRegression::new()) as Box<dyn Regressor>))
            .unwrap()
    }

    #[test]
    fn test_split_uses_last_column_as_target() {
        let train = ndarray::array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let test = ndarray::array![[7.0, 8.0, 9.0]];
        let data = SplitData::from_arrays(&train, &test).unwrap();
        assert_eq!(data.n_features(), 2);
        assert_eq!(data.y_train, ndarray::array![3.0, 6.0]);
        assert_eq!(data.x_test, ndarray::array![[7.0, 8.0]]);
    }

    #[test]
    fn test_split_rejects_bad_shapes() {
        let train = Array2::<f64>::zeros((4, 3));
        assert!(SplitData::from_arrays(&train, &Array2::zeros((2, 4))).is_err());
        assert!(SplitData::from_arrays(&Array2::zeros((4, 1)), &Array2::zeros((2, 1))).is_err());
        assert!(SplitData::from_arrays(&train, &Array2::zeros((0, 3))).is_err());
    }

    #[test]
    fn test_grid_search_picks_deeper_tree() {
        let data = SplitData::from_arrays(&linear_matrix(60, 0), &linear_matrix(20, 7)).unwrap();
        let evaluation = GridSearchEvaluator::new(3).evaluate(&data, &catalog()).unwrap();

        assert_eq!(evaluation.len(), 2);
        let tree = evaluation.get("Tree").unwrap();
        assert_eq!(tree.best_params["max_depth"], ParamValue::Int(8));
        let cv = tree.cv.as_ref().unwrap();
        assert_eq!(cv.n_folds, 3);
        assert_eq!(tree.cv_score(), Some(cv.mean_score));
        assert!(tree.cv_std().unwrap() >= 0.0);

        let linear = evaluation.get("Linear").unwrap();
        assert!(linear.best_params.is_empty());
        assert!(linear.cv.is_none());
        assert!(linear.test_score > 0.999);
        assert_eq!(evaluation.best().unwrap().name, "Linear");
    }

    #[test]
    fn test_failing_combinations_are_skipped() {
        let entry = CatalogEntry::new("Tree", || Box::new(DecisionTreeRegressor::new()) as Box<dyn Regressor>)
            .with_grid(ParamGrid::new().with("min_samples_split", [0usize, 4]));
        let catalog = ModelCatalog::new().with_entry(entry).unwrap();
        let data = SplitData::from_arrays(&linear_matrix(30, 0), &linear_matrix(10, 3)).unwrap();

        let evaluation = GridSearchEvaluator::new(3).evaluate(&data, &catalog).unwrap();
        let report = evaluation.get("Tree").unwrap();
        assert_eq!(report.best_params["min_samples_split"], ParamValue::Int(4));
    }

    #[test]
    fn test_too_few_rows_skips_cv() {
        let mut catalog = catalog();
        catalog.retain(&["Tree"]);
        let data = SplitData::from_arrays(&linear_matrix(2, 0), &linear_matrix(3, 5)).unwrap();
        let evaluation = GridSearchEvaluator::new(3).evaluate(&data, &catalog).unwrap();
        let tree = evaluation.get("Tree").unwrap();
        assert!(tree.cv.is_none());
        assert_eq!(tree.best_params["max_depth"], ParamValue::Int(1));
    }

    #[test]
    fn test_best_prefers_first_on_tie() {
        let make = |name: &str, score: f64| ModelReport {
            name: name.to_string(),
            best_params: ParamSet::new(),
            cv: None,
            test_score: score,
            estimator: Box::new(LinearRegression::new()),
        };
        let evaluation = Evaluation::new(vec![make("a", 0.5), make("b", 0.9), make("c", 0.9)]);
        assert_eq!(evaluation.best().unwrap().name, "b");
        assert_eq!(evaluation.into_best().unwrap().name, "b");
        assert!(Evaluation::default().best().is_none());
    }
}
