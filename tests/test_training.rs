//! Integration test: model selection end-to-end

use approx::assert_relative_eq;
use model_trainer::prelude::*;
use model_trainer::training::{DecisionTreeRegressor, LinearRegression};
use ndarray::{s, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Rows of `[x1, x2, x3, y]` with `y = 2*x1 + 3*x2 - x3 + noise`
fn linear_rows(n: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
    let mut data = Array2::zeros((n, 4));
    for mut row in data.rows_mut() {
        let x1: f64 = rng.gen_range(0.0..10.0);
        let x2: f64 = rng.gen_range(0.0..10.0);
        let x3: f64 = rng.gen_range(0.0..10.0);
        let noise: f64 = rng.gen_range(-0.1..0.1);
        row[0] = x1;
        row[1] = x2;
        row[2] = x3;
        row[3] = 2.0 * x1 + 3.0 * x2 - x3 + noise;
    }
    data
}

/// 100 rows split 80/20
fn linear_split(seed: u64) -> (Array2<f64>, Array2<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let all = linear_rows(100, &mut rng);
    (all.slice(s![..80, ..]).to_owned(), all.slice(s![80.., ..]).to_owned())
}

/// Target jumps by 10 at x1 = 5, so a shallow tree captures it
fn step_split(seed: u64) -> (Array2<f64>, Array2<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Array2::zeros((120, 3));
    for mut row in data.rows_mut() {
        let x1: f64 = rng.gen_range(0.0..10.0);
        let x2: f64 = rng.gen_range(0.0..1.0);
        row[0] = x1;
        row[1] = x2;
        row[2] = if x1 > 5.0 { 10.0 } else { 0.0 } + x2;
    }
    (data.slice(s![..90, ..]).to_owned(), data.slice(s![90.., ..]).to_owned())
}

fn small_catalog() -> ModelCatalog {
    let mut catalog = ModelCatalog::builtin();
    catalog.retain(&["Decision Tree", "Linear Regression"]);
    catalog
}

#[test]
fn test_builtin_catalog_selects_linear_regression() {
    let dir = tempfile::tempdir().unwrap();
    let (train, test) = linear_split(7);

    let trainer = ModelTrainer::new(TrainerConfig::new().with_artifact_path(dir.path().join("model.json")));
    let outcome = trainer.train(&train, &test).unwrap();

    assert_eq!(outcome.model_name, "Linear Regression");
    assert!(outcome.r2_score > 0.9, "R² = {}", outcome.r2_score);
    assert_eq!(outcome.leaderboard.len(), 7);
    for row in &outcome.leaderboard {
        assert!(outcome.r2_score >= row.test_score, "{} beat the winner", row.name);
    }
}

#[test]
fn test_returned_score_matches_persisted_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/model.json");
    let (train, test) = linear_split(11);

    let trainer = ModelTrainer::new(TrainerConfig::new().with_artifact_path(&path)).with_catalog(small_catalog());
    let outcome = trainer.train(&train, &test).unwrap();

    let artifact = ModelArtifact::load(&path).unwrap();
    assert_eq!(artifact.model_name, outcome.model_name);
    assert_eq!(artifact.n_features, 3);

    let x_test = test.slice(s![.., ..3]).to_owned();
    let y_test = test.column(3).to_owned();
    let preds = artifact.predict(&x_test).unwrap();
    assert_relative_eq!(r2_score(&y_test, &preds).unwrap(), outcome.r2_score, epsilon = 1e-12);
    assert_relative_eq!(artifact.r2_score, outcome.r2_score, epsilon = 1e-12);
}

#[test]
fn test_rejected_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");

    // Pure noise: nothing generalises
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let train = Array2::from_shape_fn((60, 3), |_| rng.gen_range(0.0..1.0));
    let test = Array2::from_shape_fn((20, 3), |_| rng.gen_range(0.0..1.0));

    let trainer = ModelTrainer::new(TrainerConfig::new().with_artifact_path(&path)).with_catalog(small_catalog());
    let err = trainer.train(&train, &test).unwrap_err();

    assert!(matches!(err, TrainerError::NoBestModel { .. }), "unexpected: {err}");
    assert!(err.to_string().starts_with("No best model found"));
    assert!(!path.exists());
}

#[test]
fn test_rejected_run_keeps_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let (train, test) = linear_split(5);

    let trainer = ModelTrainer::new(TrainerConfig::new().with_artifact_path(&path)).with_catalog(small_catalog());
    trainer.train(&train, &test).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let strict = ModelTrainer::new(TrainerConfig::new().with_artifact_path(&path).with_min_score(1.01))
        .with_catalog(small_catalog());
    let err = strict.train(&train, &test).unwrap_err();
    assert!(matches!(err, TrainerError::NoBestModel { threshold, .. } if threshold == 1.01));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_mismatched_columns_fail_as_training_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let (train, test) = linear_split(1);
    let narrow_test = test.slice(s![.., 1..]).to_owned();

    let trainer = ModelTrainer::new(TrainerConfig::new().with_artifact_path(&path)).with_catalog(small_catalog());
    let err = trainer.train(&train, &narrow_test).unwrap_err();

    match err {
        TrainerError::Training { source } => assert!(matches!(source, ModelError::ShapeError { .. })),
        other => panic!("expected a training error, got {other}"),
    }
    assert!(!path.exists());
}

#[test]
fn test_rerun_overwrites_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let trainer = ModelTrainer::new(TrainerConfig::new().with_artifact_path(&path)).with_catalog(small_catalog());

    let (train, test) = linear_split(21);
    trainer.train(&train, &test).unwrap();

    let (train, test) = step_split(22);
    let second = trainer.train(&train, &test).unwrap();

    let artifact = ModelArtifact::load(&path).unwrap();
    assert_eq!(artifact.model_name, second.model_name);
    assert_eq!(artifact.n_features, 2);
    assert_relative_eq!(artifact.r2_score, second.r2_score, epsilon = 1e-12);
}

#[test]
fn test_refit_strategies() {
    let dir = tempfile::tempdir().unwrap();
    let (train, test) = step_split(4);

    let mut catalog = ModelCatalog::new();
    catalog
        .push(
            CatalogEntry::new("Decision Tree", || {
                Box::new(Estimator::DecisionTree(DecisionTreeRegressor::new())) as Box<dyn Regressor>
            })
            .with_grid(ParamGrid::new().with("max_depth", [1usize, 2])),
        )
        .unwrap();

    let tuned = ModelTrainer::new(TrainerConfig::new().with_artifact_path(dir.path().join("tuned.json")))
        .with_catalog(catalog.clone())
        .train(&train, &test)
        .unwrap();
    assert!(tuned.params.contains_key("max_depth"));
    // the tuned winner is the estimator the search already fitted
    assert_eq!(tuned.r2_score, tuned.leaderboard[0].test_score);

    let untuned = ModelTrainer::new(
        TrainerConfig::new()
            .with_artifact_path(dir.path().join("defaults.json"))
            .with_refit(RefitStrategy::Defaults),
    )
    .with_catalog(catalog)
    .train(&train, &test)
    .unwrap();
    assert_eq!(untuned.model_name, "Decision Tree");
    assert!(!untuned.params.contains_key("max_depth"));
}

#[test]
fn test_ties_go_to_catalog_order() {
    let dir = tempfile::tempdir().unwrap();
    let (train, test) = linear_split(9);

    let linear = || Box::new(LinearRegression::new()) as Box<dyn Regressor>;
    let catalog = ModelCatalog::new()
        .with_entry(CatalogEntry::new("First", linear))
        .unwrap()
        .with_entry(CatalogEntry::new("Second", linear))
        .unwrap();

    let outcome = ModelTrainer::new(TrainerConfig::new().with_artifact_path(dir.path().join("m.json")))
        .with_catalog(catalog)
        .train(&train, &test)
        .unwrap();
    assert_eq!(outcome.model_name, "First");
    assert_eq!(outcome.leaderboard[0].test_score, outcome.leaderboard[1].test_score);
}
