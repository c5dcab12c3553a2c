use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use model_trainer::selection::{GridSearchEvaluator, Evaluator, ModelCatalog, SplitData};
use model_trainer::training::{
    CatBoostConfig, CatBoostRegressor, DecisionTreeRegressor, GradientBoostingConfig, GradientBoostingRegressor,
    RandomForestRegressor,
};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    let y = x.sum_axis(Axis(1)).mapv(|v| v + rng.gen::<f64>() * 0.1);
    (x, y)
}

fn bench_estimators(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    for n_rows in [1000, 5000].iter() {
        let (x, y) = create_regression_data(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("decision_tree", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| DecisionTreeRegressor::new().fit(black_box(x), black_box(y)).map(|_| ()).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("random_forest_32", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| RandomForestRegressor::new(32).fit(black_box(x), black_box(y)).map(|_| ()).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("gradient_boosting_64", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let config = GradientBoostingConfig { n_estimators: 64, ..Default::default() };
                GradientBoostingRegressor::new(config).fit(black_box(x), black_box(y)).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("catboost_50", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let config = CatBoostConfig { iterations: 50, ..Default::default() };
                CatBoostRegressor::new(config).fit(black_box(x), black_box(y)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");
    group.sample_size(10);

    let (x, y) = create_regression_data(500, 5);
    let data = SplitData {
        x_train: x.slice(ndarray::s![..400, ..]).to_owned(),
        y_train: y.slice(ndarray::s![..400]).to_owned(),
        x_test: x.slice(ndarray::s![400.., ..]).to_owned(),
        y_test: y.slice(ndarray::s![400..]).to_owned(),
    };

    let mut catalog = ModelCatalog::builtin();
    catalog.retain(&["Random Forest", "Decision Tree", "Linear Regression", "K-Neighbours Regressor"]);
    let evaluator = GridSearchEvaluator::new(3);

    group.bench_function("grid_search_4_models", |b| {
        b.iter(|| evaluator.evaluate(black_box(&data), &catalog).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_estimators, bench_selection);
criterion_main!(benches);
