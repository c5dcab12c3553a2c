//! Ordinary least squares regression

use crate::error::{ModelError, Result};
use super::params::{invalid, ParamSet, ParamValue};
use super::Regressor;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Retries once with a small ridge on the diagonal if the matrix is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    match cholesky_factor(a) {
        Some(l) => Some(cholesky_substitute(&l, b)),
        None => {
            let mut a_reg = a.clone();
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
            for k in 0..n {
                a_reg[[k, k]] += ridge;
            }
            cholesky_factor(&a_reg).map(|l| cholesky_substitute(&l, b))
        }
    }
}

/// Lower-triangular L with A = L * L^T, or None if A is not positive definite
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    x
}

/// Matrix inversion using Gauss-Jordan elimination (fallback)
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    // Augmented matrix [M | I]
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }

        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }

        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    Some(aug.slice(ndarray::s![.., n..]).to_owned())
}

/// Solve least squares via normal equations: (X^T X) w = X^T y
fn solve_least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);

    if let Some(result) = cholesky_solve(&xtx, &xty) {
        return Some(result);
    }

    matrix_inverse(&xtx).map(|inv| inv.dot(&xty))
}

/// Ordinary least squares linear regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: Option<f64>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new linear regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Fit the model to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(ModelError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ModelError::TrainingError("Empty dataset".into()));
        }

        // Center data if fitting intercept
        let (x_work, y_work, means) = if self.fit_intercept {
            let x_mean = x
                .mean_axis(Axis(0))
                .ok_or_else(|| ModelError::TrainingError("Empty dataset".into()))?;
            let y_mean = y.mean().unwrap_or(0.0);

            let x_centered = x - &x_mean.view().insert_axis(Axis(0));
            let y_centered = y - y_mean;

            (x_centered, y_centered, Some((x_mean, y_mean)))
        } else {
            (x.clone(), y.clone(), None)
        };

        let coefficients = solve_least_squares(&x_work, &y_work).ok_or_else(|| {
            ModelError::ComputationError("Matrix is singular, cannot solve least squares".to_string())
        })?;

        let intercept = match means {
            Some((x_mean, y_mean)) => y_mean - coefficients.dot(&x_mean),
            None => 0.0,
        };

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);

        Ok(self)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(ModelError::ModelNotFitted)?;

        if x.ncols() != coefficients.len() {
            return Err(ModelError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LinearRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LinearRegression::predict(self, x)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "fit_intercept" => {
                self.fit_intercept = value.as_usize(name)? != 0;
                Ok(())
            }
            _ => Err(invalid(name, value, "unknown parameter for LinearRegression")),
        }
    }

    fn params(&self) -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("fit_intercept".into(), ParamValue::Int(self.fit_intercept as i64));
        params
    }

    fn boxed_clone(&self) -> Box<dyn Regressor> {
        Box::new(self.clone())
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
