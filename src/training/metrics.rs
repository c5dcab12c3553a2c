//! Regression metrics

use crate::error::{ModelError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Metrics for regression model evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Coefficient of determination
    pub r2: f64,
    /// Number of scored samples
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute regression metrics
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2: r2_score(y_true, y_pred)?,
            n_samples: y_true.len(),
        })
    }
}

/// R² (coefficient of determination).
///
/// A constant target has no variance to explain: a perfect prediction scores
/// 1.0 and anything else 0.0.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;

    let y_mean = y_true.sum() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }

    Ok(1.0 - ss_res / ss_tot)
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(ModelError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(ModelError::ValidationError(
            "Cannot score an empty target".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred).unwrap();

        assert_abs_diff_eq!(metrics.mse, 0.006, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.rmse, 0.006f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.mae, 0.06, epsilon = 1e-12);
        assert!(metrics.r2 > 0.9);
        assert_eq!(metrics.n_samples, 5);
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = array![1.0, 2.0, 3.0];
        assert_abs_diff_eq!(r2_score(&y, &y).unwrap(), 1.0);

        let mean = array![2.0, 2.0, 2.0];
        assert_abs_diff_eq!(r2_score(&y, &mean).unwrap(), 0.0);
    }

    #[test]
    fn test_r2_can_be_negative() {
        let y = array![1.0, 2.0, 3.0];
        let bad = array![3.0, 2.0, 1.0];
        assert_abs_diff_eq!(r2_score(&y, &bad).unwrap(), -3.0);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![4.0, 4.0];
        assert_eq!(r2_score(&y, &array![4.0, 4.0]).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![4.0, 5.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_r2_rejects_bad_input() {
        assert!(r2_score(&array![1.0, 2.0], &array![1.0]).is_err());
        assert!(r2_score(&Array1::zeros(0), &Array1::zeros(0)).is_err());
    }
}
