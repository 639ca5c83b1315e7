//! Ordinary least-squares regression and evaluation metrics
//!
//! The fit solves the normal equations on centred features with Gaussian
//! elimination. A ridge term proportional to the sample count keeps the
//! system solvable when columns are constant or exactly collinear (lag
//! columns of a linear ramp, a constant `hour`).

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Ridge term per training sample
const RIDGE_EPSILON: f64 = 1e-8;

/// Pivot magnitude below which the system is treated as singular
const PIVOT_EPSILON: f64 = 1e-300;

/// `y = intercept + coefficients · x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        if x.is_empty() {
            return Err(ForecastError::InsufficientData(
                "cannot fit a regression on zero rows".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(ForecastError::InvalidConfig(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        let p = x[0].len();
        if x.iter().any(|r| r.len() != p) {
            return Err(ForecastError::InvalidConfig(
                "regression rows have inconsistent widths".to_string(),
            ));
        }

        let n = x.len() as f64;
        let x_mean: Vec<f64> = (0..p)
            .map(|j| x.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n;

        // A = Xcᵀ Xc + λI, b = Xcᵀ yc
        let mut a = vec![vec![0.0; p]; p];
        let mut b = vec![0.0; p];
        for (row, &target) in x.iter().zip(y) {
            let centred: Vec<f64> = row.iter().zip(&x_mean).map(|(v, m)| v - m).collect();
            let yc = target - y_mean;
            for i in 0..p {
                b[i] += centred[i] * yc;
                for j in i..p {
                    a[i][j] += centred[i] * centred[j];
                }
            }
        }
        let ridge = RIDGE_EPSILON * n;
        for i in 0..p {
            a[i][i] += ridge;
            for j in 0..i {
                a[i][j] = a[j][i];
            }
        }

        let coefficients = solve(a, b)?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();

        Ok(Self {
            intercept,
            coefficients,
        })
    }

    pub fn width(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(w, v)| w * v)
                .sum::<f64>()
    }

    pub fn predict_all(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict(r)).collect()
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON || !a[pivot][col].is_finite() {
            return Err(ForecastError::InsufficientData(
                "normal equations are singular".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

/// Held-out evaluation of a fitted model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Coefficient of determination
    pub r2: f64,
    /// Mean absolute error in bpm
    pub mae: f64,
}

impl EvaluationMetrics {
    /// `None` for an empty evaluation set
    pub fn compute(predicted: &[f64], actual: &[f64]) -> Option<Self> {
        if actual.is_empty() || predicted.len() != actual.len() {
            return None;
        }
        Some(Self {
            r2: r2_score(predicted, actual),
            mae: mean_absolute_error(predicted, actual),
        })
    }
}

/// R²; with zero target variance, 1.0 for a perfect fit and 0.0 otherwise
pub fn r2_score(predicted: &[f64], actual: &[f64]) -> f64 {
    let n = actual.len() as f64;
    let mean = actual.iter().sum::<f64>() / n;
    let ss_res: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn mean_absolute_error(predicted: &[f64], actual: &[f64]) -> f64 {
    predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).abs())
        .sum::<f64>()
        / actual.len() as f64
}
