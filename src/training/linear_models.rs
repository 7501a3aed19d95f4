//! Linear regressors: ordinary least squares, ridge and lasso

use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve the symmetric positive-definite system `a x = b` via Cholesky.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
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

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Cholesky solve, retrying with a small diagonal jitter when the matrix is
/// only positive semi-definite (collinear or constant columns).
fn solve_normal_equations(xtx: &Array2<f64>, xty: &Array1<f64>) -> Result<Array1<f64>> {
    if let Some(w) = cholesky_solve(xtx, xty) {
        return Ok(w);
    }

    let n = xtx.nrows();
    let scale = xtx.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let mut jitter = 1e-10 * scale.max(1e-12);
    for _ in 0..6 {
        let mut reg = xtx.clone();
        reg.diag_mut().iter_mut().for_each(|d| *d += jitter);
        if let Some(w) = cholesky_solve(&reg, xty) {
            return Ok(w);
        }
        jitter *= 100.0;
    }

    Err(PredictorError::Computation(
        "Normal equations are singular".to_string(),
    ))
}

/// Center `x` and `y`; returns the centered data and the means.
fn center(x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array2<f64>, Array1<f64>, Array1<f64>, f64)> {
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| PredictorError::InvalidInput("Cannot fit on zero samples".to_string()))?;
    let y_mean = y.mean().unwrap_or(0.0);
    Ok((x - &x_mean, y - y_mean, x_mean, y_mean))
}

fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PredictorError::shape_mismatch(x.nrows(), y.len()));
    }
    if x.nrows() == 0 {
        return Err(PredictorError::InvalidInput(
            "Cannot fit on zero samples".to_string(),
        ));
    }
    Ok(())
}

/// Coefficients plus intercept shared by every linear variant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearCoefficients {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearCoefficients {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(PredictorError::Shape {
                expected: format!("{} features", self.coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

/// Ridge solution `(Xc^T Xc + alpha I) w = Xc^T yc` with an unpenalized intercept.
fn fit_l2(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<LinearCoefficients> {
    check_xy(x, y)?;
    let (xc, yc, x_mean, y_mean) = center(x, y)?;

    let mut xtx = xc.t().dot(&xc);
    if alpha > 0.0 {
        xtx.diag_mut().iter_mut().for_each(|d| *d += alpha);
    }
    let xty = xc.t().dot(&yc);
    let coefficients = solve_normal_equations(&xtx, &xty)?;
    let intercept = y_mean - coefficients.dot(&x_mean);

    Ok(LinearCoefficients {
        coefficients,
        intercept,
    })
}

/// Ordinary least squares with intercept
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    fitted: Option<LinearCoefficients>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fitted = Some(fit_l2(x, y, 0.0)?);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(PredictorError::ModelNotFitted)?.predict(x)
    }

    pub fn coefficients(&self) -> Option<&LinearCoefficients> {
        self.fitted.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

/// L2-penalized least squares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub alpha: f64,
    fitted: Option<LinearCoefficients>,
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fitted: None,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.alpha < 0.0 {
            return Err(PredictorError::InvalidInput(format!(
                "Ridge alpha must be non-negative, got {}",
                self.alpha
            )));
        }
        self.fitted = Some(fit_l2(x, y, self.alpha)?);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(PredictorError::ModelNotFitted)?.predict(x)
    }

    pub fn coefficients(&self) -> Option<&LinearCoefficients> {
        self.fitted.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

/// L1-penalized least squares by cyclic coordinate descent.
///
/// Minimizes `1/(2n) ||y - Xw - b||^2 + alpha ||w||_1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    n_iter: usize,
    fitted: Option<LinearCoefficients>,
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            max_iter: 1000,
            tol: 1e-4,
            n_iter: 0,
            fitted: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    fn soft_threshold(val: f64, threshold: f64) -> f64 {
        if val > threshold {
            val - threshold
        } else if val < -threshold {
            val + threshold
        } else {
            0.0
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        let (xc, yc, x_mean, y_mean) = center(x, y)?;
        let n_features = xc.ncols();

        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| xc.column(j).mapv(|v| v * v).sum())
            .collect();

        let lambda = self.alpha * xc.nrows() as f64;
        let mut w = Array1::<f64>::zeros(n_features);
        let mut r = yc.clone();
        self.n_iter = 0;

        for _ in 0..self.max_iter {
            self.n_iter += 1;
            let mut max_update = 0.0f64;
            let mut max_w = 0.0f64;

            for j in 0..n_features {
                if col_norms[j] < 1e-15 {
                    continue;
                }
                let col = xc.column(j);
                let old = w[j];
                let rho = col.dot(&r) + col_norms[j] * old;
                let new = Self::soft_threshold(rho, lambda) / col_norms[j];
                if new != old {
                    r.scaled_add(old - new, &col);
                    w[j] = new;
                }
                max_update = max_update.max((new - old).abs());
                max_w = max_w.max(new.abs());
            }

            if max_w == 0.0 || max_update <= self.tol * max_w {
                break;
            }
        }

        let intercept = y_mean - w.dot(&x_mean);
        self.fitted = Some(LinearCoefficients {
            coefficients: w,
            intercept,
        });
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.fitted.as_ref().ok_or(PredictorError::ModelNotFitted)?.predict(x)
    }

    pub fn coefficients(&self) -> Option<&LinearCoefficients> {
        self.fitted.as_ref()
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}
