use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::data::spectrum::Data1d;
use crate::error::FilterError;

/// Baseline estimation strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BaselineMethod {
    /// Polynomial regression of the given degree over an equally
    /// spaced downsample of the real channel.
    Polynomial { degree: usize },
    /// Adaptive iteratively reweighted penalized least squares
    /// (asymmetric Whittaker smoothing).
    AirPls { lambda: f64, max_iter: usize },
}

/// Sample cap for the polynomial fit, independent of buffer length.
const MAX_FIT_SAMPLES: usize = 4096;

/// Estimates and subtracts the baseline of the real channel.
///
/// `exclusions` are x intervals (signal regions) left out of the
/// polynomial fit; the airPLS variant down-weights signal regions on
/// its own.
pub fn baseline_correction(
    data: &mut Data1d,
    method: &BaselineMethod,
    exclusions: &[(f64, f64)],
) -> Result<(), FilterError> {
    const NAME: &str = "baselineCorrection";

    if data.is_empty() {
        return Err(FilterError::EmptyBuffer { filter: NAME });
    }
    match method {
        BaselineMethod::Polynomial { degree } => polynomial_baseline(data, *degree, exclusions),
        BaselineMethod::AirPls { lambda, max_iter } => airpls_baseline(data, *lambda, *max_iter),
    }
}

fn polynomial_baseline(
    data: &mut Data1d,
    degree: usize,
    exclusions: &[(f64, f64)],
) -> Result<(), FilterError> {
    const NAME: &str = "baselineCorrection";

    if degree > 12 {
        return Err(FilterError::Degenerate {
            filter: NAME,
            reason: format!("polynomial degree {} is unreasonably high", degree),
        });
    }

    let n = data.len();
    let (x_min, x_max) = axis_bounds(&data.x);
    let span = x_max - x_min;
    if span <= 0.0 {
        return Err(FilterError::Degenerate {
            filter: NAME,
            reason: "axis has zero extent".to_string(),
        });
    }
    // Normalize x into [-1, 1] for conditioning of the Vandermonde.
    let normalize = |x: f64| 2.0 * (x - x_min) / span - 1.0;

    let stride = (n / MAX_FIT_SAMPLES).max(1);
    let mut xs: Vec<f64> = Vec::new();
    let mut ys: Vec<f64> = Vec::new();
    for i in (0..n).step_by(stride) {
        let x = data.x[i];
        if exclusions
            .iter()
            .any(|&(a, b)| x >= a.min(b) && x <= a.max(b))
        {
            continue;
        }
        xs.push(normalize(x));
        ys.push(data.re[i]);
    }

    let cols = degree + 1;
    if xs.len() < cols {
        return Err(FilterError::Degenerate {
            filter: NAME,
            reason: format!(
                "{} fit samples cannot constrain a degree-{} polynomial",
                xs.len(),
                degree
            ),
        });
    }

    let a = DMatrix::from_fn(xs.len(), cols, |r, c| xs[r].powi(c as i32));
    let b = DVector::from_vec(ys);
    let coeffs = a
        .svd(true, true)
        .solve(&b, 1e-12)
        .map_err(|e| FilterError::Degenerate { filter: NAME, reason: e.to_string() })?;

    for i in 0..n {
        let u = normalize(data.x[i]);
        let mut fitted = 0.0;
        for c in (0..cols).rev() {
            fitted = fitted * u + coeffs[c];
        }
        data.re[i] -= fitted;
    }
    Ok(())
}

fn airpls_baseline(data: &mut Data1d, lambda: f64, max_iter: usize) -> Result<(), FilterError> {
    const NAME: &str = "baselineCorrection";

    if lambda <= 0.0 {
        return Err(FilterError::Degenerate {
            filter: NAME,
            reason: "airPLS lambda must be positive".to_string(),
        });
    }
    let n = data.len();
    if n < 4 {
        return Ok(());
    }

    let y = data.re.clone();
    let total_abs: f64 = y.iter().map(|v| v.abs()).sum();
    let mut weights = vec![1.0; n];
    let mut baseline = vec![0.0; n];

    for iteration in 1..=max_iter.max(1) {
        baseline = whittaker_smooth(&y, &weights, lambda);

        let mut negative_sum = 0.0;
        for i in 0..n {
            let d = y[i] - baseline[i];
            if d < 0.0 {
                negative_sum += -d;
            }
        }
        if negative_sum < 0.001 * total_abs {
            break;
        }
        for i in 0..n {
            let d = y[i] - baseline[i];
            weights[i] = if d >= 0.0 {
                0.0
            } else {
                (iteration as f64 * -d / negative_sum).exp()
            };
        }
        // Anchor the endpoints so the smoother stays pinned.
        weights[0] = 1.0;
        weights[n - 1] = 1.0;
    }

    for i in 0..n {
        data.re[i] = y[i] - baseline[i];
    }
    Ok(())
}

/// Solves `(W + lambda * D' D) z = W y` where `D` is the second
/// difference operator: a symmetric pentadiagonal positive definite
/// system, factored in O(n) by banded LDL'.
fn whittaker_smooth(y: &[f64], weights: &[f64], lambda: f64) -> Vec<f64> {
    let n = y.len();

    // Bands of W + lambda * D'D.
    let mut diag = vec![0.0; n];
    let mut sub1 = vec![0.0; n]; // coupling (i-1, i), stored at i
    let mut sub2 = vec![0.0; n]; // coupling (i-2, i), stored at i
    for i in 0..n {
        let stencil = if i == 0 || i == n - 1 {
            1.0
        } else if i == 1 || i == n - 2 {
            5.0
        } else {
            6.0
        };
        diag[i] = weights[i] + lambda * stencil;
    }
    for i in 1..n {
        sub1[i] = lambda * if i == 1 || i == n - 1 { -2.0 } else { -4.0 };
    }
    for i in 2..n {
        sub2[i] = lambda;
    }

    // LDL' factorization within the band.
    let mut d = vec![0.0; n];
    let mut l1 = vec![0.0; n];
    let mut l2 = vec![0.0; n];
    for i in 0..n {
        if i >= 2 {
            l2[i] = sub2[i] / d[i - 2];
        }
        if i >= 1 {
            let mut v = sub1[i];
            if i >= 2 {
                v -= l2[i] * l1[i - 1] * d[i - 2];
            }
            l1[i] = v / d[i - 1];
        }
        let mut di = diag[i];
        if i >= 1 {
            di -= l1[i] * l1[i] * d[i - 1];
        }
        if i >= 2 {
            di -= l2[i] * l2[i] * d[i - 2];
        }
        d[i] = di;
    }

    // Forward substitution, diagonal scale, back substitution.
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut v = weights[i] * y[i];
        if i >= 1 {
            v -= l1[i] * z[i - 1];
        }
        if i >= 2 {
            v -= l2[i] * z[i - 2];
        }
        z[i] = v;
    }
    for i in 0..n {
        z[i] /= d[i];
    }
    for i in (0..n).rev() {
        if i + 1 < n {
            z[i] -= l1[i + 1] * z[i + 1];
        }
        if i + 2 < n {
            z[i] -= l2[i + 2] * z[i + 2];
        }
    }
    z
}

fn axis_bounds(x: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in x {
        min = min.min(v);
        max = max.max(v);
    }
    (min, max)
}
