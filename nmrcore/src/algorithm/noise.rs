use statrs::statistics::{Data, OrderStatistics};

/// Upper bound on the number of points the noise statistic inspects,
/// regardless of buffer or grid size.
pub const MAX_NOISE_SAMPLES: usize = 4096;

/// Decimated-sampling noise estimate of a channel: the median of the
/// absolute values over an evenly strided sample of at most
/// [`MAX_NOISE_SAMPLES`] points.
///
/// The median is robust against the (sparse) signal points riding on
/// top of the noise, so no signal exclusion is needed.
pub fn noise_level(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let stride = values.len().div_ceil(MAX_NOISE_SAMPLES).max(1);
    let sampled: Vec<f64> = values.iter().step_by(stride).map(|v| v.abs()).collect();
    let mut data = Data::new(sampled);
    data.median()
}

/// Noise estimate of a 2D grid. The stride runs over the flattened
/// cell index, so the sample budget is honored for any grid shape and
/// the estimate does not depend on row/column orientation.
pub fn noise_level_2d(z: &[Vec<f64>]) -> f64 {
    let rows = z.len();
    let cols = z.first().map(|row| row.len()).unwrap_or(0);
    let total = rows * cols;
    if total == 0 {
        return 0.0;
    }
    let stride = total.div_ceil(MAX_NOISE_SAMPLES).max(1);
    let sampled: Vec<f64> = (0..total)
        .step_by(stride)
        .map(|k| z[k / cols][k % cols].abs())
        .collect();
    let mut data = Data::new(sampled);
    data.median()
}
