use serde::{Deserialize, Serialize};

use crate::algorithm::noise::noise_level_2d;
use crate::data::features::{Signal2d, SignalKind, Zone};
use crate::data::spectrum::{Data2d, Spectrum};
use crate::error::DetectionError;
use crate::quantify;

/// Smoothing kernel run along rows and columns before maxima search.
const KERNEL: [f64; 5] = [1.0, 2.0, 3.0, 2.0, 1.0];
/// Cluster tolerance, as a fraction of the axis span.
const CLUSTER_SPAN_FRACTION: f64 = 0.01;
/// Tolerance for deduplicating zones, as a fraction of the axis span.
const DEDUP_SPAN_FRACTION: f64 = 1.0 / 1_000.0;
/// Candidate floor as a fraction of the grid's maximum magnitude, for
/// grids whose noise floor is effectively zero.
const MIN_SIGNAL_FRACTION: f64 = 1e-3;

/// Options of the 2D zone detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneDetectionOptions {
    /// Candidate threshold as a multiple of the grid noise floor.
    pub threshold_ratio: f64,
    /// Also pick negative lobes.
    pub keep_negative: bool,
    /// Optional sub-matrix restriction, in axis units. Used by manual
    /// interactive picking over a dragged rectangle.
    pub x_from: Option<f64>,
    pub x_to: Option<f64>,
    pub y_from: Option<f64>,
    pub y_to: Option<f64>,
    /// Keep at most this many zones per detection pass.
    pub max_zones: usize,
}

impl Default for ZoneDetectionOptions {
    fn default() -> Self {
        ZoneDetectionOptions {
            threshold_ratio: 3.0,
            keep_negative: false,
            x_from: None,
            x_to: None,
            y_from: None,
            y_to: None,
            max_zones: 128,
        }
    }
}

/// A raw picked 2D component, before feature bookkeeping.
#[derive(Clone, Debug, PartialEq)]
struct PickedComponent {
    x: f64,
    y: f64,
    intensity: f64,
}

/// Detects zones on a derived 2D grid: smoothed row/column maxima
/// intersection, symmetry enhancement for homonuclear spectra,
/// rectangle clustering, dedup against existing zones and a forced
/// quantification recompute.
///
/// # Returns
/// The number of zones added.
pub fn detect_zones(
    spectrum: &mut Spectrum,
    options: &ZoneDetectionOptions,
) -> Result<usize, DetectionError> {
    let data = spectrum
        .derived_2d()
        .ok_or(DetectionError::WrongDimension { detector: "zoneDetection", expected: "2D" })?;
    if data.rows() < 3 || data.cols() < 3 {
        return Ok(0);
    }
    if let (Some(from), Some(to)) = (options.x_from, options.x_to) {
        if from >= to {
            return Err(DetectionError::MalformedInterval { from, to });
        }
    }
    if let (Some(from), Some(to)) = (options.y_from, options.y_to) {
        if from >= to {
            return Err(DetectionError::MalformedInterval { from, to });
        }
    }

    let symmetric = spectrum.meta.is_homonuclear() && data.rows() == data.cols();
    let grid = if symmetric {
        symmetrized(&data.z)
    } else {
        data.z.clone()
    };

    let max_magnitude = grid
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, &v| acc.max(v.abs()));
    let threshold = (noise_level_2d(&grid) * options.threshold_ratio)
        .max(max_magnitude * MIN_SIGNAL_FRACTION);
    let (row_lo, row_hi, col_lo, col_hi) = window_cells(data, options);

    let mut components = pick_components(data, &grid, threshold, 1.0, row_lo, row_hi, col_lo, col_hi);
    if options.keep_negative {
        components.extend(pick_components(
            data, &grid, threshold, -1.0, row_lo, row_hi, col_lo, col_hi,
        ));
    }
    if components.is_empty() {
        return Ok(0);
    }

    let tol_x = data.x_span() * CLUSTER_SPAN_FRACTION;
    let tol_y = data.y_span() * CLUSTER_SPAN_FRACTION;
    let mut clusters = cluster_components(components, tol_x, tol_y);
    clusters.truncate(options.max_zones);

    let dedup_x = data.x_span() * DEDUP_SPAN_FRACTION;
    let dedup_y = data.y_span() * DEDUP_SPAN_FRACTION;
    let (shift_x, shift_y) = spectrum.accumulated_shift();

    let mut added = 0;
    for cluster in clusters {
        let x_from = cluster.iter().map(|c| c.x).fold(f64::INFINITY, f64::min) - tol_x / 2.0;
        let x_to = cluster.iter().map(|c| c.x).fold(f64::NEG_INFINITY, f64::max) + tol_x / 2.0;
        let y_from = cluster.iter().map(|c| c.y).fold(f64::INFINITY, f64::min) - tol_y / 2.0;
        let y_to = cluster.iter().map(|c| c.y).fold(f64::NEG_INFINITY, f64::max) + tol_y / 2.0;
        let x_center = (x_from + x_to) / 2.0;
        let y_center = (y_from + y_to) / 2.0;

        let duplicate = spectrum.zones.iter().any(|zone| {
            (zone.x_center() - x_center).abs() < dedup_x
                && (zone.y_center() - y_center).abs() < dedup_y
        });
        if duplicate {
            continue;
        }

        let signals: Vec<Signal2d> = cluster
            .iter()
            .map(|c| Signal2d {
                x: c.x,
                y: c.y,
                original_x: c.x - shift_x,
                original_y: c.y - shift_y,
                intensity: c.intensity,
            })
            .collect();
        let absolute = signals.iter().map(|s| s.intensity.abs()).sum();

        let id = spectrum.mint_feature_id();
        spectrum.zones.push(Zone {
            id,
            x_from,
            x_to,
            y_from,
            y_to,
            absolute,
            relative: 0.0,
            kind: SignalKind::Signal,
            signals,
        });
        added += 1;
    }

    let mut sum_options = spectrum.quantification.clone();
    quantify::update_relative_values(&mut spectrum.zones, &mut sum_options, true);
    spectrum.quantification = sum_options;

    log::debug!("zone detection added {} zones", added);
    Ok(added)
}

/// Symmetry enhancement for homonuclear square grids: each cell is
/// replaced by the signed minimum magnitude of itself and its mirror
/// across the diagonal, suppressing t1-noise ridges that have no
/// mirror partner.
fn symmetrized(z: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = z.len();
    let mut out = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            let a = z[i][j];
            let b = z[j][i];
            out[i][j] = a.signum() * a.abs().min(b.abs());
        }
    }
    out
}

fn window_cells(data: &Data2d, options: &ZoneDetectionOptions) -> (usize, usize, usize, usize) {
    let col_of = |x: f64| -> usize {
        if data.x_span() <= 0.0 {
            return 0;
        }
        let t = (x - data.min_x) / (data.max_x - data.min_x);
        ((t * (data.cols() - 1) as f64).round() as isize)
            .clamp(0, data.cols() as isize - 1) as usize
    };
    let row_of = |y: f64| -> usize {
        if data.y_span() <= 0.0 {
            return 0;
        }
        let t = (y - data.min_y) / (data.max_y - data.min_y);
        ((t * (data.rows() - 1) as f64).round() as isize)
            .clamp(0, data.rows() as isize - 1) as usize
    };

    let (col_lo, col_hi) = match (options.x_from, options.x_to) {
        (Some(from), Some(to)) => {
            let a = col_of(from);
            let b = col_of(to);
            (a.min(b), a.max(b))
        }
        _ => (0, data.cols() - 1),
    };
    let (row_lo, row_hi) = match (options.y_from, options.y_to) {
        (Some(from), Some(to)) => {
            let a = row_of(from);
            let b = row_of(to);
            (a.min(b), a.max(b))
        }
        _ => (0, data.rows() - 1),
    };
    (row_lo, row_hi, col_lo, col_hi)
}

/// Kernel-smoothed value of the grid at `(row, col)` along one axis.
fn smoothed(grid: &[Vec<f64>], row: usize, col: usize, along_row: bool) -> f64 {
    let rows = grid.len() as isize;
    let cols = grid[0].len() as isize;
    let mut sum = 0.0;
    let mut weight = 0.0;
    for (k, &w) in KERNEL.iter().enumerate() {
        let offset = k as isize - 2;
        let (r, c) = if along_row {
            (row as isize, col as isize + offset)
        } else {
            (row as isize + offset, col as isize)
        };
        if r < 0 || r >= rows || c < 0 || c >= cols {
            continue;
        }
        sum += w * grid[r as usize][c as usize];
        weight += w;
    }
    sum / weight
}

/// Cells that are strict local maxima of the row-smoothed grid along
/// their row AND of the column-smoothed grid along their column, above
/// the threshold. `sign` -1 picks negative lobes.
#[allow(clippy::too_many_arguments)]
fn pick_components(
    data: &Data2d,
    grid: &[Vec<f64>],
    threshold: f64,
    sign: f64,
    row_lo: usize,
    row_hi: usize,
    col_lo: usize,
    col_hi: usize,
) -> Vec<PickedComponent> {
    let value = |r: usize, c: usize, along_row: bool| sign * smoothed(grid, r, c, along_row);
    let mut components = Vec::new();

    for row in row_lo.max(1)..=row_hi.min(grid.len() - 2) {
        for col in col_lo.max(1)..=col_hi.min(grid[0].len() - 2) {
            // A flat apex (a maximum sampled exactly between two
            // cells) counts once, at its leading edge.
            let along = value(row, col, true);
            if along <= threshold
                || along <= value(row, col - 1, true)
                || along < value(row, col + 1, true)
            {
                continue;
            }
            let across = value(row, col, false);
            if across <= value(row - 1, col, false) || across < value(row + 1, col, false) {
                continue;
            }
            components.push(PickedComponent {
                x: data.x_at(col),
                y: data.y_at(row),
                intensity: grid[row][col],
            });
        }
    }
    components
}

/// Greedy transitive clustering: a component joins the first cluster
/// holding a member within tolerance on both axes.
fn cluster_components(
    components: Vec<PickedComponent>,
    tol_x: f64,
    tol_y: f64,
) -> Vec<Vec<PickedComponent>> {
    let mut clusters: Vec<Vec<PickedComponent>> = Vec::new();
    for component in components {
        let home = clusters.iter_mut().find(|cluster| {
            cluster.iter().any(|member| {
                (member.x - component.x).abs() <= tol_x
                    && (member.y - component.y).abs() <= tol_y
            })
        });
        match home {
            Some(cluster) => cluster.push(component),
            None => clusters.push(vec![component]),
        }
    }
    clusters
}
