use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::contour::levels::{contour_levels, ContourOptions, ContourViewState};
use crate::data::spectrum::Data2d;

/// One traced iso level: its value and the line segments making up the
/// curves, in axis units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContourLevel {
    pub level: f64,
    pub segments: Vec<[(f64, f64); 2]>,
}

/// Complete result of a contour redraw.
///
/// `timed_out` is set when the time budget expired mid-trace; the
/// levels traced so far are kept, so a slow redraw degrades to a
/// partial drawing instead of blocking or failing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContourResult {
    pub positive: Vec<ContourLevel>,
    pub negative: Vec<ContourLevel>,
    pub timed_out: bool,
}

impl ContourResult {
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }
}

/// Regenerates the full contour set at the view state's current
/// levels. The optional budget bounds wall-clock time; expiry returns
/// whatever was traced with the `timed_out` flag raised.
pub fn redraw_contours(
    data: &Data2d,
    options: &ContourOptions,
    view: &ContourViewState,
    budget: Option<Duration>,
) -> ContourResult {
    let deadline = budget.map(|budget| Instant::now() + budget);
    let (positive_levels, negative_levels) = contour_levels(data, options, view);

    let mut result = ContourResult {
        positive: Vec::new(),
        negative: Vec::new(),
        timed_out: false,
    };

    for level in positive_levels {
        match trace_level(data, level, deadline) {
            Some(traced) => result.positive.push(traced),
            None => {
                result.timed_out = true;
                log::warn!("contour redraw timed out at level {}", level);
                return result;
            }
        }
    }
    for level in negative_levels {
        match trace_level(data, level, deadline) {
            Some(traced) => result.negative.push(traced),
            None => {
                result.timed_out = true;
                log::warn!("contour redraw timed out at level {}", level);
                return result;
            }
        }
    }
    result
}

/// Marching-squares pass over the grid for one iso value. The deadline
/// is checked once per row; `None` means it expired.
fn trace_level(data: &Data2d, level: f64, deadline: Option<Instant>) -> Option<ContourLevel> {
    let rows = data.rows();
    let cols = data.cols();
    let mut segments = Vec::new();

    for row in 0..rows.saturating_sub(1) {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return None;
            }
        }
        for col in 0..cols.saturating_sub(1) {
            // Cell corners, counterclockwise from bottom-left.
            let bl = data.z[row][col];
            let br = data.z[row][col + 1];
            let tr = data.z[row + 1][col + 1];
            let tl = data.z[row + 1][col];

            let case = usize::from(bl > level)
                | usize::from(br > level) << 1
                | usize::from(tr > level) << 2
                | usize::from(tl > level) << 3;
            if case == 0 || case == 15 {
                continue;
            }

            let x0 = data.x_at(col);
            let x1 = data.x_at(col + 1);
            let y0 = data.y_at(row);
            let y1 = data.y_at(row + 1);

            // Crossing points on the four cell edges.
            let bottom = (lerp(x0, x1, bl, br, level), y0);
            let right = (x1, lerp(y0, y1, br, tr, level));
            let top = (lerp(x0, x1, tl, tr, level), y1);
            let left = (x0, lerp(y0, y1, bl, tl, level));

            match case {
                1 | 14 => segments.push([left, bottom]),
                2 | 13 => segments.push([bottom, right]),
                3 | 12 => segments.push([left, right]),
                4 | 11 => segments.push([right, top]),
                6 | 9 => segments.push([bottom, top]),
                7 | 8 => segments.push([left, top]),
                5 => {
                    // Saddle: resolve by the cell-center average.
                    if (bl + br + tr + tl) / 4.0 > level {
                        segments.push([left, top]);
                        segments.push([bottom, right]);
                    } else {
                        segments.push([left, bottom]);
                        segments.push([right, top]);
                    }
                }
                10 => {
                    if (bl + br + tr + tl) / 4.0 > level {
                        segments.push([left, bottom]);
                        segments.push([right, top]);
                    } else {
                        segments.push([left, top]);
                        segments.push([bottom, right]);
                    }
                }
                _ => unreachable!("cases 0 and 15 are filtered above"),
            }
        }
    }
    Some(ContourLevel { level, segments })
}

/// Linear interpolation of the crossing coordinate between two corner
/// values straddling the level.
fn lerp(a: f64, b: f64, va: f64, vb: f64, level: f64) -> f64 {
    if (vb - va).abs() < f64::EPSILON {
        return (a + b) / 2.0;
    }
    a + (b - a) * (level - va) / (vb - va)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Radial cone of height `peak` and radius `n / 8` cells centered
    /// on the grid; zero everywhere else, so the noise floor is zero.
    fn cone_grid(n: usize, peak: f64) -> Data2d {
        let radius = n as f64 / 8.0;
        let z: Vec<Vec<f64>> = (0..n)
            .map(|row| {
                (0..n)
                    .map(|col| {
                        let dx = col as f64 - (n - 1) as f64 / 2.0;
                        let dy = row as f64 - (n - 1) as f64 / 2.0;
                        (peak * (1.0 - (dx * dx + dy * dy).sqrt() / radius)).max(0.0)
                    })
                    .collect()
            })
            .collect();
        Data2d::new(z, 0.0, 10.0, 0.0, 10.0)
    }

    #[test]
    fn test_all_zero_grid_returns_empty_result() {
        let data = Data2d::new(vec![vec![0.0; 32]; 32], 0.0, 1.0, 0.0, 1.0);
        let result = redraw_contours(
            &data,
            &ContourOptions::default(),
            &ContourViewState::default(),
            None,
        );
        assert!(result.is_empty());
        assert!(!result.timed_out);
    }

    #[test]
    fn test_ragged_grid_with_empty_first_row_returns_empty_segments() {
        // Levels exist (the second row carries signal) but the column
        // count derived from the empty first row is zero; the tracer
        // must return cleanly instead of panicking.
        let data = Data2d::new(vec![Vec::new(), vec![5.0; 4]], 0.0, 1.0, 0.0, 1.0);
        let result = redraw_contours(
            &data,
            &ContourOptions::default(),
            &ContourViewState::default(),
            None,
        );
        assert!(!result.timed_out);
        assert!(result.positive.iter().all(|level| level.segments.is_empty()));
    }

    #[test]
    fn test_cone_produces_closed_rings() {
        let data = cone_grid(64, 100.0);
        let result = redraw_contours(
            &data,
            &ContourOptions::default(),
            &ContourViewState::default(),
            None,
        );

        assert!(!result.timed_out);
        assert!(!result.positive.is_empty());
        // Every level strictly below the apex yields a ring, and all
        // segment endpoints sit inside the axis bounds. The top level
        // sits at the grid maximum and may trace nothing.
        for level in &result.positive[..result.positive.len() - 1] {
            assert!(!level.segments.is_empty(), "level {} is empty", level.level);
            for segment in &level.segments {
                for &(x, y) in segment {
                    assert!((0.0..=10.0).contains(&x));
                    assert!((0.0..=10.0).contains(&y));
                }
            }
        }
    }

    #[test]
    fn test_segments_lie_on_the_iso_value() {
        let data = cone_grid(64, 100.0);
        let result = redraw_contours(
            &data,
            &ContourOptions::default(),
            &ContourViewState::default(),
            None,
        );

        // For a radial cone the iso line at level L is a circle of
        // known radius around the grid center.
        let level = &result.positive[result.positive.len() - 2];
        let radius_cells = 8.0 * (1.0 - level.level / 100.0);
        let radius = radius_cells * 10.0 / 63.0;
        for segment in &level.segments {
            for &(x, y) in segment {
                let r = ((x - 5.0).powi(2) + (y - 5.0).powi(2)).sqrt();
                assert!((r - radius).abs() < 0.4, "r = {}, expected {}", r, radius);
            }
        }
    }

    #[test]
    fn test_expired_budget_returns_partial_flagged_result() {
        let data = cone_grid(128, 100.0);
        let result = redraw_contours(
            &data,
            &ContourOptions::default(),
            &ContourViewState::default(),
            Some(Duration::ZERO),
        );
        assert!(result.timed_out);
        assert!(result.positive.is_empty());
    }

    #[test]
    fn test_negative_lobes_are_traced() {
        let mut data = cone_grid(64, 100.0);
        for row in data.z.iter_mut() {
            for value in row.iter_mut() {
                *value = -*value;
            }
        }
        let result = redraw_contours(
            &data,
            &ContourOptions::default(),
            &ContourViewState::default(),
            None,
        );
        assert!(result.positive.is_empty());
        assert!(!result.negative.is_empty());
    }
}
