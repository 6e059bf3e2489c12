use serde::{Deserialize, Serialize};

use crate::algorithm::noise::noise_level_2d;
use crate::data::spectrum::Data2d;

/// Static parameters of the contour level ladder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContourOptions {
    /// Number of iso levels per lobe sign.
    pub num_levels: usize,
    /// Noise-floor multiplier anchoring the lowest level.
    pub noise_multiplier: f64,
    /// Multiplicative step applied per wheel increment.
    pub zoom_step: f64,
    /// Inclusive wheel range.
    pub min_zoom: i32,
    pub max_zoom: i32,
    /// Inverse exponent compressing the ladder toward the floor:
    /// values above 1 put more levels near the noise anchor.
    pub compression: f64,
}

impl Default for ContourOptions {
    fn default() -> Self {
        ContourOptions {
            num_levels: 10,
            noise_multiplier: 3.0,
            zoom_step: 1.25,
            min_zoom: -10,
            max_zoom: 20,
            compression: 2.0,
        }
    }
}

/// Interactive zoom state, one discretized wheel position per lobe
/// sign. Mutating the state never retraces; the next redraw picks the
/// new levels up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContourViewState {
    pub positive_zoom: i32,
    pub negative_zoom: i32,
}

impl ContourViewState {
    /// Applies one wheel step to the selected lobe, clamped to the
    /// configured range.
    pub fn wheel(&mut self, delta: i32, positive: bool, options: &ContourOptions) {
        let slot = if positive {
            &mut self.positive_zoom
        } else {
            &mut self.negative_zoom
        };
        *slot = (*slot + delta).clamp(options.min_zoom, options.max_zoom);
    }
}

/// Iso levels of both lobes for the current view state.
///
/// Each ladder runs geometrically from the zoomed noise anchor up to
/// the lobe's extreme value, with the exponent compressed so spacing
/// is finer near the floor. A lobe whose extreme does not clear its
/// anchor gets an empty ladder.
pub fn contour_levels(
    data: &Data2d,
    options: &ContourOptions,
    view: &ContourViewState,
) -> (Vec<f64>, Vec<f64>) {
    let noise = noise_level_2d(&data.z);
    let max = data
        .z
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, &v| acc.max(v));
    let min = data
        .z
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, &v| acc.min(v));

    let positive = ladder(
        anchor(noise, options, view.positive_zoom),
        max,
        options,
    );
    let negative = ladder(
        anchor(noise, options, view.negative_zoom),
        -min,
        options,
    )
    .into_iter()
    .map(|level| -level)
    .collect();
    (positive, negative)
}

/// Lowest level of a ladder: the scaled noise floor raised (or
/// lowered) by the discretized zoom.
fn anchor(noise: f64, options: &ContourOptions, zoom: i32) -> f64 {
    let base = if noise > 0.0 {
        noise * options.noise_multiplier
    } else {
        // Degenerate floor: fall back to a unit anchor so zooming
        // still works on noiseless synthetic grids.
        1.0
    };
    base * options.zoom_step.powi(zoom)
}

fn ladder(start: f64, ceiling: f64, options: &ContourOptions) -> Vec<f64> {
    if options.num_levels == 0 || start <= 0.0 || ceiling <= start {
        return Vec::new();
    }
    if options.num_levels == 1 {
        return vec![start];
    }
    let ratio = ceiling / start;
    (0..options.num_levels)
        .map(|k| {
            let t = k as f64 / (options.num_levels - 1) as f64;
            start * ratio.powf(t.powf(options.compression))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(max: f64) -> Data2d {
        let mut z = vec![vec![0.5; 32]; 32];
        z[16][16] = max;
        z[8][8] = -max / 2.0;
        Data2d::new(z, 0.0, 10.0, 0.0, 10.0)
    }

    #[test]
    fn test_ladder_is_anchored_and_monotone() {
        let data = grid(1000.0);
        let options = ContourOptions::default();
        let (positive, negative) = contour_levels(&data, &options, &ContourViewState::default());

        assert_eq!(positive.len(), options.num_levels);
        assert!((positive[0] - 0.5 * options.noise_multiplier).abs() < 1e-9);
        assert!((positive[positive.len() - 1] - 1000.0).abs() < 1e-6);
        assert!(positive.windows(2).all(|w| w[1] > w[0]));

        // Negative levels mirror the ladder below zero.
        assert!(!negative.is_empty());
        assert!(negative.iter().all(|&level| level < 0.0));
    }

    #[test]
    fn test_compression_packs_levels_near_the_floor() {
        let data = grid(1000.0);
        let options = ContourOptions::default();
        let (positive, _) = contour_levels(&data, &options, &ContourViewState::default());

        // The first gap is smaller than the last.
        let first = positive[1] - positive[0];
        let last = positive[positive.len() - 1] - positive[positive.len() - 2];
        assert!(first < last);
    }

    #[test]
    fn test_wheel_zoom_is_clamped() {
        let options = ContourOptions::default();
        let mut view = ContourViewState::default();

        view.wheel(5, true, &options);
        assert_eq!(view.positive_zoom, 5);
        view.wheel(100, true, &options);
        assert_eq!(view.positive_zoom, options.max_zoom);
        view.wheel(-1000, true, &options);
        assert_eq!(view.positive_zoom, options.min_zoom);
        // The negative lobe zoom is independent.
        assert_eq!(view.negative_zoom, 0);
    }

    #[test]
    fn test_zoom_raises_the_anchor() {
        let data = grid(1000.0);
        let options = ContourOptions::default();
        let mut view = ContourViewState::default();
        let (before, _) = contour_levels(&data, &options, &view);
        view.wheel(4, true, &options);
        let (after, _) = contour_levels(&data, &options, &view);

        assert!((after[0] / before[0] - options.zoom_step.powi(4)).abs() < 1e-9);
    }

    #[test]
    fn test_noise_above_ceiling_yields_empty_ladder() {
        let z = vec![vec![1.0; 16]; 16];
        let data = Data2d::new(z, 0.0, 1.0, 0.0, 1.0);
        let (positive, negative) =
            contour_levels(&data, &ContourOptions::default(), &ContourViewState::default());
        assert!(positive.is_empty());
        assert!(negative.is_empty());
    }
}
