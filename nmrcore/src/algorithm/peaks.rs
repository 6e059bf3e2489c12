use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::algorithm::noise::noise_level;
use crate::data::features::Peak;
use crate::data::spectrum::{Data1d, Spectrum};
use crate::error::DetectionError;

/// Tolerance for deduplicating peaks, as a fraction of the axis span.
const DEDUP_SPAN_FRACTION: f64 = 1.0 / 10_000.0;

/// Options of the 1D peak picker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeakPickingOptions {
    /// Optional sub-range of the axis to inspect.
    pub from: Option<f64>,
    pub to: Option<f64>,
    /// Candidate threshold as a multiple of the noise floor.
    pub threshold_ratio: f64,
    /// Extra scaling of the noise floor before thresholding.
    pub noise_factor: f64,
    /// Keep at most this many peaks, by descending |intensity|.
    pub max_peaks: usize,
    /// Also pick negative lobes.
    pub keep_negative: bool,
}

impl Default for PeakPickingOptions {
    fn default() -> Self {
        PeakPickingOptions {
            from: None,
            to: None,
            threshold_ratio: 3.0,
            noise_factor: 1.0,
            max_peaks: 256,
            keep_negative: false,
        }
    }
}

/// A raw picked peak, before feature bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct PickedPeak {
    pub x: f64,
    pub intensity: f64,
    pub width: f64,
}

/// Picks peaks on the real channel: local maxima above a noise-scaled
/// threshold, refined by parabolic interpolation of the apex and
/// measured at half height.
///
/// # Returns
/// Peaks sorted by descending |intensity|, truncated to
/// `options.max_peaks`.
pub fn pick(data: &Data1d, options: &PeakPickingOptions) -> Vec<PickedPeak> {
    let n = data.len();
    if n < 3 {
        return Vec::new();
    }

    let (lo, hi) = window_indices(data, options);
    if hi - lo < 2 {
        return Vec::new();
    }

    let noise = noise_level(&data.re[lo..=hi]);
    let threshold = noise * options.threshold_ratio * options.noise_factor;

    let mut peaks = scan(data, lo, hi, threshold, 1.0);
    if options.keep_negative {
        peaks.extend(scan(data, lo, hi, threshold, -1.0));
    }

    peaks.sort_by_key(|p| std::cmp::Reverse(OrderedFloat(p.intensity.abs())));
    peaks.truncate(options.max_peaks);
    peaks
}

/// Runs the peak picker on the derived buffer and appends the results
/// to the spectrum's peak collection, skipping candidates that
/// duplicate an existing peak within an axis-span-relative tolerance.
///
/// # Returns
/// The number of peaks added.
pub fn detect_peaks(
    spectrum: &mut Spectrum,
    options: &PeakPickingOptions,
) -> Result<usize, DetectionError> {
    let data = spectrum
        .derived_1d()
        .ok_or(DetectionError::WrongDimension { detector: "peakPicking", expected: "1D" })?;
    if data.is_empty() {
        return Ok(0);
    }

    let tolerance = data.x_span() * DEDUP_SPAN_FRACTION;
    let picked = pick(data, options);
    let shift = spectrum.accumulated_shift().0;

    let mut added = 0;
    for candidate in picked {
        let duplicate = spectrum
            .peaks
            .iter()
            .any(|peak| (peak.x - candidate.x).abs() < tolerance);
        if duplicate {
            continue;
        }
        let id = spectrum.mint_feature_id();
        spectrum.peaks.push(Peak {
            id,
            x: candidate.x,
            original_x: candidate.x - shift,
            intensity: candidate.intensity,
            width: candidate.width,
        });
        added += 1;
    }
    log::debug!("peak picking added {} peaks", added);
    Ok(added)
}

fn window_indices(data: &Data1d, options: &PeakPickingOptions) -> (usize, usize) {
    let n = data.len();
    match (options.from, options.to) {
        (Some(from), Some(to)) => {
            let a = data.closest_index(from);
            let b = data.closest_index(to);
            (a.min(b), a.max(b))
        }
        _ => (0, n - 1),
    }
}

/// One scan direction: `sign` +1 picks maxima, -1 picks minima
/// (reported with negative intensity).
fn scan(data: &Data1d, lo: usize, hi: usize, threshold: f64, sign: f64) -> Vec<PickedPeak> {
    let value = |i: usize| sign * data.re[i];
    let mut peaks = Vec::new();

    for i in (lo + 1)..hi {
        let y = value(i);
        if y <= threshold || y < value(i - 1) || y < value(i + 1) {
            continue;
        }
        if y == value(i - 1) {
            // Flat-top plateau: only the leading edge counts.
            continue;
        }

        // Parabolic apex refinement through the three points.
        let denom = value(i - 1) - 2.0 * y + value(i + 1);
        let delta = if denom.abs() > f64::EPSILON {
            (0.5 * (value(i - 1) - value(i + 1)) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        let spacing = (data.x[i + 1] - data.x[i - 1]) / 2.0;
        let x = data.x[i] + delta * spacing;
        let intensity = y - 0.25 * (value(i - 1) - value(i + 1)) * delta;

        peaks.push(PickedPeak {
            x,
            intensity: sign * intensity,
            width: half_height_width(data, i, lo, hi, sign),
        });
    }
    peaks
}

fn half_height_width(data: &Data1d, apex: usize, lo: usize, hi: usize, sign: f64) -> f64 {
    let value = |i: usize| sign * data.re[i];
    let half = value(apex) / 2.0;

    let mut left = apex;
    while left > lo && value(left - 1) > half {
        left -= 1;
    }
    let mut right = apex;
    while right < hi && value(right + 1) > half {
        right += 1;
    }
    if right > left {
        (data.x[right] - data.x[left]).abs()
    } else {
        (data.x[apex + 1] - data.x[apex - 1]).abs() / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::{Data1d, Metadata, Spectrum};

    fn lorentzian(x: f64, center: f64, width: f64) -> f64 {
        let d = (x - center) / (width / 2.0);
        1.0 / (1.0 + d * d)
    }

    /// Frequency-domain test spectrum: descending ppm axis with
    /// Lorentzians at the given (center, amplitude) pairs.
    fn synth(peaks: &[(f64, f64)], n: usize) -> Spectrum {
        let x: Vec<f64> = (0..n)
            .map(|i| 10.0 - 10.0 * i as f64 / (n - 1) as f64)
            .collect();
        let re: Vec<f64> = x
            .iter()
            .map(|&x| {
                peaks
                    .iter()
                    .map(|&(c, a)| a * lorentzian(x, c, 0.02))
                    .sum::<f64>()
            })
            .collect();
        let data = Data1d::new(x, re, None);
        Spectrum::one_dim("synth", data, Metadata::one_dim("1H", 400.0, 4000.0))
    }

    #[test]
    fn test_picks_both_resonances() {
        let mut spectrum = synth(&[(7.0, 1.0), (3.0, 0.4)], 8192);
        let added = detect_peaks(&mut spectrum, &PeakPickingOptions::default()).unwrap();

        assert_eq!(added, 2);
        // Sorted by descending intensity.
        assert!((spectrum.peaks[0].x - 7.0).abs() < 0.01);
        assert!((spectrum.peaks[1].x - 3.0).abs() < 0.01);
        assert!(spectrum.peaks[0].width > 0.0);
    }

    #[test]
    fn test_rerun_does_not_duplicate() {
        let mut spectrum = synth(&[(7.0, 1.0), (3.0, 0.4)], 8192);
        let options = PeakPickingOptions::default();
        detect_peaks(&mut spectrum, &options).unwrap();
        let added = detect_peaks(&mut spectrum, &options).unwrap();

        assert_eq!(added, 0);
        assert_eq!(spectrum.peaks.len(), 2);
    }

    #[test]
    fn test_saturated_flat_top_is_picked_once() {
        // A clipped apex holds two equal samples; the picker keeps
        // its leading edge and refines to the plateau midpoint.
        let n = 64;
        let x: Vec<f64> = (0..n)
            .map(|i| 10.0 - 10.0 * i as f64 / (n - 1) as f64)
            .collect();
        let mut re = vec![0.0; n];
        re[31] = 10.0;
        re[32] = 10.0;
        let data = Data1d::new(x, re, None);

        let peaks = pick(&data, &PeakPickingOptions::default());
        assert_eq!(peaks.len(), 1);
        let mid = (data.x[31] + data.x[32]) / 2.0;
        assert!((peaks[0].x - mid).abs() < 1e-9);
        assert!(peaks[0].intensity >= 10.0);
        assert!(peaks[0].width > 0.0);
    }

    #[test]
    fn test_negative_lobes_are_optional() {
        let mut spectrum = synth(&[(7.0, 1.0), (3.0, -0.5)], 8192);
        let added = detect_peaks(&mut spectrum, &PeakPickingOptions::default()).unwrap();
        assert_eq!(added, 1);

        let mut spectrum = synth(&[(7.0, 1.0), (3.0, -0.5)], 8192);
        let options = PeakPickingOptions { keep_negative: true, ..Default::default() };
        let added = detect_peaks(&mut spectrum, &options).unwrap();
        assert_eq!(added, 2);
        let negative = spectrum.peaks.iter().find(|p| p.intensity < 0.0).unwrap();
        assert!((negative.x - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_window_restricts_candidates() {
        let mut spectrum = synth(&[(7.0, 1.0), (3.0, 0.4)], 8192);
        let options = PeakPickingOptions {
            from: Some(2.0),
            to: Some(4.0),
            ..Default::default()
        };
        let added = detect_peaks(&mut spectrum, &options).unwrap();
        assert_eq!(added, 1);
        assert!((spectrum.peaks[0].x - 3.0).abs() < 0.01);
    }
}
