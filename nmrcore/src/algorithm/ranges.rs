use serde::{Deserialize, Serialize};

use crate::algorithm::multiplet::analyse_multiplet;
use crate::algorithm::peaks::{pick, PeakPickingOptions, PickedPeak};
use crate::data::features::{Range, Signal, SignalKind};
use crate::data::spectrum::{Data1d, Spectrum};
use crate::error::DetectionError;
use crate::quantify;

/// Tolerance for deduplicating ranges, as a fraction of the axis span.
const DEDUP_SPAN_FRACTION: f64 = 1.0 / 1_000.0;

/// Options of the 1D range detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RangeDetectionOptions {
    /// Seed peak picking configuration.
    pub peaks: PeakPickingOptions,
    /// Peaks closer than this (in Hz) belong to the same multiplet.
    pub clustering_hz: f64,
    /// Join proposed ranges whose intervals overlap.
    pub join_overlapping: bool,
}

impl Default for RangeDetectionOptions {
    fn default() -> Self {
        RangeDetectionOptions {
            peaks: PeakPickingOptions::default(),
            clustering_hz: 18.0,
            join_overlapping: true,
        }
    }
}

/// Detects ranges on the derived buffer: picks peaks, clusters them
/// into chemical-shift intervals, runs the multiplet analysis per
/// cluster, joins overlapping intervals, integrates each interval and
/// appends the results to the spectrum's range collection. Finishes
/// with a forced quantification recompute so relative values stay
/// consistent with the sum options.
///
/// # Returns
/// The number of ranges added.
pub fn detect_ranges(
    spectrum: &mut Spectrum,
    options: &RangeDetectionOptions,
) -> Result<usize, DetectionError> {
    let data = spectrum
        .derived_1d()
        .ok_or(DetectionError::WrongDimension { detector: "rangeDetection", expected: "1D" })?;
    if data.is_empty() {
        return Ok(0);
    }

    let frequency = spectrum.meta.frequency_mhz;
    let mut picked = pick(data, &options.peaks);
    if picked.is_empty() {
        return Ok(0);
    }
    picked.sort_by(|a, b| a.x.total_cmp(&b.x));

    let gap_ppm = options.clustering_hz / frequency;
    let margin = gap_ppm / 2.0;

    let mut candidates: Vec<(f64, f64, Signal)> = Vec::new();
    for cluster in cluster_by_gap(&picked, gap_ppm) {
        let pairs: Vec<(f64, f64)> = cluster.iter().map(|p| (p.x, p.intensity)).collect();
        let analysis = analyse_multiplet(&pairs, frequency)?;
        let from = cluster.first().map(|p| p.x).unwrap_or(analysis.delta) - margin;
        let to = cluster.last().map(|p| p.x).unwrap_or(analysis.delta) + margin;
        candidates.push((
            from,
            to,
            Signal {
                delta: analysis.delta,
                original_delta: analysis.delta,
                multiplicity: analysis.multiplicity,
                couplings_hz: analysis.couplings_hz,
            },
        ));
    }

    let mut proposed: Vec<(f64, f64, Vec<Signal>)> = Vec::new();
    for (from, to, signal) in candidates {
        match proposed.last_mut() {
            Some(last) if options.join_overlapping && from <= last.1 => {
                last.1 = last.1.max(to);
                last.2.push(signal);
            }
            _ => proposed.push((from, to, vec![signal])),
        }
    }

    let tolerance = data.x_span() * DEDUP_SPAN_FRACTION;
    let shift = spectrum.accumulated_shift().0;
    let integrated: Vec<(f64, f64, f64, Vec<Signal>)> = proposed
        .into_iter()
        .map(|(from, to, signals)| (from, to, integrate_region(data, from, to), signals))
        .collect();

    let mut added = 0;
    for (from, to, absolute, mut signals) in integrated {
        let duplicate = spectrum
            .ranges
            .iter()
            .any(|r| (r.from - from).abs() < tolerance && (r.to - to).abs() < tolerance);
        if duplicate {
            continue;
        }
        for signal in signals.iter_mut() {
            signal.original_delta = signal.delta - shift;
        }
        let id = spectrum.mint_feature_id();
        spectrum.ranges.push(Range {
            id,
            from,
            to,
            absolute,
            relative: 0.0,
            kind: SignalKind::Signal,
            signals,
        });
        added += 1;
    }

    let mut sum_options = spectrum.quantification.clone();
    quantify::update_relative_values(&mut spectrum.ranges, &mut sum_options, true);
    spectrum.quantification = sum_options;

    log::debug!("range detection added {} ranges", added);
    Ok(added)
}

/// Splits peaks (sorted by x) into clusters wherever the gap between
/// neighbors exceeds `gap_ppm`.
fn cluster_by_gap(picked: &[PickedPeak], gap_ppm: f64) -> Vec<Vec<PickedPeak>> {
    let mut clusters: Vec<Vec<PickedPeak>> = Vec::new();
    for peak in picked {
        match clusters.last_mut() {
            Some(cluster)
                if peak.x - cluster.last().map(|p| p.x).unwrap_or(f64::NEG_INFINITY)
                    <= gap_ppm =>
            {
                cluster.push(peak.clone())
            }
            _ => clusters.push(vec![peak.clone()]),
        }
    }
    clusters
}

/// Trapezoid integral of the real channel over the x interval,
/// reported as a magnitude.
pub fn integrate_region(data: &Data1d, from: f64, to: f64) -> f64 {
    let lo = from.min(to);
    let hi = from.max(to);
    let mut sum = 0.0;
    for i in 0..data.len().saturating_sub(1) {
        let (x0, x1) = (data.x[i], data.x[i + 1]);
        if x0.min(x1) < lo || x0.max(x1) > hi {
            continue;
        }
        sum += 0.5 * (data.re[i] + data.re[i + 1]) * (x1 - x0);
    }
    sum.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::{Data1d, Metadata, Spectrum};

    fn lorentzian(x: f64, center: f64, width: f64) -> f64 {
        let d = (x - center) / (width / 2.0);
        1.0 / (1.0 + d * d)
    }

    /// A frequency-domain proton spectrum holding a triplet centered
    /// at 1.00 ppm with J = 7.2 Hz, on a descending axis.
    fn triplet_spectrum() -> Spectrum {
        let freq = 400.0;
        let j_ppm = 7.2 / freq;
        let n = 8192;
        let x: Vec<f64> = (0..n)
            .map(|i| 1.1 - 0.2 * i as f64 / (n - 1) as f64)
            .collect();
        let components = [(1.0 - j_ppm, 0.5), (1.0, 1.0), (1.0 + j_ppm, 0.5)];
        let re: Vec<f64> = x
            .iter()
            .map(|&x| {
                components
                    .iter()
                    .map(|&(c, a)| a * lorentzian(x, c, 0.0015))
                    .sum()
            })
            .collect();
        let data = Data1d::new(x, re, None);
        Spectrum::one_dim("triplet", data, Metadata::one_dim("1H", freq, 4000.0))
    }

    #[test]
    fn test_triplet_multiplicity_and_coupling() {
        let mut spectrum = triplet_spectrum();
        let added = detect_ranges(&mut spectrum, &RangeDetectionOptions::default()).unwrap();

        assert_eq!(added, 1);
        let range = &spectrum.ranges[0];
        assert_eq!(range.signals.len(), 1);
        let signal = &range.signals[0];
        assert_eq!(signal.multiplicity, "t");
        assert!((signal.delta - 1.0).abs() < 0.003, "delta = {}", signal.delta);
        assert_eq!(signal.couplings_hz.len(), 1);
        assert!(
            (signal.couplings_hz[0] - 7.2).abs() < 0.02,
            "J = {}",
            signal.couplings_hz[0]
        );
        assert!(range.from < 0.98 && range.to > 1.02);
        assert!(range.absolute > 0.0);
    }

    #[test]
    fn test_rerun_does_not_duplicate_ranges() {
        let mut spectrum = triplet_spectrum();
        let options = RangeDetectionOptions::default();
        detect_ranges(&mut spectrum, &options).unwrap();
        let added = detect_ranges(&mut spectrum, &options).unwrap();
        assert_eq!(added, 0);
        assert_eq!(spectrum.ranges.len(), 1);
    }

    #[test]
    fn test_detection_refreshes_relative_values() {
        let mut spectrum = triplet_spectrum();
        spectrum.quantification.sum = 3.0;
        detect_ranges(&mut spectrum, &RangeDetectionOptions::default()).unwrap();

        // A forced recompute normalizes the single range to the sum.
        assert!((spectrum.ranges[0].relative - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_integrate_region_on_constant_channel() {
        let data = Data1d::new(
            (0..11).map(|i| i as f64).collect(),
            vec![2.0; 11],
            None,
        );
        let integral = integrate_region(&data, 2.0, 7.0);
        assert!((integral - 10.0).abs() < 1e-12);
    }
}
