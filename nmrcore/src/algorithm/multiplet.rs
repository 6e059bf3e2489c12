use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Result of the multiplet analysis of one peak cluster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultipletAnalysis {
    /// Intensity-weighted center of the cluster, in ppm.
    pub delta: f64,
    /// "s", "d", "t", "q", compounds like "dd", or "m".
    pub multiplicity: String,
    /// One coupling constant (Hz) per letter, descending.
    pub couplings_hz: Vec<f64>,
}

/// Smallest coupling the analysis resolves, in Hz.
const MIN_J_HZ: f64 = 0.3;
/// Patterns larger than this are reported as "m" outright.
const MAX_PATTERN_PEAKS: usize = 16;
/// Relative amplitude mismatch tolerated between split partners.
const AMPLITUDE_TOLERANCE: f64 = 0.35;

/// First-order multiplet analysis by iterative symmetrized splitting.
///
/// The cluster is first checked for mirror symmetry about its
/// intensity centroid; a symmetric pattern is then repeatedly
/// deconvolved by its smallest peak spacing: each pass removes one
/// doublet splitting (child peaks pair up into a parent pattern at
/// half-spacing offsets), and the extracted spacings are grouped into
/// coupling constants. A pattern that resists any pass is classified
/// "m" with no couplings.
///
/// # Arguments
/// * `peaks` - `(x_ppm, intensity)` pairs of one cluster
/// * `frequency_mhz` - spectrometer frequency for ppm -> Hz conversion
pub fn analyse_multiplet(
    peaks: &[(f64, f64)],
    frequency_mhz: f64,
) -> Result<MultipletAnalysis, DetectionError> {
    if peaks.is_empty() {
        return Err(DetectionError::EmptyMultiplet);
    }

    let total: f64 = peaks.iter().map(|&(_, y)| y.abs()).sum();
    let delta = if total > 0.0 {
        peaks.iter().map(|&(x, y)| x * y.abs()).sum::<f64>() / total
    } else {
        peaks.iter().map(|&(x, _)| x).sum::<f64>() / peaks.len() as f64
    };

    if peaks.len() == 1 {
        return Ok(MultipletAnalysis {
            delta,
            multiplicity: "s".to_string(),
            couplings_hz: Vec::new(),
        });
    }
    if peaks.len() > MAX_PATTERN_PEAKS {
        return Ok(fallback(delta));
    }

    // Work in Hz relative to the centroid, sorted left to right, with
    // amplitudes normalized to the tallest peak.
    let mut pattern: Vec<(f64, f64)> = peaks
        .iter()
        .map(|&(x, y)| ((x - delta) * frequency_mhz, y.abs()))
        .collect();
    pattern.sort_by(|a, b| a.0.total_cmp(&b.0));
    let max_amp = pattern.iter().map(|&(_, y)| y).fold(f64::MIN, f64::max);
    if max_amp <= 0.0 {
        return Ok(fallback(delta));
    }
    for peak in pattern.iter_mut() {
        peak.1 /= max_amp;
    }

    let pattern = match symmetrize(&pattern) {
        Some(pattern) => pattern,
        None => return Ok(fallback(delta)),
    };

    // Iterative splitting: peel one doublet coupling per pass.
    let mut current = pattern;
    let mut extracted: Vec<f64> = Vec::new();
    while current.len() > 1 {
        let j = current[1].0 - current[0].0;
        if j < MIN_J_HZ || extracted.len() >= 6 {
            return Ok(fallback(delta));
        }
        match deconvolve(&current, j) {
            Some(parent) => {
                extracted.push(j);
                current = parent;
            }
            None => return Ok(fallback(delta)),
        }
    }

    let (multiplicity, couplings_hz) = name_pattern(&extracted);
    if multiplicity.is_empty() {
        return Ok(fallback(delta));
    }
    Ok(MultipletAnalysis { delta, multiplicity, couplings_hz })
}

fn fallback(delta: f64) -> MultipletAnalysis {
    MultipletAnalysis {
        delta,
        multiplicity: "m".to_string(),
        couplings_hz: Vec::new(),
    }
}

/// Checks mirror symmetry about the centroid and averages each peak
/// with its mirror partner. Returns `None` for asymmetric patterns.
fn symmetrize(pattern: &[(f64, f64)]) -> Option<Vec<(f64, f64)>> {
    let span = pattern.last()?.0 - pattern.first()?.0;
    let tolerance = (0.02 * span).max(0.5);

    let mut result = Vec::with_capacity(pattern.len());
    for &(x, y) in pattern {
        let (mx, my) = pattern
            .iter()
            .min_by(|a, b| (a.0 + x).abs().total_cmp(&(b.0 + x).abs()))
            .copied()?;
        if (mx + x).abs() > tolerance {
            return None;
        }
        let mean = (y + my) / 2.0;
        if (y - my).abs() > AMPLITUDE_TOLERANCE * mean.max(f64::EPSILON) {
            return None;
        }
        result.push((x, mean));
    }
    Some(result)
}

/// Removes one doublet splitting of spacing `j` from a pattern:
/// consumes peaks left to right, pairing each with its partner at
/// `+j`, and emits the parent peak at the pair midpoint. Fails when a
/// partner is missing or too weak.
fn deconvolve(pattern: &[(f64, f64)], j: f64) -> Option<Vec<(f64, f64)>> {
    let tolerance = (0.12 * j).max(0.25);
    let epsilon = 0.03;

    let mut remaining = pattern.to_vec();
    let mut parent: Vec<(f64, f64)> = Vec::new();

    while let Some(&(x0, y0)) = remaining.first() {
        if y0 <= epsilon {
            remaining.remove(0);
            continue;
        }
        let partner = remaining
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, &(x, y))| (x - (x0 + j)).abs() <= tolerance && y > epsilon)
            .map(|(k, _)| k)?;
        if remaining[partner].1 < y0 * (1.0 - AMPLITUDE_TOLERANCE) {
            return None;
        }
        remaining[partner].1 -= y0;
        push_coalesced(&mut parent, (x0 + j / 2.0, y0), tolerance);
        remaining.remove(0);
    }
    Some(parent)
}

/// Appends a parent peak, merging it into the previous one when the
/// positions coincide within tolerance.
fn push_coalesced(parent: &mut Vec<(f64, f64)>, peak: (f64, f64), tolerance: f64) {
    match parent.last_mut() {
        Some(last) if (last.0 - peak.0).abs() <= tolerance => {
            let weight = last.1 + peak.1;
            last.0 = (last.0 * last.1 + peak.0 * peak.1) / weight;
            last.1 = weight;
        }
        _ => parent.push(peak),
    }
}

/// Groups the extracted spacings into couplings and builds the
/// multiplicity label, one letter per distinct coupling, largest
/// first. Returns an empty label when a group is too deep to name.
fn name_pattern(extracted: &[f64]) -> (String, Vec<f64>) {
    let mut sorted = extracted.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut label = String::new();
    let mut couplings = Vec::new();
    let mut index = 0;
    while index < sorted.len() {
        let mut group = vec![sorted[index]];
        while index + 1 < sorted.len()
            && (sorted[index + 1] - sorted[index]).abs() <= 0.15 * sorted[index]
        {
            index += 1;
            group.push(sorted[index]);
        }
        index += 1;

        let letter = match group.len() {
            1 => 'd',
            2 => 't',
            3 => 'q',
            4 => 'p',
            5 => 'h',
            _ => return (String::new(), Vec::new()),
        };
        label.push(letter);
        couplings.push(group.iter().sum::<f64>() / group.len() as f64);
    }
    (label, couplings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FREQ: f64 = 400.0;

    /// Builds (ppm, intensity) peaks centered at `center` with the
    /// given Hz offsets and amplitudes.
    fn cluster(center: f64, peaks_hz: &[(f64, f64)]) -> Vec<(f64, f64)> {
        peaks_hz
            .iter()
            .map(|&(hz, y)| (center + hz / FREQ, y))
            .collect()
    }

    #[test]
    fn test_singlet() {
        let analysis = analyse_multiplet(&[(2.5, 1.0)], FREQ).unwrap();
        assert_eq!(analysis.multiplicity, "s");
        assert!(analysis.couplings_hz.is_empty());
        assert!((analysis.delta - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_doublet() {
        let peaks = cluster(3.0, &[(-3.6, 1.0), (3.6, 1.0)]);
        let analysis = analyse_multiplet(&peaks, FREQ).unwrap();
        assert_eq!(analysis.multiplicity, "d");
        assert_eq!(analysis.couplings_hz.len(), 1);
        assert!((analysis.couplings_hz[0] - 7.2).abs() < 0.05);
    }

    #[test]
    fn test_triplet_with_coupling() {
        let peaks = cluster(1.0, &[(-7.2, 0.5), (0.0, 1.0), (7.2, 0.5)]);
        let analysis = analyse_multiplet(&peaks, FREQ).unwrap();
        assert_eq!(analysis.multiplicity, "t");
        assert_eq!(analysis.couplings_hz.len(), 1);
        assert!((analysis.couplings_hz[0] - 7.2).abs() < 0.02);
        assert!((analysis.delta - 1.0).abs() < 0.003);
    }

    #[test]
    fn test_quartet() {
        let peaks = cluster(4.1, &[(-10.8, 1.0), (-3.6, 3.0), (3.6, 3.0), (10.8, 1.0)]);
        let analysis = analyse_multiplet(&peaks, FREQ).unwrap();
        assert_eq!(analysis.multiplicity, "q");
        assert!((analysis.couplings_hz[0] - 7.2).abs() < 0.05);
    }

    #[test]
    fn test_doublet_of_doublets() {
        // J1 = 12 Hz, J2 = 4 Hz: four equal peaks at +-8, +-4 Hz.
        let peaks = cluster(5.0, &[(-8.0, 1.0), (-4.0, 1.0), (4.0, 1.0), (8.0, 1.0)]);
        let analysis = analyse_multiplet(&peaks, FREQ).unwrap();
        assert_eq!(analysis.multiplicity, "dd");
        assert!((analysis.couplings_hz[0] - 12.0).abs() < 0.05);
        assert!((analysis.couplings_hz[1] - 4.0).abs() < 0.05);
    }

    #[test]
    fn test_asymmetric_pattern_is_m() {
        let peaks = cluster(2.0, &[(-7.0, 1.0), (0.0, 0.2), (4.0, 0.9)]);
        let analysis = analyse_multiplet(&peaks, FREQ).unwrap();
        assert_eq!(analysis.multiplicity, "m");
        assert!(analysis.couplings_hz.is_empty());
    }

    #[test]
    fn test_empty_cluster_is_an_error() {
        assert_eq!(
            analyse_multiplet(&[], FREQ).unwrap_err(),
            DetectionError::EmptyMultiplet
        );
    }
}
