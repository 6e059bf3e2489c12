use itertools::Itertools;

use crate::data::spectrum::Data1d;
use crate::error::FilterError;

/// Zeroes the real (and imaginary) channel inside each excluded x
/// interval. Intervals are given as `(from, to)` pairs in axis units.
pub fn apply_exclusion_zones(data: &mut Data1d, zones: &[(f64, f64)]) -> Result<(), FilterError> {
    if data.is_empty() {
        return Err(FilterError::EmptyBuffer { filter: "exclusionZones" });
    }
    for &(from, to) in zones {
        let lo = from.min(to);
        let hi = from.max(to);
        for i in 0..data.x.len() {
            if data.x[i] >= lo && data.x[i] <= hi {
                data.re[i] = 0.0;
                if let Some(im) = data.im.as_mut() {
                    im[i] = 0.0;
                }
            }
        }
    }
    Ok(())
}

/// Normalizes a zone list: orients each pair, sorts by start and
/// coalesces overlapping or touching intervals. This is the merge
/// combination for repeated exclusion-zone requests.
pub fn normalize_zones(zones: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut sorted: Vec<(f64, f64)> = zones
        .iter()
        .map(|&(a, b)| (a.min(b), a.max(b)))
        .sorted_by(|a, b| a.0.total_cmp(&b.0))
        .collect();

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(sorted.len());
    for zone in sorted.drain(..) {
        match merged.last_mut() {
            Some(last) if zone.0 <= last.1 => last.1 = last.1.max(zone.1),
            _ => merged.push(zone),
        }
    }
    merged
}
