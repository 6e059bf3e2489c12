use crate::data::features::{Range, SignalKind, SumOptions, Zone};

/// A feature that participates in proportional quantification.
///
/// The relative-value manager works against this seam so ranges and
/// zones share one recompute path.
pub trait Quantifiable {
    fn feature_id(&self) -> &str;
    fn kind(&self) -> SignalKind;
    fn absolute(&self) -> f64;
    fn relative(&self) -> f64;
    fn set_relative(&mut self, value: f64);
}

impl Quantifiable for Range {
    fn feature_id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> SignalKind {
        self.kind
    }
    fn absolute(&self) -> f64 {
        self.absolute
    }
    fn relative(&self) -> f64 {
        self.relative
    }
    fn set_relative(&mut self, value: f64) {
        self.relative = value;
    }
}

impl Quantifiable for Zone {
    fn feature_id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> SignalKind {
        self.kind
    }
    fn absolute(&self) -> f64 {
        self.absolute
    }
    fn relative(&self) -> f64 {
        self.relative
    }
    fn set_relative(&mut self, value: f64) {
        self.relative = value;
    }
}

/// Recomputes the relative values of a feature collection under the
/// current sum options.
///
/// Constant-sum (or a forced recompute): the qualifying absolutes are
/// rescaled so their relative values total `options.sum`; the target
/// itself is left untouched. Auto-sum: the scale is derived from one
/// reference feature's existing relative/absolute ratio and the target
/// follows the resulting total. Features whose kind is excluded by the
/// inclusion predicate get a relative value of zero.
pub fn update_relative_values<T: Quantifiable>(
    features: &mut [T],
    options: &mut SumOptions,
    force: bool,
) {
    if features.is_empty() {
        return;
    }

    let scale = if options.auto {
        auto_scale(features, options)
    } else if options.is_constant || force {
        let total: f64 = features
            .iter()
            .filter(|f| f.kind().is_quantified())
            .map(|f| f.absolute())
            .sum();
        if total > 0.0 {
            Some(options.sum / total)
        } else {
            Some(0.0)
        }
    } else {
        None
    };

    let scale = match scale {
        Some(scale) => scale,
        None => return,
    };

    apply_scale(features, scale);
    if options.auto {
        options.sum = features
            .iter()
            .filter(|f| f.kind().is_quantified())
            .map(|f| f.relative())
            .sum();
    }
    log::debug!("quantification recomputed with scale {}", scale);
}

/// Sets one feature's relative value and rescales the rest of the
/// collection so all ratios stay proportional to the absolutes. The
/// aggregate target follows the new total.
///
/// # Returns
/// `false` when `id` names no feature or the feature has no usable
/// absolute value; the collection is then left unchanged.
pub fn set_relative_value<T: Quantifiable>(
    features: &mut [T],
    options: &mut SumOptions,
    id: &str,
    value: f64,
) -> bool {
    let target = match features.iter().find(|f| f.feature_id() == id) {
        Some(target) => target,
        None => return false,
    };
    if target.absolute() == 0.0 || !target.absolute().is_finite() {
        return false;
    }

    let scale = value / target.absolute();
    apply_scale(features, scale);
    options.sum = features
        .iter()
        .filter(|f| f.kind().is_quantified())
        .map(|f| f.relative())
        .sum();
    true
}

/// Scale factor of the auto-sum regime: the pinned reference feature's
/// relative/absolute ratio, falling back to the first qualifying
/// feature that already carries a nonzero relative value. Without a
/// usable reference the constant-sum scale is used instead.
fn auto_scale<T: Quantifiable>(features: &[T], options: &SumOptions) -> Option<f64> {
    let reference = match &options.reference {
        Some(id) => features.iter().find(|f| f.feature_id() == id),
        None => features
            .iter()
            .find(|f| f.kind().is_quantified() && f.relative() != 0.0 && f.absolute() > 0.0),
    };
    match reference {
        Some(reference) if reference.absolute() > 0.0 && reference.relative() != 0.0 => {
            Some(reference.relative() / reference.absolute())
        }
        _ => {
            let total: f64 = features
                .iter()
                .filter(|f| f.kind().is_quantified())
                .map(|f| f.absolute())
                .sum();
            if total > 0.0 {
                Some(options.sum / total)
            } else {
                Some(0.0)
            }
        }
    }
}

fn apply_scale<T: Quantifiable>(features: &mut [T], scale: f64) {
    for feature in features.iter_mut() {
        if feature.kind().is_quantified() {
            feature.set_relative(feature.absolute() * scale);
        } else {
            feature.set_relative(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(absolutes: &[f64]) -> Vec<Range> {
        absolutes
            .iter()
            .enumerate()
            .map(|(i, &absolute)| Range {
                id: format!("r{}", i),
                from: i as f64,
                to: i as f64 + 0.5,
                absolute,
                relative: 0.0,
                kind: SignalKind::Signal,
                signals: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn test_constant_sum_distributes_target() {
        let mut features = ranges(&[10.0, 20.0, 30.0]);
        let mut options = SumOptions { sum: 100.0, is_constant: true, ..Default::default() };
        update_relative_values(&mut features, &mut options, false);

        assert!((features[0].relative - 100.0 / 6.0).abs() < 0.01);
        assert!((features[1].relative - 100.0 / 3.0).abs() < 0.01);
        assert!((features[2].relative - 50.0).abs() < 0.01);
        let total: f64 = features.iter().map(|f| f.relative).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert!((options.sum - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_excluded_kinds_do_not_consume_the_target() {
        let mut features = ranges(&[10.0, 10.0, 20.0]);
        features[2].kind = SignalKind::Solvent;
        let mut options = SumOptions { sum: 100.0, is_constant: true, ..Default::default() };
        update_relative_values(&mut features, &mut options, false);

        assert!((features[0].relative - 50.0).abs() < 1e-9);
        assert!((features[1].relative - 50.0).abs() < 1e-9);
        assert_eq!(features[2].relative, 0.0);
    }

    #[test]
    fn test_single_edit_rescales_collection() {
        let mut features = ranges(&[10.0, 20.0, 30.0]);
        let mut options = SumOptions::default();
        update_relative_values(&mut features, &mut options, true);

        // Pin the first range to 2 protons; the rest follow the ratio.
        assert!(set_relative_value(&mut features, &mut options, "r0", 2.0));
        assert!((features[0].relative - 2.0).abs() < 1e-12);
        assert!((features[1].relative - 4.0).abs() < 1e-12);
        assert!((features[2].relative - 6.0).abs() < 1e-12);
        assert!((options.sum - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_edit_rejects_unknown_id() {
        let mut features = ranges(&[10.0]);
        let mut options = SumOptions::default();
        assert!(!set_relative_value(&mut features, &mut options, "nope", 1.0));
        assert_eq!(features[0].relative, 0.0);
    }

    #[test]
    fn test_auto_sum_follows_the_reference() {
        let mut features = ranges(&[10.0, 20.0]);
        features[0].relative = 3.0;
        let mut options = SumOptions {
            auto: true,
            reference: Some("r0".to_string()),
            ..Default::default()
        };
        update_relative_values(&mut features, &mut options, false);

        assert!((features[0].relative - 3.0).abs() < 1e-12);
        assert!((features[1].relative - 6.0).abs() < 1e-12);
        assert!((options.sum - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_total_yields_zero_relatives() {
        let mut features = ranges(&[0.0, 0.0]);
        let mut options = SumOptions { is_constant: true, ..Default::default() };
        update_relative_values(&mut features, &mut options, false);
        assert_eq!(features[0].relative, 0.0);
        assert_eq!(features[1].relative, 0.0);
    }

    #[test]
    fn test_non_constant_non_forced_is_a_no_op() {
        let mut features = ranges(&[10.0, 20.0]);
        features[0].relative = 42.0;
        let mut options = SumOptions::default();
        update_relative_values(&mut features, &mut options, false);
        assert!((features[0].relative - 42.0).abs() < 1e-12);
    }
}
