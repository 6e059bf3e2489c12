use std::f64::consts::{LN_2, PI};

use crate::data::spectrum::{Data1d, Metadata};
use crate::error::FilterError;

/// Lorentz-to-Gauss apodization of a time-domain buffer.
///
/// Each point at acquisition time `t` is scaled by
/// `exp(-pi * lb * t) * exp(-(pi * gb * t)^2 / (4 ln 2))`; a negative
/// `line_broadening_hz` performs resolution enhancement. When the
/// digital filter has been removed upstream, the rotated tail at the
/// buffer end holds pre-acquisition points and is left unweighted.
///
/// # Arguments
/// * `line_broadening_hz` - exponential line broadening (Hz)
/// * `gauss_broadening_hz` - Gaussian broadening (Hz)
pub fn apodize(
    data: &mut Data1d,
    meta: &Metadata,
    line_broadening_hz: f64,
    gauss_broadening_hz: f64,
) -> Result<(), FilterError> {
    const NAME: &str = "apodization";

    if data.is_empty() {
        return Err(FilterError::EmptyBuffer { filter: NAME });
    }
    if meta.spectral_width_hz <= 0.0 {
        return Err(FilterError::Degenerate {
            filter: NAME,
            reason: "spectral width must be positive to derive the dwell time".to_string(),
        });
    }

    let dwell = 1.0 / meta.spectral_width_hz;
    let tail = meta.digital_filter_points().min(data.len());
    let effective = data.len() - tail;

    for i in 0..effective {
        let t = i as f64 * dwell;
        let mut w = (-PI * line_broadening_hz * t).exp();
        if gauss_broadening_hz != 0.0 {
            let g = PI * gauss_broadening_hz * t;
            w *= (-(g * g) / (4.0 * LN_2)).exp();
        }
        data.re[i] *= w;
        if let Some(im) = data.im.as_mut() {
            im[i] *= w;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::Metadata;

    fn meta() -> Metadata {
        let mut meta = Metadata::one_dim("1H", 400.0, 1000.0);
        meta.is_complex = true;
        meta.is_fid = true;
        meta
    }

    #[test]
    fn test_exponential_decay_is_monotone() {
        let mut data = Data1d::new(vec![0.0; 64], vec![1.0; 64], Some(vec![1.0; 64]));
        apodize(&mut data, &meta(), 2.0, 0.0).unwrap();

        assert!((data.re[0] - 1.0).abs() < 1e-12);
        for i in 1..64 {
            assert!(data.re[i] < data.re[i - 1]);
        }
    }

    #[test]
    fn test_digital_filter_tail_untouched() {
        let mut meta = meta();
        meta.digital_filter = Some(4.5);
        let mut data = Data1d::new(vec![0.0; 16], vec![1.0; 16], None);

        apodize(&mut data, &meta, 5.0, 1.0).unwrap();

        // Last four points are the rotated pre-acquisition tail.
        for i in 12..16 {
            assert!((data.re[i] - 1.0).abs() < 1e-12);
        }
        assert!(data.re[11] < 1.0);
    }
}
