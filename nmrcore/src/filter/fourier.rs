use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::data::spectrum::{Data1d, Metadata};
use crate::error::FilterError;

/// Fourier transform of a complex time-domain buffer.
///
/// The pipeline is: optional DC offset removal (acquisition-mode
/// flag), zero filling to the next power of two with the digitally
/// filtered tail kept at the buffer end, forward FFT with fft-shift,
/// first-order phase unwind proportional to the fractional part of the
/// group delay, and frequency-axis regeneration from spectral
/// width/offset in ppm. Marks the spectrum as frequency-domain.
pub fn fourier_transform(data: &mut Data1d, meta: &mut Metadata) -> Result<(), FilterError> {
    const NAME: &str = "fft";

    if data.is_empty() {
        return Err(FilterError::EmptyBuffer { filter: NAME });
    }
    let im_len = data.im.as_ref().map(|im| im.len()).unwrap_or(0);
    if data.im.is_none() {
        return Err(FilterError::MissingImaginary { filter: NAME });
    }
    if im_len != data.re.len() || data.x.len() != data.re.len() {
        return Err(FilterError::MismatchedLengths {
            re: data.re.len(),
            im: im_len,
            x: data.x.len(),
        });
    }
    if meta.frequency_mhz <= 0.0 || meta.spectral_width_hz <= 0.0 {
        return Err(FilterError::Degenerate {
            filter: NAME,
            reason: "spectral width and frequency must be positive".to_string(),
        });
    }

    let im = match data.im.as_mut() {
        Some(im) => im,
        None => return Err(FilterError::MissingImaginary { filter: NAME }),
    };

    if meta.dc_correction {
        remove_dc_offset(&mut data.re);
        remove_dc_offset(im);
    }

    // Zero-fill to the next power of two, keeping the rotated
    // digital-filter tail pinned at the end.
    let len = data.re.len();
    let target = len.next_power_of_two();
    let tail = meta.digital_filter_points().min(len);
    if target > len {
        pad_before_tail(&mut data.re, target, tail);
        pad_before_tail(im, target, tail);
    }

    let n = data.re.len();
    let mut buffer: Vec<Complex<f64>> = data
        .re
        .iter()
        .zip(im.iter())
        .map(|(&re, &im)| Complex::new(re, im))
        .collect();

    FftPlanner::new().plan_fft_forward(n).process(&mut buffer);

    // Center the carrier frequency (fft-shift).
    buffer.rotate_left(n / 2);

    // Unwind the fractional group delay as a first-order phase ramp.
    if let Some(group_delay) = meta.digital_filter {
        let frac = group_delay.fract();
        if frac != 0.0 {
            for (k, value) in buffer.iter_mut().enumerate() {
                let phi = 2.0 * PI * frac * (k as f64 - n as f64 / 2.0) / n as f64;
                *value *= Complex::new(phi.cos(), phi.sin());
            }
        }
    }

    // The shifted output ascends in frequency; the displayed axis
    // descends, so the buffer is reversed to match.
    buffer.reverse();

    data.re = buffer.iter().map(|c| c.re).collect();
    *im = buffer.iter().map(|c| c.im).collect();

    // Frequency axis in ppm, descending as conventionally displayed.
    let sw = meta.spectral_width_hz;
    let offset = meta.offset_hz;
    let freq = meta.frequency_mhz;
    data.x = (0..n)
        .map(|k| {
            let hz = offset + sw / 2.0 - sw * k as f64 / (n - 1).max(1) as f64;
            hz / freq
        })
        .collect();

    meta.is_fid = false;
    Ok(())
}

/// Subtracts the mean of the trailing quarter, where the FID has
/// decayed into noise, from the whole channel.
fn remove_dc_offset(channel: &mut [f64]) {
    let n = channel.len();
    let start = n - n / 4;
    if start >= n {
        return;
    }
    let mean = channel[start..].iter().sum::<f64>() / (n - start) as f64;
    for value in channel.iter_mut() {
        *value -= mean;
    }
}

fn pad_before_tail(channel: &mut Vec<f64>, target: usize, tail: usize) {
    let len = channel.len();
    let tail_points: Vec<f64> = channel.split_off(len - tail);
    channel.resize(target - tail, 0.0);
    channel.extend(tail_points);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::Metadata;

    fn fid_meta(sw: f64, freq: f64) -> Metadata {
        let mut meta = Metadata::one_dim("1H", freq, sw);
        meta.is_complex = true;
        meta.is_fid = true;
        meta
    }

    fn synth_fid(n: usize, freq_hz: f64, sw: f64) -> Data1d {
        let dwell = 1.0 / sw;
        let mut re = Vec::with_capacity(n);
        let mut im = Vec::with_capacity(n);
        for i in 0..n {
            let t = i as f64 * dwell;
            let decay = (-t * 20.0).exp();
            re.push(decay * (2.0 * PI * freq_hz * t).cos());
            im.push(decay * (2.0 * PI * freq_hz * t).sin());
        }
        Data1d::new((0..n).map(|i| i as f64 * dwell).collect(), re, Some(im))
    }

    #[test]
    fn test_pads_to_power_of_two_and_flips_domain() {
        let sw = 1000.0;
        let mut data = synth_fid(1000, 100.0, sw);
        let mut meta = fid_meta(sw, 400.0);

        fourier_transform(&mut data, &mut meta).unwrap();

        assert_eq!(data.len(), 1024);
        assert!(!meta.is_fid);
        assert_eq!(data.x.len(), 1024);
        // Axis is descending in ppm.
        assert!(data.x[0] > data.x[1023]);
    }

    #[test]
    fn test_single_resonance_lands_at_its_frequency() {
        let sw = 1024.0;
        let freq_mhz = 400.0;
        let mut data = synth_fid(1024, 128.0, sw);
        let mut meta = fid_meta(sw, freq_mhz);

        fourier_transform(&mut data, &mut meta).unwrap();

        let max_idx = data
            .re
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap();
        let found_hz = data.x[max_idx] * freq_mhz;
        assert!((found_hz - 128.0).abs() < 2.0, "found {} Hz", found_hz);
    }

    #[test]
    fn test_rejects_real_only_buffer() {
        let mut data = Data1d::new(vec![0.0, 1.0], vec![1.0, 1.0], None);
        let mut meta = fid_meta(1000.0, 400.0);
        assert!(fourier_transform(&mut data, &mut meta).is_err());
    }
}
