use crate::data::spectrum::{Data1d, Data2d, Metadata};
use crate::error::FilterError;

/// Translates a 1D frequency axis by `shift_ppm`. Repeated requests
/// accumulate by summation in the chain entry.
pub fn shift_x(data: &mut Data1d, shift_ppm: f64) -> Result<(), FilterError> {
    if !shift_ppm.is_finite() {
        return Err(FilterError::Degenerate {
            filter: "shiftX",
            reason: "shift is not finite".to_string(),
        });
    }
    for x in data.x.iter_mut() {
        *x += shift_ppm;
    }
    Ok(())
}

/// Translates both axes of a 2D grid.
pub fn shift_2d(data: &mut Data2d, x_ppm: f64, y_ppm: f64) -> Result<(), FilterError> {
    if !x_ppm.is_finite() || !y_ppm.is_finite() {
        return Err(FilterError::Degenerate {
            filter: "shift2D",
            reason: "shift is not finite".to_string(),
        });
    }
    data.min_x += x_ppm;
    data.max_x += x_ppm;
    data.min_y += y_ppm;
    data.max_y += y_ppm;
    Ok(())
}

/// Replaces the real channel with the point-wise magnitude and drops
/// the imaginary channel. Marks the spectrum as real-only.
pub fn absolute_value(data: &mut Data1d, meta: &mut Metadata) -> Result<(), FilterError> {
    if data.is_empty() {
        return Err(FilterError::EmptyBuffer { filter: "absolute" });
    }
    match data.im.take() {
        Some(im) => {
            for (re, im) in data.re.iter_mut().zip(im.iter()) {
                *re = re.hypot(*im);
            }
        }
        None => {
            for re in data.re.iter_mut() {
                *re = re.abs();
            }
        }
    }
    meta.is_complex = false;
    Ok(())
}
