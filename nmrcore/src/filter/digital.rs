use crate::data::spectrum::{Data1d, Metadata};
use crate::error::FilterError;

/// Removes the acquisition digital filter by circularly rotating the
/// leading group-delay points to the end of the buffer.
///
/// The floor of `group_delay` determines the whole-point rotation; the
/// fractional remainder is recorded in the metadata and unwound as a
/// first-order phase by the Fourier transform. The rotated tail stays
/// at the buffer end through zero filling and transform.
///
/// # Arguments
/// * `data` - complex time-domain buffer
/// * `meta` - spectrum metadata, updated with the group delay
/// * `group_delay` - number of pre-acquisition points, possibly fractional
pub fn remove_digital_filter(
    data: &mut Data1d,
    meta: &mut Metadata,
    group_delay: f64,
) -> Result<(), FilterError> {
    const NAME: &str = "digitalFilter";

    if data.is_empty() {
        return Err(FilterError::EmptyBuffer { filter: NAME });
    }
    if !group_delay.is_finite() || group_delay < 0.0 {
        return Err(FilterError::Degenerate {
            filter: NAME,
            reason: format!("group delay {} is not a non-negative number", group_delay),
        });
    }
    let im = match data.im.as_mut() {
        Some(im) => im,
        None => return Err(FilterError::MissingImaginary { filter: NAME }),
    };

    let points = (group_delay.floor() as usize) % data.re.len();
    data.re.rotate_left(points);
    im.rotate_left(points);
    meta.digital_filter = Some(group_delay);
    Ok(())
}
