use crate::data::spectrum::{Data1d, Metadata};
use crate::error::FilterError;

/// Pads (or truncates) a time-domain buffer to the next power of two
/// of the requested size.
///
/// When the digital filter has been removed upstream, its rotated tail
/// sits at the buffer end and must stay there: zeros are inserted (or
/// points dropped) just before the tail, never after it.
pub fn zero_fill(data: &mut Data1d, meta: &Metadata, size: usize) -> Result<(), FilterError> {
    const NAME: &str = "zeroFilling";

    if data.is_empty() {
        return Err(FilterError::EmptyBuffer { filter: NAME });
    }
    if size == 0 {
        return Err(FilterError::Degenerate {
            filter: NAME,
            reason: "target size must be positive".to_string(),
        });
    }

    let target = size.next_power_of_two();
    let len = data.len();
    let tail = meta.digital_filter_points().min(len);

    if target == len {
        return Ok(());
    }
    if target < tail {
        return Err(FilterError::Degenerate {
            filter: NAME,
            reason: format!(
                "target {} is smaller than the {} digitally filtered tail points",
                target, tail
            ),
        });
    }

    resize_before_tail(&mut data.re, target, tail);
    if let Some(im) = data.im.as_mut() {
        resize_before_tail(im, target, tail);
    }

    // The time axis keeps its dwell spacing and simply extends.
    let x0 = data.x.first().copied().unwrap_or(0.0);
    let dwell = if data.x.len() > 1 {
        data.x[1] - data.x[0]
    } else {
        1.0 / meta.spectral_width_hz.max(f64::MIN_POSITIVE)
    };
    data.x = (0..target).map(|i| x0 + i as f64 * dwell).collect();
    Ok(())
}

/// Grows or shrinks `channel` to `target` points, keeping the last
/// `tail` points pinned at the end.
fn resize_before_tail(channel: &mut Vec<f64>, target: usize, tail: usize) {
    let len = channel.len();
    let tail_points: Vec<f64> = channel.split_off(len - tail);
    channel.resize(target - tail, 0.0);
    channel.extend(tail_points);
}
