use crate::data::spectrum::Data1d;
use crate::error::FilterError;

/// Applies zero- and first-order phase correction to a complex buffer.
///
/// Point `i` of `n` is rotated by `ph0 + ph1 * i / (n - 1)` degrees.
/// Repeated manual edits accumulate additively in the chain entry.
pub fn phase_correction(data: &mut Data1d, ph0_deg: f64, ph1_deg: f64) -> Result<(), FilterError> {
    const NAME: &str = "phaseCorrection";

    if data.is_empty() {
        return Err(FilterError::EmptyBuffer { filter: NAME });
    }
    let im = match data.im.as_mut() {
        Some(im) => im,
        None => return Err(FilterError::MissingImaginary { filter: NAME }),
    };

    let n = data.re.len();
    let denom = (n.max(2) - 1) as f64;
    for i in 0..n {
        let phi = (ph0_deg + ph1_deg * i as f64 / denom).to_radians();
        let (sin, cos) = phi.sin_cos();
        let re = data.re[i];
        let imv = im[i];
        data.re[i] = re * cos - imv * sin;
        im[i] = re * sin + imv * cos;
    }
    Ok(())
}

/// Automatic phase correction: a coarse-to-fine grid search minimizing
/// the negative-lobe penalty of the real channel. Returns the
/// `(ph0, ph1)` pair in degrees to fold into the chain as a regular
/// phase-correction entry.
pub fn auto_phase(data: &Data1d) -> (f64, f64) {
    let im = match data.im.as_ref() {
        Some(im) => im,
        None => return (0.0, 0.0),
    };
    if data.is_empty() {
        return (0.0, 0.0);
    }

    let n = data.re.len();
    let denom = (n.max(2) - 1) as f64;
    let penalty = |ph0: f64, ph1: f64| -> f64 {
        let mut cost = 0.0;
        for i in 0..n {
            let phi = (ph0 + ph1 * i as f64 / denom).to_radians();
            let re = data.re[i] * phi.cos() - im[i] * phi.sin();
            if re < 0.0 {
                cost += re * re;
            }
        }
        cost
    };

    let mut best = (0.0, 0.0);
    let mut best_cost = f64::INFINITY;
    let mut ph0 = -180.0;
    while ph0 < 180.0 {
        let mut ph1 = -90.0;
        while ph1 <= 90.0 {
            let cost = penalty(ph0, ph1);
            if cost < best_cost {
                best_cost = cost;
                best = (ph0, ph1);
            }
            ph1 += 15.0;
        }
        ph0 += 5.0;
    }

    // Refine the zero-order term around the coarse optimum.
    let mut ph0 = best.0 - 5.0;
    while ph0 <= best.0 + 5.0 {
        let cost = penalty(ph0, best.1);
        if cost < best_cost {
            best_cost = cost;
            best = (ph0, best.1);
        }
        ph0 += 0.25;
    }
    best
}
