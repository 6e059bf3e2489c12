use serde::{Deserialize, Serialize};

/// Classification of a detected feature. Only `Signal` features count
/// toward the quantification sum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    Signal,
    Reference,
    Solvent,
    Impurity,
}

impl SignalKind {
    /// Inclusion predicate of the relative-value manager.
    pub fn is_quantified(&self) -> bool {
        matches!(self, SignalKind::Signal)
    }
}

impl Default for SignalKind {
    fn default() -> Self {
        SignalKind::Signal
    }
}

/// A picked 1D peak.
///
/// `original_x` is the shift-independent reference coordinate: it is
/// re-derived as `x - accumulated_shift` whenever an axis-shift
/// filter's value changes, so it stays invariant under shift edits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub id: String,
    pub x: f64,
    pub original_x: f64,
    pub intensity: f64,
    pub width: f64,
}

/// One resolved component of a multiplet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Chemical shift of the multiplet center, in ppm.
    pub delta: f64,
    /// Shift-independent reference coordinate of `delta`.
    pub original_delta: f64,
    /// Multiplicity label: "s", "d", "t", "q", compounds like "dd",
    /// or "m" when the pattern resists first-order analysis.
    pub multiplicity: String,
    /// One coupling constant (Hz) per letter of `multiplicity`,
    /// descending; empty for "s" and "m".
    pub couplings_hz: Vec<f64>,
}

/// A detected 1D range: a chemical-shift interval with its integral
/// and the multiplet signals found inside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub id: String,
    pub from: f64,
    pub to: f64,
    /// Absolute integral over `[from, to]` of the derived real channel.
    pub absolute: f64,
    /// Proportional quantification value under the current SumOptions.
    pub relative: f64,
    pub kind: SignalKind,
    pub signals: Vec<Signal>,
}

impl Range {
    pub fn width(&self) -> f64 {
        (self.to - self.from).abs()
    }

    pub fn center(&self) -> f64 {
        (self.from + self.to) / 2.0
    }

    /// True when the two intervals overlap or touch.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.from.min(self.to) <= other.from.max(other.to)
            && other.from.min(other.to) <= self.from.max(self.to)
    }
}

/// One component of a 2D zone, in two-axis frequency space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal2d {
    pub x: f64,
    pub y: f64,
    pub original_x: f64,
    pub original_y: f64,
    pub intensity: f64,
}

/// A detected 2D zone: a rectangular boundary in both axes holding one
/// or more signal components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub x_from: f64,
    pub x_to: f64,
    pub y_from: f64,
    pub y_to: f64,
    /// Summed component intensity, the zone's absolute value.
    pub absolute: f64,
    pub relative: f64,
    pub kind: SignalKind,
    pub signals: Vec<Signal2d>,
}

impl Zone {
    pub fn x_center(&self) -> f64 {
        (self.x_from + self.x_to) / 2.0
    }

    pub fn y_center(&self) -> f64 {
        (self.y_from + self.y_to) / 2.0
    }
}

/// Aggregate quantification options of a feature collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SumOptions {
    /// Aggregate target value of all qualifying relative values.
    pub sum: f64,
    /// Constant-sum regime: relative values are rescaled so that they
    /// total `sum` after every detection or edit.
    pub is_constant: bool,
    /// Auto-sum regime: the scale is derived from one reference
    /// feature and `sum` follows the resulting total.
    pub auto: bool,
    /// Feature id of the auto-sum reference, if pinned.
    pub reference: Option<String>,
    /// Molecular-formula identifier carried through for consumers;
    /// not interpreted by this crate.
    pub formula: Option<String>,
}

impl Default for SumOptions {
    fn default() -> Self {
        SumOptions {
            sum: 100.0,
            is_constant: false,
            auto: false,
            reference: None,
            formula: None,
        }
    }
}
