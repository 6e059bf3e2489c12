use thiserror::Error;

/// Errors raised by a single filter application.
///
/// `NotApplicable` is an expected outcome (a filter requested against
/// metadata that fails its applicability predicate); the chain engine
/// records it on the owning entry and keeps replaying. The remaining
/// variants are real faults of the input buffer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("filter '{filter}' is not applicable: {reason}")]
    NotApplicable { filter: &'static str, reason: String },
    #[error("mismatched channel lengths: re = {re}, im = {im}, x = {x}")]
    MismatchedLengths { re: usize, im: usize, x: usize },
    #[error("filter '{filter}' requires an imaginary channel")]
    MissingImaginary { filter: &'static str },
    #[error("filter '{filter}' cannot run on an empty buffer")]
    EmptyBuffer { filter: &'static str },
    #[error("degenerate input for filter '{filter}': {reason}")]
    Degenerate { filter: &'static str, reason: String },
}

/// Errors raised by chain bookkeeping operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("no filter entry with id '{0}'")]
    UnknownEntry(String),
    #[error("filter entry '{0}' is not deletable")]
    NotDeletable(String),
}

/// Errors raised by the feature detectors. These propagate to the
/// caller of the detection call and never leave the spectrum in a
/// partially mutated state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("detector '{detector}' expects {expected} data")]
    WrongDimension {
        detector: &'static str,
        expected: &'static str,
    },
    #[error("malformed interval [{from}, {to}]")]
    MalformedInterval { from: f64, to: f64 },
    #[error("multiplet analysis needs at least one peak")]
    EmptyMultiplet,
    #[error("empty derived buffer, apply filters before detection")]
    EmptyBuffer,
}
