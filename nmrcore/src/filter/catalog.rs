use std::mem::discriminant;

use serde::{Deserialize, Serialize};

use crate::data::spectrum::{Metadata, SpectrumData};
use crate::error::FilterError;
use crate::filter::baseline::{baseline_correction, BaselineMethod};
use crate::filter::{apodization, digital, exclusion, fourier, phase, shift, zero_fill};

/// The closed catalog of chain transformations.
///
/// Every member carries its options payload; `is_applicable`, `merge`
/// and `apply` are exhaustive matches so a new catalog entry cannot be
/// added without supplying all three behaviors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    DigitalFilterRemoval { group_delay: f64 },
    Apodization { line_broadening_hz: f64, gauss_broadening_hz: f64 },
    FourierTransform,
    PhaseCorrection { ph0_deg: f64, ph1_deg: f64 },
    BaselineCorrection { method: BaselineMethod, exclusions: Vec<(f64, f64)> },
    ZeroFilling { size: usize },
    ExclusionZones { zones: Vec<(f64, f64)> },
    AbsoluteValue,
    ShiftX { shift_ppm: f64 },
    Shift2d { x_ppm: f64, y_ppm: f64 },
}

/// Resolution of a repeated request against an existing chain entry
/// with the same catalog key.
#[derive(Clone, Debug, PartialEq)]
pub enum MergeOutcome {
    /// The requests fold into one entry holding the merged value; the
    /// merged value is NOT a delta over the applied buffer, so a full
    /// replay is required.
    Collapse(Filter),
    /// The requests fold into one entry and the incoming request is a
    /// delta that may be applied incrementally on the derived buffer.
    Accumulate(Filter),
    /// The incoming request becomes an independent chain entry.
    Distinct,
}

impl Filter {
    /// Stable catalog key of this filter.
    pub fn name(&self) -> &'static str {
        match self {
            Filter::DigitalFilterRemoval { .. } => "digitalFilter",
            Filter::Apodization { .. } => "apodization",
            Filter::FourierTransform => "fft",
            Filter::PhaseCorrection { .. } => "phaseCorrection",
            Filter::BaselineCorrection { .. } => "baselineCorrection",
            Filter::ZeroFilling { .. } => "zeroFilling",
            Filter::ExclusionZones { .. } => "exclusionZones",
            Filter::AbsoluteValue => "absolute",
            Filter::ShiftX { .. } => "shiftX",
            Filter::Shift2d { .. } => "shift2D",
        }
    }

    /// True when `other` shares this filter's catalog key.
    pub fn same_kind(&self, other: &Filter) -> bool {
        discriminant(self) == discriminant(other)
    }

    /// Applicability predicate over spectrum metadata and dimension.
    pub fn is_applicable(&self, meta: &Metadata, data: &SpectrumData) -> bool {
        let one_dim = matches!(data, SpectrumData::OneDim(_));
        match self {
            Filter::DigitalFilterRemoval { .. } => one_dim && meta.is_complex && meta.is_fid,
            Filter::Apodization { .. } => one_dim && meta.is_fid,
            Filter::FourierTransform => one_dim && meta.is_complex && meta.is_fid,
            Filter::PhaseCorrection { .. } => one_dim && meta.is_complex && !meta.is_fid,
            Filter::BaselineCorrection { .. } => one_dim && !meta.is_fid,
            Filter::ZeroFilling { .. } => one_dim && meta.is_fid,
            Filter::ExclusionZones { .. } => one_dim && !meta.is_fid,
            Filter::AbsoluteValue => one_dim && meta.is_complex && !meta.is_fid,
            Filter::ShiftX { .. } => one_dim,
            Filter::Shift2d { .. } => !one_dim,
        }
    }

    /// Per-filter merge policy for a repeated request with the same
    /// catalog key. The observed product table is preserved: shifts,
    /// phase and exclusion zones accumulate; everything else collapses
    /// to the latest value.
    pub fn merge(&self, incoming: &Filter) -> MergeOutcome {
        if !self.same_kind(incoming) {
            return MergeOutcome::Distinct;
        }
        match (self, incoming) {
            (
                Filter::PhaseCorrection { ph0_deg: a0, ph1_deg: a1 },
                Filter::PhaseCorrection { ph0_deg: b0, ph1_deg: b1 },
            ) => MergeOutcome::Accumulate(Filter::PhaseCorrection {
                ph0_deg: a0 + b0,
                ph1_deg: a1 + b1,
            }),
            (Filter::ShiftX { shift_ppm: a }, Filter::ShiftX { shift_ppm: b }) => {
                MergeOutcome::Accumulate(Filter::ShiftX { shift_ppm: a + b })
            }
            (
                Filter::Shift2d { x_ppm: ax, y_ppm: ay },
                Filter::Shift2d { x_ppm: bx, y_ppm: by },
            ) => MergeOutcome::Accumulate(Filter::Shift2d { x_ppm: ax + bx, y_ppm: ay + by }),
            (Filter::ExclusionZones { zones: a }, Filter::ExclusionZones { zones: b }) => {
                let mut union = a.clone();
                union.extend_from_slice(b);
                MergeOutcome::Accumulate(Filter::ExclusionZones {
                    zones: exclusion::normalize_zones(&union),
                })
            }
            _ => MergeOutcome::Collapse(incoming.clone()),
        }
    }

    /// Applies this filter to the buffer and metadata.
    ///
    /// A failed applicability predicate surfaces here as
    /// `FilterError::NotApplicable`; the chain engine records it on
    /// the owning entry and keeps replaying.
    pub fn apply(&self, data: &mut SpectrumData, meta: &mut Metadata) -> Result<(), FilterError> {
        if !self.is_applicable(meta, data) {
            return Err(FilterError::NotApplicable {
                filter: self.name(),
                reason: format!(
                    "{} spectrum, complex: {}, time domain: {}",
                    data.dimension_name(),
                    meta.is_complex,
                    meta.is_fid
                ),
            });
        }
        match (self, data) {
            (Filter::DigitalFilterRemoval { group_delay }, SpectrumData::OneDim(data)) => {
                digital::remove_digital_filter(data, meta, *group_delay)
            }
            (
                Filter::Apodization { line_broadening_hz, gauss_broadening_hz },
                SpectrumData::OneDim(data),
            ) => apodization::apodize(data, meta, *line_broadening_hz, *gauss_broadening_hz),
            (Filter::FourierTransform, SpectrumData::OneDim(data)) => {
                fourier::fourier_transform(data, meta)
            }
            (Filter::PhaseCorrection { ph0_deg, ph1_deg }, SpectrumData::OneDim(data)) => {
                phase::phase_correction(data, *ph0_deg, *ph1_deg)
            }
            (Filter::BaselineCorrection { method, exclusions }, SpectrumData::OneDim(data)) => {
                baseline_correction(data, method, exclusions)
            }
            (Filter::ZeroFilling { size }, SpectrumData::OneDim(data)) => {
                zero_fill::zero_fill(data, meta, *size)
            }
            (Filter::ExclusionZones { zones }, SpectrumData::OneDim(data)) => {
                exclusion::apply_exclusion_zones(data, zones)
            }
            (Filter::AbsoluteValue, SpectrumData::OneDim(data)) => {
                shift::absolute_value(data, meta)
            }
            (Filter::ShiftX { shift_ppm }, SpectrumData::OneDim(data)) => {
                shift::shift_x(data, *shift_ppm)
            }
            (Filter::Shift2d { x_ppm, y_ppm }, SpectrumData::TwoDim(data)) => {
                shift::shift_2d(data, *x_ppm, *y_ppm)
            }
            (filter, data) => Err(FilterError::NotApplicable {
                filter: filter.name(),
                reason: format!("not defined for {} data", data.dimension_name()),
            }),
        }
    }
}
