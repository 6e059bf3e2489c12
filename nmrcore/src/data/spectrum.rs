use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::data::features::{Peak, Range, SumOptions, Zone};
use crate::filter::chain::FilterEntry;

/// Acquisition and axis metadata attached to a spectrum.
///
/// Filters both consult and rewrite metadata: the Fourier transform
/// clears `is_fid`, absolute value clears `is_complex`, and the
/// digital-filter removal records its group delay here so that
/// downstream filters can keep the rotated tail at the buffer end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Observed nucleus per axis, e.g. `["1H"]` or `["1H", "13C"]`.
    pub nucleus: Vec<String>,
    /// Spectrometer frequency in MHz, used for Hz <-> ppm conversion.
    pub frequency_mhz: f64,
    /// Spectral width in Hz.
    pub spectral_width_hz: f64,
    /// Reference offset of the axis center in Hz.
    pub offset_hz: f64,
    /// Whether an imaginary channel is present.
    pub is_complex: bool,
    /// Whether the buffer is still a time-domain FID.
    pub is_fid: bool,
    /// Acquisition-mode flag requesting DC offset removal before FT.
    pub dc_correction: bool,
    /// Group delay recorded by the digital-filter removal, if applied.
    pub digital_filter: Option<f64>,
}

impl Metadata {
    pub fn one_dim(nucleus: &str, frequency_mhz: f64, spectral_width_hz: f64) -> Self {
        Metadata {
            nucleus: vec![nucleus.to_string()],
            frequency_mhz,
            spectral_width_hz,
            offset_hz: 0.0,
            is_complex: false,
            is_fid: false,
            dc_correction: false,
            digital_filter: None,
        }
    }

    pub fn two_dim(nucleus_x: &str, nucleus_y: &str, frequency_mhz: f64) -> Self {
        Metadata {
            nucleus: vec![nucleus_x.to_string(), nucleus_y.to_string()],
            frequency_mhz,
            spectral_width_hz: 0.0,
            offset_hz: 0.0,
            is_complex: false,
            is_fid: false,
            dc_correction: false,
            digital_filter: None,
        }
    }

    /// True when both axes of a 2D spectrum observe the same nucleus.
    pub fn is_homonuclear(&self) -> bool {
        self.nucleus.len() == 2 && self.nucleus[0] == self.nucleus[1]
    }

    /// Whole points rotated to the buffer end by the digital filter.
    pub fn digital_filter_points(&self) -> usize {
        self.digital_filter.map(|gd| gd.floor() as usize).unwrap_or(0)
    }
}

/// One-dimensional signal: axis values plus real and optional
/// imaginary channels of equal length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Data1d {
    pub x: Vec<f64>,
    pub re: Vec<f64>,
    pub im: Option<Vec<f64>>,
}

impl Data1d {
    pub fn new(x: Vec<f64>, re: Vec<f64>, im: Option<Vec<f64>>) -> Self {
        Data1d { x, re, im }
    }

    pub fn len(&self) -> usize {
        self.re.len()
    }

    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }

    /// Total axis extent, `|x_last - x_first|`.
    pub fn x_span(&self) -> f64 {
        match (self.x.first(), self.x.last()) {
            (Some(first), Some(last)) => (last - first).abs(),
            _ => 0.0,
        }
    }

    /// Index of the axis value closest to `value`.
    pub fn closest_index(&self, value: f64) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, &x) in self.x.iter().enumerate() {
            let dist = (x - value).abs();
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best
    }
}

/// Two-dimensional grid of intensities with its axis bounds.
///
/// Rows index the y axis, columns the x axis; `z[row][col]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Data2d {
    pub z: Vec<Vec<f64>>,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Data2d {
    pub fn new(z: Vec<Vec<f64>>, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Data2d { z, min_x, max_x, min_y, max_y }
    }

    pub fn rows(&self) -> usize {
        self.z.len()
    }

    pub fn cols(&self) -> usize {
        self.z.first().map(|row| row.len()).unwrap_or(0)
    }

    /// Axis value of column `col`.
    pub fn x_at(&self, col: usize) -> f64 {
        let n = self.cols();
        if n < 2 {
            return self.min_x;
        }
        self.min_x + (self.max_x - self.min_x) * col as f64 / (n - 1) as f64
    }

    /// Axis value of row `row`.
    pub fn y_at(&self, row: usize) -> f64 {
        let n = self.rows();
        if n < 2 {
            return self.min_y;
        }
        self.min_y + (self.max_y - self.min_y) * row as f64 / (n - 1) as f64
    }

    pub fn x_span(&self) -> f64 {
        (self.max_x - self.min_x).abs()
    }

    pub fn y_span(&self) -> f64 {
        (self.max_y - self.min_y).abs()
    }
}

/// Signal buffer of a spectrum, one- or two-dimensional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SpectrumData {
    OneDim(Data1d),
    TwoDim(Data2d),
}

impl SpectrumData {
    pub fn dimension_name(&self) -> &'static str {
        match self {
            SpectrumData::OneDim(_) => "1D",
            SpectrumData::TwoDim(_) => "2D",
        }
    }

    pub fn as_one_dim(&self) -> Option<&Data1d> {
        match self {
            SpectrumData::OneDim(data) => Some(data),
            SpectrumData::TwoDim(_) => None,
        }
    }

    pub fn as_two_dim(&self) -> Option<&Data2d> {
        match self {
            SpectrumData::TwoDim(data) => Some(data),
            SpectrumData::OneDim(_) => None,
        }
    }
}

/// A spectrum: immutable raw buffer, replayable filter chain, derived
/// buffer and the feature collections extracted from it.
///
/// The raw snapshot and the chain are private; the chain engine in
/// `filter::chain` is the only mutator. External callers get immutable
/// views (or clones) of the buffers, never aliases.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Spectrum {
    pub id: String,
    pub meta: Metadata,
    raw: SpectrumData,
    raw_meta: Metadata,
    derived: SpectrumData,
    chain: Vec<FilterEntry>,
    pub peaks: Vec<Peak>,
    pub ranges: Vec<Range>,
    pub zones: Vec<Zone>,
    pub quantification: SumOptions,
    next_id: u64,
}

impl Spectrum {
    /// Creates a 1D spectrum from a normalized `{x, re, im}` series as
    /// supplied by an external parser. The series is captured as the
    /// immutable raw buffer; the derived buffer starts as a copy.
    pub fn one_dim(id: &str, data: Data1d, meta: Metadata) -> Self {
        let raw = SpectrumData::OneDim(data);
        Spectrum {
            id: id.to_string(),
            meta: meta.clone(),
            raw: raw.clone(),
            raw_meta: meta,
            derived: raw.clone(),
            chain: Vec::new(),
            peaks: Vec::new(),
            ranges: Vec::new(),
            zones: Vec::new(),
            quantification: SumOptions::default(),
            next_id: 0,
        }
    }

    /// Creates a 2D spectrum from a normalized grid plus axis bounds.
    pub fn two_dim(id: &str, data: Data2d, meta: Metadata) -> Self {
        let raw = SpectrumData::TwoDim(data);
        Spectrum {
            id: id.to_string(),
            meta: meta.clone(),
            raw: raw.clone(),
            raw_meta: meta,
            derived: raw.clone(),
            chain: Vec::new(),
            peaks: Vec::new(),
            ranges: Vec::new(),
            zones: Vec::new(),
            quantification: SumOptions::default(),
            next_id: 0,
        }
    }

    /// Immutable view of the raw buffer (never mutates after capture).
    pub fn raw(&self) -> &SpectrumData {
        &self.raw
    }

    /// Metadata as it was at ingestion time.
    pub fn raw_meta(&self) -> &Metadata {
        &self.raw_meta
    }

    /// Immutable view of the derived buffer.
    pub fn derived(&self) -> &SpectrumData {
        &self.derived
    }

    /// Derived 1D data, if this is a 1D spectrum.
    pub fn derived_1d(&self) -> Option<&Data1d> {
        self.derived.as_one_dim()
    }

    /// Derived 2D data, if this is a 2D spectrum.
    pub fn derived_2d(&self) -> Option<&Data2d> {
        self.derived.as_two_dim()
    }

    /// Immutable view of the filter chain.
    pub fn filter_chain(&self) -> &[FilterEntry] {
        &self.chain
    }

    pub(crate) fn chain_mut(&mut self) -> &mut Vec<FilterEntry> {
        &mut self.chain
    }

    pub(crate) fn derived_mut(&mut self) -> &mut SpectrumData {
        &mut self.derived
    }

    /// Split borrow for filter application: the derived buffer and the
    /// live metadata, mutably, in one go.
    pub(crate) fn derived_and_meta_mut(&mut self) -> (&mut SpectrumData, &mut Metadata) {
        (&mut self.derived, &mut self.meta)
    }

    /// Resets the derived buffer and live metadata back to the raw
    /// snapshot, the starting point of every full replay.
    pub(crate) fn reset_derived(&mut self) {
        self.derived = self.raw.clone();
        self.meta = self.raw_meta.clone();
    }

    /// Mints a new unique filter-entry id for this spectrum.
    pub(crate) fn mint_entry_id(&mut self) -> String {
        self.next_id += 1;
        format!("{}-f{}", self.id, self.next_id)
    }

    /// Mints a new unique feature id for this spectrum.
    pub fn mint_feature_id(&mut self) -> String {
        self.next_id += 1;
        format!("{}-k{}", self.id, self.next_id)
    }
}

impl Display for Spectrum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let size = match &self.derived {
            SpectrumData::OneDim(data) => data.len(),
            SpectrumData::TwoDim(data) => data.rows() * data.cols(),
        };
        write!(
            f,
            "Spectrum(id: {}, {} {}, data points: {}, filters: {})",
            self.id,
            self.meta.nucleus.join("-"),
            self.derived.dimension_name(),
            size,
            self.chain.len()
        )
    }
}
