use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::data::spectrum::Spectrum;
use crate::error::ChainError;
use crate::filter::catalog::{Filter, MergeOutcome};

/// One entry of a spectrum's filter chain.
///
/// Entries are created on first request for a catalog key (or appended
/// for non-mergeable repeats), mutated only by the chain engine, and
/// destroyed on explicit deletion. A failed apply is recorded in
/// `error` without aborting the rest of the chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub id: String,
    pub filter: Filter,
    pub enabled: bool,
    pub deletable: bool,
    pub error: Option<String>,
}

/// How a request turn touched one chain entry.
struct ChangedEntry {
    index: usize,
    /// True when the request value is a delta that may run
    /// incrementally on the derived buffer (append or accumulate).
    incremental_ok: bool,
    request: Filter,
}

impl Spectrum {
    /// Applies a batch of filter requests to this spectrum.
    ///
    /// Each request is merged into an existing entry with the same
    /// catalog key according to that filter's merge policy, or
    /// appended as a new entry. When the turn changed exactly one
    /// entry, that entry is last in the chain and the change was an
    /// append or accumulation, the request runs incrementally on the
    /// derived buffer; every other outcome triggers a full replay from
    /// the raw snapshot. Apply failures are recorded per entry and
    /// never abort the chain.
    pub fn apply_filters(&mut self, requests: Vec<Filter>) {
        let shift_before = self.accumulated_shift();
        let mut changed: Vec<ChangedEntry> = Vec::new();

        for request in requests {
            let existing = self
                .filter_chain()
                .iter()
                .position(|entry| entry.filter.same_kind(&request));
            match existing {
                Some(index) => {
                    let outcome = self.filter_chain()[index].filter.merge(&request);
                    match outcome {
                        MergeOutcome::Collapse(merged) => {
                            debug!("collapsing repeated '{}' request", request.name());
                            self.chain_mut()[index].filter = merged;
                            changed.push(ChangedEntry { index, incremental_ok: false, request });
                        }
                        MergeOutcome::Accumulate(merged) => {
                            debug!("accumulating repeated '{}' request", request.name());
                            self.chain_mut()[index].filter = merged;
                            changed.push(ChangedEntry { index, incremental_ok: true, request });
                        }
                        MergeOutcome::Distinct => {
                            let index = self.append_entry(request.clone());
                            changed.push(ChangedEntry { index, incremental_ok: true, request });
                        }
                    }
                }
                None => {
                    let index = self.append_entry(request.clone());
                    changed.push(ChangedEntry { index, incremental_ok: true, request });
                }
            }
        }

        let last = self.filter_chain().len().saturating_sub(1);
        let incremental = match changed.as_slice() {
            [only] => {
                only.incremental_ok
                    && only.index == last
                    && self.filter_chain()[last].enabled
                    && self.filter_chain()[last].error.is_none()
            }
            _ => false,
        };

        if incremental {
            let request = changed.pop().map(|c| c.request);
            if let Some(request) = request {
                self.apply_on_derived(last, request);
            }
        } else {
            self.full_replay();
        }
        self.sync_features_to_shift(shift_before);
    }

    /// Enables or disables one chain entry and fully replays.
    pub fn enable_filter(&mut self, id: &str, enabled: bool) -> Result<(), ChainError> {
        let shift_before = self.accumulated_shift();
        let index = self.entry_index(id)?;
        self.chain_mut()[index].enabled = enabled;
        self.full_replay();
        self.sync_features_to_shift(shift_before);
        Ok(())
    }

    /// Removes one chain entry (terminal state) and fully replays.
    pub fn delete_filter(&mut self, id: &str) -> Result<(), ChainError> {
        let shift_before = self.accumulated_shift();
        let index = self.entry_index(id)?;
        if !self.filter_chain()[index].deletable {
            return Err(ChainError::NotDeletable(id.to_string()));
        }
        self.chain_mut().remove(index);
        self.full_replay();
        self.sync_features_to_shift(shift_before);
        Ok(())
    }

    /// Marks an entry as protected from (or open to) deletion.
    pub fn set_filter_deletable(&mut self, id: &str, deletable: bool) -> Result<(), ChainError> {
        let index = self.entry_index(id)?;
        self.chain_mut()[index].deletable = deletable;
        Ok(())
    }

    /// Replays the enabled chain prefix up to and including `upto`
    /// into the derived buffer ("preview as of this step"). `None`
    /// replays the whole chain.
    pub fn replay_upto(&mut self, upto: Option<&str>) -> Result<(), ChainError> {
        let stop = match upto {
            Some(id) => Some(self.entry_index(id)?),
            None => None,
        };
        self.reset_derived();
        for index in 0..self.filter_chain().len() {
            self.replay_entry(index);
            if stop == Some(index) {
                break;
            }
        }
        Ok(())
    }

    /// Accumulated enabled axis shift `(x, y)`, in ppm. Entries with a
    /// recorded error do not contribute.
    pub fn accumulated_shift(&self) -> (f64, f64) {
        let mut shift = (0.0, 0.0);
        for entry in self.filter_chain() {
            if !entry.enabled || entry.error.is_some() {
                continue;
            }
            match entry.filter {
                Filter::ShiftX { shift_ppm } => shift.0 += shift_ppm,
                Filter::Shift2d { x_ppm, y_ppm } => {
                    shift.0 += x_ppm;
                    shift.1 += y_ppm;
                }
                _ => {}
            }
        }
        shift
    }

    fn append_entry(&mut self, filter: Filter) -> usize {
        let id = self.mint_entry_id();
        debug!("creating chain entry '{}' for '{}'", id, filter.name());
        self.chain_mut().push(FilterEntry {
            id,
            filter,
            enabled: true,
            deletable: true,
            error: None,
        });
        self.filter_chain().len() - 1
    }

    fn entry_index(&self, id: &str) -> Result<usize, ChainError> {
        self.filter_chain()
            .iter()
            .position(|entry| entry.id == id)
            .ok_or_else(|| ChainError::UnknownEntry(id.to_string()))
    }

    /// Full replay: reset to the raw snapshot, then run every enabled
    /// entry in order, recording failures per entry.
    pub(crate) fn full_replay(&mut self) {
        self.reset_derived();
        for index in 0..self.filter_chain().len() {
            self.replay_entry(index);
        }
    }

    fn replay_entry(&mut self, index: usize) {
        let (enabled, filter) = {
            let entry = &self.filter_chain()[index];
            (entry.enabled, entry.filter.clone())
        };
        if !enabled {
            return;
        }
        self.chain_mut()[index].error = None;
        self.apply_on_derived(index, filter);
    }

    /// Runs one filter value over the current derived buffer, writing
    /// a failure into the owning entry. Kernels validate before they
    /// mutate, so a failed apply leaves the buffer untouched.
    fn apply_on_derived(&mut self, index: usize, filter: Filter) {
        let result = {
            let (data, meta) = self.derived_and_meta_mut();
            filter.apply(data, meta)
        };
        if let Err(err) = result {
            warn!("filter '{}' failed: {}", filter.name(), err);
            self.chain_mut()[index].error = Some(err.to_string());
        }
    }

    /// Re-aligns feature positions with the accumulated axis shift and
    /// re-derives their origin coordinates, keeping origins invariant
    /// under shift-filter edits.
    fn sync_features_to_shift(&mut self, before: (f64, f64)) {
        let after = self.accumulated_shift();
        let (dx, dy) = (after.0 - before.0, after.1 - before.1);
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        for peak in &mut self.peaks {
            peak.x += dx;
            peak.original_x = peak.x - after.0;
        }
        for range in &mut self.ranges {
            range.from += dx;
            range.to += dx;
            for signal in &mut range.signals {
                signal.delta += dx;
                signal.original_delta = signal.delta - after.0;
            }
        }
        for zone in &mut self.zones {
            zone.x_from += dx;
            zone.x_to += dx;
            zone.y_from += dy;
            zone.y_to += dy;
            for signal in &mut zone.signals {
                signal.x += dx;
                signal.y += dy;
                signal.original_x = signal.x - after.0;
                signal.original_y = signal.y - after.1;
            }
        }
    }
}
