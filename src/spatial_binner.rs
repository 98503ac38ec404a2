/*!
 * Streaming aggregation of the observations of one product into spatial bins.
 *
 * A product is fed to the binner as a sequence of slices ordered by latitude. A bin that did not
 * receive an observation during a slice will not receive one later, so it is completed and handed
 * to the [SpatialBinProcessor] right away. Only about one slice worth of bins is held in memory.
 */

use crate::{
    bin_manager::BinManager,
    bins::SpatialBin,
    error::BinningError,
    grid::BinningGrid,
    observation::Observation,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::error::Error;

/**
 * Receives batches of completed spatial bins.
 */
pub trait SpatialBinProcessor {
    /// Handle the bins completed while processing the slice `slice_index`.
    ///
    /// An error does not stop the binner, it is recorded and the next slice is processed.
    fn process_spatial_bins(
        &mut self,
        slice_index: usize,
        bins: Vec<SpatialBin>,
    ) -> Result<(), Box<dyn Error>>;
}

impl<P: SpatialBinProcessor + ?Sized> SpatialBinProcessor for &mut P {
    fn process_spatial_bins(
        &mut self,
        slice_index: usize,
        bins: Vec<SpatialBin>,
    ) -> Result<(), Box<dyn Error>> {
        (**self).process_spatial_bins(slice_index, bins)
    }
}

/**
 * Bins the observations of one product, slice by slice.
 */
pub struct SpatialBinner<'a, G, P> {
    bin_manager: &'a BinManager,
    grid: &'a G,
    processor: P,
    total_slices: Option<usize>,
    slice_index: usize,
    /// The bins still collecting observations.
    active_bins: FxHashMap<i64, SpatialBin>,
    /// Active bins not touched by the current slice.
    finalized_candidates: FxHashSet<i64>,
    errors: Vec<BinningError>,
    num_observations: usize,
    skipped_observations: usize,
    num_emitted_bins: usize,
}

impl<'a, G, P> SpatialBinner<'a, G, P>
where
    G: BinningGrid,
    P: SpatialBinProcessor,
{
    /**
     * Create a binner.
     *
     * If the number of slices is known up front all bins are emitted as soon as the last one is
     * processed. Otherwise the remaining bins are emitted by [SpatialBinner::complete].
     */
    pub fn new(
        bin_manager: &'a BinManager,
        grid: &'a G,
        processor: P,
        total_slices: Option<usize>,
    ) -> Self {
        SpatialBinner {
            bin_manager,
            grid,
            processor,
            total_slices,
            slice_index: 0,
            active_bins: FxHashMap::default(),
            finalized_candidates: FxHashSet::default(),
            errors: vec![],
            num_observations: 0,
            skipped_observations: 0,
            num_emitted_bins: 0,
        }
    }

    /// Aggregate the observations of the next slice and emit every bin that is finished.
    pub fn process_slice(&mut self, observations: &[Observation]) {
        self.finalized_candidates
            .extend(self.active_bins.keys().copied());

        for obs in observations {
            if let Err(err) = self.bin_manager.check_observation(obs) {
                if self.skipped_observations == 0 {
                    log::warn!("skipping observation at ({}, {}): {}", obs.lat, obs.lon, err);
                }
                self.skipped_observations += 1;
                continue;
            }

            let index = self.grid.bin_index(obs.lat, obs.lon);
            let bin_manager = self.bin_manager;
            let bin = self
                .active_bins
                .entry(index)
                .or_insert_with(|| bin_manager.create_spatial_bin(index));

            bin_manager.aggregate_spatial_bin(obs, bin);
            self.finalized_candidates.remove(&index);
            self.num_observations += 1;
        }

        log::debug!(
            "slice {}: {} observations, {} active bins, {} finished",
            self.slice_index,
            observations.len(),
            self.active_bins.len(),
            self.finalized_candidates.len()
        );

        if self.is_last_slice() {
            self.finalized_candidates.clear();
            self.emit_all(self.slice_index);
        } else if self.slice_index > 0 {
            let finished: Vec<SpatialBin> = self
                .finalized_candidates
                .drain()
                .filter_map(|index| self.active_bins.remove(&index))
                .collect();
            self.emit(self.slice_index, finished);
        }

        self.slice_index += 1;
    }

    fn is_last_slice(&self) -> bool {
        self.total_slices
            .map(|total| self.slice_index + 1 >= total)
            .unwrap_or(false)
    }

    /**
     * Emit every bin that is still active.
     *
     * Needed when the number of slices was not known up front or fewer slices than announced
     * were processed. Does nothing if all bins have been emitted already.
     */
    pub fn complete(&mut self) {
        self.finalized_candidates.clear();
        // Reported as part of the last slice that was processed.
        self.emit_all(self.slice_index.saturating_sub(1));

        log::info!(
            "binned {} observations into {} bins in {} slices, {} skipped, {} errors",
            self.num_observations,
            self.num_emitted_bins,
            self.slice_index,
            self.skipped_observations,
            self.errors.len()
        );
    }

    fn emit_all(&mut self, slice_index: usize) {
        let bins: Vec<SpatialBin> = self.active_bins.drain().map(|(_, bin)| bin).collect();
        self.emit(slice_index, bins);
    }

    fn emit(&mut self, slice_index: usize, mut bins: Vec<SpatialBin>) {
        if bins.is_empty() {
            return;
        }

        bins.sort_unstable_by_key(|bin| bin.index);
        for bin in &mut bins {
            self.bin_manager.complete_spatial_bin(bin);
        }

        let num_bins = bins.len();
        log::debug!("slice {}: emitting {} bins", slice_index, num_bins);

        match self.processor.process_spatial_bins(slice_index, bins) {
            Ok(()) => self.num_emitted_bins += num_bins,
            Err(err) => {
                log::error!("failed to process bins of slice {}: {}", slice_index, err);
                self.errors.push(BinningError::SliceProcessing {
                    slice_index,
                    message: err.to_string(),
                });
            }
        }
    }

    /// The number of slices processed so far.
    pub fn slice_count(&self) -> usize {
        self.slice_index
    }

    /// The number of bins that are still collecting observations.
    pub fn active_bin_count(&self) -> usize {
        self.active_bins.len()
    }

    /// The number of observations aggregated.
    pub fn num_observations(&self) -> usize {
        self.num_observations
    }

    /// The number of observations rejected because a value was outside an aggregator's domain.
    pub fn skipped_observations(&self) -> usize {
        self.skipped_observations
    }

    /// The number of bins successfully handed to the processor.
    pub fn num_emitted_bins(&self) -> usize {
        self.num_emitted_bins
    }

    /// The failures recorded so far.
    pub fn errors(&self) -> &[BinningError] {
        &self.errors
    }

    /// Take the recorded failures, leaving none behind.
    pub fn take_errors(&mut self) -> Vec<BinningError> {
        std::mem::take(&mut self.errors)
    }

    /// Give up the binner and get back the processor.
    pub fn into_processor(self) -> P {
        self.processor
    }
}
