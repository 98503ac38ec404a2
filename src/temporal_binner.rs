/*!
 * Merging the spatial bins of a cell into a temporal bin.
 */

use crate::{
    bin_manager::BinManager,
    bins::{SpatialBin, TemporalBin},
    store::SpatialBinStore,
};

/**
 * Folds every spatial bin of one cell into a single temporal bin.
 *
 * The spatial bins may arrive in any order, folding them is commutative up to rounding.
 */
#[derive(Debug, Clone, Copy)]
pub struct TemporalBinner<'a> {
    bin_manager: &'a BinManager,
}

impl<'a> TemporalBinner<'a> {
    pub fn new(bin_manager: &'a BinManager) -> Self {
        TemporalBinner { bin_manager }
    }

    /// Build the temporal bin of cell `index` from its completed spatial bins.
    pub fn process_spatial_bins(&self, index: i64, spatial_bins: &[SpatialBin]) -> TemporalBin {
        let mut temporal_bin = self.bin_manager.create_temporal_bin(index);
        for spatial_bin in spatial_bins {
            self.bin_manager
                .aggregate_temporal_bin(spatial_bin, &mut temporal_bin);
        }
        self.bin_manager.complete_temporal_bin(&mut temporal_bin);
        temporal_bin
    }

    /// Combine partial temporal bins of cell `index`, e.g. from several reducers.
    pub fn merge_temporal_bins(&self, index: i64, partials: &[TemporalBin]) -> TemporalBin {
        let mut temporal_bin = self.bin_manager.create_temporal_bin(index);
        for partial in partials {
            self.bin_manager.merge_temporal_bins(partial, &mut temporal_bin);
        }
        self.bin_manager.complete_temporal_bin(&mut temporal_bin);
        temporal_bin
    }

    /// Build the temporal bins of every cell in a store, sorted by bin index.
    pub fn process_store(&self, store: &SpatialBinStore) -> Vec<TemporalBin> {
        let temporal_bins: Vec<TemporalBin> = store
            .iter()
            .map(|(index, bins)| self.process_spatial_bins(index, bins))
            .collect();

        log::debug!(
            "merged {} spatial bins into {} temporal bins",
            store.num_bins(),
            temporal_bins.len()
        );

        temporal_bins
    }
}
