/*!
 * In memory collection of spatial bins, grouped by cell.
 */

use crate::{bins::SpatialBin, spatial_binner::SpatialBinProcessor};
use std::{collections::BTreeMap, error::Error};

/**
 * Keeps every spatial bin it receives, grouped by bin index in ascending order.
 *
 * This is what a distributed run gets from its shuffle and sort step. The groups come out
 * sorted by bin index and therefore by grid row.
 */
#[derive(Debug, Clone, Default)]
pub struct SpatialBinStore {
    groups: BTreeMap<i64, Vec<SpatialBin>>,
    num_bins: usize,
    num_observations: u64,
}

impl SpatialBinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch of bins.
    pub fn add_bins<I: IntoIterator<Item = SpatialBin>>(&mut self, bins: I) {
        for bin in bins {
            self.num_bins += 1;
            self.num_observations += bin.num_obs as u64;
            self.groups.entry(bin.index).or_default().push(bin);
        }
    }

    /// Move every bin of `other` into this store.
    pub fn merge(&mut self, other: SpatialBinStore) {
        for (_, bins) in other.groups {
            self.add_bins(bins);
        }
    }

    /// The number of distinct cells.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The number of spatial bins received.
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// The number of observations in all received bins.
    pub fn num_observations(&self) -> u64 {
        self.num_observations
    }

    /// The bins of one cell.
    pub fn get(&self, index: i64) -> Option<&[SpatialBin]> {
        self.groups.get(&index).map(Vec::as_slice)
    }

    /// Iterate over the cells in ascending bin index order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &[SpatialBin])> {
        self.groups.iter().map(|(&k, v)| (k, v.as_slice()))
    }
}

impl SpatialBinProcessor for SpatialBinStore {
    fn process_spatial_bins(
        &mut self,
        _slice_index: usize,
        bins: Vec<SpatialBin>,
    ) -> Result<(), Box<dyn Error>> {
        self.add_bins(bins);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::PropertyVector;

    fn bin(index: i64, num_obs: u32) -> SpatialBin {
        SpatialBin {
            index,
            num_obs,
            properties: PropertyVector::zeros(2),
        }
    }

    #[test]
    fn test_groups_are_sorted() {
        let mut store = SpatialBinStore::new();
        store
            .process_spatial_bins(0, vec![bin(7, 1), bin(3, 2)])
            .unwrap();

        let mut other = SpatialBinStore::new();
        other.add_bins(vec![bin(5, 4), bin(7, 3)]);
        store.merge(other);

        assert_eq!(store.len(), 3);
        assert_eq!(store.num_bins(), 4);
        assert_eq!(store.num_observations(), 10);

        let keys: Vec<i64> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![3, 5, 7]);
        assert_eq!(store.get(7).map(|b| b.len()), Some(2));
        assert!(store.get(4).is_none());
    }
}
