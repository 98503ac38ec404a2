/*!
 * The two kinds of bins.
 *
 * A bin is one grid cell's worth of aggregated data. Bins are created and updated by the
 * [BinManager](crate::BinManager); the layout of their property vectors is only known to it.
 */

use crate::vector::PropertyVector;

/**
 * The aggregate of the observations of one product that fell into a grid cell.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialBin {
    /// Index of the grid cell.
    pub index: i64,
    /// Number of observations aggregated into this bin.
    pub num_obs: u32,
    /// The spatial windows of all aggregators.
    pub properties: PropertyVector,
}

impl SpatialBin {
    pub(crate) fn new(index: i64, properties: PropertyVector) -> Self {
        SpatialBin {
            index,
            num_obs: 0,
            properties,
        }
    }
}

/**
 * The aggregate of many spatial bins of the same grid cell.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalBin {
    /// Index of the grid cell.
    pub index: i64,
    /// Total number of observations in all merged spatial bins.
    pub num_obs: u32,
    /// Number of spatial bins (passes) merged.
    pub num_passes: u32,
    /// The temporal windows of all aggregators.
    pub properties: PropertyVector,
}

impl TemporalBin {
    pub(crate) fn new(index: i64, properties: PropertyVector) -> Self {
        TemporalBin {
            index,
            num_obs: 0,
            num_passes: 0,
            properties,
        }
    }
}
