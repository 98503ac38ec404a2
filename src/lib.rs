pub use aggregator::{
    Aggregator, AggregatorType, Average, AverageMl, MinMax, OnMaxSet, DEFAULT_WEIGHT_COEFF,
};
pub use bin_manager::BinManager;
pub use bins::{SpatialBin, TemporalBin};
pub use config::{
    AggregatorConfig, BinningConfig, BinningContext, VariableConfig, DEFAULT_NUM_ROWS,
};
pub use error::{BinningError, BinningResult};
pub use grid::{BinningGrid, IsinGrid};
pub use observation::{Observation, ObservationSlice};
pub use reprojector::{PixelRegion, Reprojector, TemporalBinProcessor};
pub use spatial_binner::{SpatialBinProcessor, SpatialBinner};
pub use store::SpatialBinStore;
pub use temporal_binner::TemporalBinner;
pub use variable::VariableContext;
pub use vector::{PropertyVector, PropertyWindow};

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod aggregator;
mod bin_manager;
mod bins;
mod config;
mod error;
mod grid;
mod observation;
mod reprojector;
mod spatial_binner;
mod store;
mod temporal_binner;
mod variable;
mod vector;
