/*!
 * Packing several aggregators into the property vectors of a bin.
 */

use crate::{
    aggregator::Aggregator,
    bins::{SpatialBin, TemporalBin},
    error::BinningResult,
    observation::Observation,
    vector::{PropertyVector, PropertyWindow},
};

/// An aggregator along with its windows into the three kinds of property vectors.
#[derive(Debug, Clone)]
struct Slot {
    aggregator: Aggregator,
    spatial: PropertyWindow,
    temporal: PropertyWindow,
    output: PropertyWindow,
}

/**
 * Owns the ordered list of aggregators and runs each phase of the reduction on every one of
 * them.
 *
 * The window of aggregator `i` starts at the sum of the property counts of the aggregators
 * before it. The offsets are computed once and never change, so every bin built by managers
 * with the same aggregator list shares one layout. The manager holds no per bin state and can
 * be shared between threads.
 */
#[derive(Debug, Clone)]
pub struct BinManager {
    slots: Vec<Slot>,
    spatial_count: usize,
    temporal_count: usize,
    output_count: usize,
}

impl BinManager {
    /// Create a manager for the given aggregators, in this order.
    pub fn new(aggregators: Vec<Aggregator>) -> Self {
        let mut spatial_count = 0;
        let mut temporal_count = 0;
        let mut output_count = 0;

        let slots = aggregators
            .into_iter()
            .map(|aggregator| {
                let spatial =
                    PropertyWindow::new(spatial_count, aggregator.spatial_property_count());
                let temporal =
                    PropertyWindow::new(temporal_count, aggregator.temporal_property_count());
                let output = PropertyWindow::new(output_count, aggregator.output_property_count());

                spatial_count += spatial.len();
                temporal_count += temporal.len();
                output_count += output.len();

                Slot {
                    aggregator,
                    spatial,
                    temporal,
                    output,
                }
            })
            .collect();

        BinManager {
            slots,
            spatial_count,
            temporal_count,
            output_count,
        }
    }

    pub fn aggregator_count(&self) -> usize {
        self.slots.len()
    }

    pub fn aggregator(&self, index: usize) -> Option<&Aggregator> {
        self.slots.get(index).map(|s| &s.aggregator)
    }

    /// Iterate over the aggregators in order.
    pub fn aggregators(&self) -> impl Iterator<Item = &Aggregator> {
        self.slots.iter().map(|s| &s.aggregator)
    }

    /// The offset of the spatial window of aggregator `index`.
    pub fn spatial_offset(&self, index: usize) -> Option<usize> {
        self.slots.get(index).map(|s| s.spatial.offset())
    }

    /// The offset of the temporal window of aggregator `index`.
    pub fn temporal_offset(&self, index: usize) -> Option<usize> {
        self.slots.get(index).map(|s| s.temporal.offset())
    }

    /// The offset of the output window of aggregator `index`.
    pub fn output_offset(&self, index: usize) -> Option<usize> {
        self.slots.get(index).map(|s| s.output.offset())
    }

    /// Length of the property vector of every spatial bin.
    pub fn spatial_property_count(&self) -> usize {
        self.spatial_count
    }

    /// Length of the property vector of every temporal bin.
    pub fn temporal_property_count(&self) -> usize {
        self.temporal_count
    }

    /// Length of an output vector.
    pub fn output_property_count(&self) -> usize {
        self.output_count
    }

    /// Names of all the values in an output vector, in order.
    pub fn output_property_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .flat_map(|s| s.aggregator.output_property_names())
            .collect()
    }

    /// The value marking missing data at position `index` of an output vector.
    pub fn output_fill_value(&self, index: usize) -> f32 {
        self.slots
            .iter()
            .find(|s| s.output.range().contains(&index))
            .map(|s| s.aggregator.output_fill_value())
            .unwrap_or(f32::NAN)
    }

    /// Allocate an output vector of the right size.
    pub fn create_output_vector(&self) -> PropertyVector {
        PropertyVector::nan(self.output_count)
    }

    /// Allocate and seed a spatial bin for the cell `index`.
    pub fn create_spatial_bin(&self, index: i64) -> SpatialBin {
        let mut bin = SpatialBin::new(index, PropertyVector::zeros(self.spatial_count));
        for slot in &self.slots {
            slot.aggregator
                .init_spatial(bin.properties.window_mut(slot.spatial));
        }
        bin
    }

    /// Allocate and seed a temporal bin for the cell `index`.
    pub fn create_temporal_bin(&self, index: i64) -> TemporalBin {
        let mut bin = TemporalBin::new(index, PropertyVector::zeros(self.temporal_count));
        for slot in &self.slots {
            slot.aggregator
                .init_temporal(bin.properties.window_mut(slot.temporal));
        }
        bin
    }

    /// Make sure no aggregator would be fed a value outside of its domain by `obs`.
    pub fn check_observation(&self, obs: &Observation) -> BinningResult<()> {
        self.slots
            .iter()
            .try_for_each(|s| s.aggregator.check_observation(obs))
    }

    /// Fold an observation into a spatial bin.
    pub fn aggregate_spatial_bin(&self, obs: &Observation, bin: &mut SpatialBin) {
        for slot in &self.slots {
            slot.aggregator
                .aggregate_spatial(obs, bin.properties.window_mut(slot.spatial));
        }
        bin.num_obs += 1;
    }

    /// Finalize a spatial bin; no more observations may be added afterwards.
    pub fn complete_spatial_bin(&self, bin: &mut SpatialBin) {
        let num_obs = bin.num_obs;
        for slot in &self.slots {
            slot.aggregator
                .complete_spatial(num_obs, bin.properties.window_mut(slot.spatial));
        }
    }

    /// Fold a completed spatial bin into a temporal bin.
    pub fn aggregate_temporal_bin(&self, spatial_bin: &SpatialBin, temporal_bin: &mut TemporalBin) {
        for slot in &self.slots {
            slot.aggregator.aggregate_temporal(
                spatial_bin.properties.window(slot.spatial),
                spatial_bin.num_obs,
                temporal_bin.properties.window_mut(slot.temporal),
            );
        }
        temporal_bin.num_obs += spatial_bin.num_obs;
        temporal_bin.num_passes += 1;
    }

    /// Fold one temporal bin into another.
    pub fn merge_temporal_bins(&self, input: &TemporalBin, output: &mut TemporalBin) {
        for slot in &self.slots {
            slot.aggregator.merge_temporal(
                input.properties.window(slot.temporal),
                output.properties.window_mut(slot.temporal),
            );
        }
        output.num_obs += input.num_obs;
        output.num_passes += input.num_passes;
    }

    /// Finalize a temporal bin once every spatial bin has been merged into it.
    pub fn complete_temporal_bin(&self, bin: &mut TemporalBin) {
        let num_obs = bin.num_obs;
        for slot in &self.slots {
            slot.aggregator
                .complete_temporal(num_obs, bin.properties.window_mut(slot.temporal));
        }
    }

    /// Compute the output values of a temporal bin into `output`, which must be at least
    /// [BinManager::output_property_count] long.
    pub fn compute_output(&self, bin: &TemporalBin, output: &mut PropertyVector) {
        for slot in &self.slots {
            slot.aggregator.compute_output(
                bin.properties.window(slot.temporal),
                output.window_mut(slot.output),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregator::{tests::assert_close, AggregatorType},
        error::BinningError,
        variable::VariableContext,
    };

    static_assertions::assert_impl_all!(BinManager: Send, Sync);
    static_assertions::assert_impl_all!(SpatialBin: Send);
    static_assertions::assert_impl_all!(TemporalBin: Send);

    fn manager() -> BinManager {
        let ctx = VariableContext::with_names(&["a", "b", "c"]);
        BinManager::new(vec![
            Aggregator::average(&ctx, "c", Some(0.0)).unwrap(),
            Aggregator::min_max(&ctx, "a").unwrap(),
            Aggregator::on_max_set(&ctx, "b", &["a", "c"]).unwrap(),
            Aggregator::average_ml(&ctx, "b", None).unwrap(),
        ])
    }

    #[test]
    fn test_offsets() {
        let bm = manager();
        assert_eq!(bm.aggregator_count(), 4);

        let types: Vec<AggregatorType> = bm.aggregators().map(|a| a.aggregator_type()).collect();
        assert_eq!(
            types,
            vec![
                AggregatorType::Average,
                AggregatorType::MinMax,
                AggregatorType::OnMaxSet,
                AggregatorType::AverageMl
            ]
        );
        assert_eq!(
            bm.aggregator(1).map(|a| a.output_property_names()),
            Some(vec!["a_min".to_owned(), "a_max".to_owned()])
        );
        assert!(bm.aggregator(4).is_none());

        let spatial: Vec<_> = (0..4).filter_map(|i| bm.spatial_offset(i)).collect();
        let temporal: Vec<_> = (0..4).filter_map(|i| bm.temporal_offset(i)).collect();
        let output: Vec<_> = (0..4).filter_map(|i| bm.output_offset(i)).collect();
        assert_eq!(spatial, vec![0, 2, 4, 7]);
        assert_eq!(temporal, vec![0, 3, 5, 8]);
        assert_eq!(output, vec![0, 2, 4, 6]);
        assert_eq!(bm.spatial_offset(4), None);

        assert_eq!(bm.spatial_property_count(), 9);
        assert_eq!(bm.temporal_property_count(), 11);
        assert_eq!(bm.output_property_count(), 10);
        assert_eq!(
            bm.output_property_names(),
            vec![
                "c_mean", "c_sigma", "a_min", "a_max", "a", "c", "b_mean", "b_sigma", "b_median",
                "b_mode"
            ]
        );
        assert_eq!(bm.create_output_vector().len(), 10);
        assert!(bm.output_fill_value(5).is_nan());
    }

    #[test]
    fn test_create_bins_are_seeded() {
        let bm = manager();

        let bin = bm.create_spatial_bin(17);
        assert_eq!(bin.index, 17);
        assert_eq!(bin.num_obs, 0);
        let p = bin.properties.as_slice();
        assert_eq!(&p[0..4], &[0.0, 0.0, f32::MAX, -f32::MAX]);
        assert_eq!(p[4], f32::NEG_INFINITY);
        assert!(p[5].is_nan() && p[6].is_nan());
        assert_eq!(&p[7..9], &[0.0, 0.0]);

        let bin = bm.create_temporal_bin(17);
        assert_eq!(bin.num_passes, 0);
        let p = bin.properties.as_slice();
        assert_eq!(&p[0..5], &[0.0, 0.0, 0.0, f32::MAX, -f32::MAX]);
        assert_eq!(p[5], f32::NEG_INFINITY);
        assert_eq!(&p[8..11], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_full_cycle() {
        let bm = manager();

        let observations = [
            Observation::new(0.0, 0.0, vec![1.0, 2.0, 3.0]),
            Observation::new(0.0, 0.0, vec![4.0, 8.0, 5.0]),
            Observation::new(0.0, 0.0, vec![-2.0, 4.0, 7.0]),
        ];

        let mut sbin = bm.create_spatial_bin(3);
        for obs in &observations {
            assert!(bm.check_observation(obs).is_ok());
            bm.aggregate_spatial_bin(obs, &mut sbin);
        }
        bm.complete_spatial_bin(&mut sbin);
        assert_eq!(sbin.num_obs, 3);

        let mut tbin = bm.create_temporal_bin(3);
        bm.aggregate_temporal_bin(&sbin, &mut tbin);
        bm.complete_temporal_bin(&mut tbin);
        assert_eq!(tbin.num_obs, 3);
        assert_eq!(tbin.num_passes, 1);

        let mut out = bm.create_output_vector();
        bm.compute_output(&tbin, &mut out);
        let out = out.as_slice();

        assert_close(5.0, out[0], 1.0e-5);
        assert_close((8.0f32 / 3.0).sqrt(), out[1], 1.0e-5);
        assert_eq!(&out[2..6], &[-2.0, 4.0, 4.0, 5.0]);

        let median = ((2.0f32.ln() + 8.0f32.ln() + 4.0f32.ln()) / 3.0).exp();
        assert_close(median, out[8], 1.0e-4);
    }

    #[test]
    fn test_merge_temporal_bins() {
        let bm = manager();

        let mut tbins = vec![];
        for values in [[1.0, 2.0, 3.0], [6.0, 1.0, 5.0]] {
            let obs = Observation::new(0.0, 0.0, values.to_vec());
            let mut sbin = bm.create_spatial_bin(9);
            bm.aggregate_spatial_bin(&obs, &mut sbin);
            bm.complete_spatial_bin(&mut sbin);

            let mut tbin = bm.create_temporal_bin(9);
            bm.aggregate_temporal_bin(&sbin, &mut tbin);
            tbins.push(tbin);
        }

        let mut merged = bm.create_temporal_bin(9);
        for tbin in &tbins {
            bm.merge_temporal_bins(tbin, &mut merged);
        }
        assert_eq!(merged.num_obs, 2);
        assert_eq!(merged.num_passes, 2);

        let mut out = bm.create_output_vector();
        bm.compute_output(&merged, &mut out);
        let out = out.as_slice();
        assert_close(4.0, out[0], 1.0e-6);
        assert_close(1.0, out[1], 1.0e-6);
        assert_eq!(&out[2..6], &[1.0, 6.0, 1.0, 3.0]);
    }

    #[test]
    fn test_check_observation() {
        let bm = manager();
        let obs = Observation::new(0.0, 0.0, vec![1.0, -2.0, 3.0]);
        assert_eq!(
            bm.check_observation(&obs),
            Err(BinningError::NumericDomain {
                variable: "b".to_owned(),
                value: -2.0
            })
        );
    }
}
