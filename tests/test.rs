use satbin::{
    Aggregator, AggregatorConfig, BinManager, BinningConfig, BinningGrid, IsinGrid, Observation,
    PropertyVector, Reprojector, SpatialBinStore, SpatialBinner, TemporalBin,
    TemporalBinProcessor, TemporalBinner, VariableConfig, VariableContext,
};
use std::error::Error;

fn assert_close(expected: f32, actual: f32, eps: f32) {
    assert!(
        (expected - actual).abs() <= eps,
        "expected {} but got {} (eps = {})",
        expected,
        actual,
        eps
    );
}

/*-------------------------------------------------------------------------------------------------
 *                                     Spatial binning
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_two_observations_in_one_cell() {
    let ctx = VariableContext::with_names(&["x"]);
    let bm = BinManager::new(vec![Aggregator::average(&ctx, "x", None).unwrap()]);
    let grid = IsinGrid::new(4);

    let mut store = SpatialBinStore::new();
    let mut binner = SpatialBinner::new(&bm, &grid, &mut store, Some(1));
    binner.process_slice(&[
        Observation::new(80.0, 0.0, vec![10.0]),
        Observation::new(80.0, 0.0, vec![20.0]),
    ]);
    binner.complete();
    assert!(binner.errors().is_empty());
    drop(binner);

    assert_eq!(store.len(), 1);
    assert_eq!(store.num_bins(), 1);

    let index = grid.bin_index(80.0, 0.0);
    assert_eq!(grid.row_index(index), 3);

    let bins = store.get(index).unwrap();
    assert_eq!(bins.len(), 1);
    assert_eq!(bins[0].num_obs, 2);

    let sqrt2 = 2.0f32.sqrt();
    let props = bins[0].properties.as_slice();
    assert_close(30.0 / sqrt2, props[0], 1.0e-4);
    assert_close(500.0 / sqrt2, props[1], 1.0e-3);
}

#[test]
fn test_halves_match_whole() {
    let ctx = VariableContext::with_names(&["x", "y"]);
    let bm = BinManager::new(vec![
        Aggregator::average(&ctx, "x", None).unwrap(),
        Aggregator::average_ml(&ctx, "y", None).unwrap(),
        Aggregator::min_max(&ctx, "x").unwrap(),
    ]);

    let observations: Vec<Observation> = [
        (1.0, 0.5),
        (4.0, 2.5),
        (2.5, 1.0),
        (7.0, 3.0),
        (0.5, 0.25),
        (3.0, 8.0),
    ]
    .iter()
    .map(|&(x, y)| Observation::new(10.0, 10.0, vec![x, y]))
    .collect();

    let spatial_bin = |obs: &[Observation]| {
        let mut bin = bm.create_spatial_bin(42);
        for o in obs {
            bm.aggregate_spatial_bin(o, &mut bin);
        }
        bm.complete_spatial_bin(&mut bin);
        bin
    };

    let mut whole = bm.create_temporal_bin(42);
    bm.aggregate_temporal_bin(&spatial_bin(&observations), &mut whole);

    let mut halves = bm.create_temporal_bin(42);
    bm.aggregate_temporal_bin(&spatial_bin(&observations[..3]), &mut halves);
    bm.aggregate_temporal_bin(&spatial_bin(&observations[3..]), &mut halves);

    assert_eq!(whole.num_obs, halves.num_obs);
    assert_eq!(whole.num_passes, 1);
    assert_eq!(halves.num_passes, 2);

    let mut whole_out = bm.create_output_vector();
    let mut halves_out = bm.create_output_vector();
    bm.compute_output(&whole, &mut whole_out);
    bm.compute_output(&halves, &mut halves_out);

    for (a, b) in whole_out.as_slice().iter().zip(halves_out.as_slice()) {
        assert_close(*a, *b, 1.0e-4);
    }

    // The plain mean and standard deviation of x.
    let mean = 18.0 / 6.0;
    let var = (1.0 + 16.0 + 6.25 + 49.0 + 0.25 + 9.0) / 6.0 - mean * mean;
    assert_close(mean, whole_out.get(0), 1.0e-5);
    assert_close(f32::sqrt(var), whole_out.get(1), 1.0e-5);
    assert_eq!(whole_out.get(6), 0.5);
    assert_eq!(whole_out.get(7), 7.0);
}

/*-------------------------------------------------------------------------------------------------
 *                                     Full pipeline
 *-----------------------------------------------------------------------------------------------*/
/// Keeps the first output value of every pixel with data.
struct Raster {
    width: usize,
    values: Vec<Option<f32>>,
    num_visits: usize,
}

impl Raster {
    fn new() -> Self {
        Raster {
            width: 0,
            values: vec![],
            num_visits: 0,
        }
    }

    fn get(&self, x: usize, y: usize) -> Option<f32> {
        self.values[y * self.width + x]
    }
}

impl TemporalBinProcessor for Raster {
    fn begin(&mut self, width: usize, height: usize) -> Result<(), Box<dyn Error>> {
        self.width = width;
        self.values = vec![None; width * height];
        Ok(())
    }

    fn process_bin(
        &mut self,
        x: usize,
        y: usize,
        _bin: &TemporalBin,
        output: &PropertyVector,
    ) -> Result<(), Box<dyn Error>> {
        self.values[y * self.width + x] = Some(output.get(0));
        self.num_visits += 1;
        Ok(())
    }

    fn process_missing_bin(&mut self, _x: usize, _y: usize) -> Result<(), Box<dyn Error>> {
        self.num_visits += 1;
        Ok(())
    }
}

#[test]
fn test_binning_pipeline() {
    let config = BinningConfig {
        num_rows: 18,
        mask_expr: None,
        variables: vec![VariableConfig::new("sst", None)],
        aggregators: vec![
            AggregatorConfig::parse("AVG:sst").unwrap(),
            AggregatorConfig::parse("MIN_MAX:sst").unwrap(),
        ],
    };
    let ctx = config.create_context().unwrap();

    // Two passes over the same region, lines in scan order from south to north.
    let product = |offset: f32| -> Vec<Vec<Observation>> {
        (0..6)
            .map(|line| {
                let lat = 20.0 + line as f64 * 2.0;
                (0..10)
                    .map(|col| {
                        let lon = -40.0 + col as f64 * 2.0;
                        Observation::new(lat, lon, vec![offset + line as f32])
                    })
                    .collect()
            })
            .collect()
    };

    let mut store = SpatialBinStore::new();
    for offset in [10.0, 20.0] {
        let slices = product(offset);
        let mut binner =
            SpatialBinner::new(&ctx.bin_manager, &ctx.grid, &mut store, Some(slices.len()));
        for slice in &slices {
            binner.process_slice(slice);
        }
        binner.complete();
        assert!(binner.errors().is_empty());
        assert_eq!(binner.num_observations(), 60);
    }
    assert_eq!(store.num_observations(), 120);

    let temporal_bins = TemporalBinner::new(&ctx.bin_manager).process_store(&store);
    assert_eq!(temporal_bins.len(), store.len());
    for bin in &temporal_bins {
        assert_eq!(bin.num_passes, 2);
    }

    let reprojector = Reprojector::new(&ctx.bin_manager, &ctx.grid);
    let mut raster = Raster::new();
    reprojector.reproject(temporal_bins, &mut raster).unwrap();

    assert_eq!(raster.num_visits, 36 * 18);

    // Row 11 covers 20 to 30 degrees north and its pixels are 10 degrees wide.
    let x = 15; // -30 to -20 degrees
    let mean = raster.get(x, 11).unwrap();
    assert!(mean > 10.0 && mean < 25.0);
    assert!(raster.get(x, 0).is_none());
    assert!(raster.get(30, 11).is_none());
}

#[test]
fn test_output_failures_keep_binning() {
    struct Flaky {
        calls: usize,
        received: usize,
    }

    impl satbin::SpatialBinProcessor for Flaky {
        fn process_spatial_bins(
            &mut self,
            _slice_index: usize,
            bins: Vec<satbin::SpatialBin>,
        ) -> Result<(), Box<dyn Error>> {
            self.calls += 1;
            if self.calls == 1 {
                Err("connection reset".into())
            } else {
                self.received += bins.len();
                Ok(())
            }
        }
    }

    let ctx = VariableContext::with_names(&["x"]);
    let bm = BinManager::new(vec![Aggregator::min_max(&ctx, "x").unwrap()]);
    let grid = IsinGrid::new(6);

    let mut binner = SpatialBinner::new(&bm, &grid, Flaky { calls: 0, received: 0 }, Some(4));
    binner.process_slice(&[Observation::new(-80.0, 0.0, vec![1.0])]);
    binner.process_slice(&[Observation::new(-50.0, 0.0, vec![1.0])]);
    binner.process_slice(&[Observation::new(-20.0, 0.0, vec![1.0])]);
    binner.process_slice(&[Observation::new(20.0, 0.0, vec![1.0])]);
    binner.complete();

    let errors = binner.take_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("connection reset"));

    let flaky = binner.into_processor();
    assert_eq!(flaky.calls, 3);
    assert_eq!(flaky.received, 3);
}
