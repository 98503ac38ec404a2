/*!
 * Statistical reducers applied to the observations falling into a bin.
 *
 * Every aggregator works on one or more variables and owns a window in the spatial property
 * vector and one in the temporal property vector of each bin. The reduction runs in four
 * phases:
 *
 * 1. `init_spatial` / `init_temporal` seed the window with the identity of the reduction.
 * 2. `aggregate_spatial` folds one observation into a spatial window.
 * 3. `complete_spatial` finalizes a spatial window once no more observations will arrive.
 * 4. `aggregate_temporal` folds a completed spatial window into a temporal window, and
 *    `compute_output` turns a temporal window into the values handed to the user.
 *
 * Aggregators hold no per-bin state, so one instance serves every bin.
 */

pub use average::{Average, AverageMl, DEFAULT_WEIGHT_COEFF};
pub use min_max::MinMax;
pub use on_max_set::OnMaxSet;

use crate::{
    config::AggregatorConfig,
    error::{BinningError, BinningResult},
    observation::Observation,
    variable::VariableContext,
};
use strum::{EnumIter, EnumString, IntoStaticStr};

/** The kinds of aggregators this library knows about. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
pub enum AggregatorType {
    /// Weighted mean and standard deviation.
    #[strum(serialize = "AVG")]
    Average,
    /// Maximum likelihood estimates for log-normally distributed values.
    #[strum(serialize = "AVG_ML")]
    AverageMl,
    /// Minimum and maximum.
    #[strum(serialize = "MIN_MAX")]
    MinMax,
    /// The values of several variables taken where a selector variable peaks.
    #[strum(serialize = "ON_MAX_SET")]
    OnMaxSet,
}

impl AggregatorType {
    /// The tag used in configurations.
    pub fn name(&self) -> &'static str {
        Into::<&'static str>::into(*self)
    }

    /// Parse a configuration tag.
    pub fn from_name(name: &str) -> BinningResult<Self> {
        name.trim()
            .parse()
            .map_err(|_| BinningError::UnsupportedAggregator {
                type_name: name.to_owned(),
            })
    }
}

/**
 * An aggregator of one of the supported kinds.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregator {
    Average(Average),
    AverageMl(AverageMl),
    MinMax(MinMax),
    OnMaxSet(OnMaxSet),
}

impl Aggregator {
    /// Create an AVG aggregator for the variable `var_name`.
    pub fn average(
        ctx: &VariableContext,
        var_name: &str,
        weight_coeff: Option<f64>,
    ) -> BinningResult<Self> {
        Ok(Aggregator::Average(Average::new(ctx, var_name, weight_coeff)?))
    }

    /// Create an AVG_ML aggregator for the variable `var_name`.
    pub fn average_ml(
        ctx: &VariableContext,
        var_name: &str,
        weight_coeff: Option<f64>,
    ) -> BinningResult<Self> {
        Ok(Aggregator::AverageMl(AverageMl::new(
            ctx,
            var_name,
            weight_coeff,
        )?))
    }

    /// Create a MIN_MAX aggregator for the variable `var_name`.
    pub fn min_max(ctx: &VariableContext, var_name: &str) -> BinningResult<Self> {
        Ok(Aggregator::MinMax(MinMax::new(ctx, var_name)?))
    }

    /// Create an ON_MAX_SET aggregator selecting on `max_var_name`.
    pub fn on_max_set<S: AsRef<str>>(
        ctx: &VariableContext,
        max_var_name: &str,
        set_var_names: &[S],
    ) -> BinningResult<Self> {
        Ok(Aggregator::OnMaxSet(OnMaxSet::new(
            ctx,
            max_var_name,
            set_var_names,
        )?))
    }

    /**
     * Build an aggregator from its configuration.
     *
     * All variables named by the configuration must already be defined in `ctx`.
     */
    pub fn from_config(config: &AggregatorConfig, ctx: &VariableContext) -> BinningResult<Self> {
        let agg_type = AggregatorType::from_name(&config.type_name)?;

        match agg_type {
            AggregatorType::Average => {
                let var_name = config.single_var_name(agg_type)?;
                Self::average(ctx, var_name, config.weight_coeff)
            }
            AggregatorType::AverageMl => {
                let var_name = config.single_var_name(agg_type)?;
                Self::average_ml(ctx, var_name, config.weight_coeff)
            }
            AggregatorType::MinMax => {
                let var_name = config.single_var_name(agg_type)?;
                Self::min_max(ctx, var_name)
            }
            AggregatorType::OnMaxSet => {
                let names = config.all_var_names();
                let (selector, set) =
                    names
                        .split_first()
                        .ok_or(BinningError::MissingParameter {
                            aggregator: agg_type.name(),
                            parameter: "varNames",
                        })?;
                Self::on_max_set(ctx, selector, set)
            }
        }
    }

    /// Which kind of aggregator is this?
    pub fn aggregator_type(&self) -> AggregatorType {
        match self {
            Self::Average(_) => AggregatorType::Average,
            Self::AverageMl(_) => AggregatorType::AverageMl,
            Self::MinMax(_) => AggregatorType::MinMax,
            Self::OnMaxSet(_) => AggregatorType::OnMaxSet,
        }
    }

    /// Names of the properties in the spatial window.
    pub fn spatial_property_names(&self) -> Vec<String> {
        match self {
            Self::Average(agg) => agg.spatial_property_names(),
            Self::AverageMl(agg) => agg.spatial_property_names(),
            Self::MinMax(agg) => agg.property_names(),
            Self::OnMaxSet(agg) => agg.property_names(),
        }
    }

    /// Names of the properties in the temporal window.
    pub fn temporal_property_names(&self) -> Vec<String> {
        match self {
            Self::Average(agg) => agg.temporal_property_names(),
            Self::AverageMl(agg) => agg.temporal_property_names(),
            Self::MinMax(agg) => agg.property_names(),
            Self::OnMaxSet(agg) => agg.property_names(),
        }
    }

    /// Names of the values produced by [Aggregator::compute_output].
    pub fn output_property_names(&self) -> Vec<String> {
        match self {
            Self::Average(agg) => agg.output_property_names(),
            Self::AverageMl(agg) => agg.output_property_names(),
            Self::MinMax(agg) => agg.property_names(),
            Self::OnMaxSet(agg) => agg.output_property_names(),
        }
    }

    /// Size of the spatial window.
    pub fn spatial_property_count(&self) -> usize {
        match self {
            Self::Average(_) | Self::AverageMl(_) => 2,
            Self::MinMax(_) => 2,
            Self::OnMaxSet(agg) => agg.property_count(),
        }
    }

    /// Size of the temporal window.
    pub fn temporal_property_count(&self) -> usize {
        match self {
            Self::Average(_) | Self::AverageMl(_) => 3,
            Self::MinMax(_) => 2,
            Self::OnMaxSet(agg) => agg.property_count(),
        }
    }

    /// Number of output values.
    pub fn output_property_count(&self) -> usize {
        match self {
            Self::Average(_) => 2,
            Self::AverageMl(_) => 4,
            Self::MinMax(_) => 2,
            Self::OnMaxSet(agg) => agg.property_count() - 1,
        }
    }

    /// The value to write for pixels without data.
    pub fn output_fill_value(&self) -> f32 {
        f32::NAN
    }

    /// Make sure an observation is inside the domain of this aggregator.
    pub fn check_observation(&self, obs: &Observation) -> BinningResult<()> {
        match self {
            Self::AverageMl(agg) => agg.check_observation(obs),
            _ => Ok(()),
        }
    }

    pub fn init_spatial(&self, vector: &mut [f32]) {
        match self {
            Self::Average(agg) => agg.init_spatial(vector),
            Self::AverageMl(agg) => agg.init_spatial(vector),
            Self::MinMax(agg) => agg.init(vector),
            Self::OnMaxSet(agg) => agg.init(vector),
        }
    }

    pub fn aggregate_spatial(&self, obs: &Observation, spatial: &mut [f32]) {
        match self {
            Self::Average(agg) => agg.aggregate_spatial(obs, spatial),
            Self::AverageMl(agg) => agg.aggregate_spatial(obs, spatial),
            Self::MinMax(agg) => agg.aggregate_spatial(obs, spatial),
            Self::OnMaxSet(agg) => agg.aggregate_spatial(obs, spatial),
        }
    }

    pub fn complete_spatial(&self, num_obs: u32, spatial: &mut [f32]) {
        match self {
            Self::Average(agg) => agg.complete_spatial(num_obs, spatial),
            Self::AverageMl(agg) => agg.complete_spatial(num_obs, spatial),
            Self::MinMax(_) | Self::OnMaxSet(_) => {}
        }
    }

    pub fn init_temporal(&self, vector: &mut [f32]) {
        match self {
            Self::Average(agg) => agg.init_temporal(vector),
            Self::AverageMl(agg) => agg.init_temporal(vector),
            Self::MinMax(agg) => agg.init(vector),
            Self::OnMaxSet(agg) => agg.init(vector),
        }
    }

    /// Fold a completed spatial window, built from `num_spatial_obs` observations, into a
    /// temporal window.
    pub fn aggregate_temporal(&self, spatial: &[f32], num_spatial_obs: u32, temporal: &mut [f32]) {
        match self {
            Self::Average(agg) => agg.aggregate_temporal(spatial, num_spatial_obs, temporal),
            Self::AverageMl(agg) => agg.aggregate_temporal(spatial, num_spatial_obs, temporal),
            Self::MinMax(agg) => agg.merge(spatial, temporal),
            Self::OnMaxSet(agg) => agg.merge(spatial, temporal),
        }
    }

    /// Fold one temporal window into another.
    pub fn merge_temporal(&self, input: &[f32], output: &mut [f32]) {
        match self {
            Self::Average(agg) => agg.merge_temporal(input, output),
            Self::AverageMl(agg) => agg.merge_temporal(input, output),
            Self::MinMax(agg) => agg.merge(input, output),
            Self::OnMaxSet(agg) => agg.merge(input, output),
        }
    }

    /// Finalize a temporal window. None of the current kinds need this.
    pub fn complete_temporal(&self, _num_obs: u32, _temporal: &mut [f32]) {}

    pub fn compute_output(&self, temporal: &[f32], output: &mut [f32]) {
        match self {
            Self::Average(agg) => agg.compute_output(temporal, output),
            Self::AverageMl(agg) => agg.compute_output(temporal, output),
            Self::MinMax(_) => output.copy_from_slice(&temporal[..2]),
            Self::OnMaxSet(agg) => agg.compute_output(temporal, output),
        }
    }
}

mod average;
mod min_max;
mod on_max_set;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    pub(crate) fn assert_close(expected: f32, actual: f32, eps: f32) {
        assert!(
            (expected - actual).abs() <= eps,
            "expected {} but got {} (eps = {})",
            expected,
            actual,
            eps
        );
    }

    #[test]
    fn test_type_names() {
        let names: Vec<&'static str> = AggregatorType::iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["AVG", "AVG_ML", "MIN_MAX", "ON_MAX_SET"]);

        assert_eq!(
            AggregatorType::from_name("ON_MAX_SET"),
            Ok(AggregatorType::OnMaxSet)
        );
        assert_eq!(
            AggregatorType::from_name("PERCENTILE"),
            Err(BinningError::UnsupportedAggregator {
                type_name: "PERCENTILE".to_owned()
            })
        );
    }

    #[test]
    fn test_from_config() {
        let ctx = VariableContext::with_names(&["a", "b", "c"]);

        let agg = Aggregator::from_config(&AggregatorConfig::parse("AVG:b:1.0").unwrap(), &ctx)
            .unwrap();
        assert_eq!(agg.aggregator_type(), AggregatorType::Average);
        assert_eq!(agg.output_property_names(), vec!["b_mean", "b_sigma"]);

        let agg =
            Aggregator::from_config(&AggregatorConfig::parse("ON_MAX_SET:c,a,b").unwrap(), &ctx)
                .unwrap();
        assert_eq!(agg.spatial_property_names(), vec!["c_max", "a", "b"]);
        assert_eq!(agg.output_property_names(), vec!["a", "b"]);
        assert_eq!(agg.output_property_count(), 2);

        let err = Aggregator::from_config(&AggregatorConfig::parse("MIN_MAX:z").unwrap(), &ctx)
            .unwrap_err();
        assert_eq!(
            err,
            BinningError::UnknownVariable {
                name: "z".to_owned()
            }
        );

        let err = Aggregator::from_config(&AggregatorConfig::new("MEDIAN", "a"), &ctx).unwrap_err();
        assert!(matches!(err, BinningError::UnsupportedAggregator { .. }));
    }

    #[test]
    fn test_counts_match_names() {
        let ctx = VariableContext::with_names(&["a", "b", "c"]);
        let aggs = [
            Aggregator::average(&ctx, "a", None).unwrap(),
            Aggregator::average_ml(&ctx, "a", None).unwrap(),
            Aggregator::min_max(&ctx, "b").unwrap(),
            Aggregator::on_max_set(&ctx, "c", &["a", "b"]).unwrap(),
        ];

        for agg in &aggs {
            assert_eq!(
                agg.spatial_property_count(),
                agg.spatial_property_names().len()
            );
            assert_eq!(
                agg.temporal_property_count(),
                agg.temporal_property_names().len()
            );
            assert_eq!(
                agg.output_property_count(),
                agg.output_property_names().len()
            );
            assert!(agg.output_fill_value().is_nan());
        }
    }

    #[test]
    fn test_complete_without_observations_is_well_defined() {
        let ctx = VariableContext::with_names(&["a", "b", "c"]);
        let aggs = [
            Aggregator::average(&ctx, "a", None).unwrap(),
            Aggregator::average_ml(&ctx, "a", Some(0.0)).unwrap(),
            Aggregator::min_max(&ctx, "b").unwrap(),
            Aggregator::on_max_set(&ctx, "c", &["a", "b"]).unwrap(),
        ];

        for agg in &aggs {
            let mut spatial = vec![f32::NAN; agg.spatial_property_count()];
            agg.init_spatial(&mut spatial);
            agg.complete_spatial(0, &mut spatial);

            match agg {
                Aggregator::Average(_) | Aggregator::AverageMl(_) => {
                    assert_eq!(spatial, vec![0.0, 0.0])
                }
                Aggregator::MinMax(_) => assert_eq!(spatial, vec![f32::MAX, -f32::MAX]),
                Aggregator::OnMaxSet(_) => {
                    assert_eq!(spatial[0], f32::NEG_INFINITY);
                    assert!(spatial[1].is_nan() && spatial[2].is_nan());
                }
            }
        }
    }
}
