/*!
 * Averages built from the first two moments of a variable.
 *
 * Both kinds keep the same bookkeeping: the spatial window holds the sums of `x` and `x²`,
 * the temporal window the sums of the completed spatial sums plus the sum of the pass weights.
 * The maximum likelihood variant does all of this on `ln(x)`.
 */

use crate::{
    error::{BinningError, BinningResult},
    observation::Observation,
    variable::VariableContext,
};

/// Weight coefficient used when the configuration does not give one; the pass weight is then
/// `sqrt(num_obs)`.
pub const DEFAULT_WEIGHT_COEFF: f64 = 0.5;

/**
 * The weight a spatial bin gets when it is folded into a temporal bin, `w(n) = n^c`.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
struct WeightFn {
    coeff: f64,
}

impl WeightFn {
    fn new(coeff: Option<f64>) -> BinningResult<Self> {
        let coeff = coeff.unwrap_or(DEFAULT_WEIGHT_COEFF);
        if !coeff.is_finite() || coeff < 0.0 {
            return Err(BinningError::InvalidParameter {
                parameter: "weightCoeff",
                value: coeff.to_string(),
            });
        }

        Ok(WeightFn { coeff })
    }

    fn eval(&self, num_obs: u32) -> f32 {
        if self.coeff == 0.0 {
            1.0
        } else if self.coeff == 0.5 {
            f64::sqrt(num_obs as f64) as f32
        } else if self.coeff == 1.0 {
            num_obs as f32
        } else {
            f64::powf(num_obs as f64, self.coeff) as f32
        }
    }
}

/// State shared by both average kinds.
#[derive(Debug, Clone, PartialEq)]
struct Moments {
    var_index: usize,
    var_name: String,
    weight: WeightFn,
}

impl Moments {
    fn new(
        ctx: &VariableContext,
        var_name: &str,
        weight_coeff: Option<f64>,
    ) -> BinningResult<Self> {
        let var_index = ctx.require_index(var_name)?;
        let weight = WeightFn::new(weight_coeff)?;

        Ok(Moments {
            var_index,
            var_name: var_name.to_owned(),
            weight,
        })
    }

    fn spatial_property_names(&self) -> Vec<String> {
        vec![
            format!("{}_sum_x", self.var_name),
            format!("{}_sum_xx", self.var_name),
        ]
    }

    fn temporal_property_names(&self) -> Vec<String> {
        vec![
            format!("{}_sum_x", self.var_name),
            format!("{}_sum_xx", self.var_name),
            format!("{}_sum_w", self.var_name),
        ]
    }

    fn init_spatial(&self, spatial: &mut [f32]) {
        spatial[0] = 0.0;
        spatial[1] = 0.0;
    }

    fn add_value(&self, x: f32, spatial: &mut [f32]) {
        spatial[0] += x;
        spatial[1] += x * x;
    }

    /// Scale the sums so that, once divided by the summed weights, they give the mean.
    fn complete_spatial(&self, num_obs: u32, spatial: &mut [f32]) {
        if num_obs == 0 {
            return;
        }

        let divisor = num_obs as f32 / self.weight.eval(num_obs);
        spatial[0] /= divisor;
        spatial[1] /= divisor;
    }

    fn init_temporal(&self, temporal: &mut [f32]) {
        temporal[0] = 0.0;
        temporal[1] = 0.0;
        temporal[2] = 0.0;
    }

    fn aggregate_temporal(&self, spatial: &[f32], num_spatial_obs: u32, temporal: &mut [f32]) {
        temporal[0] += spatial[0];
        temporal[1] += spatial[1];
        temporal[2] += self.weight.eval(num_spatial_obs);
    }

    fn merge_temporal(&self, input: &[f32], output: &mut [f32]) {
        output[0] += input[0];
        output[1] += input[1];
        output[2] += input[2];
    }

    /// The weighted mean and variance, or `None` if nothing was aggregated.
    fn mean_and_variance(&self, temporal: &[f32]) -> Option<(f32, f32)> {
        let sum_w = temporal[2];
        if sum_w <= 0.0 {
            return None;
        }

        let mean = temporal[0] / sum_w;
        // Rounding can push the variance of constant data just below zero.
        let variance = (temporal[1] / sum_w - mean * mean).max(0.0);
        Some((mean, variance))
    }
}

/**
 * The AVG aggregator: weighted mean and standard deviation of a variable.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Average(Moments);

impl Average {
    pub(crate) fn new(
        ctx: &VariableContext,
        var_name: &str,
        weight_coeff: Option<f64>,
    ) -> BinningResult<Self> {
        Ok(Average(Moments::new(ctx, var_name, weight_coeff)?))
    }

    /// The index of the averaged variable.
    pub fn var_index(&self) -> usize {
        self.0.var_index
    }

    /// The coefficient of the pass weight function.
    pub fn weight_coeff(&self) -> f64 {
        self.0.weight.coeff
    }

    pub(crate) fn spatial_property_names(&self) -> Vec<String> {
        self.0.spatial_property_names()
    }

    pub(crate) fn temporal_property_names(&self) -> Vec<String> {
        self.0.temporal_property_names()
    }

    pub(crate) fn output_property_names(&self) -> Vec<String> {
        vec![
            format!("{}_mean", self.0.var_name),
            format!("{}_sigma", self.0.var_name),
        ]
    }

    pub(crate) fn init_spatial(&self, spatial: &mut [f32]) {
        self.0.init_spatial(spatial)
    }

    pub(crate) fn aggregate_spatial(&self, obs: &Observation, spatial: &mut [f32]) {
        self.0.add_value(obs.value(self.0.var_index), spatial)
    }

    pub(crate) fn complete_spatial(&self, num_obs: u32, spatial: &mut [f32]) {
        self.0.complete_spatial(num_obs, spatial)
    }

    pub(crate) fn init_temporal(&self, temporal: &mut [f32]) {
        self.0.init_temporal(temporal)
    }

    pub(crate) fn aggregate_temporal(
        &self,
        spatial: &[f32],
        num_spatial_obs: u32,
        temporal: &mut [f32],
    ) {
        self.0.aggregate_temporal(spatial, num_spatial_obs, temporal)
    }

    pub(crate) fn merge_temporal(&self, input: &[f32], output: &mut [f32]) {
        self.0.merge_temporal(input, output)
    }

    pub(crate) fn compute_output(&self, temporal: &[f32], output: &mut [f32]) {
        match self.0.mean_and_variance(temporal) {
            Some((mean, variance)) => {
                output[0] = mean;
                output[1] = variance.sqrt();
            }
            None => {
                output[0] = f32::NAN;
                output[1] = f32::NAN;
            }
        }
    }
}

/**
 * The AVG_ML aggregator: maximum likelihood estimates for a log-normally distributed variable.
 *
 * With `m` and `v` the weighted mean and variance of `ln(x)` the outputs are
 *
 * * mean   = exp(m + v/2)
 * * sigma  = mean * sqrt(exp(v) - 1)
 * * median = exp(m)
 * * mode   = exp(m - v)
 */
#[derive(Debug, Clone, PartialEq)]
pub struct AverageMl(Moments);

impl AverageMl {
    pub(crate) fn new(
        ctx: &VariableContext,
        var_name: &str,
        weight_coeff: Option<f64>,
    ) -> BinningResult<Self> {
        Ok(AverageMl(Moments::new(ctx, var_name, weight_coeff)?))
    }

    /// The index of the averaged variable.
    pub fn var_index(&self) -> usize {
        self.0.var_index
    }

    /// The coefficient of the pass weight function.
    pub fn weight_coeff(&self) -> f64 {
        self.0.weight.coeff
    }

    pub(crate) fn check_observation(&self, obs: &Observation) -> BinningResult<()> {
        let value = obs.value(self.0.var_index);
        // NaN passes, it is not a domain problem and poisons the bin like with any other kind.
        if value <= 0.0 {
            Err(BinningError::NumericDomain {
                variable: self.0.var_name.clone(),
                value,
            })
        } else {
            Ok(())
        }
    }

    pub(crate) fn spatial_property_names(&self) -> Vec<String> {
        self.0.spatial_property_names()
    }

    pub(crate) fn temporal_property_names(&self) -> Vec<String> {
        self.0.temporal_property_names()
    }

    pub(crate) fn output_property_names(&self) -> Vec<String> {
        let name = &self.0.var_name;
        vec![
            format!("{}_mean", name),
            format!("{}_sigma", name),
            format!("{}_median", name),
            format!("{}_mode", name),
        ]
    }

    pub(crate) fn init_spatial(&self, spatial: &mut [f32]) {
        self.0.init_spatial(spatial)
    }

    pub(crate) fn aggregate_spatial(&self, obs: &Observation, spatial: &mut [f32]) {
        self.0.add_value(obs.value(self.0.var_index).ln(), spatial)
    }

    pub(crate) fn complete_spatial(&self, num_obs: u32, spatial: &mut [f32]) {
        self.0.complete_spatial(num_obs, spatial)
    }

    pub(crate) fn init_temporal(&self, temporal: &mut [f32]) {
        self.0.init_temporal(temporal)
    }

    pub(crate) fn aggregate_temporal(
        &self,
        spatial: &[f32],
        num_spatial_obs: u32,
        temporal: &mut [f32],
    ) {
        self.0.aggregate_temporal(spatial, num_spatial_obs, temporal)
    }

    pub(crate) fn merge_temporal(&self, input: &[f32], output: &mut [f32]) {
        self.0.merge_temporal(input, output)
    }

    pub(crate) fn compute_output(&self, temporal: &[f32], output: &mut [f32]) {
        match self.0.mean_and_variance(temporal) {
            Some((m, v)) => {
                let mean = (m + 0.5 * v).exp();
                output[0] = mean;
                output[1] = mean * (v.exp() - 1.0).sqrt();
                output[2] = m.exp();
                output[3] = (m - v).exp();
            }
            None => output[..4].iter_mut().for_each(|o| *o = f32::NAN),
        }
    }
}
