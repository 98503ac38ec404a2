use crate::{error::BinningResult, observation::Observation, variable::VariableContext};

/**
 * The MIN_MAX aggregator: the smallest and largest value of a variable.
 *
 * The spatial, temporal and output windows all hold `(min, max)`.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct MinMax {
    var_index: usize,
    var_name: String,
}

impl MinMax {
    pub(crate) fn new(ctx: &VariableContext, var_name: &str) -> BinningResult<Self> {
        let var_index = ctx.require_index(var_name)?;

        Ok(MinMax {
            var_index,
            var_name: var_name.to_owned(),
        })
    }

    /// The index of the variable.
    pub fn var_index(&self) -> usize {
        self.var_index
    }

    pub(crate) fn property_names(&self) -> Vec<String> {
        vec![
            format!("{}_min", self.var_name),
            format!("{}_max", self.var_name),
        ]
    }

    pub(crate) fn init(&self, vector: &mut [f32]) {
        vector[0] = f32::MAX;
        vector[1] = -f32::MAX;
    }

    pub(crate) fn aggregate_spatial(&self, obs: &Observation, spatial: &mut [f32]) {
        let value = obs.value(self.var_index);
        spatial[0] = spatial[0].min(value);
        spatial[1] = spatial[1].max(value);
    }

    pub(crate) fn merge(&self, input: &[f32], output: &mut [f32]) {
        output[0] = output[0].min(input[0]);
        output[1] = output[1].max(input[1]);
    }
}
