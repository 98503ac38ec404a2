use crate::{error::BinningResult, observation::Observation, variable::VariableContext};

/**
 * The ON_MAX_SET aggregator: keep the values of a set of variables from the observation where
 * a selector variable is largest.
 *
 * The window holds the selector in its first slot followed by one slot per set variable. The
 * whole window is replaced only when a strictly greater selector value arrives, so ties keep
 * the values seen first. The output is the set variables without the selector.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct OnMaxSet {
    max_index: usize,
    max_name: String,
    set_indexes: Vec<usize>,
    set_names: Vec<String>,
}

impl OnMaxSet {
    pub(crate) fn new<S: AsRef<str>>(
        ctx: &VariableContext,
        max_var_name: &str,
        set_var_names: &[S],
    ) -> BinningResult<Self> {
        let max_index = ctx.require_index(max_var_name)?;

        let set_indexes = set_var_names
            .iter()
            .map(|name| ctx.require_index(name.as_ref()))
            .collect::<BinningResult<Vec<usize>>>()?;

        let set_names = set_var_names
            .iter()
            .map(|name| name.as_ref().to_owned())
            .collect();

        Ok(OnMaxSet {
            max_index,
            max_name: max_var_name.to_owned(),
            set_indexes,
            set_names,
        })
    }

    /// Index of the selector variable.
    pub fn max_var_index(&self) -> usize {
        self.max_index
    }

    /// Indexes of the variables copied along with the maximum.
    pub fn set_var_indexes(&self) -> &[usize] {
        &self.set_indexes
    }

    pub(crate) fn property_count(&self) -> usize {
        self.set_indexes.len() + 1
    }

    pub(crate) fn property_names(&self) -> Vec<String> {
        std::iter::once(format!("{}_max", self.max_name))
            .chain(self.set_names.iter().cloned())
            .collect()
    }

    pub(crate) fn output_property_names(&self) -> Vec<String> {
        self.set_names.clone()
    }

    pub(crate) fn init(&self, vector: &mut [f32]) {
        vector[0] = f32::NEG_INFINITY;
        vector[1..self.property_count()]
            .iter_mut()
            .for_each(|v| *v = f32::NAN);
    }

    pub(crate) fn aggregate_spatial(&self, obs: &Observation, spatial: &mut [f32]) {
        let value = obs.value(self.max_index);
        if value > spatial[0] {
            spatial[0] = value;
            for (slot, &index) in spatial[1..].iter_mut().zip(&self.set_indexes) {
                *slot = obs.value(index);
            }
        }
    }

    pub(crate) fn merge(&self, input: &[f32], output: &mut [f32]) {
        if input[0] > output[0] {
            let count = self.property_count();
            output[..count].copy_from_slice(&input[..count]);
        }
    }

    pub(crate) fn compute_output(&self, temporal: &[f32], output: &mut [f32]) {
        let count = self.set_indexes.len();
        output[..count].copy_from_slice(&temporal[1..=count]);
    }
}
