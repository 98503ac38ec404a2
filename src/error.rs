use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// Shorthand for results produced by this crate.
pub type BinningResult<T> = Result<T, BinningError>;

/**
 * Everything that can go wrong while configuring or running the binning engine.
 *
 * The first four variants are configuration errors and are always reported before a single
 * observation has been processed.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum BinningError {
    /// A variable name could not be resolved in the variable context.
    UnknownVariable { name: String },
    /// The aggregator type tag is not one of the known kinds.
    UnsupportedAggregator { type_name: String },
    /// A required aggregator parameter was not given.
    MissingParameter {
        aggregator: &'static str,
        parameter: &'static str,
    },
    /// A parameter was given, but it could not be parsed or is out of range.
    InvalidParameter {
        parameter: &'static str,
        value: String,
    },
    /// A value outside the domain of an aggregator, e.g. a non-positive value for a log-normal
    /// average.
    NumericDomain { variable: String, value: f32 },
    /// The output collaborator failed while a finalized batch of spatial bins was handed to it.
    SliceProcessing { slice_index: usize, message: String },
}

impl BinningError {
    /// Is this one of the configuration errors?
    pub fn is_configuration_error(&self) -> bool {
        use BinningError::*;

        matches!(
            self,
            UnknownVariable { .. }
                | UnsupportedAggregator { .. }
                | MissingParameter { .. }
                | InvalidParameter { .. }
        )
    }
}

impl Display for BinningError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        use BinningError::*;

        match self {
            UnknownVariable { name } => write!(f, "unknown variable: '{}'", name),
            UnsupportedAggregator { type_name } => {
                write!(f, "unsupported aggregator type: '{}'", type_name)
            }
            MissingParameter {
                aggregator,
                parameter,
            } => write!(f, "aggregator {} is missing parameter '{}'", aggregator, parameter),
            InvalidParameter { parameter, value } => {
                write!(f, "invalid value for parameter '{}': '{}'", parameter, value)
            }
            NumericDomain { variable, value } => write!(
                f,
                "value {} of variable '{}' is outside the domain of the aggregator",
                value, variable
            ),
            SliceProcessing {
                slice_index,
                message,
            } => write!(f, "failed to process slice {}: {}", slice_index, message),
        }
    }
}

impl Error for BinningError {}
