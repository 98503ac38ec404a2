/*!
 * Configuration of a binning run.
 *
 * The configuration is only consulted while the engine is set up. Everything is validated
 * eagerly so that a bad aggregator or variable name is reported before the first observation
 * is read.
 */

use crate::{
    aggregator::{Aggregator, AggregatorType},
    bin_manager::BinManager,
    error::{BinningError, BinningResult},
    grid::IsinGrid,
    variable::VariableContext,
};

/// Number of grid rows used when nothing else is configured, about 9.28 km per row.
pub const DEFAULT_NUM_ROWS: usize = 2160;

/// A variable to add to the context before the aggregators are built.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableConfig {
    pub name: String,
    /// Expression deriving the variable from others, `None` for a raw read.
    pub expr: Option<String>,
}

impl VariableConfig {
    pub fn new(name: &str, expr: Option<&str>) -> Self {
        VariableConfig {
            name: name.to_owned(),
            expr: expr.map(str::to_owned),
        }
    }
}

/**
 * Description of a single aggregator.
 *
 * Single variable kinds read `var_name`, ON_MAX_SET reads `var_names` with the selector first.
 * If only one of the two is given it is used for both purposes.
 */
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatorConfig {
    /// One of `AVG`, `AVG_ML`, `MIN_MAX` or `ON_MAX_SET`.
    pub type_name: String,
    pub var_name: Option<String>,
    pub var_names: Vec<String>,
    /// Exponent of the pass weight for the averaging kinds.
    pub weight_coeff: Option<f64>,
}

impl AggregatorConfig {
    /// Configure an aggregator of kind `type_name` for a single variable.
    pub fn new(type_name: &str, var_name: &str) -> Self {
        AggregatorConfig {
            type_name: type_name.to_owned(),
            var_name: Some(var_name.to_owned()),
            ..Self::default()
        }
    }

    /**
     * Parse the compact form `TYPE:var[,var...][:weight]`.
     *
     * ```
     * use satbin::AggregatorConfig;
     *
     * let config = AggregatorConfig::parse("ON_MAX_SET:ndvi,red,nir").unwrap();
     * assert_eq!(config.type_name, "ON_MAX_SET");
     * assert_eq!(config.var_names, vec!["ndvi", "red", "nir"]);
     *
     * let config = AggregatorConfig::parse("AVG:chl:1.0").unwrap();
     * assert_eq!(config.var_name.as_deref(), Some("chl"));
     * assert_eq!(config.weight_coeff, Some(1.0));
     * ```
     */
    pub fn parse(text: &str) -> BinningResult<Self> {
        let mut parts = text.split(':').map(str::trim);

        let type_name = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BinningError::InvalidParameter {
                parameter: "aggregator",
                value: text.to_owned(),
            })?;

        let var_names: Vec<String> = parts
            .next()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();

        let weight_coeff = match parts.next() {
            Some(w) => Some(w.parse::<f64>().map_err(|_| BinningError::InvalidParameter {
                parameter: "weightCoeff",
                value: w.to_owned(),
            })?),
            None => None,
        };

        if parts.next().is_some() {
            return Err(BinningError::InvalidParameter {
                parameter: "aggregator",
                value: text.to_owned(),
            });
        }

        let var_name = if var_names.len() == 1 {
            var_names.first().cloned()
        } else {
            None
        };

        Ok(AggregatorConfig {
            type_name: type_name.to_owned(),
            var_name,
            var_names,
            weight_coeff,
        })
    }

    /// The single variable of a one variable aggregator.
    pub(crate) fn single_var_name(&self, agg_type: AggregatorType) -> BinningResult<&str> {
        self.var_name
            .as_deref()
            .or_else(|| match self.var_names.as_slice() {
                [only] => Some(only.as_str()),
                _ => None,
            })
            .ok_or(BinningError::MissingParameter {
                aggregator: agg_type.name(),
                parameter: "varName",
            })
    }

    /// Every variable this aggregator refers to.
    pub(crate) fn all_var_names(&self) -> Vec<&str> {
        if self.var_names.is_empty() {
            self.var_name.iter().map(String::as_str).collect()
        } else {
            self.var_names.iter().map(String::as_str).collect()
        }
    }
}

/**
 * Everything needed to set up the binning engine.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct BinningConfig {
    /// Number of rows of the equal-area grid.
    pub num_rows: usize,
    /// Expression selecting the valid pixels of a product.
    pub mask_expr: Option<String>,
    /// Variables to define before the aggregators, in this order.
    pub variables: Vec<VariableConfig>,
    pub aggregators: Vec<AggregatorConfig>,
}

impl Default for BinningConfig {
    fn default() -> Self {
        BinningConfig {
            num_rows: DEFAULT_NUM_ROWS,
            mask_expr: None,
            variables: vec![],
            aggregators: vec![],
        }
    }
}

/// The objects built from a [BinningConfig].
#[derive(Debug, Clone)]
pub struct BinningContext {
    pub grid: IsinGrid,
    pub variables: VariableContext,
    pub bin_manager: BinManager,
}

impl BinningConfig {
    /**
     * Validate the configuration and build the grid, variable context and bin manager.
     *
     * Declared variables are defined first, then every variable an aggregator names that is
     * not declared is added as a raw read.
     */
    pub fn create_context(&self) -> BinningResult<BinningContext> {
        if self.num_rows == 0 {
            return Err(BinningError::InvalidParameter {
                parameter: "numRows",
                value: self.num_rows.to_string(),
            });
        }
        let grid = IsinGrid::new(self.num_rows);

        let mut variables = VariableContext::new();
        variables.set_mask_expr(self.mask_expr.as_deref());
        for var in &self.variables {
            variables.define_variable(&var.name, var.expr.as_deref());
        }
        for agg in &self.aggregators {
            for name in agg.all_var_names() {
                variables.define_variable(name, None);
            }
        }

        let aggregators = self
            .aggregators
            .iter()
            .map(|agg| Aggregator::from_config(agg, &variables))
            .collect::<BinningResult<Vec<_>>>()?;

        let bin_manager = BinManager::new(aggregators);

        log::debug!(
            "binning context: {} rows, {} variables, {} aggregators",
            self.num_rows,
            variables.variable_count(),
            bin_manager.aggregator_count()
        );

        Ok(BinningContext {
            grid,
            variables,
            bin_manager,
        })
    }
}
