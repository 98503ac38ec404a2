/*!
 * Named variables available to the aggregators.
 *
 * A variable is either read directly from the source product (no expression) or derived from
 * other variables by an expression. The expressions are evaluated by whoever produces the
 * observations; here they are only recorded so the producer knows what to compute. The position
 * of a variable in the context is the index of its value in every
 * [Observation](crate::Observation).
 */

use crate::error::{BinningError, BinningResult};

/// A single named variable.
#[derive(Debug, Clone, PartialEq)]
struct Variable {
    name: String,
    expr: Option<String>,
}

/**
 * Ordered registry of variables plus the expression that masks out invalid pixels.
 */
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    variables: Vec<Variable>,
    mask_expr: Option<String>,
}

impl VariableContext {
    /// Create a new, empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context holding raw variables with the given names, in that order.
    pub fn with_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut ctx = Self::new();
        for name in names {
            ctx.define_variable(name.as_ref(), None);
        }
        ctx
    }

    /// Set the expression used to mask out invalid pixels.
    pub fn set_mask_expr(&mut self, mask_expr: Option<&str>) {
        self.mask_expr = mask_expr.map(str::to_owned);
    }

    /// The valid pixel expression, if there is one.
    pub fn mask_expr(&self) -> Option<&str> {
        self.mask_expr.as_deref()
    }

    /**
     * Define a variable and return its index.
     *
     * Defining a name twice does not add a second entry. If the second definition carries an
     * expression it replaces the old one, a definition without an expression never removes an
     * existing expression.
     */
    pub fn define_variable(&mut self, name: &str, expr: Option<&str>) -> usize {
        match self.variable_index(name) {
            Some(index) => {
                if let Some(expr) = expr {
                    self.variables[index].expr = Some(expr.to_owned());
                }
                index
            }
            None => {
                self.variables.push(Variable {
                    name: name.to_owned(),
                    expr: expr.map(str::to_owned),
                });
                self.variables.len() - 1
            }
        }
    }

    /// The number of variables defined.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// The name of the variable at `index`.
    pub fn variable_name(&self, index: usize) -> Option<&str> {
        self.variables.get(index).map(|v| v.name.as_str())
    }

    /// The expression of the variable at `index`, `None` for raw variables.
    pub fn variable_expr(&self, index: usize) -> Option<&str> {
        self.variables.get(index).and_then(|v| v.expr.as_deref())
    }

    /// Look up the index of a variable by name.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    /// Look up the index of a variable and fail if it is not defined.
    pub fn require_index(&self, name: &str) -> BinningResult<usize> {
        self.variable_index(name)
            .ok_or_else(|| BinningError::UnknownVariable {
                name: name.to_owned(),
            })
    }

    /// Iterate over the variable names in index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }
}
