use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use ndarray::{Array1, Array2};
use thiserror::Error;

/// Lower and upper bound on a variable or a constraint row. Either side may be infinite.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    /// Lower bound, possibly [`f64::NEG_INFINITY`].
    pub lower: f64,
    /// Upper bound, possibly [`f64::INFINITY`].
    pub upper: f64,
}

impl Bounds {
    /// Bounded on both sides.
    pub fn between(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Exactly `value`.
    pub fn fixed(value: f64) -> Self {
        Self::between(value, value)
    }

    /// `lower` or more.
    pub fn at_least(lower: f64) -> Self {
        Self::between(lower, f64::INFINITY)
    }

    /// `upper` or less.
    pub fn at_most(upper: f64) -> Self {
        Self::between(f64::NEG_INFINITY, upper)
    }

    /// Both bounds are finite whole numbers, which is what makes a variable integer-valued.
    pub fn is_integral(&self) -> bool {
        [self.lower, self.upper].iter().all(|bound| bound.is_finite() && bound.fract() == 0.0)
    }
}

/// A model referenced a name it never declared.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ModelDefinitionError {
    /// A coefficient or objective term names a variable that was never added.
    #[error("undeclared variable `{0}`")]
    UndeclaredVariable(String),
    /// A coefficient names a constraint that was never added.
    #[error("undeclared constraint `{0}`")]
    UndeclaredConstraint(String),
}

/// A column of a [`ModelMatrix`].
#[derive(Clone, Debug, PartialEq)]
pub struct VariableSpec {
    /// Name the variable was declared with.
    pub name: String,
    /// Declared bounds.
    pub bounds: Bounds,
    /// Whether the solver must give this variable an integer value.
    pub integer: bool,
}

/// A row of a [`ModelMatrix`].
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintSpec {
    /// Name the constraint was declared with.
    pub name: String,
    /// Declared bounds on the row's value.
    pub bounds: Bounds,
}

/// Solver-agnostic accumulator of a maximization problem, addressed by name rather than by column index.
///
/// Rows and columns are only ever added. Names may be referenced before they are declared; references are checked
/// when the model is [built](Self::build).
#[derive(Clone, Debug, Default)]
pub struct ConstraintModel {
    variables: Vec<(String, Bounds)>,
    variable_index: HashMap<String, usize>,
    constraints: Vec<(String, Bounds)>,
    constraint_index: HashMap<String, usize>,
    coefficients: BTreeMap<(String, String), f64>,
    objective: BTreeMap<String, f64>,
}

impl ConstraintModel {
    /// An empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable. Declaring an existing name again replaces its bounds and keeps its position.
    pub fn add_variable(&mut self, name: impl Into<String>, bounds: Bounds) -> &mut Self {
        let name = name.into();
        match self.variable_index.get(&name) {
            Some(index) => self.variables[*index].1 = bounds,
            None => {
                self.variable_index.insert(name.clone(), self.variables.len());
                self.variables.push((name, bounds));
            }
        }
        self
    }

    /// Declare a constraint row. Declaring an existing name again replaces its bounds and keeps its position.
    pub fn add_constraint(&mut self, name: impl Into<String>, bounds: Bounds) -> &mut Self {
        let name = name.into();
        match self.constraint_index.get(&name) {
            Some(index) => self.constraints[*index].1 = bounds,
            None => {
                self.constraint_index.insert(name.clone(), self.constraints.len());
                self.constraints.push((name, bounds));
            }
        }
        self
    }

    /// Add `value` to the coefficient of `variable` in `constraint`.
    pub fn add_coefficient(&mut self, constraint: impl Into<String>, variable: impl Into<String>, value: f64) -> &mut Self {
        *self.coefficients.entry((constraint.into(), variable.into())).or_default() += value;
        self
    }

    /// Add `value` to the objective weight of `variable`.
    pub fn add_objective(&mut self, variable: impl Into<String>, value: f64) -> &mut Self {
        *self.objective.entry(variable.into()).or_default() += value;
        self
    }

    /// Number of declared variables.
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of declared constraints.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Check every reference and lay the model out densely, rows and columns in declaration order.
    pub fn build(&self) -> Result<ModelMatrix, ModelDefinitionError> {
        let mut coefficients = Array2::zeros((self.constraints.len(), self.variables.len()));
        for ((row_name, column_name), value) in &self.coefficients {
            let row = *self.constraint_index.get(row_name)
                .ok_or_else(|| ModelDefinitionError::UndeclaredConstraint(row_name.clone()))?;
            let column = *self.variable_index.get(column_name)
                .ok_or_else(|| ModelDefinitionError::UndeclaredVariable(column_name.clone()))?;
            coefficients[[row, column]] += value;
        }

        let mut objective = Array1::zeros(self.variables.len());
        for (column_name, value) in &self.objective {
            let column = *self.variable_index.get(column_name)
                .ok_or_else(|| ModelDefinitionError::UndeclaredVariable(column_name.clone()))?;
            objective[column] += value;
        }

        Ok(ModelMatrix {
            variables: self.variables.iter()
                .map(|(name, bounds)| VariableSpec { name: name.clone(), bounds: *bounds, integer: bounds.is_integral() })
                .collect_vec(),
            constraints: self.constraints.iter()
                .map(|(name, bounds)| ConstraintSpec { name: name.clone(), bounds: *bounds })
                .collect_vec(),
            variable_index: self.variable_index.clone(),
            coefficients,
            objective,
        })
    }
}

/// A [`ConstraintModel`] laid out for a numeric solver: one row per constraint, one column per variable.
#[derive(Clone, Debug)]
pub struct ModelMatrix {
    variables: Vec<VariableSpec>,
    constraints: Vec<ConstraintSpec>,
    variable_index: HashMap<String, usize>,
    coefficients: Array2<f64>,
    objective: Array1<f64>,
}

impl ModelMatrix {
    /// Columns, in declaration order.
    pub fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }

    /// Rows, in declaration order.
    pub fn constraints(&self) -> &[ConstraintSpec] {
        &self.constraints
    }

    /// Dense `constraints x variables` coefficient matrix.
    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    /// Objective weight of every column; the objective is maximized.
    pub fn objective(&self) -> &Array1<f64> {
        &self.objective
    }

    /// Column index of the variable called `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.variable_index.get(name).copied()
    }
}
