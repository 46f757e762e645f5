use good_lp::{variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable};
use itertools::Itertools;
use log::trace;
use strum::{Display, IntoStaticStr};
use thiserror::Error;

use crate::model::ModelMatrix;

/// Values a [`MilpSolver`] found for every column of a [`ModelMatrix`], with the objective they reach.
#[derive(Clone, Debug, PartialEq)]
pub struct MilpSolution {
    /// Objective value at `values`.
    pub objective: f64,
    /// One value per column, in column order.
    pub values: Vec<f64>,
}

impl MilpSolution {
    /// The value of the variable called `name`, if `matrix` has such a column.
    pub fn value(&self, matrix: &ModelMatrix, name: &str) -> Option<f64> {
        matrix.column(name).and_then(|column| self.values.get(column).copied())
    }
}

/// Why a [`MilpSolver`] did not return an optimum.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum NonOptimal {
    /// No assignment satisfies every constraint.
    #[error("infeasible")]
    Infeasible,
    /// The objective can grow without limit.
    #[error("unbounded")]
    Unbounded,
    /// Anything else the backend reported.
    #[error("{0}")]
    Other(String),
}

/// Which solve of an iteration failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Display, IntoStaticStr)]
pub enum Stage {
    /// Every variable treated as continuous.
    #[strum(serialize = "relaxation")]
    Relaxation,
    /// Integrality enforced.
    #[strum(serialize = "integer")]
    Integer,
}

/// A numeric backend that maximizes the objective of a [`ModelMatrix`].
///
/// With `relaxed` set, integrality is dropped and every variable is continuous within its bounds.
pub trait MilpSolver {
    /// Maximize `matrix`'s objective.
    fn solve(&self, matrix: &ModelMatrix, relaxed: bool) -> Result<MilpSolution, NonOptimal>;
    /// Short name for logs.
    fn name(&self) -> &str;
}

/// [`MilpSolver`] backed by `good_lp` with its pure-Rust `microlp` solver.
#[derive(Copy, Clone, Debug, Default)]
pub struct MicroLpSolver;

impl MilpSolver for MicroLpSolver {
    fn solve(&self, matrix: &ModelMatrix, relaxed: bool) -> Result<MilpSolution, NonOptimal> {
        let mut problem = ProblemVariables::new();
        let columns: Vec<Variable> = matrix.variables().iter()
            .map(|spec| {
                let mut definition = variable().name(spec.name.clone());
                if spec.bounds.lower.is_finite() {
                    definition = definition.min(spec.bounds.lower);
                }
                if spec.bounds.upper.is_finite() {
                    definition = definition.max(spec.bounds.upper);
                }
                if spec.integer && !relaxed {
                    definition = definition.integer();
                }
                problem.add(definition)
            })
            .collect_vec();

        let objective: Expression = columns.iter()
            .zip(matrix.objective().iter())
            .filter(|(_, weight)| **weight != 0.0)
            .map(|(column, weight)| *column * *weight)
            .sum();

        let mut model = problem.maximise(objective).using(good_lp::solvers::microlp::microlp);
        for (row, spec) in matrix.coefficients().rows().into_iter().zip(matrix.constraints()) {
            let expression: Expression = columns.iter()
                .zip(row.iter())
                .filter(|(_, coefficient)| **coefficient != 0.0)
                .map(|(column, coefficient)| *column * *coefficient)
                .sum();

            // ranged rows become a pair; an equality is just both sides at once
            if spec.bounds.lower.is_finite() {
                model.add_constraint(expression.clone().geq(spec.bounds.lower));
            }
            if spec.bounds.upper.is_finite() {
                model.add_constraint(expression.leq(spec.bounds.upper));
            }
        }

        let solution = model.solve().map_err(|error| match error {
            ResolutionError::Infeasible => NonOptimal::Infeasible,
            ResolutionError::Unbounded => NonOptimal::Unbounded,
            other => NonOptimal::Other(other.to_string()),
        })?;

        let values = columns.iter()
            .zip(matrix.variables())
            .map(|(column, spec)| {
                let value = solution.value(*column);
                if spec.integer && !relaxed { value.round() } else { value }
            })
            .collect_vec();
        let objective = values.iter().zip(matrix.objective().iter()).map(|(value, weight)| value * weight).sum();

        Ok(MilpSolution { objective, values })
    }

    fn name(&self) -> &str {
        "microlp"
    }
}

/// Solve the relaxation first and then the integer program, returning the latter.
///
/// An infeasible or unbounded relaxation settles the integer program too, so it is not attempted.
pub(crate) fn solve_stages<S: MilpSolver + ?Sized>(backend: &S, matrix: &ModelMatrix) -> Result<MilpSolution, (Stage, NonOptimal)> {
    let relaxed = backend.solve(matrix, true).map_err(|reason| (Stage::Relaxation, reason))?;
    trace!("{} relaxation objective {}", backend.name(), relaxed.objective);

    let integer = backend.solve(matrix, false).map_err(|reason| (Stage::Integer, reason))?;
    trace!("{} integer objective {}", backend.name(), integer.objective);

    Ok(integer)
}
