use std::time::Instant;

use log::{debug, info, warn};
use strum::IntoStaticStr;
use thiserror::Error;

use crate::config::SolverConfig;
use crate::flow::{cut_around, EdgeMultiset, InstanceModel};
use crate::milp::{solve_stages, MicroLpSolver, MilpSolver, NonOptimal, Stage};
use crate::model::{ConstraintModel, ModelDefinitionError};
use crate::problem::Problem;

/// Reasons a search may fail outright. Solver trouble during the search is not one of them; see
/// [`SearchStatus::SolverFailed`].
#[derive(Debug, Error)]
pub enum SolverError {
    /// The model referenced a variable or constraint it never declared.
    #[error("malformed model: {0}")]
    ModelDefinition(#[from] ModelDefinitionError),
}

/// How a search ended.
#[derive(Clone, Debug, Eq, PartialEq, IntoStaticStr)]
pub enum SearchStatus {
    /// The last solution was connected, so it is optimal.
    Connected,
    /// The upper bound fell to the length already found, so that is optimal.
    Bounded,
    /// The backend gave no optimum; the best chain so far is returned unproven.
    SolverFailed {
        /// Which solve of the round failed.
        stage: Stage,
        /// What the backend reported.
        reason: NonOptimal,
    },
    /// A [`SolverConfig`] ceiling stopped the search early; the best chain so far is returned unproven.
    Inconclusive,
}

impl SearchStatus {
    /// Whether the returned length is proven to be the longest possible.
    pub fn is_optimal(&self) -> bool {
        matches!(self, SearchStatus::Connected | SearchStatus::Bounded)
    }
}

/// Outcome of a [`TrailSolver`] search.
#[derive(Clone, Debug)]
pub struct TrailSearch {
    /// Edge usage of the longest connected chain found, sentinel edges included.
    pub best: EdgeMultiset,
    /// How the search ended.
    pub status: SearchStatus,
    /// Rounds solved.
    pub iterations: usize,
    /// Upper bound on the chain length after each round; never increasing.
    pub bounds: Vec<usize>,
}

impl TrailSearch {
    fn new() -> Self {
        Self { best: EdgeMultiset::new(), status: SearchStatus::Inconclusive, iterations: 0, bounds: Vec::new() }
    }

    /// Length of the best chain.
    pub fn len(&self) -> usize {
        self.best.len()
    }

    /// Whether no chain was found.
    pub fn is_empty(&self) -> bool {
        self.best.len() == 0
    }
}

/// Longest-chain search over a single [`Problem`]. Use [`Self::solve`] to run it.
///
/// Each round maximizes a flow of one unit from a source sentinel to a sink sentinel through the word graph. A solution
/// may also use closed loops the chain never reaches; each round that happens, a cut is added forcing flow into the
/// unreached part whenever any of it is used, and the model is solved again.
pub struct TrailSolver<'a> {
    problem: &'a Problem,
    config: SolverConfig,
}

impl<'a> From<&'a Problem> for TrailSolver<'a> {
    fn from(problem: &'a Problem) -> Self {
        Self { problem, config: SolverConfig::default() }
    }
}

impl TrailSolver<'_> {
    /// Replace the resource ceilings.
    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the search with [`MicroLpSolver`].
    pub fn solve(&self) -> Result<TrailSearch, SolverError> {
        self.solve_with(&MicroLpSolver)
    }

    /// Run the search with `backend`.
    pub fn solve_with<S: MilpSolver + ?Sized>(&self, backend: &S) -> Result<TrailSearch, SolverError> {
        let mut search = TrailSearch::new();
        if self.problem.is_empty() {
            search.status = SearchStatus::Connected;
            return Ok(search);
        }

        let instance = InstanceModel::new(self.problem, "");
        let mut model = ConstraintModel::new();
        instance.populate(&mut model, 1.0);
        info!("searching {} links over {} characters with {}",
            self.problem.links().len(), self.problem.nodes().len(), backend.name());

        let started = Instant::now();
        loop {
            if !self.config.allows(search.iterations, started) {
                warn!("stopping after {} rounds with length {} unproven", search.iterations, search.best.len());
                search.status = SearchStatus::Inconclusive;
                break;
            }

            let matrix = model.build()?;
            let solution = match solve_stages(backend, &matrix) {
                Ok(solution) => solution,
                Err((stage, reason)) => {
                    warn!("{} {stage} solve failed in round {}: {reason}", backend.name(), search.iterations);
                    search.status = SearchStatus::SolverFailed { stage, reason };
                    break;
                }
            };
            search.iterations += 1;

            // both sentinel edges are always used
            let bound = (solution.objective.round().max(0.0) as usize).saturating_sub(2);
            search.bounds.push(bound);
            let usage = instance.usage(&matrix, &solution);
            let component = usage.reachable_component();
            debug!("round {}: bound {}, reached {}, best {}",
                search.iterations, bound, component.edges.len(), search.best.len());

            if component.edges.len() == bound {
                if component.edges.len() > search.best.len() {
                    search.best = component.edges;
                }
                search.status = SearchStatus::Connected;
                break;
            }
            if bound <= search.best.len() {
                search.status = SearchStatus::Bounded;
                break;
            }
            if component.edges.len() > search.best.len() {
                search.best = component.edges;
            }

            let Some(cut) = cut_around(self.problem, &component.vertices) else {
                warn!("round {} left edges unreached but found nothing to cut", search.iterations);
                search.status = SearchStatus::Inconclusive;
                break;
            };
            instance.add_cut(&mut model, &format!("cut_{}", search.iterations), &cut, None);
        }

        info!("longest chain has {} words after {} rounds ({})",
            search.best.len(), search.iterations, <&str>::from(&search.status));
        Ok(search)
    }
}
