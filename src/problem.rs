use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use log::info;
use thiserror::Error;

use crate::assign::{AssignError, ResultAssigner, ResultAssignment};
use crate::builder::{BuilderInvalidReason, ProblemBuilder};
use crate::config::SolverConfig;
use crate::milp::{MicroLpSolver, MilpSolver};
use crate::multi::{MultiTrailSearch, MultiTrailSolver};
use crate::solver::{SolverError, TrailSearch, TrailSolver};
use crate::trail::{ReconstructionError, Trail, TrailReconstructor};

/// The normalized characters a word starts and ends with. Every word sharing a label is interchangeable in a chain.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EdgeLabel {
    /// Normalized first character.
    pub start: char,
    /// Normalized last character.
    pub end: char,
}

impl EdgeLabel {
    /// Construct a label from its two characters.
    pub fn new(start: char, end: char) -> Self {
        Self { start, end }
    }
}

impl Display for EdgeLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A word list seen as a directed multigraph: characters are vertices and each word is an edge from its start to its
/// end character. Build one with [`ProblemBuilder`] or [`Problem::from_words`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Problem {
    pub(crate) words: Vec<String>,
    pub(crate) nodes: Vec<char>,
    pub(crate) links: BTreeMap<EdgeLabel, Vec<String>>,
}

impl Problem {
    /// Shorthand for building a problem from `words` in one go.
    pub fn from_words<I, S>(words: I) -> Result<Self, Vec<BuilderInvalidReason>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProblemBuilder::new().add_words(words).build().map_err(Clone::clone)
    }

    /// Every word given, in input order.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Every character a word starts or ends with, sorted.
    pub fn nodes(&self) -> &[char] {
        &self.nodes
    }

    /// Distinct words grouped by label, each group in input order.
    pub fn links(&self) -> &BTreeMap<EdgeLabel, Vec<String>> {
        &self.links
    }

    /// Words carrying `label`; empty when there are none.
    pub fn candidates(&self, label: EdgeLabel) -> &[String] {
        self.links.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// How many times `label` may be used in one chain.
    pub fn capacity(&self, label: EdgeLabel) -> usize {
        self.candidates(label).len()
    }

    /// Summed capacity of every label.
    pub fn total_capacity(&self) -> usize {
        self.links.values().map(Vec::len).sum()
    }

    /// Whether there is no word to chain at all.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Find a longest chain with the default configuration and backend, then order it and pick its words.
    pub fn solve(&self) -> Result<Shiritori, PipelineError> {
        self.solve_with(SolverConfig::default(), &MicroLpSolver)
    }

    /// [`Self::solve`] with an explicit configuration and MILP backend.
    pub fn solve_with<S: MilpSolver + ?Sized>(&self, config: SolverConfig, backend: &S) -> Result<Shiritori, PipelineError> {
        let search = TrailSolver::from(self).with_config(config).solve_with(backend)?;
        let trail = TrailReconstructor::from(&search.best).reconstruct()?;
        let assignment = ResultAssigner::from(self).assign(&trail.path)?;
        info!("chain of {} words ({})", trail.path.len(), <&str>::from(&search.status));

        Ok(Shiritori { search, trail, assignment })
    }
}

/// Everything [`Problem::solve`] produces.
#[derive(Clone, Debug)]
pub struct Shiritori {
    /// Raw outcome of the search.
    pub search: TrailSearch,
    /// The chain in order.
    pub trail: Trail,
    /// Words picked for each link of the chain.
    pub assignment: ResultAssignment,
}

impl Shiritori {
    /// Number of words in the chain.
    pub fn len(&self) -> usize {
        self.trail.path.len()
    }

    /// Whether the chain has no words.
    pub fn is_empty(&self) -> bool {
        self.trail.path.is_empty()
    }
}

/// Everything [`solve_all`] produces: the joint search, then one chain and assignment per problem, in input order.
#[derive(Clone, Debug)]
pub struct MultiShiritori {
    /// Raw outcome of the joint search.
    pub search: MultiTrailSearch,
    /// One ordered chain per problem.
    pub trails: Vec<Trail>,
    /// One assignment per problem.
    pub assignments: Vec<ResultAssignment>,
}

/// Find longest chains for several problems at once, preferring chains that share links among equally long ones.
pub fn solve_all(problems: &[Problem]) -> Result<MultiShiritori, PipelineError> {
    solve_all_with(problems, SolverConfig::default(), &MicroLpSolver)
}

/// [`solve_all`] with an explicit configuration and MILP backend.
pub fn solve_all_with<S: MilpSolver + ?Sized>(problems: &[Problem], config: SolverConfig, backend: &S) -> Result<MultiShiritori, PipelineError> {
    let search = MultiTrailSolver::from(problems).with_config(config).solve_with(backend)?;

    let mut trails = Vec::with_capacity(problems.len());
    let mut assignments = Vec::with_capacity(problems.len());
    for (problem, best) in problems.iter().zip(&search.best) {
        let trail = TrailReconstructor::from(best).reconstruct()?;
        assignments.push(ResultAssigner::from(problem).assign(&trail.path)?);
        trails.push(trail);
    }

    Ok(MultiShiritori { search, trails, assignments })
}

/// Any failure along [`Problem::solve`] or [`solve_all`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The search could not be set up.
    #[error(transparent)]
    Solver(#[from] SolverError),
    /// The found edges could not be ordered into a chain.
    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),
    /// The chain uses a link the problem cannot supply words for.
    #[error(transparent)]
    Assign(#[from] AssignError),
}
