use std::time::{Duration, Instant};

/// Resource ceilings for a search. Both are off by default, so a search runs until it proves its result.
///
/// When a ceiling is hit, the search stops with [`SearchStatus::Inconclusive`](crate::solver::SearchStatus::Inconclusive)
/// and the longest connected chain found so far.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SolverConfig {
    /// Most solve rounds to run.
    pub max_iterations: Option<usize>,
    /// Wall-clock budget, checked between rounds.
    pub time_limit: Option<Duration>,
}

impl SolverConfig {
    /// Stop after `iterations` rounds.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Stop starting new rounds once `limit` has elapsed.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Whether another round may start after `iterations` rounds begun at `started`.
    pub(crate) fn allows(&self, iterations: usize, started: Instant) -> bool {
        self.max_iterations.map_or(true, |max| iterations < max)
            && self.time_limit.map_or(true, |limit| started.elapsed() < limit)
    }
}
