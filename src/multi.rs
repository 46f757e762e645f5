use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use itertools::Itertools;
use log::{debug, info, trace, warn};

use crate::config::SolverConfig;
use crate::flow::{cut_around, Edge, EdgeMultiset, InstanceModel};
use crate::milp::{solve_stages, MicroLpSolver, MilpSolver};
use crate::model::{Bounds, ConstraintModel};
use crate::problem::{EdgeLabel, Problem};
use crate::solver::{SearchStatus, SolverError};

/// Objective weights of a joint search, and the inverse mapping from objective value back to its parts.
///
/// With `M` the scale, every edge weighs `M`, every shared link weighs 1 and every connectivity indicator weighs `M²`.
/// Shared links never add up to `M` and no cut can be violated for a gain of `M²`, so the tiers stay apart.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ObjectiveScale {
    instances: usize,
    scale: usize,
}

/// An objective value split back into its tiers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Decoded {
    /// Edges used over every instance, sentinel edges included.
    pub edges: usize,
    /// Summed value of the shared-link variables.
    pub common: usize,
}

impl ObjectiveScale {
    /// Scale for `instances` modeled instances holding `words` words between them.
    pub fn new(instances: usize, words: usize) -> Self {
        Self { instances, scale: words + 1 }
    }

    /// Weight of a single edge.
    pub fn edge_weight(&self) -> f64 {
        self.scale as f64
    }

    /// Weight of a shared link.
    pub fn common_weight(&self) -> f64 {
        1.0
    }

    /// Weight of a connectivity indicator.
    pub fn indicator_weight(&self) -> f64 {
        (self.scale * self.scale) as f64
    }

    /// What the indicators contribute once `rounds` rounds of them are in the model, all of them set.
    pub fn offset(&self, rounds: usize) -> u128 {
        let scale = self.scale as u128;
        self.instances as u128 * scale * scale * rounds as u128
    }

    /// Split `objective`, reached with `rounds` rounds of indicators in the model, into edges and shared links.
    pub fn decode(&self, objective: f64, rounds: usize) -> Decoded {
        let total = objective.round().max(0.0) as u128;
        let rest = total.saturating_sub(self.offset(rounds));
        let scale = self.scale as u128;

        Decoded { edges: (rest / scale) as usize, common: (rest % scale) as usize }
    }

    /// Upper bound on the summed chain length behind `decoded`.
    pub fn length(&self, decoded: Decoded) -> usize {
        decoded.edges.saturating_sub(2 * self.instances)
    }
}

/// Outcome of a [`MultiTrailSolver`] search.
#[derive(Clone, Debug)]
pub struct MultiTrailSearch {
    /// Longest connected chain found per problem, in input order.
    pub best: Vec<EdgeMultiset>,
    /// Links every chain uses, with the least number of times any of them uses it.
    pub common: BTreeMap<EdgeLabel, usize>,
    /// How the search ended.
    pub status: SearchStatus,
    /// Rounds solved.
    pub iterations: usize,
    /// Upper bound on the summed chain length after each round.
    pub bounds: Vec<usize>,
}

impl MultiTrailSearch {
    /// Summed length of every chain.
    pub fn len(&self) -> usize {
        self.best.iter().map(EdgeMultiset::len).sum()
    }

    /// Whether every chain is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of link uses shared by every chain.
    pub fn common_count(&self) -> usize {
        self.common.values().sum()
    }

    /// Links chain `i` uses more often than chain `j`, with the excess.
    pub fn difference(&self, i: usize, j: usize) -> Option<EdgeMultiset> {
        let (a, b) = (self.best.get(i)?, self.best.get(j)?);
        Some(a.difference(b).iter().filter(|(edge, _)| !edge.is_dummy()).collect())
    }
}

/// Joint longest-chain search over several problems, preferring shared links among equally long solutions.
pub struct MultiTrailSolver<'a> {
    problems: &'a [Problem],
    config: SolverConfig,
}

impl<'a> From<&'a [Problem]> for MultiTrailSolver<'a> {
    fn from(problems: &'a [Problem]) -> Self {
        Self { problems, config: SolverConfig::default() }
    }
}

fn common_key(label: EdgeLabel) -> String {
    format!("common_{}", Edge::from(label).key())
}

// labels present in every problem
fn common_links(problems: &[Problem]) -> BTreeSet<EdgeLabel> {
    let mut problems = problems.iter();
    let Some(first) = problems.next() else { return BTreeSet::new() };

    problems.fold(first.links().keys().copied().collect::<BTreeSet<_>>(), |shared, problem| {
        shared.into_iter().filter(|label| problem.links().contains_key(label)).collect()
    })
}

// uses of each shared link common to every chain
fn common_uses(best: &[EdgeMultiset], shared: &BTreeSet<EdgeLabel>) -> BTreeMap<EdgeLabel, usize> {
    shared.iter()
        .filter_map(|label| {
            let edge = Edge::from(*label);
            let least = best.iter().map(|chain| chain.count(edge)).min().unwrap_or(0);
            (least > 0).then_some((*label, least))
        })
        .collect()
}

// summed length, then shared link uses; incumbents are compared on this
fn tiers(best: &[EdgeMultiset], shared: &BTreeSet<EdgeLabel>) -> (usize, usize) {
    let length = best.iter().map(EdgeMultiset::len).sum();
    (length, common_uses(best, shared).values().sum())
}

impl MultiTrailSolver<'_> {
    /// Replace the resource ceilings.
    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the search with [`MicroLpSolver`].
    pub fn solve(&self) -> Result<MultiTrailSearch, SolverError> {
        self.solve_with(&MicroLpSolver)
    }

    /// Run the search with `backend`.
    pub fn solve_with<S: MilpSolver + ?Sized>(&self, backend: &S) -> Result<MultiTrailSearch, SolverError> {
        let mut search = MultiTrailSearch {
            best: vec![EdgeMultiset::new(); self.problems.len()],
            common: BTreeMap::new(),
            status: SearchStatus::Inconclusive,
            iterations: 0,
            bounds: Vec::new(),
        };

        // problems without links have nothing to model and are trivially done
        let instances = self.problems.iter()
            .enumerate()
            .filter(|(_, problem)| !problem.is_empty())
            .map(|(index, problem)| (index, InstanceModel::new(problem, format!("i{index}/"))))
            .collect_vec();
        if instances.is_empty() {
            search.status = SearchStatus::Connected;
            return Ok(search);
        }

        let words = self.problems.iter().map(Problem::total_capacity).sum();
        let scale = ObjectiveScale::new(instances.len(), words);
        let mut model = ConstraintModel::new();
        for (_, instance) in &instances {
            instance.populate(&mut model, scale.edge_weight());
        }

        let shared = match self.problems.len() {
            0 | 1 => BTreeSet::new(),
            _ => common_links(self.problems),
        };
        for label in &shared {
            let common = common_key(*label);
            model.add_variable(&common, Bounds::at_least(0.0));
            model.add_objective(&common, scale.common_weight());
            for (_, instance) in &instances {
                let row = instance.name(&common);
                model.add_constraint(&row, Bounds::at_most(0.0));
                model.add_coefficient(&row, &common, 1.0);
                model.add_coefficient(&row, instance.edge_var(Edge::from(*label)), -1.0);
            }
        }
        info!("searching {} problems jointly ({} modeled, {} shared links) with {}",
            self.problems.len(), instances.len(), shared.len(), backend.name());

        let started = Instant::now();
        let mut rounds = 0;
        loop {
            if !self.config.allows(search.iterations, started) {
                warn!("stopping after {} rounds with total length {} unproven", search.iterations, search.len());
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

            let decoded = scale.decode(solution.objective, rounds);
            let bound = scale.length(decoded);
            search.bounds.push(bound);

            let reached = instances.iter()
                .map(|(_, instance)| {
                    let usage = instance.usage(&matrix, &solution);
                    let component = usage.reachable_component();
                    let connected = component.edges.len() == usage.len();
                    (usage, component, connected)
                })
                .collect_vec();
            debug!("round {}: bound {} ({} shared), best {}, {} of {} connected",
                search.iterations, bound, decoded.common, search.len(),
                reached.iter().filter(|(_, _, connected)| *connected).count(), instances.len());

            if reached.iter().all(|(_, _, connected)| *connected) {
                for ((index, _), (usage, _, _)) in instances.iter().zip(reached) {
                    search.best[*index] = usage;
                }
                search.status = SearchStatus::Connected;
                break;
            }

            let mut cuts = Vec::new();
            for ((index, instance), (_, component, connected)) in instances.iter().zip(reached) {
                let mut candidate = search.best.clone();
                candidate[*index] = component.edges.clone();
                if tiers(&candidate, &shared) > tiers(&search.best, &shared) {
                    search.best = candidate;
                }
                if !connected {
                    cuts.push((instance, cut_around(instance.problem, &component.vertices)));
                }
            }

            // nothing left to gain once neither the length nor the shared uses can improve
            if (bound, decoded.common) <= tiers(&search.best, &shared) {
                search.status = SearchStatus::Bounded;
                break;
            }
            if cuts.iter().any(|(_, cut)| cut.is_none()) {
                warn!("round {} left edges unreached but found nothing to cut", search.iterations);
                search.status = SearchStatus::Inconclusive;
                break;
            }

            // every instance gets an indicator each round so the offset stays predictable
            for (_, instance) in &instances {
                let indicator = instance.name(&format!("connected_{rounds}"));
                model.add_variable(&indicator, Bounds::between(0.0, 1.0));
                model.add_objective(&indicator, scale.indicator_weight());
            }
            for (instance, cut) in cuts {
                if let Some(cut) = cut {
                    trace!("cutting {} edges inside {}", cut.inside.len(), instance.name(""));
                    let indicator = instance.name(&format!("connected_{rounds}"));
                    instance.add_cut(&mut model, &format!("cut_{rounds}"), &cut, Some(indicator.as_str()));
                }
            }
            rounds += 1;
        }

        search.common = common_uses(&search.best, &shared);

        info!("total length {} with {} shared links after {} rounds ({})",
            search.len(), search.common_count(), search.iterations, <&str>::from(&search.status));
        Ok(search)
    }
}

#[cfg(test)]
mod tests {
    use super::{Decoded, ObjectiveScale};

    #[test]
    fn weights_follow_scale() {
        // 2 instances, 9 words: M = 10
        let scale = ObjectiveScale::new(2, 9);
        assert_eq!(scale.edge_weight(), 10.0);
        assert_eq!(scale.common_weight(), 1.0);
        assert_eq!(scale.indicator_weight(), 100.0);
        assert_eq!(scale.offset(0), 0);
        assert_eq!(scale.offset(3), 600);
    }

    #[test]
    fn decode_splits_tiers() {
        let scale = ObjectiveScale::new(2, 9);
        // 3 rounds of 2 indicators, 11 edges, 4 shared
        assert_eq!(scale.decode(600.0 + 110.0 + 4.0, 3), Decoded { edges: 11, common: 4 });
        assert_eq!(scale.length(Decoded { edges: 11, common: 4 }), 7);
        assert_eq!(scale.decode(114.0, 0), Decoded { edges: 11, common: 4 });
        // solver noise rounds away
        assert_eq!(scale.decode(713.9999996, 3), Decoded { edges: 11, common: 4 });
    }

    #[test]
    fn decode_without_rounds_or_shared_links() {
        let scale = ObjectiveScale::new(1, 4);
        assert_eq!(scale.decode(30.0, 0), Decoded { edges: 6, common: 0 });
        assert_eq!(scale.length(scale.decode(30.0, 0)), 4);
    }
}
