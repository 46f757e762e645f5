use std::collections::{BTreeSet, VecDeque};

use itertools::Itertools;
use log::trace;
use thiserror::Error;

use crate::flow::{Edge, EdgeMultiset, Vertex};
use crate::problem::EdgeLabel;

/// Reasons a [`TrailReconstructor`] may fail. Any of these means the edge usage given was not a single connected
/// chain.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ReconstructionError {
    /// Some vertex has unequal in- and out-degree, or the sentinels do not carry exactly one unit.
    #[error("edge usage is not a balanced flow")]
    Unbalanced,
    /// The walk from the source got stuck before reaching the sink.
    #[error("walk from the source stops at {vertex}")]
    DeadEnd {
        /// Where the walk got stuck.
        vertex: Vertex,
    },
    /// Edges left over after the main walk do not close into a cycle.
    #[error("leftover edges through {vertex} do not close")]
    OpenCycle {
        /// Where the leftover walk got stuck.
        vertex: Vertex,
    },
    /// Cycles that share no vertex with the chain.
    #[error("{count} cycles are not reachable from the chain")]
    UnsplicedCycles {
        /// How many cycles were left.
        count: usize,
    },
}

/// One chain in order, with the pieces it was assembled from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Trail {
    /// Every link of the chain, in order.
    pub path: Vec<EdgeLabel>,
    /// The links of the chain that lie on no extracted cycle, in order.
    pub noncycle_path: Vec<EdgeLabel>,
    /// Cycles spliced into `noncycle_path` to form `path`, in the order they were found.
    pub cycles: Vec<Vec<EdgeLabel>>,
}

impl Trail {
    /// Edge usage of the chain, sentinel edges included.
    pub fn multiset(&self) -> EdgeMultiset {
        self.path.iter().copied().collect()
    }
}

/// Orders a balanced, connected [`EdgeMultiset`] into a [`Trail`]. Use [`Self::reconstruct`] to run it.
///
/// Cycles are peeled off wherever a vertex still has more than one way out, leaving a simple walk from the source to
/// the sink. The walk is then replayed and each cycle is inserted at the first vertex it shares with what has been
/// walked so far.
pub struct TrailReconstructor {
    remaining: EdgeMultiset,
    cycles: Vec<Vec<Edge>>,
}

impl From<&EdgeMultiset> for TrailReconstructor {
    fn from(multiset: &EdgeMultiset) -> Self {
        Self { remaining: multiset.clone(), cycles: Vec::new() }
    }
}

impl TrailReconstructor {
    /// Consume the reconstructor and assemble its edges into a [`Trail`].
    pub fn reconstruct(mut self) -> Result<Trail, ReconstructionError> {
        if self.remaining.is_empty() {
            return Ok(Trail::default());
        }
        if !self.remaining.is_balanced() {
            return Err(ReconstructionError::Unbalanced);
        }

        while let Some(branching) = self.branching_vertex() {
            // a balanced vertex with two ways out always lies on a cycle
            let Some(cycle) = self.find_cycle(branching) else { break };
            self.take_cycle(cycle);
        }

        let path = self.walk_from_source()?;
        self.close_leftovers()?;
        let cycles = self.cycles.iter()
            .map(|cycle| cycle.iter().filter_map(Edge::label).collect_vec())
            .collect_vec();
        let full = self.splice(&path)?;

        Ok(Trail {
            path: full.iter().filter_map(Edge::label).collect_vec(),
            noncycle_path: path.iter().filter_map(Edge::label).collect_vec(),
            cycles,
        })
    }

    fn successors(&self, vertex: Vertex) -> Vec<Vertex> {
        self.remaining.iter()
            .filter(|(edge, _)| edge.from == vertex)
            .map(|(edge, _)| edge.to)
            .collect_vec()
    }

    // smallest vertex still having more than one way out
    fn branching_vertex(&self) -> Option<Vertex> {
        self.remaining.vertices().into_iter().find(|vertex| self.remaining.out_degree(*vertex) > 1)
    }

    /// Depth-first search from `start` for a closed walk back onto the current walk, without repeating vertices.
    fn find_cycle(&self, start: Vertex) -> Option<Vec<Edge>> {
        // frame: vertex with the successors not yet tried from it
        let mut stack: Vec<(Vertex, Vec<Vertex>)> = vec![(start, self.successors(start))];
        let mut on_stack = BTreeSet::from([start]);
        let mut finished = BTreeSet::new();

        while let Some((vertex, untried)) = stack.last_mut() {
            let vertex = *vertex;
            match untried.pop() {
                None => {
                    stack.pop();
                    on_stack.remove(&vertex);
                    finished.insert(vertex);
                }
                Some(next) if on_stack.contains(&next) => {
                    let walk = stack.iter()
                        .map(|(vertex, _)| *vertex)
                        .skip_while(|vertex| *vertex != next)
                        .chain([next])
                        .collect_vec();
                    return Some(walk.into_iter().tuple_windows().map(|(from, to)| Edge::new(from, to)).collect_vec());
                }
                Some(next) if finished.contains(&next) => {}
                Some(next) => {
                    on_stack.insert(next);
                    stack.push((next, self.successors(next)));
                }
            }
        }

        None
    }

    fn take_cycle(&mut self, cycle: Vec<Edge>) {
        trace!("cycle {}", cycle.iter().join(" "));
        for edge in &cycle {
            self.remaining.remove_one(*edge);
        }
        self.cycles.push(cycle);
    }

    fn walk_from_source(&mut self) -> Result<Vec<Edge>, ReconstructionError> {
        let mut path = Vec::new();
        let mut vertex = Vertex::Source;
        while vertex != Vertex::Sink {
            let edge = match self.successors(vertex).first() {
                Some(next) => Edge::new(vertex, *next),
                None => return Err(ReconstructionError::DeadEnd { vertex }),
            };
            self.remaining.remove_one(edge);
            path.push(edge);
            vertex = edge.to;
        }

        Ok(path)
    }

    // whatever the walk left behind is a set of disjoint simple cycles
    fn close_leftovers(&mut self) -> Result<(), ReconstructionError> {
        loop {
            let Some(start) = self.remaining.iter().next().map(|(edge, _)| edge.from) else { break };
            let mut cycle = Vec::new();
            let mut vertex = start;
            loop {
                let edge = match self.successors(vertex).first() {
                    Some(next) => Edge::new(vertex, *next),
                    None => return Err(ReconstructionError::OpenCycle { vertex }),
                };
                self.remaining.remove_one(edge);
                cycle.push(edge);
                vertex = edge.to;
                if vertex == start {
                    break;
                }
            }
            trace!("leftover cycle {}", cycle.iter().join(" "));
            self.cycles.push(cycle);
        }

        Ok(())
    }

    fn splice(&self, path: &[Edge]) -> Result<Vec<Edge>, ReconstructionError> {
        let mut pending = self.cycles.iter().map(Some).collect_vec();
        let mut queue: VecDeque<Edge> = path.iter().copied().collect();
        let mut full = Vec::with_capacity(self.cycles.iter().map(Vec::len).sum::<usize>() + path.len());

        while let Some(edge) = queue.pop_front() {
            full.push(edge);

            let mut inserted = Vec::new();
            for slot in pending.iter_mut() {
                let Some(cycle) = *slot else { continue };
                if let Some(position) = cycle.iter().position(|step| step.from == edge.to) {
                    inserted.extend(cycle[position..].iter().chain(&cycle[..position]).copied());
                    *slot = None;
                }
            }
            for step in inserted.into_iter().rev() {
                queue.push_front(step);
            }
        }

        match pending.iter().filter(|slot| slot.is_some()).count() {
            0 => Ok(full),
            count => Err(ReconstructionError::UnsplicedCycles { count }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::flow::{Edge, EdgeMultiset, Vertex};
    use crate::problem::EdgeLabel;

    use super::{ReconstructionError, TrailReconstructor};

    fn labels(pairs: &[(char, char)]) -> Vec<EdgeLabel> {
        pairs.iter().map(|(start, end)| EdgeLabel::new(*start, *end)).collect()
    }

    fn is_chain(path: &[EdgeLabel]) -> bool {
        path.windows(2).all(|pair| pair[0].end == pair[1].start)
    }

    #[test]
    fn splices_cycles_into_path() {
        // a→x→a with a detour x→b→x and a self-loop at b
        let multiset: EdgeMultiset = labels(&[('a', 'x'), ('x', 'b'), ('b', 'b'), ('b', 'x'), ('x', 'a')]).into_iter().collect();
        let trail = TrailReconstructor::from(&multiset).reconstruct().unwrap();

        assert_eq!(trail.path.len(), 5);
        assert_eq!(trail.path[0], EdgeLabel::new('a', 'x'));
        assert!(is_chain(&trail.path));
        assert_eq!(trail.multiset(), multiset);
        assert!(!trail.cycles.is_empty());
        assert!(trail.noncycle_path.len() < trail.path.len());
    }

    #[test]
    fn empty_multiset_is_empty_trail() {
        let trail = TrailReconstructor::from(&EdgeMultiset::new()).reconstruct().unwrap();
        assert!(trail.path.is_empty());
        assert!(trail.cycles.is_empty());
    }

    #[test]
    fn detached_cycle_fails() {
        let mut multiset: EdgeMultiset = labels(&[('a', 'b')]).into_iter().collect();
        multiset.add(Edge::from(EdgeLabel::new('x', 'y')), 1);
        multiset.add(Edge::from(EdgeLabel::new('y', 'x')), 1);

        assert_eq!(TrailReconstructor::from(&multiset).reconstruct(), Err(ReconstructionError::UnsplicedCycles { count: 1 }));
    }

    #[test]
    fn unbalanced_fails() {
        let mut multiset: EdgeMultiset = labels(&[('a', 'b')]).into_iter().collect();
        multiset.add(Edge::new(Vertex::Char('b'), Vertex::Char('c')), 1);

        assert_eq!(TrailReconstructor::from(&multiset).reconstruct(), Err(ReconstructionError::Unbalanced));
    }

    #[test]
    fn reconstruction_is_idempotent() {
        let multiset: EdgeMultiset = labels(&[('a', 'b'), ('b', 'a'), ('a', 'c'), ('c', 'a'), ('a', 'b')]).into_iter().collect();
        let once = TrailReconstructor::from(&multiset).reconstruct().unwrap();
        let twice = TrailReconstructor::from(&once.multiset()).reconstruct().unwrap();

        assert!(is_chain(&once.path));
        assert_eq!(once.path.len(), 5);
        assert_eq!(twice.multiset(), once.multiset());
        assert_eq!(twice.path.len(), once.path.len());
    }
}
