use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use itertools::Itertools;
use log::trace;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;

use crate::milp::MilpSolution;
use crate::model::{Bounds, ConstraintModel, ModelMatrix};
use crate::problem::{EdgeLabel, Problem};

/// A vertex of the word graph: a normalized character, or one of the two sentinels bounding every trail.
///
/// Sentinels are their own variants, so no input character can ever be mistaken for one.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Vertex {
    /// Dummy origin; exactly one unit of flow leaves it.
    Source,
    /// A real character words start or end with.
    Char(char),
    /// Dummy destination; exactly one unit of flow enters it.
    Sink,
}

impl Vertex {
    /// The character of a real vertex.
    pub fn char(&self) -> Option<char> {
        match self {
            Vertex::Char(ch) => Some(*ch),
            _ => None,
        }
    }

    /// Whether this is [`Source`](Vertex::Source) or [`Sink`](Vertex::Sink).
    pub fn is_dummy(&self) -> bool {
        self.char().is_none()
    }

    // unambiguous name fragment for model variables and constraints
    pub(crate) fn key(&self) -> String {
        match self {
            Vertex::Source => "^".to_string(),
            Vertex::Char(ch) => format!("{ch:?}"),
            Vertex::Sink => "$".to_string(),
        }
    }
}

impl Display for Vertex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Vertex::Source => write!(f, "^"),
            Vertex::Char(ch) => write!(f, "{ch}"),
            Vertex::Sink => write!(f, "$"),
        }
    }
}

/// A directed edge between two vertices. Real edges correspond to an [`EdgeLabel`]; the rest touch a sentinel.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Edge {
    /// Tail of the edge.
    pub from: Vertex,
    /// Head of the edge.
    pub to: Vertex,
}

impl Edge {
    /// Construct an edge from `from` to `to`.
    pub fn new(from: Vertex, to: Vertex) -> Self {
        Self { from, to }
    }

    /// The word label of a real edge, or [`None`] for an edge touching a sentinel.
    pub fn label(&self) -> Option<EdgeLabel> {
        match (self.from, self.to) {
            (Vertex::Char(start), Vertex::Char(end)) => Some(EdgeLabel::new(start, end)),
            _ => None,
        }
    }

    /// Whether this edge touches [`Source`](Vertex::Source) or [`Sink`](Vertex::Sink).
    pub fn is_dummy(&self) -> bool {
        self.from.is_dummy() || self.to.is_dummy()
    }

    pub(crate) fn key(&self) -> String {
        format!("edge_{}_{}", self.from.key(), self.to.key())
    }
}

impl From<EdgeLabel> for Edge {
    fn from(label: EdgeLabel) -> Self {
        Self::new(Vertex::Char(label.start), Vertex::Char(label.end))
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)
    }
}

/// How many times each edge is used by a flow. Edges with zero usage are never stored.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EdgeMultiset {
    counts: BTreeMap<Edge, usize>,
}

/// The part of a flow reachable from [`Vertex::Source`] along used edges.
#[derive(Clone, Debug, Default)]
pub struct Component {
    /// Every used edge leaving a reached vertex.
    pub edges: EdgeMultiset,
    /// Every reached vertex, sentinels included.
    pub vertices: BTreeSet<Vertex>,
}

impl EdgeMultiset {
    /// An empty multiset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `edge` `count` more times.
    pub fn add(&mut self, edge: Edge, count: usize) {
        if count > 0 {
            *self.counts.entry(edge).or_default() += count;
        }
    }

    /// Drop one use of `edge`, returning whether there was one to drop.
    pub fn remove_one(&mut self, edge: Edge) -> bool {
        match self.counts.get_mut(&edge) {
            None => false,
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&edge);
                }
                true
            }
        }
    }

    /// How many times `edge` is used.
    pub fn count(&self, edge: Edge) -> usize {
        self.counts.get(&edge).copied().unwrap_or(0)
    }

    /// Chain length: total usage of real edges, sentinel edges excluded.
    pub fn len(&self) -> usize {
        self.counts.iter()
            .filter(|(edge, _)| !edge.is_dummy())
            .map(|(_, count)| count)
            .sum()
    }

    /// Total usage of every edge, sentinel edges included.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Whether no edge at all is used.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Every used edge with its usage, in edge order.
    pub fn iter(&self) -> impl Iterator<Item = (Edge, usize)> + '_ {
        self.counts.iter().map(|(edge, count)| (*edge, *count))
    }

    /// Every used real edge as a word label with its usage.
    pub fn labels(&self) -> impl Iterator<Item = (EdgeLabel, usize)> + '_ {
        self.counts.iter().filter_map(|(edge, count)| edge.label().map(|label| (label, *count)))
    }

    /// Summed usage of edges leaving `vertex`.
    pub fn out_degree(&self, vertex: Vertex) -> usize {
        self.counts.iter()
            .filter(|(edge, _)| edge.from == vertex)
            .map(|(_, count)| count)
            .sum()
    }

    /// Summed usage of edges entering `vertex`.
    pub fn in_degree(&self, vertex: Vertex) -> usize {
        self.counts.iter()
            .filter(|(edge, _)| edge.to == vertex)
            .map(|(_, count)| count)
            .sum()
    }

    /// Every vertex touched by a used edge.
    pub fn vertices(&self) -> BTreeSet<Vertex> {
        self.counts.keys().flat_map(|edge| [edge.from, edge.to]).collect()
    }

    /// Check flow conservation: every real vertex has equal in- and out-degree, one unit leaves
    /// [`Source`](Vertex::Source) and one unit enters [`Sink`](Vertex::Sink).
    pub fn is_balanced(&self) -> bool {
        self.out_degree(Vertex::Source) == 1
            && self.in_degree(Vertex::Source) == 0
            && self.in_degree(Vertex::Sink) == 1
            && self.out_degree(Vertex::Sink) == 0
            && self.vertices().into_iter()
            .filter(|vertex| !vertex.is_dummy())
            .all(|vertex| self.in_degree(vertex) == self.out_degree(vertex))
    }

    /// Multiset difference: usage in `self` beyond the usage in `other`.
    pub fn difference(&self, other: &EdgeMultiset) -> EdgeMultiset {
        self.iter()
            .map(|(edge, count)| (edge, count.saturating_sub(other.count(edge))))
            .collect()
    }

    /// Walk used edges depth-first from [`Source`](Vertex::Source) and collect what is reached.
    pub fn reachable_component(&self) -> Component {
        let graph: DiGraphMap<Vertex, usize> = DiGraphMap::from_edges(
            self.counts.iter().map(|(edge, count)| (edge.from, edge.to, *count))
        );

        let mut component = Component::default();
        if !graph.contains_node(Vertex::Source) {
            return component;
        }

        let mut dfs = Dfs::new(&graph, Vertex::Source);
        while let Some(vertex) = dfs.next(&graph) {
            component.vertices.insert(vertex);
            for (from, to, count) in graph.edges(vertex) {
                component.edges.add(Edge::new(from, to), *count);
            }
        }

        component
    }
}

impl FromIterator<(Edge, usize)> for EdgeMultiset {
    fn from_iter<T: IntoIterator<Item = (Edge, usize)>>(iter: T) -> Self {
        let mut multiset = EdgeMultiset::new();
        iter.into_iter().for_each(|(edge, count)| multiset.add(edge, count));
        multiset
    }
}

impl FromIterator<EdgeLabel> for EdgeMultiset {
    /// Build the balanced multiset of a chain given as consecutive labels, sentinel edges added at both ends.
    fn from_iter<T: IntoIterator<Item = EdgeLabel>>(iter: T) -> Self {
        let labels = iter.into_iter().collect_vec();
        let mut multiset = EdgeMultiset::new();
        if let (Some(first), Some(last)) = (labels.first(), labels.last()) {
            multiset.add(Edge::new(Vertex::Source, Vertex::Char(first.start)), 1);
            multiset.add(Edge::new(Vertex::Char(last.end), Vertex::Sink), 1);
        }
        labels.into_iter().for_each(|label| multiset.add(label.into(), 1));
        multiset
    }
}

/// Edges on either side of the boundary between the vertices reached from the source and the rest.
#[derive(Clone, Debug)]
pub(crate) struct Cut {
    /// Real edges with exactly one unreached endpoint, plus source edges into unreached vertices.
    pub(crate) crossing: Vec<Edge>,
    /// Real edges with both endpoints unreached.
    pub(crate) inside: Vec<Edge>,
    /// Summed capacity of `inside`.
    pub(crate) capacity: usize,
}

/// The cut separating `reached` from the remaining real vertices of `problem`, or [`None`] if nothing could be
/// used outside `reached`.
///
/// A longest chain may leave the unreached side entirely unused, so the cut only demands crossing flow in proportion
/// to what is used inside it.
pub(crate) fn cut_around(problem: &Problem, reached: &BTreeSet<Vertex>) -> Option<Cut> {
    let unreached = problem.nodes().iter()
        .copied()
        .filter(|ch| !reached.contains(&Vertex::Char(*ch)))
        .collect::<BTreeSet<char>>();

    let mut cut = Cut { crossing: Vec::new(), inside: Vec::new(), capacity: 0 };
    for (label, words) in problem.links() {
        match (unreached.contains(&label.start), unreached.contains(&label.end)) {
            (true, true) => {
                cut.inside.push(Edge::from(*label));
                cut.capacity += words.len();
            }
            (false, false) => {}
            _ => cut.crossing.push(Edge::from(*label)),
        }
    }
    // entering the unreached side straight from the source counts as crossing too
    cut.crossing.extend(unreached.iter().map(|ch| Edge::new(Vertex::Source, Vertex::Char(*ch))));

    trace!("cut around {} reached vertices: {} crossing, {} inside, capacity {}",
        reached.len(), cut.crossing.len(), cut.inside.len(), cut.capacity);

    match cut.capacity {
        0 => None,
        _ => Some(cut),
    }
}

/// One problem's share of a [`ConstraintModel`], every name carrying `prefix`.
pub(crate) struct InstanceModel<'a> {
    pub(crate) problem: &'a Problem,
    prefix: String,
}

impl<'a> InstanceModel<'a> {
    pub(crate) fn new(problem: &'a Problem, prefix: impl Into<String>) -> Self {
        Self { problem, prefix: prefix.into() }
    }

    pub(crate) fn name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub(crate) fn edge_var(&self, edge: Edge) -> String {
        self.name(&edge.key())
    }

    fn degree_row(&self, vertex: Vertex) -> String {
        self.name(&format!("degree_{}", vertex.key()))
    }

    /// Every edge the flow may use, with its capacity bounds: one per link, and sentinel edges to and from every
    /// real vertex.
    pub(crate) fn edges(&self) -> Vec<(Edge, Bounds)> {
        let links = self.problem.links().iter()
            .map(|(label, words)| (Edge::from(*label), Bounds::between(0.0, words.len() as f64)));
        let dummies = self.problem.nodes().iter()
            .flat_map(|ch| [
                Edge::new(Vertex::Source, Vertex::Char(*ch)),
                Edge::new(Vertex::Char(*ch), Vertex::Sink),
            ])
            .map(|edge| (edge, Bounds::between(0.0, 1.0)));

        links.chain(dummies).collect_vec()
    }

    /// Declare degree constraints and edge variables, each edge weighing `weight` in the objective.
    ///
    /// Every vertex gets one constraint on out-degree minus in-degree: 0 for real vertices, 1 for the source and
    /// -1 for the sink.
    pub(crate) fn populate(&self, model: &mut ConstraintModel, weight: f64) {
        for ch in self.problem.nodes() {
            model.add_constraint(self.degree_row(Vertex::Char(*ch)), Bounds::fixed(0.0));
        }
        model.add_constraint(self.degree_row(Vertex::Source), Bounds::fixed(1.0));
        model.add_constraint(self.degree_row(Vertex::Sink), Bounds::fixed(-1.0));

        for (edge, bounds) in self.edges() {
            let var = self.edge_var(edge);
            model.add_variable(&var, bounds);
            // self-loops cancel out here
            model.add_coefficient(self.degree_row(edge.from), &var, 1.0);
            model.add_coefficient(self.degree_row(edge.to), &var, -1.0);
            model.add_objective(&var, weight);
        }
    }

    /// Require flow across `cut` whenever anything inside it is used.
    ///
    /// Without `indicator` this is `capacity * crossing - inside >= 0`. With one, the row becomes
    /// `capacity * crossing - inside - capacity * indicator >= -capacity`, enforced only while the indicator is 1.
    pub(crate) fn add_cut(&self, model: &mut ConstraintModel, row: &str, cut: &Cut, indicator: Option<&str>) {
        let capacity = cut.capacity as f64;
        let row = self.name(row);

        match indicator {
            None => {
                model.add_constraint(&row, Bounds::at_least(0.0));
            }
            Some(indicator) => {
                model.add_constraint(&row, Bounds::at_least(-capacity));
                model.add_coefficient(&row, indicator, -capacity);
            }
        }
        for edge in &cut.crossing {
            model.add_coefficient(&row, self.edge_var(*edge), capacity);
        }
        for edge in &cut.inside {
            model.add_coefficient(&row, self.edge_var(*edge), -1.0);
        }
    }

    /// Read this instance's edge usage out of a solution.
    pub(crate) fn usage(&self, matrix: &ModelMatrix, solution: &MilpSolution) -> EdgeMultiset {
        self.edges().into_iter()
            .filter_map(|(edge, _)| {
                solution.value(matrix, &self.edge_var(edge))
                    .map(|value| (edge, value.round().max(0.0) as usize))
            })
            .collect()
    }
}
