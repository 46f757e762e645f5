#![warn(missing_docs)]

//! # `shiritori`
//!
//! A solver for the longest possible game of [shiritori](https://en.wikipedia.org/wiki/Shiritori): given a word list,
//! chain as many words as possible so that each word starts with the character the previous one ends with, using no
//! word twice.
//! Begin by building a [`Problem`] with a [`ProblemBuilder`](builder::ProblemBuilder) or [`Problem::from_words`], then
//! call [`solve()`](Problem::solve) to get the chain, in order, with words picked for each of its links.
//! Several word lists can be solved together with [`solve_all`], which among equally long results prefers chains that
//! share links with each other.
//!
//! Characters are compared after [normalization](character::normalize): letters are lowercased, voiced kana lose their
//! marks and small kana count as their full-size form. A word ending in the long vowel mark `ー` chains from the
//! character before it.
//!
//! # Internals
//! Words are grouped by their first and last character, so a word list becomes a directed multigraph with one vertex
//! per character. Each group of words sharing both ends is a single edge whose capacity is the size of the group.
//! A chain is then a trail through this graph, and the longest chain is the longest trail.
//!
//! A high level overview is as follows:
//!
//! Add a source and a sink vertex, with an edge from the source to every character and from every character to the
//! sink. Express the problem as an integer program over edge usage:
//! 1. At every character, as many edges are used going in as going out.
//! One edge leaves the source and one edge enters the sink.
//! 2. Each edge is used at most its capacity times. Maximize the number of edges used.
//!
//! A solution to this program is a walk from the source to the sink, but possibly also some closed loops that the walk
//! never touches. If the solution is connected, it is a longest chain. Otherwise, the characters the walk does not
//! reach are cut off: a constraint is added which forces at least one unit of flow into them whenever any edge among
//! them is used, and the program is solved again. The optimum only ever goes down, and the search stops as soon as it
//! is connected or no longer beats the longest connected walk found so far.
//!
//! The resulting edge usage is ordered into an actual chain by peeling cycles off until only a simple walk from source
//! to sink remains, then splicing the cycles back into it.
//!
//! The numeric solve is done through [`MilpSolver`](milp::MilpSolver); [`MicroLpSolver`](milp::MicroLpSolver) is used by
//! default.

pub use problem::{solve_all, EdgeLabel, Problem, Shiritori};

mod tests;
pub mod assign;
pub mod builder;
pub mod character;
pub mod config;
pub mod flow;
pub mod milp;
pub mod model;
pub mod multi;
pub mod problem;
pub mod solver;
pub mod trail;
