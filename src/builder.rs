use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use log::trace;

use crate::character::word_ends;
use crate::problem::{EdgeLabel, Problem};

/// Reasons a builder may become invalid while building.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BuilderInvalidReason {
    /// The word at `index` (counting every word ever added) is empty and so has no first character to chain from.
    EmptyWord {
        /// Position of the offending word.
        index: usize,
    },
}

/// Collects words and turns them into a [`Problem`].
///
/// Builders mutate themselves while building but can be [`Clone`]d to save their state at some point.
/// Words are kept in the order given; a word repeated under the same start and end characters is only counted once.
#[derive(Clone, Debug, Default)]
pub struct ProblemBuilder {
    words: Vec<String>,
    added: usize,
    invalid_reasons: Vec<BuilderInvalidReason>,
}

impl ProblemBuilder {
    /// A builder with no words.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single word.
    ///
    /// May cause the builder to enter an [`EmptyWord`](BuilderInvalidReason::EmptyWord) invalid state if `word` is
    /// empty. If the builder is already in an invalid state, this function does nothing.
    pub fn add_word(&mut self, word: impl Into<String>) -> &mut Self {
        if !self.invalid_reasons.is_empty() {
            return self;
        }

        let word = word.into();
        let index = self.added;
        self.added += 1;
        if word.is_empty() {
            self.invalid_reasons.push(BuilderInvalidReason::EmptyWord { index });
            return self;
        }

        self.words.push(word);
        self
    }

    /// Shorthand for multiple calls to [`Self::add_word`], with the same conditions.
    pub fn add_words<I, S>(&mut self, words: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for word in words {
            self.add_word(word);
        }

        self
    }

    /// Remove the most recently added word.
    ///
    /// If the builder is in an invalid state or holds no words, this function does nothing.
    pub fn pop_word(&mut self) -> &mut Self {
        if !self.invalid_reasons.is_empty() {
            return self;
        }

        if self.words.pop().is_some() {
            self.added -= 1;
        }
        self
    }

    /// Check the validity of this builder, ensuring no [`BuilderInvalidReason`] condition has arisen.
    ///
    /// Returns `None` if the builder is valid, `Some(&Vec<BuilderInvalidReason>)` otherwise.
    pub fn is_valid(&self) -> Option<&Vec<BuilderInvalidReason>> {
        if self.invalid_reasons.is_empty() {
            None
        } else {
            Some(&self.invalid_reasons)
        }
    }

    /// Convert the state of this builder into a [`Problem`].
    /// If the builder is invalid for any reason, a reference to a [`Vec`] of [`BuilderInvalidReason`] will indicate why.
    pub fn build(&self) -> Result<Problem, &Vec<BuilderInvalidReason>> {
        if !self.invalid_reasons.is_empty() {
            return Err(&self.invalid_reasons);
        }

        let mut nodes = BTreeSet::new();
        let mut links: BTreeMap<EdgeLabel, Vec<String>> = BTreeMap::new();
        for word in &self.words {
            // empty words never get this far
            let Some((start, end)) = word_ends(word) else { continue };
            nodes.insert(start);
            nodes.insert(end);

            let candidates = links.entry(EdgeLabel::new(start, end)).or_default();
            if !candidates.contains(word) {
                candidates.push(word.clone());
            }
        }

        trace!("built problem of {} words over {} characters and {} links", self.words.len(), nodes.len(), links.len());

        Ok(Problem {
            words: self.words.clone(),
            nodes: nodes.into_iter().collect_vec(),
            links,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::problem::EdgeLabel;

    use super::{BuilderInvalidReason, ProblemBuilder};

    #[test]
    fn groups_words_by_ends() {
        let problem = ProblemBuilder::new()
            .add_words(["ab1", "ab2", "ab1", "ba", "ばあ"])
            .build()
            .unwrap();

        assert_eq!(problem.words().len(), 5);
        assert_eq!(problem.nodes(), &['1', '2', 'a', 'b', 'あ', 'は']);
        // "ab1" twice under the same label only counts once
        assert_eq!(problem.candidates(EdgeLabel::new('a', '1')), &["ab1".to_string()]);
        assert_eq!(problem.capacity(EdgeLabel::new('b', 'a')), 1);
        assert_eq!(problem.capacity(EdgeLabel::new('は', 'あ')), 1);
        assert_eq!(problem.capacity(EdgeLabel::new('a', 'b')), 0);
    }

    #[test]
    fn empty_word_invalidates() {
        let mut builder = ProblemBuilder::new();
        builder.add_words(["ab", "", "cd"]);

        assert_eq!(builder.is_valid(), Some(&vec![BuilderInvalidReason::EmptyWord { index: 1 }]));
        assert!(builder.build().is_err());
    }

    #[test]
    fn pop_removes_last_word() {
        let problem = ProblemBuilder::new()
            .add_word("ax")
            .add_word("xa")
            .pop_word()
            .build()
            .unwrap();

        assert_eq!(problem.words(), &["ax".to_string()]);
        assert_eq!(problem.links().len(), 1);
    }

    #[test]
    fn no_words_is_an_empty_problem() {
        let problem = ProblemBuilder::new().build().unwrap();
        assert!(problem.is_empty());
        assert!(problem.nodes().is_empty());
    }
}
