use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use itertools::Itertools;
use thiserror::Error;

use crate::problem::{EdgeLabel, Problem};

/// What to write at one position of a chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Assignment {
    /// Exactly this word.
    Word(String),
    /// Any one of these words; the link is used once, so the choice is free.
    Choice(Vec<String>),
    /// A word chosen jointly with the other positions sharing the note at index `note` of
    /// [`ResultAssignment::notes`].
    Footnote {
        /// Index into the notes.
        note: usize,
    },
}

/// Several positions of a chain use the same link, but fewer times than it has words: choose `count` distinct words
/// among `words` for them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Note {
    /// The shared link.
    pub label: EdgeLabel,
    /// Words to choose from.
    pub words: Vec<String>,
    /// How many distinct words to choose.
    pub count: usize,
}

/// Words assigned to every position of a chain.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResultAssignment {
    /// One entry per link of the chain, in order.
    pub assignments: Vec<Assignment>,
    /// Notes referenced by [`Assignment::Footnote`], numbered by first appearance.
    pub notes: Vec<Note>,
}

impl Display for ResultAssignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let steps = self.assignments.iter()
            .map(|assignment| match assignment {
                Assignment::Word(word) => word.clone(),
                Assignment::Choice(words) => format!("({})", words.join("|")),
                Assignment::Footnote { note } => match self.notes.get(*note) {
                    Some(Note { label, .. }) => format!("*{}:{label}", note + 1),
                    None => format!("*{}", note + 1),
                },
            })
            .join(" -> ");
        write!(f, "{steps}")?;

        for (index, note) in self.notes.iter().enumerate() {
            write!(f, "\n*{}: choose {} of {}", index + 1, note.count, note.words.join("/"))?;
        }

        Ok(())
    }
}

/// Reasons a [`ResultAssigner`] may fail.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AssignError {
    /// No word of the problem carries this link.
    #[error("no word carries link {label}")]
    UnknownLabel {
        /// The offending link.
        label: EdgeLabel,
    },
    /// The chain uses a link more often than the problem has words for it.
    #[error("link {label} used {used} times but only {available} words carry it")]
    Overused {
        /// The offending link.
        label: EdgeLabel,
        /// Uses in the chain.
        used: usize,
        /// Words carrying it.
        available: usize,
    },
}

/// Picks concrete words for an ordered chain of links.
pub struct ResultAssigner<'a> {
    problem: &'a Problem,
}

impl<'a> From<&'a Problem> for ResultAssigner<'a> {
    fn from(problem: &'a Problem) -> Self {
        Self { problem }
    }
}

impl ResultAssigner<'_> {
    /// Assign words to `path`.
    ///
    /// A link used once gets its word, or a free choice among several. A link used as many times as it has words gets
    /// each word in turn. Any other link shares a [`Note`] among its positions.
    pub fn assign(&self, path: &[EdgeLabel]) -> Result<ResultAssignment, AssignError> {
        let needed = path.iter().copied().counts();
        for (label, used) in &needed {
            let available = self.problem.capacity(*label);
            if available == 0 {
                return Err(AssignError::UnknownLabel { label: *label });
            }
            if *used > available {
                return Err(AssignError::Overused { label: *label, used: *used, available });
            }
        }

        let mut result = ResultAssignment::default();
        let mut handed_out: HashMap<EdgeLabel, usize> = HashMap::new();
        let mut note_of: HashMap<EdgeLabel, usize> = HashMap::new();
        for label in path {
            let candidates = self.problem.candidates(*label);
            let need = needed[label];

            let assignment = if need == 1 {
                match candidates {
                    [word] => Assignment::Word(word.clone()),
                    _ => Assignment::Choice(candidates.to_vec()),
                }
            } else if need == candidates.len() {
                let next = handed_out.entry(*label).or_default();
                *next += 1;
                Assignment::Word(candidates[*next - 1].clone())
            } else {
                let note = *note_of.entry(*label).or_insert_with(|| {
                    result.notes.push(Note { label: *label, words: candidates.to_vec(), count: need });
                    result.notes.len() - 1
                });
                Assignment::Footnote { note }
            };
            result.assignments.push(assignment);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::problem::{EdgeLabel, Problem};

    use super::{AssignError, Assignment, ResultAssigner};

    const AA: EdgeLabel = EdgeLabel { start: 'a', end: 'a' };
    const AB: EdgeLabel = EdgeLabel { start: 'a', end: 'b' };

    #[test]
    fn single_use_is_word_or_choice() {
        let problem = Problem::from_words(["axa", "aya", "ab"]).unwrap();
        let result = ResultAssigner::from(&problem).assign(&[AA, AB]).unwrap();

        assert_eq!(result.assignments, vec![
            Assignment::Choice(vec!["axa".into(), "aya".into()]),
            Assignment::Word("ab".into()),
        ]);
        assert!(result.notes.is_empty());
        assert_eq!(result.to_string(), "(axa|aya) -> ab");
    }

    #[test]
    fn exhausted_link_hands_out_each_word() {
        let problem = Problem::from_words(["axa", "aya", "ab"]).unwrap();
        let result = ResultAssigner::from(&problem).assign(&[AA, AA, AB]).unwrap();

        assert_eq!(result.assignments, vec![
            Assignment::Word("axa".into()),
            Assignment::Word("aya".into()),
            Assignment::Word("ab".into()),
        ]);
    }

    #[test]
    fn partial_use_gets_a_footnote() {
        let problem = Problem::from_words(["axa", "aya", "aza", "ab"]).unwrap();
        let result = ResultAssigner::from(&problem).assign(&[AA, AA, AB]).unwrap();

        assert_eq!(result.assignments[0], Assignment::Footnote { note: 0 });
        assert_eq!(result.assignments[1], Assignment::Footnote { note: 0 });
        assert_eq!(result.assignments[2], Assignment::Word("ab".into()));
        assert_eq!(result.notes.len(), 1);
        assert_eq!(result.notes[0].count, 2);
        assert_eq!(result.notes[0].words, vec!["axa".to_string(), "aya".to_string(), "aza".to_string()]);
        assert_eq!(result.to_string(), "*1:a-a -> *1:a-a -> ab\n*1: choose 2 of axa/aya/aza");
    }

    #[test]
    fn bad_labels_fail() {
        let problem = Problem::from_words(["axa", "ab"]).unwrap();

        assert_eq!(ResultAssigner::from(&problem).assign(&[EdgeLabel::new('b', 'a')]),
            Err(AssignError::UnknownLabel { label: EdgeLabel::new('b', 'a') }));
        assert_eq!(ResultAssigner::from(&problem).assign(&[AA, AA, AB]),
            Err(AssignError::Overused { label: AA, used: 2, available: 1 }));
    }
}
