#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{BTreeMap, VecDeque};

    use itertools::Itertools;

    use crate::assign::Assignment;
    use crate::character::word_ends;
    use crate::config::SolverConfig;
    use crate::milp::{MicroLpSolver, MilpSolution, MilpSolver, NonOptimal, Stage};
    use crate::model::ModelMatrix;
    use crate::problem::{solve_all, EdgeLabel, Problem, Shiritori};
    use crate::solver::{SearchStatus, TrailSolver};
    use crate::trail::TrailReconstructor;

    fn words_of(result: &Shiritori) -> Vec<String> {
        result.assignment.assignments.iter()
            .map(|assignment| match assignment {
                Assignment::Word(word) => word.clone(),
                other => panic!("expected a word, got {other:?}"),
            })
            .collect_vec()
    }

    fn chains(words: &[String]) -> bool {
        words.iter().tuple_windows().all(|(prev, next)| {
            word_ends(prev).map(|(_, end)| end) == word_ends(next).map(|(start, _)| start)
        })
    }

    fn assert_sound(result: &Shiritori) {
        assert!(result.search.status.is_optimal(), "{:?}", result.search.status);
        assert!(result.search.best.is_balanced());
        assert!(result.search.bounds.windows(2).all(|pair| pair[0] >= pair[1]), "{:?}", result.search.bounds);
        assert_eq!(result.trail.multiset(), result.search.best);
        assert_eq!(result.len(), result.search.len());
    }

    #[test]
    fn solve_single_cycle() {
        let problem = Problem::from_words(["ax", "xa", "xb", "bx"]).unwrap();
        let result = problem.solve().unwrap();

        assert_sound(&result);
        assert_eq!(result.len(), 4);
        let words = words_of(&result);
        assert!(chains(&words));
        assert_eq!(words.iter().sorted().collect_vec(), ["ax", "bx", "xa", "xb"]);
        assert!(result.assignment.notes.is_empty());
    }

    #[test]
    fn solve_ignores_detached_word() {
        let problem = Problem::from_words(["ax", "xa", "xb", "bx", "cd"]).unwrap();
        let result = problem.solve().unwrap();

        assert_sound(&result);
        assert_eq!(result.len(), 4);
        // the first round links everything at once and has to be cut
        assert!(result.search.iterations >= 2);
        assert_eq!(result.search.bounds[0], 5);
        assert!(!words_of(&result).contains(&"cd".to_string()));
    }

    #[test]
    fn solve_free_choice() {
        let problem = Problem::from_words(["a1b", "a2b"]).unwrap();
        let result = problem.solve().unwrap();

        assert_sound(&result);
        assert_eq!(result.len(), 1);
        assert_eq!(result.assignment.assignments, vec![Assignment::Choice(vec!["a1b".into(), "a2b".into()])]);
        assert!(result.assignment.notes.is_empty());
    }

    #[test]
    fn solve_full_kana_chain() {
        let problem = Problem::from_words([
            "りんご", "ごりら", "らっぱ", "ぱんだ", "だちょう", "うし", "しか", "かめ",
            "めだか", "かば", "ばった", "たぬき", "きつね", "ねこ", "こあら", "らいおん",
        ]).unwrap();
        let result = problem.solve().unwrap();

        assert_sound(&result);
        assert_eq!(result.len(), 16);
        let words = words_of(&result);
        assert!(chains(&words));
        assert_eq!(words.iter().unique().count(), 16);
        assert_eq!(words.first().map(String::as_str), Some("りんご"));
        assert_eq!(words.last().map(String::as_str), Some("らいおん"));
    }

    #[test]
    fn solve_empty() {
        let result = Problem::default().solve().unwrap();
        assert!(result.is_empty());
        assert_eq!(result.search.status, SearchStatus::Connected);
        assert!(result.assignment.assignments.is_empty());
    }

    #[test]
    fn reconstruction_round_trips() {
        let problem = Problem::from_words(["ab", "ba", "ac", "ca", "ad", "da", "ab2"]).unwrap();
        let result = problem.solve().unwrap();

        assert_sound(&result);
        let again = TrailReconstructor::from(&result.trail.multiset()).reconstruct().unwrap();
        assert_eq!(again.path.len(), result.trail.path.len());
        assert_eq!(again.multiset(), result.search.best);
    }

    #[test]
    fn solve_jointly_shares_links() {
        let problems = [
            Problem::from_words(["ax", "xa", "ab"]).unwrap(),
            Problem::from_words(["ax", "xa", "xy"]).unwrap(),
        ];
        let result = solve_all(&problems).unwrap();

        assert!(result.search.status.is_optimal());
        assert_eq!(result.search.best.iter().map(|best| best.len()).collect_vec(), [3, 3]);
        assert_eq!(result.search.len(), 6);
        assert_eq!(result.search.common, BTreeMap::from([(EdgeLabel::new('a', 'x'), 1), (EdgeLabel::new('x', 'a'), 1)]));
        assert_eq!(result.search.common_count(), 2);

        let only_first = result.search.difference(0, 1).unwrap();
        assert_eq!(only_first.labels().collect_vec(), [(EdgeLabel::new('a', 'b'), 1)]);
        let only_second = result.search.difference(1, 0).unwrap();
        assert_eq!(only_second.labels().collect_vec(), [(EdgeLabel::new('x', 'y'), 1)]);
        assert!(result.search.difference(0, 2).is_none());

        for trail in &result.trails {
            assert_eq!(trail.path.len(), 3);
        }
    }

    #[test]
    fn solve_jointly_prefers_shared_chain() {
        // the first list has two chains of length 2, only a->y->b shares links with the second
        let problems = [
            Problem::from_words(["ax", "xb", "ay", "yb"]).unwrap(),
            Problem::from_words(["ay", "yb"]).unwrap(),
        ];
        let result = solve_all(&problems).unwrap();

        assert!(result.search.status.is_optimal());
        assert_eq!(result.search.len(), 4);
        assert_eq!(result.search.common, BTreeMap::from([(EdgeLabel::new('a', 'y'), 1), (EdgeLabel::new('y', 'b'), 1)]));
        assert_eq!(result.search.best[0].labels().collect_vec(),
            [(EdgeLabel::new('a', 'y'), 1), (EdgeLabel::new('y', 'b'), 1)]);
        assert!(result.search.difference(0, 1).unwrap().is_empty());
    }

    #[test]
    fn solve_jointly_keeps_cutting_for_shared_links() {
        // the first list reaches length 3 either through e->c->a->b or through d->d->a->b; the second can only use
        // d->d->c->b, so d-d is the one link both can share
        let problems = [
            Problem::from_words(["ab", "cb", "da", "ca", "ec", "dd"]).unwrap(),
            Problem::from_words(["dd", "eb", "cb", "aa", "dc"]).unwrap(),
        ];
        let result = solve_all(&problems).unwrap();

        assert!(result.search.status.is_optimal(), "{:?}", result.search.status);
        assert_eq!(result.search.best.iter().map(|best| best.len()).collect_vec(), [3, 3]);
        assert_eq!(result.search.common, BTreeMap::from([(EdgeLabel::new('d', 'd'), 1)]));
        assert!(result.search.bounds.windows(2).all(|pair| pair[0] >= pair[1]), "{:?}", result.search.bounds);
        for trail in &result.trails {
            assert_eq!(trail.path.first(), Some(&EdgeLabel::new('d', 'd')));
        }
    }

    #[test]
    fn solve_jointly_with_empty_problem() {
        let problems = [
            Problem::from_words(["ax", "xa", "xb", "bx", "cd"]).unwrap(),
            Problem::default(),
        ];
        let result = solve_all(&problems).unwrap();

        assert!(result.search.status.is_optimal());
        assert_eq!(result.search.best[0].len(), 4);
        assert!(result.search.best[1].is_empty());
        assert!(result.search.common.is_empty());
        assert!(result.trails[1].path.is_empty());
    }

    #[test]
    fn iteration_ceiling_returns_incumbent() {
        let problem = Problem::from_words(["ax", "xa", "xb", "bx", "cd"]).unwrap();
        let search = TrailSolver::from(&problem)
            .with_config(SolverConfig::default().with_max_iterations(1))
            .solve()
            .unwrap();

        assert_eq!(search.status, SearchStatus::Inconclusive);
        assert_eq!(search.iterations, 1);
        assert_eq!(search.bounds, [5]);
        assert_eq!(search.len(), 1);
        assert!(search.best.is_balanced());
    }

    /// Replays canned answers, one per solve call, relaxation and integer alike.
    struct ScriptedSolver {
        script: RefCell<VecDeque<Result<Vec<(&'static str, f64)>, NonOptimal>>>,
    }

    impl ScriptedSolver {
        fn new(script: Vec<Result<Vec<(&'static str, f64)>, NonOptimal>>) -> Self {
            Self { script: RefCell::new(script.into()) }
        }
    }

    impl MilpSolver for ScriptedSolver {
        fn solve(&self, matrix: &ModelMatrix, _relaxed: bool) -> Result<MilpSolution, NonOptimal> {
            let assigned = self.script.borrow_mut().pop_front().expect("script ran out")?;
            let values = matrix.variables().iter()
                .map(|spec| assigned.iter().find(|(name, _)| *name == spec.name).map_or(0.0, |(_, value)| *value))
                .collect_vec();
            let objective = values.iter().zip(matrix.objective().iter()).map(|(value, weight)| value * weight).sum();

            Ok(MilpSolution { objective, values })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn failed_relaxation_returns_nothing() {
        let problem = Problem::from_words(["ab"]).unwrap();
        let backend = ScriptedSolver::new(vec![Err(NonOptimal::Infeasible)]);
        let search = TrailSolver::from(&problem).solve_with(&backend).unwrap();

        assert_eq!(search.status, SearchStatus::SolverFailed { stage: Stage::Relaxation, reason: NonOptimal::Infeasible });
        assert_eq!(search.iterations, 0);
        assert!(search.is_empty());
    }

    #[test]
    fn failed_integer_solve_keeps_incumbent() {
        let problem = Problem::from_words(["cd", "xy", "yx"]).unwrap();
        let disconnected = vec![
            ("edge_^_'c'", 1.0), ("edge_'c'_'d'", 1.0), ("edge_'d'_$", 1.0),
            ("edge_'x'_'y'", 1.0), ("edge_'y'_'x'", 1.0),
        ];
        let backend = ScriptedSolver::new(vec![
            Ok(disconnected.clone()),
            Ok(disconnected),
            Ok(vec![]),
            Err(NonOptimal::Other("timed out".into())),
        ]);
        let search = TrailSolver::from(&problem).solve_with(&backend).unwrap();

        assert_eq!(search.status, SearchStatus::SolverFailed { stage: Stage::Integer, reason: NonOptimal::Other("timed out".into()) });
        assert!(!search.status.is_optimal());
        assert_eq!(search.iterations, 1);
        assert_eq!(search.bounds, [3]);
        assert_eq!(search.len(), 1);
    }

    #[test]
    fn micro_lp_names_itself() {
        assert_eq!(MicroLpSolver.name(), "microlp");
    }
}
