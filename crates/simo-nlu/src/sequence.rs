use once_cell::sync::Lazy;
use regex::Regex;
use simo_core::{Action, MAX_SEQUENCE_STEPS, Suggestion, collapse_and_cap};
use tracing::debug;

use crate::parser::{Parser, Understanding};
use crate::rules::match_clause;

/// Clause separators, longest first so "完了再" is not split twice.
static SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"然后|接着|之后|完了再|完再|完了|完|再|,|，|以后").expect("separator pattern")
});

/// Split an utterance into trimmed, non-empty clauses.
pub fn split_clauses(text: &str) -> Vec<String> {
    let lowered = text.trim().to_lowercase();
    SEPARATORS
        .split(&lowered)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Segments multi-clause utterances ("前进然后左转") into advisory steps.
///
/// Only MOVE, TURN and STOP clauses become steps. A STOP anywhere collapses
/// the list to that STOP, and the list never exceeds `max_steps`.
#[derive(Debug, Clone, Copy)]
pub struct SequenceParser {
    max_steps: usize,
}

impl Default for SequenceParser {
    fn default() -> Self {
        Self {
            max_steps: MAX_SEQUENCE_STEPS,
        }
    }
}

impl SequenceParser {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps: max_steps.clamp(1, MAX_SEQUENCE_STEPS),
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn suggestions(&self, text: &str) -> Vec<Suggestion> {
        let clauses = split_clauses(text);
        if clauses.len() <= 1 {
            return Vec::new();
        }

        let steps: Vec<Suggestion> = clauses
            .iter()
            .filter_map(|clause| {
                let (action, _) = match_clause(clause)?;
                matches!(action, Action::Stop | Action::Move { .. } | Action::Turn { .. })
                    .then(|| Suggestion::new(action, clause.as_str()))
            })
            .collect();

        if steps.len() > self.max_steps {
            debug!(found = steps.len(), max = self.max_steps, "sequence truncated");
        }
        collapse_and_cap(steps, self.max_steps)
    }
}

impl Parser for SequenceParser {
    fn name(&self) -> &str {
        "sequence"
    }

    fn parse(&self, text: &str) -> Understanding {
        let steps = self.suggestions(text);
        if steps.is_empty() {
            Understanding::Nothing
        } else {
            Understanding::Suggestions(steps)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_split() {
        assert_eq!(split_clauses("前进然后左转"), vec!["前进", "左转"]);
        assert_eq!(split_clauses("走完了再退，右转"), vec!["走", "退", "右转"]);
        assert_eq!(split_clauses("  前进  "), vec!["前进"]);
    }

    #[test]
    fn single_clause_is_not_a_sequence() {
        assert!(SequenceParser::default().suggestions("再往前走").is_empty());
    }
}
