use crate::summary::{extract_items, TurnSummary};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AccumulatedState
// ---------------------------------------------------------------------------

/// The running session-level summary, threaded through the turn loop.
///
/// Owned exclusively by the orchestrator for the duration of a run; passed
/// explicitly rather than held in any global so independent sessions never
/// interfere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatedState {
    /// Set by the first turn that establishes one; never overwritten after.
    pub high_level_goal: Option<String>,
    /// Insertion-ordered, deduplicated against the whole session history.
    pub key_decisions: Vec<String>,
    pub constraints: Vec<String>,
    pub artifacts: Vec<String>,
    /// Replaced wholesale by each turn that provides any — latest turn wins.
    pub open_questions: Vec<String>,
}

impl AccumulatedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one turn's parsed summary into the state.
    ///
    /// Merge rules per field:
    /// - `high_level_goal`: seeded from the first turn's `key_outcomes`;
    ///   on later turns only adopted while still unset.
    /// - `key_decisions` / `constraints` / `artifacts`: list-extracted from
    ///   their source field and appended if not already present anywhere in
    ///   the accumulated list.
    /// - `open_questions`: a non-empty extraction replaces the prior list
    ///   entirely; an absent or empty source leaves it in place.
    pub fn absorb(&mut self, summary: &TurnSummary, is_first_turn: bool) {
        let goal = summary
            .key_outcomes
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if is_first_turn {
            self.high_level_goal = goal.map(str::to_string);
        } else if self.high_level_goal.is_none() {
            if let Some(goal) = goal {
                self.high_level_goal = Some(goal.to_string());
            }
        }

        append_unique(
            &mut self.key_decisions,
            extract_items(summary.key_outcomes.as_deref()),
        );
        append_unique(
            &mut self.constraints,
            extract_items(summary.constraints_added.as_deref()),
        );
        append_unique(
            &mut self.artifacts,
            extract_items(summary.artifacts_modified.as_deref()),
        );

        let questions = extract_items(summary.open_questions.as_deref());
        if !questions.is_empty() {
            self.open_questions = questions;
        }
    }
}

fn append_unique(list: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_with(field: fn(&mut TurnSummary, String), value: &str) -> TurnSummary {
        let mut summary = TurnSummary::default();
        field(&mut summary, value.to_string());
        summary
    }

    fn outcomes(value: &str) -> TurnSummary {
        summary_with(|s, v| s.key_outcomes = Some(v), value)
    }

    #[test]
    fn goal_set_on_first_turn() {
        let mut state = AccumulatedState::new();
        state.absorb(&outcomes("Build X"), true);
        assert_eq!(state.high_level_goal.as_deref(), Some("Build X"));
    }

    #[test]
    fn goal_never_overwritten() {
        let mut state = AccumulatedState::new();
        state.absorb(&outcomes("Build X"), true);
        state.absorb(&outcomes("Build Y instead"), false);
        assert_eq!(state.high_level_goal.as_deref(), Some("Build X"));
    }

    #[test]
    fn goal_adopted_late_when_first_turn_had_none() {
        let mut state = AccumulatedState::new();
        state.absorb(&TurnSummary::default(), true);
        assert_eq!(state.high_level_goal, None);
        state.absorb(&outcomes("Build Z"), false);
        assert_eq!(state.high_level_goal.as_deref(), Some("Build Z"));
    }

    #[test]
    fn decisions_deduplicate_across_turns() {
        let mut state = AccumulatedState::new();
        state.absorb(&outcomes("use regex, keep it sync"), true);
        state.absorb(&outcomes("use regex, add tests"), false);
        assert_eq!(
            state.key_decisions,
            vec!["use regex", "keep it sync", "add tests"]
        );
    }

    #[test]
    fn constraints_and_artifacts_accumulate_unique() {
        let mut state = AccumulatedState::new();
        let first = TurnSummary {
            constraints_added: Some("no network".to_string()),
            artifacts_modified: Some("src/a.rs, src/b.rs".to_string()),
            ..TurnSummary::default()
        };
        state.absorb(&first, true);

        let second = TurnSummary {
            constraints_added: Some("no network, flat files only".to_string()),
            artifacts_modified: Some("src/b.rs".to_string()),
            ..TurnSummary::default()
        };
        state.absorb(&second, false);

        assert_eq!(state.constraints, vec!["no network", "flat files only"]);
        assert_eq!(state.artifacts, vec!["src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn open_questions_replaced_wholesale() {
        let mut state = AccumulatedState::new();
        let first = TurnSummary {
            open_questions: Some("A".to_string()),
            ..TurnSummary::default()
        };
        state.absorb(&first, true);
        assert_eq!(state.open_questions, vec!["A"]);

        let second = TurnSummary {
            open_questions: Some("B, C".to_string()),
            ..TurnSummary::default()
        };
        state.absorb(&second, false);
        assert_eq!(state.open_questions, vec!["B", "C"]);
    }

    #[test]
    fn absent_open_questions_leave_prior_list() {
        let mut state = AccumulatedState::new();
        let first = TurnSummary {
            open_questions: Some("A".to_string()),
            ..TurnSummary::default()
        };
        state.absorb(&first, true);

        state.absorb(&TurnSummary::default(), false);
        assert_eq!(state.open_questions, vec!["A"]);

        let empty = TurnSummary {
            open_questions: Some(String::new()),
            ..TurnSummary::default()
        };
        state.absorb(&empty, false);
        assert_eq!(state.open_questions, vec!["A"]);
    }

    #[test]
    fn empty_summary_is_a_noop() {
        let mut state = AccumulatedState::new();
        state.absorb(&TurnSummary::default(), true);
        assert_eq!(state, AccumulatedState::default());
    }
}
