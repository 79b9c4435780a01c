use crate::config::{MAX_PROMPT_RESPONSE_LINES, TURN_SUMMARY_SCHEMA};
use crate::state::AccumulatedState;
use crate::summary::TurnSummary;
use crate::turn::Turn;
use std::fmt::Write as _;

/// Build the prompt asking the model to summarize one turn.
///
/// Deterministic string assembly, no side effects: the same inputs always
/// produce the same prompt. Sections appear in a fixed order and are
/// omitted when their driving input is absent or empty.
pub fn build_turn_prompt(
    session_name: &str,
    turn: &Turn,
    previous_summary: Option<&TurnSummary>,
    accumulated_state: Option<&AccumulatedState>,
) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Session name: {session_name}");

    if let Some(previous) = previous_summary {
        prompt.push_str("PREVIOUS TURN SUMMARY:\n");
        let _ = writeln!(
            prompt,
            "Turn number: {}",
            previous.turn_number.as_deref().unwrap_or("N/A")
        );
        if let Some(request) = &previous.user_request_summary {
            let _ = writeln!(prompt, "User request summary: {request}");
        }
        prompt.push('\n');
    }

    if let Some(state) = accumulated_state {
        prompt.push_str("CURRENT ACCUMULATED STATE:\n");
        let _ = writeln!(prompt, "Session name: {session_name}");
        if let Some(goal) = &state.high_level_goal {
            let _ = writeln!(prompt, "High-level goal: {goal}");
        }
        if !state.key_decisions.is_empty() {
            let _ = writeln!(prompt, "Key decisions: {}", state.key_decisions.join(", "));
        }
        if !state.constraints.is_empty() {
            let _ = writeln!(prompt, "Constraints: {}", state.constraints.join(", "));
        }
        if !state.artifacts.is_empty() {
            let _ = writeln!(prompt, "All artifacts: {}", state.artifacts.join(", "));
        }
        if !state.open_questions.is_empty() {
            let _ = writeln!(prompt, "Open questions: {}", state.open_questions.join(", "));
        }
        prompt.push('\n');
    }

    let _ = writeln!(prompt, "CURRENT TURN (Turn {}):", turn.turn_number);
    prompt.push_str("User messages:\n");
    for message in &turn.user_messages {
        let _ = writeln!(prompt, "┃ {message}");
    }
    prompt.push('\n');

    prompt.push_str("Agent responses:\n");
    for response in turn.agent_responses.iter().take(MAX_PROMPT_RESPONSE_LINES) {
        let _ = writeln!(prompt, "┃ {response}");
    }
    if turn.agent_responses.len() > MAX_PROMPT_RESPONSE_LINES {
        let remaining = turn.agent_responses.len() - MAX_PROMPT_RESPONSE_LINES;
        let _ = writeln!(prompt, "... and {remaining} more lines");
    }
    prompt.push('\n');

    prompt.push_str(TURN_SUMMARY_SCHEMA);

    prompt
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(number: usize, responses: usize) -> Turn {
        Turn {
            turn_number: number,
            user_messages: vec!["add a cache layer".to_string()],
            agent_responses: (0..responses).map(|i| format!("response {i}")).collect(),
            raw_lines: Vec::new(),
            start_line_index: 0,
            end_line_index: 0,
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn minimal_prompt_has_session_turn_and_schema() {
        let prompt = build_turn_prompt("my-session", &turn(0, 1), None, None);
        assert!(prompt.starts_with("Session name: my-session\n"));
        assert!(prompt.contains("CURRENT TURN (Turn 0):"));
        assert!(prompt.contains("┃ add a cache layer"));
        assert!(prompt.contains("TURN SUMMARY"));
        assert!(!prompt.contains("PREVIOUS TURN SUMMARY"));
        assert!(!prompt.contains("CURRENT ACCUMULATED STATE"));
    }

    #[test]
    fn previous_summary_section_included() {
        let previous = TurnSummary {
            turn_number: Some("3".to_string()),
            user_request_summary: Some("asked for tests".to_string()),
            ..TurnSummary::default()
        };
        let prompt = build_turn_prompt("s", &turn(4, 1), Some(&previous), None);
        assert!(prompt.contains("PREVIOUS TURN SUMMARY:"));
        assert!(prompt.contains("Turn number: 3"));
        assert!(prompt.contains("User request summary: asked for tests"));
    }

    #[test]
    fn previous_summary_missing_fields_degrade() {
        let previous = TurnSummary::default();
        let prompt = build_turn_prompt("s", &turn(1, 1), Some(&previous), None);
        assert!(prompt.contains("Turn number: N/A"));
        assert!(!prompt.contains("User request summary:"));
    }

    #[test]
    fn accumulated_state_section_skips_empty_lists() {
        let state = AccumulatedState {
            high_level_goal: Some("ship the parser".to_string()),
            key_decisions: vec!["use regex".to_string(), "no async".to_string()],
            ..AccumulatedState::default()
        };
        let prompt = build_turn_prompt("s", &turn(1, 1), None, Some(&state));
        assert!(prompt.contains("CURRENT ACCUMULATED STATE:"));
        assert!(prompt.contains("High-level goal: ship the parser"));
        assert!(prompt.contains("Key decisions: use regex, no async"));
        assert!(!prompt.contains("Constraints:"));
        assert!(!prompt.contains("All artifacts:"));
        assert!(!prompt.contains("Open questions:"));
    }

    #[test]
    fn exactly_ten_responses_no_truncation_marker() {
        let prompt = build_turn_prompt("s", &turn(0, 10), None, None);
        assert!(prompt.contains("┃ response 9"));
        assert!(!prompt.contains("more lines"));
    }

    #[test]
    fn eleven_responses_truncate_to_ten_with_marker() {
        let prompt = build_turn_prompt("s", &turn(0, 11), None, None);
        assert!(prompt.contains("┃ response 9"));
        assert!(!prompt.contains("┃ response 10"));
        assert!(prompt.contains("... and 1 more lines"));
    }

    #[test]
    fn twenty_responses_report_remaining_count() {
        let prompt = build_turn_prompt("s", &turn(0, 20), None, None);
        assert!(prompt.contains("... and 10 more lines"));
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let t = turn(2, 5);
        let a = build_turn_prompt("s", &t, None, None);
        let b = build_turn_prompt("s", &t, None, None);
        assert_eq!(a, b);
    }
}
