use crate::error::Result;
use crate::orchestrator::SessionDigest;
use crate::state::AccumulatedState;
use crate::summary::TurnSummary;
use crate::transcript::ScriptHeader;
use std::fmt::Write as _;

const NOT_ESTABLISHED: &str = "Not established";
const NOT_STATED: &str = "Not explicitly stated";

/// Synthesize the SESSION SUMMARY document directly from accumulated state,
/// without a final model pass. Used when evidence gathering is skipped and
/// in dry-run mode.
pub fn synthesize_summary(state: &AccumulatedState, session_name: &str) -> String {
    let goal = state.high_level_goal.as_deref().unwrap_or(NOT_ESTABLISHED);
    let primary_task = state
        .key_decisions
        .last()
        .map(String::as_str)
        .unwrap_or(NOT_ESTABLISHED);

    format!(
        "SESSION SUMMARY\n\
         \n\
         Session name:\n\
         - {session_name}\n\
         \n\
         High-level goal:\n\
         - {goal}\n\
         \n\
         Primary task in progress:\n\
         - {primary_task}\n\
         \n\
         Key decisions already made:\n\
         {}\n\
         \n\
         Constraints and assumptions:\n\
         {}\n\
         \n\
         Artifacts referenced or created:\n\
         {}\n\
         \n\
         Open questions:\n\
         {}\n\
         \n\
         Next concrete steps:\n\
         - Continue from last turn with resolved open questions\n",
        bullet_list(&state.key_decisions),
        bullet_list(&state.constraints),
        bullet_list(&state.artifacts),
        bullet_list(&state.open_questions),
    )
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return format!("- {NOT_STATED}");
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the turn-by-turn dump written by `--dump-turns`.
pub fn render_turns(turn_summaries: &[TurnSummary]) -> String {
    let mut out = String::from("TURN-BY-TURN SUMMARIES\n");

    for summary in turn_summaries {
        let _ = write!(
            out,
            "\nTurn {}\n\
             ─────────────────────────────────\n\
             User request: {}\n\
             Agent response: {}\n\
             Key outcomes: {}\n\
             State changes: {}\n\
             Artifacts modified: {}\n\
             Constraints/assumptions: {}\n\
             Open questions: {}\n\
             ─────────────────────────────────\n",
            summary.turn_number.as_deref().unwrap_or("N/A"),
            summary.user_request_summary.as_deref().unwrap_or("N/A"),
            summary.agent_response_summary.as_deref().unwrap_or("N/A"),
            summary.key_outcomes.as_deref().unwrap_or("N/A"),
            summary.state_changes.as_deref().unwrap_or("N/A"),
            summary.artifacts_modified.as_deref().unwrap_or("N/A"),
            summary.constraints_added.as_deref().unwrap_or("N/A"),
            summary.open_questions.as_deref().unwrap_or("N/A"),
        );
    }

    out
}

/// Script-header preamble prepended by `--include-header`.
pub fn header_preamble(header: &ScriptHeader) -> String {
    format!(
        "<!-- Script Header -->\n\
         - Timestamp: {}\n\
         - Command: {}\n\
         - TTY: {}\n\
         \n",
        header.timestamp, header.command, header.tty
    )
}

/// Pretty-printed JSON rendering of a full digest (`--format json`).
pub fn render_digest_json(digest: &SessionDigest) -> Result<String> {
    Ok(serde_json::to_string_pretty(digest)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesize_with_empty_state_uses_placeholders() {
        let summary = synthesize_summary(&AccumulatedState::default(), "my-session");
        assert!(summary.starts_with("SESSION SUMMARY"));
        assert!(summary.contains("- my-session"));
        assert!(summary.contains("High-level goal:\n- Not established"));
        assert!(summary.contains("- Not explicitly stated"));
    }

    #[test]
    fn synthesize_with_populated_state() {
        let state = AccumulatedState {
            high_level_goal: Some("port the parser".to_string()),
            key_decisions: vec!["drop async".to_string(), "use regex".to_string()],
            constraints: vec!["flat files only".to_string()],
            artifacts: vec!["src/turn.rs".to_string()],
            open_questions: vec!["cache layer?".to_string()],
        };
        let summary = synthesize_summary(&state, "s");
        assert!(summary.contains("High-level goal:\n- port the parser"));
        // Primary task is the most recent decision.
        assert!(summary.contains("Primary task in progress:\n- use regex"));
        assert!(summary.contains("- drop async"));
        assert!(summary.contains("- flat files only"));
        assert!(summary.contains("- src/turn.rs"));
        assert!(summary.contains("- cache layer?"));
    }

    #[test]
    fn render_turns_lists_each_turn() {
        let summaries = vec![
            TurnSummary {
                turn_number: Some("0".to_string()),
                user_request_summary: Some("start".to_string()),
                ..TurnSummary::default()
            },
            TurnSummary::default(),
        ];
        let dump = render_turns(&summaries);
        assert!(dump.starts_with("TURN-BY-TURN SUMMARIES"));
        assert!(dump.contains("Turn 0"));
        assert!(dump.contains("User request: start"));
        assert!(dump.contains("Turn N/A"));
    }

    #[test]
    fn digest_json_roundtrips_field_names() {
        let digest = SessionDigest {
            turn_summaries: vec![TurnSummary::default()],
            accumulated_state: AccumulatedState::default(),
        };
        let json = render_digest_json(&digest).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["turn_summaries"].is_array());
        assert!(value["accumulated_state"]["key_decisions"].is_array());
    }
}
