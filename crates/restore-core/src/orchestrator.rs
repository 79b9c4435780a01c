use crate::error::{Result, RestoreError};
use crate::prompt::build_turn_prompt;
use crate::state::AccumulatedState;
use crate::summary::{parse_turn_summary, TurnSummary};
use crate::turn::Turn;
use serde::Serialize;

// ---------------------------------------------------------------------------
// SummaryBackend
// ---------------------------------------------------------------------------

/// The injectable LLM capability: one prompt in, one reply out.
///
/// Implementations block until the model answers. Failures surface to the
/// orchestrator's caller unmodified — no retry or masking happens here;
/// that responsibility belongs to whatever wraps the backend.
pub trait SummaryBackend {
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

// ---------------------------------------------------------------------------
// SessionDigest
// ---------------------------------------------------------------------------

/// Output of an incremental summarization run: one parsed summary per turn,
/// in turn order, plus the final accumulated session state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDigest {
    pub turn_summaries: Vec<TurnSummary>,
    pub accumulated_state: AccumulatedState,
}

// ---------------------------------------------------------------------------
// process_turns_incrementally
// ---------------------------------------------------------------------------

/// Drive the turn loop: for each turn in order, build a prompt from the
/// turn, the previous turn's summary, and the accumulated state; ask the
/// backend; parse the reply; fold it into the state.
///
/// Strictly sequential — each prompt depends on the state produced by all
/// prior turns. With no backend, every reply is the empty string and every
/// summary parses to all-`None`; this dry-run mode never errors. An empty
/// `turns` slice returns an empty digest without touching the backend.
pub fn process_turns_incrementally(
    session_name: &str,
    turns: &[Turn],
    backend: Option<&dyn SummaryBackend>,
) -> Result<SessionDigest> {
    let mut turn_summaries: Vec<TurnSummary> = Vec::with_capacity(turns.len());
    let mut accumulated_state = AccumulatedState::new();

    for (i, turn) in turns.iter().enumerate() {
        let prompt = build_turn_prompt(
            session_name,
            turn,
            turn_summaries.last(),
            Some(&accumulated_state),
        );

        let reply = match backend {
            Some(backend) => backend.generate(&prompt).map_err(RestoreError::Backend)?,
            None => String::new(),
        };

        let summary = parse_turn_summary(&reply);
        accumulated_state.absorb(&summary, i == 0);
        tracing::debug!(turn = turn.turn_number, "summarized turn");
        turn_summaries.push(summary);
    }

    Ok(SessionDigest {
        turn_summaries,
        accumulated_state,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
