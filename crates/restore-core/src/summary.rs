use crate::config::TURN_SUMMARY_HEADER;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// TurnSummary
// ---------------------------------------------------------------------------

/// Parsed model reply for one turn. Every field is optional; a field the
/// reply never mentioned stays `None`, while a label present with an empty
/// value parses to `Some("")` — absence and presence-but-empty are distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub turn_number: Option<String>,
    pub user_request_summary: Option<String>,
    pub agent_response_summary: Option<String>,
    pub key_outcomes: Option<String>,
    pub state_changes: Option<String>,
    pub artifacts_modified: Option<String>,
    pub constraints_added: Option<String>,
    pub open_questions: Option<String>,
}

// ---------------------------------------------------------------------------
// Label table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    TurnNumber,
    UserRequestSummary,
    AgentResponseSummary,
    KeyOutcomes,
    StateChanges,
    ArtifactsModified,
    ConstraintsAdded,
    OpenQuestions,
}

/// Recognized field labels, lowercase. Models spell some labels more than
/// one way; extending support is adding a row here.
const LABEL_TABLE: &[(&str, Field)] = &[
    ("turn number", Field::TurnNumber),
    ("user request summary", Field::UserRequestSummary),
    ("agent response summary", Field::AgentResponseSummary),
    ("key outcomes", Field::KeyOutcomes),
    ("state changes", Field::StateChanges),
    ("artifacts modified", Field::ArtifactsModified),
    ("constraints/assumptions added", Field::ConstraintsAdded),
    ("constraints added", Field::ConstraintsAdded),
    ("open questions after this turn", Field::OpenQuestions),
    ("open questions", Field::OpenQuestions),
];

fn lookup_label(label: &str) -> Option<Field> {
    let normalized = label.trim().to_lowercase();
    LABEL_TABLE
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, field)| *field)
}

impl TurnSummary {
    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::TurnNumber => &mut self.turn_number,
            Field::UserRequestSummary => &mut self.user_request_summary,
            Field::AgentResponseSummary => &mut self.agent_response_summary,
            Field::KeyOutcomes => &mut self.key_outcomes,
            Field::StateChanges => &mut self.state_changes,
            Field::ArtifactsModified => &mut self.artifacts_modified,
            Field::ConstraintsAdded => &mut self.constraints_added,
            Field::OpenQuestions => &mut self.open_questions,
        };
        *slot = Some(value);
    }
}

// ---------------------------------------------------------------------------
// parse_turn_summary
// ---------------------------------------------------------------------------

/// Parse a model reply into a [`TurnSummary`].
///
/// A reply without the `TURN SUMMARY` header (matched case-insensitively)
/// yields an all-`None` summary — the model not answering usefully is not
/// an error. Lines after the header are split on the FIRST colon only, so
/// values may themselves contain colons; lines without a colon, blank
/// lines, stray bullets, and unrecognized labels contribute nothing. When
/// a label repeats, the last occurrence wins.
pub fn parse_turn_summary(llm_response: &str) -> TurnSummary {
    let mut summary = TurnSummary::default();

    if llm_response.is_empty() {
        return summary;
    }

    let lines: Vec<&str> = llm_response.lines().collect();
    let Some(header_index) = lines
        .iter()
        .position(|line| line.to_uppercase().contains(TURN_SUMMARY_HEADER))
    else {
        return summary;
    };

    for line in &lines[header_index + 1..] {
        let line = line.trim();
        if line.is_empty() || line.starts_with('-') {
            continue;
        }
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        if let Some(field) = lookup_label(label) {
            summary.set(field, value.trim().to_string());
        }
    }

    summary
}

// ---------------------------------------------------------------------------
// extract_items
// ---------------------------------------------------------------------------

static NUMBERED_MARKER_RE: OnceLock<Regex> = OnceLock::new();

fn numbered_marker_re() -> &'static Regex {
    NUMBERED_MARKER_RE.get_or_init(|| Regex::new(r"^\d+[.)]\s*").unwrap())
}

/// Extract list items from comma-separated or bullet/numbered text.
///
/// Text containing a newline is treated as a bulleted or numbered list
/// (markers `-`, `•`, `*`, `1.`, `1)`); otherwise it splits on commas.
/// Order is preserved and no deduplication happens here — that belongs to
/// the accumulator.
pub fn extract_items(text: Option<&str>) -> Vec<String> {
    let Some(text) = text else {
        return Vec::new();
    };
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if text.contains('\n') {
        extract_bullet_lines(text)
    } else {
        text.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn extract_bullet_lines(text: &str) -> Vec<String> {
    let marker = numbered_marker_re();
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let stripped = line
                .strip_prefix('-')
                .or_else(|| line.strip_prefix('•'))
                .or_else(|| line.strip_prefix('*'))
                .map(str::trim_start)
                .unwrap_or_else(|| {
                    marker
                        .find(line)
                        .map(|m| &line[m.end()..])
                        .unwrap_or(line)
                });
            let stripped = stripped.trim();
            (!stripped.is_empty()).then(|| stripped.to_string())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
