use crate::error::{Result, RestoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_MODEL: &str = "gpt-oss20b";
pub const DEFAULT_MAX_LINES: usize = 600;

/// Cap on agent-response lines included in a turn prompt. Long agent outputs
/// are truncated past this point with an explicit "... and N more lines"
/// marker to bound prompt size.
pub const MAX_PROMPT_RESPONSE_LINES: usize = 10;

// ---------------------------------------------------------------------------
// Transcript patterns
// ---------------------------------------------------------------------------

/// Composite pattern covering the ANSI escape and control sequences emitted
/// by the OpenCode TUI, including partially-mangled sequences that survive
/// `script(1)` capture with a stripped ESC byte.
pub const ANSI_ESCAPE_PATTERN: &str = r"\x1b\[\?\d+[hl]|\x1b\[[0-9;]*[mGKHfJ]|\x1b\][0-9;]*;[0-9;]*;[0-9;]*[a-zA-Z]|\x1b\?\[[0-9;]*[hl]|\x1b\?\d+[hl]|\x1b\[[0-9;]*[a-zA-Z]|\x1b\([0-9AB]|\x1b\)[0-9AB]|\x1b=|\x07|\x1b\[?1034h|\[[0-9;]*m|\[[0-9;]*[Hm]|\[?\[[0-9;]*[hl]]|\[\?\[[0-9;]*[hl]]|\[\?25[hl]]|\[[0-9;]*[Hm]\]|\x1b\?\[?\d+\[hl]\]|\[\?\d+\[hl]\]|\[\?\d+[hl]\]";

/// Lines matching any of these are TUI chrome (borders, spinners, cursor
/// residue) and never carry conversational content.
pub const UI_ARTIFACT_PATTERNS: &[&str] = &[
    r"\x1b\[\?\d+[hl]",
    r"^\s*[┃└┌├│─]+\s*$",
    r"^\s*[█▀▄░]+\s*$",
    r"^\s*\[?\[?[0-9]+\]`?\s*$",
    r"^\s*\[?\[?[0-9]+\][A-Z]r?\s*[0-9;]*[Hm]?",
    r"^\s*\[?\[25[hl]\]?\s*$",
    r"^\s*\[?\[[0-9;]+[0-9;]*[Hm]\s*$",
    r"^\s*\[?\[\?\[[0-9;]*[hl]\]\s*$",
    r"^\s*\[?\[[0-9;]+;\s*[0-9]+\]r\s*$",
    r"^\s*\[?\[12[ST]\]\s*$",
    r"^\s*\[?\[2[KT]\]\s*$",
    r"^\s*\[?\[M\]\s*$",
    r"^\s*\[?\[7[hl]\]\s*$",
    r"\[[0-9]+\][a-z]?\]",
    r"\[[0-9]+;[0-9]+\][a-z]\]",
    r"^\s*[0-9]+\][a-z]+\s*$",
    r"^\s*\[?\[[0-9]+\]`\s*$",
    r"^\s*─+\s*$",
    r"\[\?25[hl]]",
    r"\[\?[0-9]+[hl]]",
    r"^\s*[┃]+\s*[┃]+\s*$",
    r"\[\?\d+\[hl]]",
    r"^\s*\[?\d+\[hl\]\s*$",
    r"^\s*\[?\d+\]\s*$",
];

/// `script(1)` header line written at the top of a raw capture.
pub const SCRIPT_HEADER_PATTERN: &str = r#"^Script started on (.+) \[COMMAND="(.+)" TERM="(.+)" TTY="(.+)" COLUMNS="(.+)" LINES="(.+)"\]$"#;

// ---------------------------------------------------------------------------
// Turn detection patterns
// ---------------------------------------------------------------------------

/// User input rendered by the TUI as a boxed line: `┃  message  ┃`.
pub const USER_MESSAGE_PATTERN: &str = r"┃\s+(.+?)\s+┃";

/// Username/timestamp marker printed under each user message, e.g.
/// `alice (10:30 AM)`.
pub const USERNAME_TIMESTAMP_PATTERN: &str = r"(\w+)\s+\(\d{1,2}:\d{2}\s+[AP]M\)";

// ---------------------------------------------------------------------------
// Tool invocation patterns (artifact detection)
// ---------------------------------------------------------------------------

pub const READ_FILE_PATTERN: &str = r"Read\s+(\S+)";
pub const EDIT_FILE_PATTERN: &str = r"Edit\s+(\S+)";
pub const SHELL_CD_PATTERN: &str = r"Shell\s+.*?(?:cd\s+)?(\S+)?";

// ---------------------------------------------------------------------------
// Turn summary schema
// ---------------------------------------------------------------------------

/// Marker line that signals the start of a structured turn-summary reply.
/// Matched case-insensitively.
pub const TURN_SUMMARY_HEADER: &str = "TURN SUMMARY";

/// Schema block appended to every turn prompt. The summary parser relies on
/// the `label: value` line format this block instructs the model to produce.
pub const TURN_SUMMARY_SCHEMA: &str = "
You must produce a structured TURN SUMMARY using the exact format below.

TURN SUMMARY

Turn number: <integer>
User request summary: <concise summary of what user asked>
Agent response summary: <what agent did/approached>
Key outcomes: <what was accomplished in this turn>
State changes: <what changed in overall session state>
Artifacts modified: <comma-separated list of files touched>
Constraints/assumptions added: <new constraints or assumptions from this turn>
Open questions after this turn: <unresolved issues or questions>
";

// ---------------------------------------------------------------------------
// Evidence search limits
// ---------------------------------------------------------------------------

pub const MAX_EVIDENCE_SEARCHES: usize = 8;
pub const SEARCH_CONTEXT_LINES: usize = 3;
pub const SEARCH_PATTERN_MAX_LENGTH: usize = 200;
pub const SEARCH_MAX_MATCHES: usize = 20;

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Md,
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Md => "md",
            OutputFormat::Json => "json",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "md" => Ok(OutputFormat::Md),
            "json" => Ok(OutputFormat::Json),
            _ => Err(RestoreError::InvalidFormat(s.to_string())),
        }
    }
}

/// Default output filename derived from the session name.
pub fn default_output_path(session_name: &str, format: OutputFormat) -> PathBuf {
    PathBuf::from(format!("SUMMARY_{session_name}.{}", format.extension()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
