use crate::config::{
    EDIT_FILE_PATTERN, READ_FILE_PATTERN, SHELL_CD_PATTERN, USERNAME_TIMESTAMP_PATTERN,
    USER_MESSAGE_PATTERN,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Read,
    Edited,
    /// Reserved for a future create/write tool pattern; no transcript
    /// pattern produces this yet.
    Created,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Read => "read",
            ArtifactKind::Edited => "edited",
            ArtifactKind::Created => "created",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ArtifactAction
// ---------------------------------------------------------------------------

/// A file reference detected within a turn's transcript lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactAction {
    pub file_path: String,
    pub kind: ArtifactKind,
    /// Line index into the source transcript where the reference appeared.
    /// Always within the owning turn's `[start_line_index, end_line_index]`.
    pub line_number: usize,
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// One grouped round of conversation: consecutive user messages plus the
/// agent responses that followed. Immutable once parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_number: usize,
    pub user_messages: Vec<String>,
    pub agent_responses: Vec<String>,
    /// Source transcript lines spanning this turn, for provenance.
    pub raw_lines: Vec<String>,
    /// Inclusive bounds into the source transcript. Artifact extraction is
    /// scoped to this range and never crosses into a neighboring turn.
    pub start_line_index: usize,
    pub end_line_index: usize,
    pub artifacts: Vec<ArtifactAction>,
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// Tagged classification of a cleaned transcript line. Keeping this separate
/// from the grouping loop lets the patterns be tested on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// Boxed user input; carries the extracted message text.
    User(String),
    /// Transient marker (username/timestamp under a user message). Dropped
    /// entirely — never part of any turn's responses.
    Noise,
    /// Plain content; agent response body when a turn is open.
    Content,
}

// ---------------------------------------------------------------------------
// TurnParser
// ---------------------------------------------------------------------------

/// Splits a cleaned transcript into conversation turns and extracts the
/// file artifacts referenced within each turn's own line range.
pub struct TurnParser {
    user_message: Regex,
    username_timestamp: Regex,
    read_file: Regex,
    edit_file: Regex,
    shell_cd: Regex,
}

impl Default for TurnParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnParser {
    pub fn new() -> Self {
        Self {
            user_message: Regex::new(USER_MESSAGE_PATTERN).unwrap(),
            username_timestamp: Regex::new(USERNAME_TIMESTAMP_PATTERN).unwrap(),
            read_file: Regex::new(READ_FILE_PATTERN).unwrap(),
            edit_file: Regex::new(EDIT_FILE_PATTERN).unwrap(),
            shell_cd: Regex::new(SHELL_CD_PATTERN).unwrap(),
        }
    }

    /// Classify one line. Unrecognized input is `Content`, never an error —
    /// garbled transcripts degrade instead of failing.
    pub fn classify_line(&self, line: &str) -> LineClass {
        if let Some(caps) = self.user_message.captures(line) {
            return LineClass::User(caps[1].trim().to_string());
        }
        if self.username_timestamp.is_match(line) {
            return LineClass::Noise;
        }
        LineClass::Content
    }

    /// Extract artifact actions from `lines[start..end]` (end exclusive).
    /// The caller passes the owning turn's own bounds; scanning outside them
    /// would attribute another turn's file activity to this one.
    pub fn extract_artifacts(
        &self,
        lines: &[String],
        start: usize,
        end: usize,
    ) -> Vec<ArtifactAction> {
        let end = end.min(lines.len());
        let mut artifacts = Vec::new();

        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            for (kind, pattern) in [
                (ArtifactKind::Read, &self.read_file),
                (ArtifactKind::Edited, &self.edit_file),
            ] {
                if let Some(caps) = pattern.captures(line) {
                    artifacts.push(ArtifactAction {
                        file_path: caps[1].to_string(),
                        kind,
                        line_number: i,
                    });
                }
            }
            if let Some(caps) = self.shell_cd.captures(line) {
                if let Some(target) = caps.get(1).filter(|m| !m.as_str().is_empty()) {
                    artifacts.push(ArtifactAction {
                        file_path: target.as_str().to_string(),
                        kind: ArtifactKind::Read,
                        line_number: i,
                    });
                }
            }
        }
        artifacts
    }

    /// Parse cleaned transcript lines into ordered turns.
    ///
    /// Consecutive user messages with no intervening agent response are
    /// grouped into one turn; a user message arriving after agent responses
    /// closes the current turn and opens the next. A trailing turn with no
    /// agent response yet is kept (interrupted sessions end mid-turn).
    pub fn parse_turns(&self, lines: &[String]) -> Vec<Turn> {
        let mut turns = Vec::new();
        let mut user_messages: Vec<String> = Vec::new();
        let mut agent_responses: Vec<String> = Vec::new();
        let mut start_idx = 0usize;
        let mut turn_number = 0usize;

        for (i, line) in lines.iter().enumerate() {
            match self.classify_line(line) {
                LineClass::User(message) => {
                    if !user_messages.is_empty() && agent_responses.is_empty() {
                        // Consecutive user messages join the open turn.
                        user_messages.push(message);
                    } else if !agent_responses.is_empty() {
                        turns.push(Turn {
                            turn_number,
                            user_messages: std::mem::take(&mut user_messages),
                            agent_responses: std::mem::take(&mut agent_responses),
                            raw_lines: lines[start_idx..i].to_vec(),
                            start_line_index: start_idx,
                            end_line_index: i - 1,
                            artifacts: self.extract_artifacts(lines, start_idx, i),
                        });
                        turn_number += 1;
                        user_messages.push(message);
                        start_idx = i;
                    } else {
                        user_messages.push(message);
                        start_idx = i;
                    }
                }
                LineClass::Noise => {}
                LineClass::Content => {
                    // Content before the first user message has no owning
                    // turn and is discarded.
                    if !user_messages.is_empty() || !agent_responses.is_empty() {
                        agent_responses.push(line.clone());
                    }
                }
            }
        }

        if !user_messages.is_empty() || !agent_responses.is_empty() {
            turns.push(Turn {
                turn_number,
                user_messages,
                agent_responses,
                raw_lines: lines[start_idx..].to_vec(),
                start_line_index: start_idx,
                end_line_index: lines.len().saturating_sub(1),
                artifacts: self.extract_artifacts(lines, start_idx, lines.len()),
            });
        }

        turns
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
