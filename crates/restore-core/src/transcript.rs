use crate::config::{ANSI_ESCAPE_PATTERN, SCRIPT_HEADER_PATTERN, UI_ARTIFACT_PATTERNS};
use crate::error::{Result, RestoreError};
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ScriptHeader
// ---------------------------------------------------------------------------

/// Parsed `script(1)` header line from the top of a raw capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptHeader {
    pub timestamp: DateTime<FixedOffset>,
    pub command: String,
    pub term: String,
    pub tty: String,
    pub columns: u32,
    pub lines: u32,
}

// ---------------------------------------------------------------------------
// ParsedTranscript
// ---------------------------------------------------------------------------

/// Cleaned transcript content plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTranscript {
    pub header: Option<ScriptHeader>,
    /// ANSI-stripped, UI-filtered, trimmed non-empty lines.
    pub content: Vec<String>,
    /// The original file lines, untouched.
    pub raw_lines: Vec<String>,
    pub session_name: String,
}

// ---------------------------------------------------------------------------
// LogParser
// ---------------------------------------------------------------------------

/// Parser for raw OpenCode session logs captured with `script(1)`.
pub struct LogParser {
    ansi: Regex,
    header: Regex,
    ui_patterns: Vec<Regex>,
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser {
    pub fn new() -> Self {
        Self {
            ansi: Regex::new(ANSI_ESCAPE_PATTERN).unwrap(),
            header: Regex::new(SCRIPT_HEADER_PATTERN).unwrap(),
            ui_patterns: UI_ARTIFACT_PATTERNS
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect(),
        }
    }

    /// Remove ANSI escape sequences from a line.
    pub fn strip_ansi(&self, text: &str) -> String {
        self.ansi.replace_all(text, "").into_owned()
    }

    /// True if the line is TUI chrome with no conversational content.
    pub fn is_ui_artifact(&self, line: &str) -> bool {
        self.ui_patterns
            .iter()
            .any(|p| p.is_match(line) || p.is_match(line.trim()))
    }

    /// Parse the `Script started on ...` header line. Malformed timestamps
    /// or counts yield `None` rather than an error.
    pub fn parse_header(&self, line: &str) -> Option<ScriptHeader> {
        let caps = self.header.captures(line)?;
        let timestamp =
            DateTime::parse_from_str(caps.get(1)?.as_str(), "%Y-%m-%d %H:%M:%S%z").ok()?;
        Some(ScriptHeader {
            timestamp,
            command: caps.get(2)?.as_str().to_string(),
            term: caps.get(3)?.as_str().to_string(),
            tty: caps.get(4)?.as_str().to_string(),
            columns: caps.get(5)?.as_str().parse().ok()?,
            lines: caps.get(6)?.as_str().parse().ok()?,
        })
    }

    /// Derive the logical session name from the log file path: the file
    /// stem, with a trailing `.raw` stripped (`debug.raw.log` → `debug`).
    pub fn extract_session_name(&self, log_path: &Path) -> String {
        let stem = log_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        stem.strip_suffix(".raw").unwrap_or(&stem).to_string()
    }

    /// Read a raw log file and extract clean content lines.
    ///
    /// The header line (when present) is consumed into
    /// [`ParsedTranscript::header`]; UI artifacts and blank lines are
    /// dropped. Invalid UTF-8 is replaced rather than fatal.
    pub fn parse_file(&self, log_path: &Path) -> Result<ParsedTranscript> {
        if !log_path.exists() {
            return Err(RestoreError::LogNotFound(log_path.to_path_buf()));
        }

        let bytes = std::fs::read(log_path)?;
        let raw_lines: Vec<String> = String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect();

        let mut header = None;
        let mut content = Vec::new();

        for line in &raw_lines {
            let stripped = self.strip_ansi(line);

            if header.is_none() {
                if let Some(parsed) = self.parse_header(&stripped) {
                    header = Some(parsed);
                    continue;
                }
            }

            if self.is_ui_artifact(&stripped) {
                continue;
            }

            let clean = stripped.trim();
            if !clean.is_empty() {
                content.push(clean.to_string());
            }
        }

        Ok(ParsedTranscript {
            header,
            content,
            raw_lines,
            session_name: self.extract_session_name(log_path),
        })
    }
}

// ---------------------------------------------------------------------------
// Content helpers
// ---------------------------------------------------------------------------

/// The last `max_lines` lines of `content` (all of it when under the cap).
pub fn tail<'a>(content: &'a [String], max_lines: usize) -> &'a [String] {
    if content.len() <= max_lines {
        content
    } else {
        &content[content.len() - max_lines..]
    }
}

/// Remove consecutive duplicate lines (TUI redraws repeat content verbatim).
pub fn deduplicate(content: &[String]) -> Vec<String> {
    let mut deduped: Vec<String> = Vec::with_capacity(content.len());
    for line in content {
        if deduped.last() != Some(line) {
            deduped.push(line.clone());
        }
    }
    deduped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
