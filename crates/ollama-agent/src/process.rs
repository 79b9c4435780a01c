use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use restore_core::SummaryBackend;

use crate::{OllamaError, Result};

// ─── OllamaClient ─────────────────────────────────────────────────────────

/// Blocking client for a local Ollama model.
///
/// Each [`generate`](OllamaClient::generate) call spawns
/// `ollama run <model>`, writes the prompt to its stdin, and waits for the
/// process to exit. One call, one subprocess — there is no session kept
/// between calls.
pub struct OllamaClient {
    model: String,
    binary: PathBuf,
}

impl OllamaClient {
    /// Create a client for `model`, resolving the `ollama` binary on PATH.
    pub fn new(model: impl Into<String>) -> Result<Self> {
        let binary = which::which("ollama").map_err(OllamaError::BinaryNotFound)?;
        Ok(Self {
            model: model.into(),
            binary,
        })
    }

    /// Create a client with an explicit binary path (used by tests and
    /// non-standard installs).
    pub fn with_binary(model: impl Into<String>, binary: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            binary: binary.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt to the model and return its trimmed reply.
    pub fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "invoking ollama");

        let mut child = Command::new(&self.binary)
            .arg("run")
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A broken pipe means the child exited without reading the full
            // prompt; its exit status carries the real error.
            if let Err(e) = stdin.write_all(prompt.as_bytes()) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
            // Dropping stdin closes the pipe; ollama reads to EOF.
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(OllamaError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl SummaryBackend for OllamaClient {
    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        OllamaClient::generate(self, prompt).map_err(Into::into)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn fake_ollama(dir: &tempfile::TempDir, script_body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("ollama");
        std::fs::write(&path, format!("#!/bin/sh\n{script_body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn model_accessor() {
        let client = OllamaClient::with_binary("llama3", "/usr/bin/ollama");
        assert_eq!(client.model(), "llama3");
    }

    #[cfg(unix)]
    #[test]
    fn generate_pipes_prompt_and_trims_reply() {
        let dir = tempfile::TempDir::new().unwrap();
        // Echo stdin back with surrounding whitespace.
        let binary = fake_ollama(&dir, "echo \"\"; cat -; echo \"\"");
        let client = OllamaClient::with_binary("m", binary);
        let reply = client.generate("hello model").unwrap();
        assert_eq!(reply, "hello model");
    }

    #[cfg(unix)]
    #[test]
    fn generate_surfaces_stderr_on_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_ollama(&dir, "echo \"model not found\" >&2; exit 2");
        let client = OllamaClient::with_binary("m", binary);
        match client.generate("hi") {
            Err(OllamaError::Failed { status, stderr }) => {
                assert_eq!(status, 2);
                assert!(stderr.contains("model not found"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn backend_trait_delegates() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_ollama(&dir, "cat -");
        let client = OllamaClient::with_binary("m", binary);
        let backend: &dyn SummaryBackend = &client;
        assert_eq!(backend.generate("ping").unwrap(), "ping");
    }

    #[cfg(unix)]
    #[test]
    fn missing_binary_is_io_error() {
        let client = OllamaClient::with_binary("m", "/nonexistent/ollama");
        assert!(matches!(client.generate("hi"), Err(OllamaError::Io(_))));
    }
}
