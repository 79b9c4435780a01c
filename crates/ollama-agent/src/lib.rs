//! `ollama-agent` — driver for the local Ollama CLI subprocess.
//!
//! Wraps `ollama run <model>` as a blocking prompt→reply call so the
//! `opencode-restore` workspace can run local models without an HTTP
//! client: the prompt goes to the child's stdin, the trimmed stdout is the
//! reply, and a non-zero exit surfaces the captured stderr.
//!
//! ```rust,ignore
//! use ollama_agent::OllamaClient;
//!
//! let client = OllamaClient::new("gpt-oss20b")?;
//! let reply = client.generate("Summarize this turn ...")?;
//! ```
//!
//! [`OllamaClient`] implements [`restore_core::SummaryBackend`], so it
//! plugs straight into the turn orchestrator and the evidence-gathering
//! loop.

pub mod error;
mod process;

pub use error::OllamaError;
pub use process::OllamaClient;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, OllamaError>;
