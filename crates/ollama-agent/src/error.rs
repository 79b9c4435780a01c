use thiserror::Error;

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("ollama binary not found on PATH")]
    BinaryNotFound(#[source] which::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ollama failed (exit {status}):\n{stderr}")]
    Failed { status: i32, stderr: String },
}
