use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("log file not found: {0}")]
    LogNotFound(std::path::PathBuf),

    #[error("invalid output format '{0}': expected 'md' or 'json'")]
    InvalidFormat(String),

    #[error("backend failure: {0}")]
    Backend(#[source] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RestoreError>;
