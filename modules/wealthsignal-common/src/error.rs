use thiserror::Error;

#[derive(Error, Debug)]
pub enum WealthSignalError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Intelligence service error: {0}")]
    Intelligence(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Pre-flight check failed: {0}")]
    Preflight(String),

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
