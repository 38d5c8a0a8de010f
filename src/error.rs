use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchipelError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported backend: {0}")]
    Unsupported(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArchipelError>;
