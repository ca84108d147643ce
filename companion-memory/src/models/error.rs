use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MemoryError {
    pub fn collaborator(collaborator: &'static str, message: impl Into<String>) -> Self {
        MemoryError::Collaborator {
            collaborator,
            message: message.into(),
        }
    }

    /// Short machine-readable category, used in log fields and reports
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryError::Storage(_) => ErrorKind::Storage,
            MemoryError::Collaborator { .. } | MemoryError::Http(_) => ErrorKind::Collaborator,
            MemoryError::InvalidInput(_) => ErrorKind::InvalidInput,
            MemoryError::InvalidConfig(_) | MemoryError::Config(_) => ErrorKind::Config,
            MemoryError::Json(_) => ErrorKind::Serialization,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Storage,
    Collaborator,
    InvalidInput,
    Config,
    Serialization,
}

pub type MemoryResult<T> = Result<T, MemoryError>;
