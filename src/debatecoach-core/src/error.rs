//! Error types for the debate coach.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("Backend returned an empty response after {attempts} attempts")]
    EmptyResponse { attempts: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("TTS error: {0}")]
    TtsError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Debate not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DebateError {
    /// True when the backend rejected the configured model, as opposed to a
    /// transient or network failure.
    pub fn is_model_unavailable(&self) -> bool {
        match self {
            DebateError::OpenAIError(e) => e.to_string().to_lowercase().contains("not found"),
            _ => false,
        }
    }
}
