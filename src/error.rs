use thiserror::Error;

use crate::chat::SessionState;
use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum PersonaError {
    /// Bad URL, empty message, malformed import file and similar user input problems.
    #[error("{0}")]
    InputValidation(String),

    #[error("Could not retrieve transcript for this video.")]
    TranscriptUnavailable,

    #[error("Failed to get a valid response from the AI model: {0}")]
    Generation(#[source] GenerationCause),

    #[error("Chat could not be started: {0}")]
    ChatInit(#[source] LlmError),

    #[error("Chat message could not be sent: {0}")]
    ChatSend(#[source] LlmError),

    #[error("Chat session is {0}, message rejected")]
    SessionNotReady(SessionState),

    #[error("No chat session is open")]
    NoChatSession,

    #[error("Stored favorites were unreadable and have been reset: {0}")]
    StorageCorruption(#[source] serde_json::Error),

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Underlying reason a persona generation call was rejected.
#[derive(Debug, Error)]
pub enum GenerationCause {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("response was not a JSON array of personas: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("persona {index} is invalid: {reason}")]
    InvalidPersona { index: usize, reason: String },
}

impl PersonaError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        PersonaError::InputValidation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PersonaError>;
