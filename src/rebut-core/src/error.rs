//! Error types for the debate system.
//!
//! Only [`DebateError`] crosses the orchestrator boundary. The other
//! families are absorbed where they occur and turned into degraded data.

use thiserror::Error;

/// Run-level failure. Aborts the whole debate.
#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Invalid round count: max_rounds must be at least 1, got {0}")]
    InvalidRounds(u32),

    #[error("Debate already finished after {0} turns")]
    RunFinished(usize),

    #[error("Debate state corrupted: {0}")]
    StateCorrupted(String),

    #[error("Debate aborted after {completed} of {max_rounds} turns")]
    Aborted { completed: usize, max_rounds: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of the text-generation backend for a single turn.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("API error: {0}")]
    Api(String),

    #[error("empty response from model")]
    EmptyResponse,

    #[error("client setup failed: {0}")]
    Client(String),
}

impl From<async_openai::error::OpenAIError> for GenerationError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        GenerationError::Api(err.to_string())
    }
}

/// Failure of the evidence backend. Never fails a run.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode search response: {0}")]
    Decode(String),
}

/// Failure of synthesis or the playback device. Surfaces as `false`.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("audio device not initialized")]
    DeviceUnavailable,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("audio decode failed: {0}")]
    Decode(String),
}
