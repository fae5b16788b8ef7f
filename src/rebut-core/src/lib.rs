//! Rebut Core Library
//!
//! Evidence-backed two-sided debates: agents, the turn orchestrator, batch
//! and streaming delivery, and the audio output controller.

pub mod agent;
pub mod audio;
pub mod config;
pub mod delivery;
pub mod error;
pub mod generation;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;
pub mod speech;
pub mod state;

pub use agent::DebateAgent;
pub use audio::{AudioCommand, AudioController, ControlResponse, PlaybackDevice, VoiceTable};
pub use config::{Config, PlaybackMode};
pub use delivery::{DebateEvent, DebateEventStream, DebateResponse, ErrorResponse, Transcript};
pub use error::{DebateError, GenerationError, PlaybackError, RetrievalError};
pub use generation::{GenerationClient, OpenAiGenerator};
pub use orchestrator::{AbortHandle, DebateEngine, DebateRequest, DebateRun};
pub use retrieval::{EvidenceItem, EvidenceRetriever, InMemoryRetriever, NoEvidence, PineconeRetriever};
pub use speech::{AudioClip, ElevenLabsSpeech, SpeechBackend};
pub use state::{DebateMode, DebateState, Gating, Position, Turn};
