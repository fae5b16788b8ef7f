//! Batch and streaming delivery.
//!
//! Both adapters only loop over [`DebateRun::advance`]; they cannot disagree
//! on speaker order, termination or gating.

use std::pin::Pin;

use chrono::{DateTime, Utc};
use futures::Stream;
use futures::stream;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::DebateError;
use crate::orchestrator::{DebateEngine, DebateRequest, DebateRun};
use crate::state::{Position, Turn};

/// Ordered result of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub claim: String,
    pub turns: Vec<Turn>,
}

impl Transcript {
    pub fn total_exchanges(&self) -> usize {
        self.turns.len()
    }
}

/// Batch response as handed to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebateResponse {
    pub claim: String,
    pub total_exchanges: usize,
    pub conversation_history: Vec<Turn>,
    pub success: bool,
}

impl From<Transcript> for DebateResponse {
    fn from(transcript: Transcript) -> Self {
        Self {
            claim: transcript.claim,
            total_exchanges: transcript.turns.len(),
            conversation_history: transcript.turns,
            success: true,
        }
    }
}

impl DebateResponse {
    /// Map a batch outcome to its transport shape.
    pub fn from_result(result: Result<Transcript, DebateError>) -> Result<Self, ErrorResponse> {
        result.map(Self::from).map_err(|e| ErrorResponse::from(&e))
    }
}

/// Run-level failure as handed to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
    pub success: bool,
}

impl From<&DebateError> for ErrorResponse {
    fn from(err: &DebateError) -> Self {
        Self {
            detail: format!("Error running debate: {}", err),
            success: false,
        }
    }
}

/// One element of the streaming protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DebateEvent {
    Start {
        claim: String,
    },
    #[serde(rename_all = "camelCase")]
    Message {
        speaker: Position,
        message: String,
        round: u32,
        timestamp: DateTime<Utc>,
        show_text: bool,
        play_audio: bool,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        total_exchanges: usize,
        conversation_history: Vec<Turn>,
    },
    Error {
        message: String,
    },
}

impl DebateEvent {
    fn message(turn: &Turn) -> Self {
        DebateEvent::Message {
            speaker: turn.speaker,
            message: turn.text.clone(),
            round: turn.round,
            timestamp: turn.timestamp,
            show_text: turn.show_text,
            play_audio: turn.play_audio,
        }
    }

    /// True for `complete` and `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DebateEvent::Complete { .. } | DebateEvent::Error { .. })
    }
}

/// Boxed stream of debate events.
pub type DebateEventStream = Pin<Box<dyn Stream<Item = DebateEvent> + Send>>;

enum Phase {
    Start(DebateRun),
    Turns(DebateRun),
    Done,
}

impl DebateRun {
    /// Advance until the run terminates.
    ///
    /// On a hard failure the turns produced so far stay readable through
    /// [`DebateRun::history`] and queued background audio is discarded.
    pub async fn run_to_completion(&mut self) -> Result<Transcript, DebateError> {
        while !self.is_finished() {
            if let Err(e) = self.advance().await {
                self.cancel_audio();
                return Err(e);
            }
        }
        self.finish_audio().await;

        info!(turns = self.history().len(), "debate complete");
        Ok(self.transcript())
    }

    pub fn transcript(&self) -> Transcript {
        Transcript {
            claim: self.claim().to_string(),
            turns: self.history().to_vec(),
        }
    }

    /// Lazily drive the run, one event per completed turn.
    ///
    /// Yields `start`, one `message` per turn, then `complete`; a hard
    /// failure yields a single `error` and ends the stream. Dropping the
    /// stream stops the run before its next turn and discards its queued
    /// background audio.
    pub fn into_stream(self) -> DebateEventStream {
        Box::pin(stream::unfold(Phase::Start(self), |phase| async move {
            match phase {
                Phase::Start(run) => {
                    let event = DebateEvent::Start {
                        claim: run.claim().to_string(),
                    };
                    Some((event, Phase::Turns(run)))
                }
                Phase::Turns(mut run) if run.is_finished() => {
                    run.finish_audio().await;
                    info!(turns = run.history().len(), "debate stream complete");
                    let event = DebateEvent::Complete {
                        total_exchanges: run.history().len(),
                        conversation_history: run.history().to_vec(),
                    };
                    Some((event, Phase::Done))
                }
                Phase::Turns(mut run) => match run.advance().await {
                    Ok(turn) => Some((DebateEvent::message(&turn), Phase::Turns(run))),
                    Err(e) => {
                        warn!(error = %e, "debate stream failed");
                        run.cancel_audio();
                        let event = DebateEvent::Error {
                            message: e.to_string(),
                        };
                        Some((event, Phase::Done))
                    }
                },
                Phase::Done => None,
            }
        }))
    }
}

impl DebateEngine {
    /// Batch delivery: run to completion and return the transcript.
    pub async fn run(&self, request: DebateRequest) -> Result<Transcript, DebateError> {
        self.start(request)?.run_to_completion().await
    }

    /// Streaming delivery. An invalid request yields a single `error` event.
    pub fn run_streamed(&self, request: DebateRequest) -> DebateEventStream {
        match self.start(request) {
            Ok(run) => run.into_stream(),
            Err(e) => Box::pin(stream::once(async move {
                DebateEvent::Error {
                    message: e.to_string(),
                }
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn turn(speaker: Position, round: u32) -> Turn {
        Turn {
            speaker,
            round,
            text: format!("turn {}", round),
            show_text: true,
            play_audio: false,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_message_event_wire_shape() {
        let event = DebateEvent::message(&turn(Position::Con, 2));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "message");
        assert_eq!(value["speaker"], "con");
        assert_eq!(value["message"], "turn 2");
        assert_eq!(value["round"], 2);
        assert_eq!(value["showText"], true);
        assert_eq!(value["playAudio"], false);
        assert_eq!(value["timestamp"], "2026-01-02T03:04:05Z");
    }

    #[test]
    fn test_complete_and_error_wire_shape() {
        let complete = DebateEvent::Complete {
            total_exchanges: 1,
            conversation_history: vec![turn(Position::Pro, 1)],
        };
        let value = serde_json::to_value(&complete).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["totalExchanges"], 1);
        assert_eq!(value["conversationHistory"][0]["speaker"], "pro");
        assert!(complete.is_terminal());

        let error = DebateEvent::Error {
            message: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({"type": "error", "message": "boom"})
        );
        assert!(!DebateEvent::Start { claim: "c".into() }.is_terminal());
    }

    #[test]
    fn test_response_from_transcript() {
        let transcript = Transcript {
            claim: "X is good".to_string(),
            turns: vec![turn(Position::Pro, 1), turn(Position::Con, 2)],
        };
        let value = serde_json::to_value(DebateResponse::from(transcript)).unwrap();
        assert_eq!(value["claim"], "X is good");
        assert_eq!(value["totalExchanges"], 2);
        assert_eq!(value["success"], true);
        assert_eq!(value["conversationHistory"][1]["round"], 2);
    }

    #[test]
    fn test_response_from_result() {
        let transcript = Transcript {
            claim: "c".to_string(),
            turns: vec![turn(Position::Pro, 1)],
        };
        let ok = DebateResponse::from_result(Ok(transcript)).unwrap();
        assert!(ok.success);
        assert_eq!(ok.total_exchanges, 1);

        let err = DebateResponse::from_result(Err(DebateError::Aborted {
            completed: 1,
            max_rounds: 4,
        }))
        .unwrap_err();
        assert!(!err.success);
        assert_eq!(err.detail, "Error running debate: Debate aborted after 1 of 4 turns");
    }

    #[test]
    fn test_error_response() {
        let response = ErrorResponse::from(&DebateError::InvalidRounds(0));
        assert!(!response.success);
        assert!(response.detail.starts_with("Error running debate: Invalid round count"));
    }
}
