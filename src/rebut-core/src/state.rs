//! Debate state model.
//!
//! [`DebateState`] is the single mutable aggregate of a run. It is owned by
//! exactly one [`crate::DebateRun`] and only changes through
//! [`DebateState::record`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DebateError;

/// Side argued by a debater.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Arguing in favor of the claim.
    Pro,
    /// Arguing against the claim.
    Con,
}

impl Position {
    /// Speaker for a 1-indexed round: odd rounds are Pro, even rounds Con.
    pub fn for_round(round: u32) -> Self {
        if round % 2 == 1 {
            Position::Pro
        } else {
            Position::Con
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Pro => "pro",
            Position::Con => "con",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Position::Pro => "PRO",
            Position::Con => "CON",
        }
    }
}

/// Controls what a consumer surfaces for each turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DebateMode {
    /// Text only; audio is suppressed even if requested.
    TextOnly,
    /// Text and, when requested, audio.
    #[default]
    Both,
}

/// Display and audio flags derived for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gating {
    pub show_text: bool,
    pub play_audio: bool,
}

impl Gating {
    pub fn evaluate(include_audio: bool, mode: DebateMode) -> Self {
        Self {
            show_text: matches!(mode, DebateMode::TextOnly | DebateMode::Both),
            play_audio: include_audio && mode == DebateMode::Both,
        }
    }
}

/// One immutable entry of the debate history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub speaker: Position,
    pub round: u32,
    pub text: String,
    pub show_text: bool,
    pub play_audio: bool,
    pub timestamp: DateTime<Utc>,
}

/// Per-run settings fixed at start.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub max_rounds: u32,
    pub include_audio: bool,
    pub debate_mode: DebateMode,
    pub pro_voice: String,
    pub con_voice: String,
}

/// Mutable aggregate for one debate run.
#[derive(Debug)]
pub struct DebateState {
    claim: String,
    round_number: u32,
    settings: RunSettings,
    history: Vec<Turn>,
}

impl DebateState {
    /// Create the initial state: round 1, empty history.
    pub fn new(claim: impl Into<String>, settings: RunSettings) -> Result<Self, DebateError> {
        if settings.max_rounds == 0 {
            return Err(DebateError::InvalidRounds(settings.max_rounds));
        }

        Ok(Self {
            claim: claim.into(),
            round_number: 1,
            settings,
            history: Vec::new(),
        })
    }

    pub fn claim(&self) -> &str {
        &self.claim
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn max_rounds(&self) -> u32 {
        self.settings.max_rounds
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn is_finished(&self) -> bool {
        self.round_number > self.settings.max_rounds
    }

    /// Speaker due for the current round.
    pub fn next_speaker(&self) -> Position {
        Position::for_round(self.round_number)
    }

    /// Voice configured for a side.
    pub fn voice_for(&self, position: Position) -> &str {
        match position {
            Position::Pro => &self.settings.pro_voice,
            Position::Con => &self.settings.con_voice,
        }
    }

    pub fn gating(&self) -> Gating {
        Gating::evaluate(self.settings.include_audio, self.settings.debate_mode)
    }

    /// Append the turn for the current round and move to the next one.
    pub(crate) fn record(&mut self, text: String) -> Result<Turn, DebateError> {
        if self.is_finished() {
            return Err(DebateError::RunFinished(self.history.len()));
        }
        if self.history.len() as u32 + 1 != self.round_number {
            return Err(DebateError::StateCorrupted(format!(
                "round {} with {} recorded turns",
                self.round_number,
                self.history.len()
            )));
        }

        let gating = self.gating();
        let turn = Turn {
            speaker: self.next_speaker(),
            round: self.round_number,
            text,
            show_text: gating.show_text,
            play_audio: gating.play_audio,
            timestamp: Utc::now(),
        };

        self.history.push(turn.clone());
        self.round_number += 1;
        Ok(turn)
    }
}
