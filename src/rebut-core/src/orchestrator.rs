//! Debate orchestration logic.
//!
//! [`DebateEngine`] holds what can be shared between runs: the two agents and
//! the audio controller. [`DebateEngine::start`] creates a [`DebateRun`] that
//! exclusively owns its [`DebateState`]. [`DebateRun::advance`] is the only
//! state transition; the batch and stream adapters in [`crate::delivery`]
//! just drive it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::DebateAgent;
use crate::audio::AudioController;
use crate::config::{Config, PlaybackMode};
use crate::error::DebateError;
use crate::generation::GenerationClient;
use crate::retrieval::EvidenceRetriever;
use crate::state::{DebateMode, DebateState, Position, RunSettings, Turn};

fn default_max_rounds() -> u32 {
    4
}

fn default_pro_voice() -> String {
    "Rachel".to_string()
}

fn default_con_voice() -> String {
    "Adam".to_string()
}

/// Parameters of one debate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateRequest {
    pub claim: String,
    /// Total number of turns, not pairs.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default)]
    pub include_audio: bool,
    #[serde(default = "default_pro_voice")]
    pub pro_voice: String,
    #[serde(default = "default_con_voice")]
    pub con_voice: String,
    #[serde(default)]
    pub debate_mode: DebateMode,
}

impl DebateRequest {
    pub fn new(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
            max_rounds: default_max_rounds(),
            include_audio: false,
            pro_voice: default_pro_voice(),
            con_voice: default_con_voice(),
            debate_mode: DebateMode::default(),
        }
    }

    pub fn with_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_audio(mut self, include_audio: bool) -> Self {
        self.include_audio = include_audio;
        self
    }

    pub fn with_voices(mut self, pro_voice: impl Into<String>, con_voice: impl Into<String>) -> Self {
        self.pro_voice = pro_voice.into();
        self.con_voice = con_voice.into();
        self
    }

    pub fn with_mode(mut self, debate_mode: DebateMode) -> Self {
        self.debate_mode = debate_mode;
        self
    }

    fn into_state(self) -> Result<DebateState, DebateError> {
        DebateState::new(
            self.claim,
            RunSettings {
                max_rounds: self.max_rounds,
                include_audio: self.include_audio,
                debate_mode: self.debate_mode,
                pro_voice: self.pro_voice,
                con_voice: self.con_voice,
            },
        )
    }
}

/// Shared, cheaply cloneable entry point for debate runs.
#[derive(Clone)]
pub struct DebateEngine {
    pro: Arc<DebateAgent>,
    con: Arc<DebateAgent>,
    audio: Arc<AudioController>,
    playback: PlaybackMode,
}

impl DebateEngine {
    /// Create an engine from one agent per side.
    pub fn new(
        pro: DebateAgent,
        con: DebateAgent,
        audio: Arc<AudioController>,
    ) -> Result<Self, DebateError> {
        if pro.position() != Position::Pro || con.position() != Position::Con {
            return Err(DebateError::ConfigError(format!(
                "agents must argue PRO then CON, got {} and {}",
                pro.position().display_name(),
                con.position().display_name()
            )));
        }

        Ok(Self {
            pro: Arc::new(pro),
            con: Arc::new(con),
            audio,
            playback: PlaybackMode::Blocking,
        })
    }

    /// Build both agents from configuration around shared backends.
    pub fn from_config(
        config: &Config,
        generator: Arc<dyn GenerationClient>,
        retriever: Arc<dyn EvidenceRetriever>,
        audio: Arc<AudioController>,
    ) -> Result<Self, DebateError> {
        let template: Arc<str> = Arc::from(config.prompts.template.as_str());
        let agent = |position: Position| {
            DebateAgent::new(
                config.agent_name(position == Position::Pro),
                position,
                generator.clone(),
                retriever.clone(),
                template.clone(),
            )
            .with_top_k(config.retrieval.top_k)
        };

        Ok(Self::new(agent(Position::Pro), agent(Position::Con), audio)?
            .with_playback(config.audio.playback))
    }

    pub fn with_playback(mut self, playback: PlaybackMode) -> Self {
        self.playback = playback;
        self
    }

    pub fn agent(&self, position: Position) -> &DebateAgent {
        match position {
            Position::Pro => self.pro.as_ref(),
            Position::Con => self.con.as_ref(),
        }
    }

    pub fn audio(&self) -> &Arc<AudioController> {
        &self.audio
    }

    /// Validate a request and create a run with a fresh state.
    pub fn start(&self, request: DebateRequest) -> Result<DebateRun, DebateError> {
        let state = request.into_state()?;
        info!(
            claim = state.claim(),
            max_rounds = state.max_rounds(),
            "debate started"
        );

        Ok(DebateRun {
            engine: self.clone(),
            state,
            abort: AbortHandle::default(),
            lane: None,
        })
    }
}

/// Cancels a run between turns.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One debate in progress.
pub struct DebateRun {
    engine: DebateEngine,
    state: DebateState,
    abort: AbortHandle,
    lane: Option<PlaybackLane>,
}

impl DebateRun {
    pub fn state(&self) -> &DebateState {
        &self.state
    }

    pub fn history(&self) -> &[Turn] {
        self.state.history()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Produce the next turn: pick the speaker by round parity, let that
    /// agent answer, record the turn and play its audio when gated on.
    pub async fn advance(&mut self) -> Result<Turn, DebateError> {
        if self.abort.is_aborted() {
            return Err(DebateError::Aborted {
                completed: self.state.history().len(),
                max_rounds: self.state.max_rounds(),
            });
        }
        if self.state.is_finished() {
            return Err(DebateError::RunFinished(self.state.history().len()));
        }

        let speaker = self.state.next_speaker();
        let text = self.engine.agent(speaker).produce(&self.state).await;
        let turn = self.state.record(text)?;

        info!(
            round = turn.round,
            speaker = turn.speaker.as_str(),
            play_audio = turn.play_audio,
            "turn complete"
        );

        if turn.play_audio {
            self.play(&turn).await;
        }

        Ok(turn)
    }

    async fn play(&mut self, turn: &Turn) {
        let voice = self.state.voice_for(turn.speaker).to_string();
        match self.engine.playback {
            PlaybackMode::Blocking => {
                self.engine.audio.play(&turn.text, &voice).await;
            }
            PlaybackMode::Background => {
                let audio = self.engine.audio.clone();
                self.lane
                    .get_or_insert_with(|| PlaybackLane::spawn(audio))
                    .enqueue(turn.text.clone(), voice);
            }
        }
    }

    /// Wait for queued background audio to finish.
    pub(crate) async fn finish_audio(&mut self) {
        if let Some(lane) = self.lane.take() {
            lane.drain().await;
        }
    }

    /// Discard queued background audio without playing it.
    pub(crate) fn cancel_audio(&mut self) {
        if self.lane.take().is_some() {
            info!("background audio cancelled");
        }
    }

    pub(crate) fn claim(&self) -> &str {
        self.state.claim()
    }
}

/// FIFO of clips played in round order, off the turn-production path.
///
/// Dropping the lane cancels its worker; queued clips are discarded.
struct PlaybackLane {
    tx: Option<mpsc::UnboundedSender<(String, String)>>,
    worker: JoinHandle<()>,
}

impl PlaybackLane {
    fn spawn(audio: Arc<AudioController>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, String)>();
        let worker = tokio::spawn(async move {
            while let Some((text, voice)) = rx.recv().await {
                audio.play(&text, &voice).await;
            }
            debug!("playback lane drained");
        });
        Self {
            tx: Some(tx),
            worker,
        }
    }

    fn enqueue(&self, text: String, voice: String) {
        let sent = self
            .tx
            .as_ref()
            .is_some_and(|tx| tx.send((text, voice)).is_ok());
        if !sent {
            warn!("playback lane closed, dropping clip");
        }
    }

    async fn drain(mut self) {
        self.tx.take();
        if let Err(e) = (&mut self.worker).await {
            warn!(error = %e, "playback lane task failed");
        }
    }
}

impl Drop for PlaybackLane {
    fn drop(&mut self) {
        if !self.worker.is_finished() {
            debug!("cancelling playback lane");
            self.worker.abort();
        }
    }
}
