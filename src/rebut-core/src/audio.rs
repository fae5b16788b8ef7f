//! Audio output control.
//!
//! A single [`AudioController`] wraps the process-wide playback device. It is
//! shared through an `Arc` by every run; its async gate guarantees that at
//! most one clip is loaded at a time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AudioConfig;
use crate::error::PlaybackError;
use crate::speech::{AudioClip, SpeechBackend};

/// Built-in voice names and their ElevenLabs voice ids.
pub const BUILTIN_VOICES: &[(&str, &str)] = &[
    ("Rachel", "21m00Tcm4TlvDq8ikWAM"),
    ("Adam", "pNInz6obpgDQGcFmaJgB"),
    ("Bella", "EXAVITQu4vr4xnAGTGEJ"),
    ("Josh", "TxGEqnHWrfWFTfGW9jC3"),
    ("Sam", "yoZ06aMxZJJ28mfd3POQ"),
    ("Antoni", "ErXwobaYiN019PkySvjV"),
    ("Arnold", "VR6AewLTigWG4xSOukaG"),
    ("Elli", "MF3mGyEYCl7XYWbV7PAN"),
];

/// Backend id used for names missing from the table.
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Voice name to backend voice id mapping.
#[derive(Debug, Clone)]
pub struct VoiceTable {
    entries: BTreeMap<String, String>,
    fallback: String,
}

impl Default for VoiceTable {
    fn default() -> Self {
        Self {
            entries: BUILTIN_VOICES
                .iter()
                .map(|(name, id)| (name.to_string(), id.to_string()))
                .collect(),
            fallback: DEFAULT_VOICE_ID.to_string(),
        }
    }
}

impl VoiceTable {
    /// Built-in table extended by the configured entries.
    pub fn from_config(config: &AudioConfig) -> Self {
        let mut table = Self::default();
        for (name, id) in &config.voices {
            table.entries.insert(name.clone(), id.clone());
        }
        if let Some(fallback) = &config.fallback_voice {
            table.fallback = fallback.clone();
        }
        table
    }

    pub fn resolve(&self, name: &str) -> &str {
        self.entries
            .get(name)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// A single output device.
pub trait PlaybackDevice: Send + Sync {
    /// Start playing a clip.
    fn load(&self, clip: AudioClip) -> Result<(), PlaybackError>;
    /// True while a clip is loaded, including when paused.
    fn is_busy(&self) -> bool;
    fn stop(&self);
    fn pause(&self);
    fn resume(&self);
}

/// Control operations exposed independently of any run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCommand {
    Stop,
    Pause,
    Resume,
}

/// Result of a control operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub message: String,
    pub success: bool,
}

/// Serialized access to the speech backend and the playback device.
pub struct AudioController {
    speech: Option<Arc<dyn SpeechBackend>>,
    device: Option<Arc<dyn PlaybackDevice>>,
    voices: VoiceTable,
    gate: tokio::sync::Mutex<()>,
    poll_interval: Duration,
}

impl AudioController {
    pub fn new(
        speech: Option<Arc<dyn SpeechBackend>>,
        device: Option<Arc<dyn PlaybackDevice>>,
        voices: VoiceTable,
    ) -> Self {
        Self {
            speech,
            device,
            voices,
            gate: tokio::sync::Mutex::new(()),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// A controller without backend or device. Every operation reports `false`.
    pub fn disabled() -> Self {
        Self::new(None, None, VoiceTable::default())
    }

    /// Set how often playback completion is polled.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn voices(&self) -> &VoiceTable {
        &self.voices
    }

    /// Synthesize `text` with the named voice and wait until it has played.
    ///
    /// Waits for any clip already playing to finish first. Returns `false` on
    /// any synthesis or device failure.
    pub async fn play(&self, text: &str, voice_name: &str) -> bool {
        match self.try_play(text, voice_name).await {
            Ok(()) => true,
            Err(e) => {
                warn!(voice = voice_name, error = %e, "audio playback failed");
                false
            }
        }
    }

    async fn try_play(&self, text: &str, voice_name: &str) -> Result<(), PlaybackError> {
        let (Some(speech), Some(device)) = (&self.speech, &self.device) else {
            return Err(PlaybackError::DeviceUnavailable);
        };

        let _guard = self.gate.lock().await;

        let voice_id = self.voices.resolve(voice_name);
        let clip = speech.synthesize(text, voice_id).await?;
        if clip.is_empty() {
            return Err(PlaybackError::Synthesis("empty clip".to_string()));
        }

        info!(voice = voice_name, voice_id, "playing turn audio");
        device.load(clip)?;

        while device.is_busy() {
            tokio::time::sleep(self.poll_interval).await;
        }
        Ok(())
    }

    pub fn stop(&self) -> bool {
        self.with_device(|d| d.stop())
    }

    pub fn pause(&self) -> bool {
        self.with_device(|d| d.pause())
    }

    pub fn resume(&self) -> bool {
        self.with_device(|d| d.resume())
    }

    pub fn is_playing(&self) -> bool {
        self.device.as_ref().is_some_and(|d| d.is_busy())
    }

    fn with_device(&self, op: impl FnOnce(&dyn PlaybackDevice)) -> bool {
        match &self.device {
            Some(device) => {
                op(device.as_ref());
                true
            }
            None => false,
        }
    }

    /// Run a control command and describe the outcome.
    pub fn control(&self, command: AudioCommand) -> ControlResponse {
        let (success, done) = match command {
            AudioCommand::Stop => (self.stop(), "stopped"),
            AudioCommand::Pause => (self.pause(), "paused"),
            AudioCommand::Resume => (self.resume(), "resumed"),
        };

        let message = if success {
            format!("Audio {} successfully", done)
        } else {
            format!("Audio not {}: no output device", done)
        };
        ControlResponse { message, success }
    }
}

/// System output through rodio.
///
/// The output stream lives on a dedicated thread; the shared sink is the
/// only handle the rest of the process touches.
#[cfg(feature = "playback")]
pub struct RodioDevice {
    sink: Arc<rodio::Sink>,
    _shutdown: std::sync::mpsc::Sender<()>,
}

#[cfg(feature = "playback")]
impl RodioDevice {
    pub fn open() -> Result<Self, PlaybackError> {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = std::sync::mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let opened = rodio::OutputStream::try_default()
                    .map_err(|e| e.to_string())
                    .and_then(|(stream, handle)| {
                        rodio::Sink::try_new(&handle)
                            .map(|sink| (stream, Arc::new(sink)))
                            .map_err(|e| e.to_string())
                    });

                match opened {
                    Ok((stream, sink)) => {
                        let _ = ready_tx.send(Ok(sink));
                        // Returns once the device handle is dropped.
                        let _ = shutdown_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| PlaybackError::Device(e.to_string()))?;

        let sink = ready_rx
            .recv()
            .map_err(|e| PlaybackError::Device(e.to_string()))?
            .map_err(PlaybackError::Device)?;

        Ok(Self {
            sink,
            _shutdown: shutdown_tx,
        })
    }
}

#[cfg(feature = "playback")]
impl PlaybackDevice for RodioDevice {
    fn load(&self, clip: AudioClip) -> Result<(), PlaybackError> {
        match clip {
            AudioClip::Pcm {
                samples,
                sample_rate,
                channels,
            } => {
                self.sink
                    .append(rodio::buffer::SamplesBuffer::new(channels, sample_rate, samples));
            }
            AudioClip::Encoded(bytes) => {
                let decoder = rodio::Decoder::new(std::io::Cursor::new(bytes))
                    .map_err(|e| PlaybackError::Decode(e.to_string()))?;
                self.sink.append(decoder);
            }
        }
        self.sink.play();
        Ok(())
    }

    fn is_busy(&self) -> bool {
        !self.sink.empty()
    }

    fn stop(&self) {
        self.sink.stop();
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn resume(&self) {
        self.sink.play();
    }
}
