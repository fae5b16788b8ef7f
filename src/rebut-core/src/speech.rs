//! Speech synthesis backends.
//!
//! Backends turn text into an [`AudioClip`]; playing it is the job of the
//! [`crate::audio`] module.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::PlaybackError;

/// Sample rate of locally synthesized speech.
pub const LOCAL_SAMPLE_RATE: u32 = 24_000;

/// Synthesized audio, ready for a playback device.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioClip {
    /// Raw interleaved samples.
    Pcm {
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    },
    /// A container/codec stream (mp3, wav, ...) the device must decode.
    Encoded(Vec<u8>),
}

impl AudioClip {
    pub fn is_empty(&self) -> bool {
        match self {
            AudioClip::Pcm { samples, .. } => samples.is_empty(),
            AudioClip::Encoded(bytes) => bytes.is_empty(),
        }
    }
}

/// Text-to-speech contract.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<AudioClip, PlaybackError>;
}

/// ElevenLabs hosted text-to-speech.
pub struct ElevenLabsSpeech {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model_id: String,
}

impl ElevenLabsSpeech {
    pub const DEFAULT_API_BASE: &'static str = "https://api.elevenlabs.io";

    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            model_id: model_id.into(),
        }
    }

    /// Point the client at another host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SpeechBackend for ElevenLabsSpeech {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<AudioClip, PlaybackError> {
        let url = format!("{}/v1/text-to-speech/{}", self.api_base, voice_id);
        let response = self
            .http
            .post(&url)
            .query(&[("output_format", "mp3_44100_128")])
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&json!({ "text": text, "model_id": self.model_id }))
            .send()
            .await
            .map_err(|e| PlaybackError::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlaybackError::Synthesis(format!("status {}: {}", status, body)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlaybackError::Synthesis(e.to_string()))?;

        debug!(voice_id, bytes = bytes.len(), "speech synthesized");
        Ok(AudioClip::Encoded(bytes.to_vec()))
    }
}

/// Local synthesis with kokoro-tiny.
#[cfg(feature = "local-tts")]
pub struct KokoroSpeech {
    engine: tokio::sync::Mutex<kokoro_tiny::TtsEngine>,
    available_voices: Vec<String>,
}

#[cfg(feature = "local-tts")]
impl KokoroSpeech {
    /// Initialize the engine (downloads the model on first run).
    pub async fn new() -> Result<Self, PlaybackError> {
        let engine = kokoro_tiny::TtsEngine::new()
            .await
            .map_err(|e| PlaybackError::Synthesis(format!("Failed to initialize TTS: {}", e)))?;
        let available_voices = engine.voices();

        Ok(Self {
            engine: tokio::sync::Mutex::new(engine),
            available_voices,
        })
    }

    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }
}

#[cfg(feature = "local-tts")]
#[async_trait]
impl SpeechBackend for KokoroSpeech {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<AudioClip, PlaybackError> {
        if !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(PlaybackError::Synthesis(format!("Unknown voice '{}'", voice_id)));
        }

        let mut engine = self.engine.lock().await;
        let mut samples = Vec::new();

        for chunk in split_into_chunks(text, 200) {
            let chunk_samples = engine
                .synthesize(&chunk, Some(voice_id))
                .map_err(|e| PlaybackError::Synthesis(format!("Synthesis failed: {}", e)))?;
            samples.extend(chunk_samples);
            // 0.3s pause between chunks
            samples.extend(std::iter::repeat_n(0.0, 7_200));
        }

        Ok(AudioClip::Pcm {
            samples,
            sample_rate: LOCAL_SAMPLE_RATE,
            channels: 1,
        })
    }
}

/// Split text into sentence-aligned chunks of at most `max_chars` where
/// possible. Over-long sentences are split on commas.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.trim().is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk.clear();
            }

            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars && !current_chunk.trim().is_empty() {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk.clear();
                    }
                    current_chunk.push_str(part.trim());
                    current_chunk.push(' ');
                }
                continue;
            }
        }

        current_chunk.push_str(sentence);
        current_chunk.push(' ');
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}
