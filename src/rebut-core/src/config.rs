//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::DebateError;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub agents: AgentsConfig,
    pub prompts: PromptsConfig,
    pub audio: AudioConfig,
}

/// OpenAI-compatible generation backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 400,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalBackend {
    #[default]
    None,
    Memory,
    Pinecone,
}

/// Evidence store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub backend: RetrievalBackend,
    pub top_k: usize,
    /// JSON corpus for the in-memory backend.
    pub corpus: Option<String>,
    pub index_host: Option<String>,
    pub namespace: String,
    pub text_field: String,
    pub source_field: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: RetrievalBackend::None,
            top_k: 5,
            corpus: None,
            index_host: None,
            namespace: "__default__".to_string(),
            text_field: "text".to_string(),
            source_field: "source".to_string(),
        }
    }
}

/// Debater names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub pro_name: String,
    pub con_name: String,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            pro_name: "Proponent".to_string(),
            con_name: "Opponent".to_string(),
        }
    }
}

/// Prompt template shared by both sides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub template: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackendKind {
    #[default]
    None,
    Elevenlabs,
    Kokoro,
}

/// Whether turn production waits for playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// The next turn starts after the previous clip finished.
    #[default]
    Blocking,
    /// Clips play on a per-run lane while the next turn is generated.
    Background,
}

/// Speech synthesis and playback settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub backend: SpeechBackendKind,
    pub model_id: String,
    pub playback: PlaybackMode,
    /// Backend voice used when a requested name is not in the table.
    pub fallback_voice: Option<String>,
    /// Extra or overriding name to backend-id entries.
    pub voices: BTreeMap<String, String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: SpeechBackendKind::None,
            model_id: "eleven_multilingual_v2".to_string(),
            playback: PlaybackMode::Blocking,
            fallback_voice: None,
            voices: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, DebateError> {
        toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Agent name for a side.
    pub fn agent_name(&self, is_pro: bool) -> &str {
        if is_pro {
            &self.agents.pro_name
        } else {
            &self.agents.con_name
        }
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

const DEFAULT_PROMPT: &str = r#"You are {name}, arguing the {position} side of a debate.

DEBATE TOPIC: "{claim}"

ROUND: {round}/{max_rounds}

{history}

EVIDENCE TO SUPPORT YOUR {position} POSITION:
{evidence}

INSTRUCTIONS:
1. Use the evidence above to support your {position} argument.
2. Only state your facts and reasoning; keep deference and flattery to a minimum.
3. Rebut the points your opponent has already made.
4. Be extremely concise.
5. Cite evidence by number where possible.

Your {position} response:
"#;
