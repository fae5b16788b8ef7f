//! Text generation backends.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::GenerationError;

/// Contract the debate agents need from a text-generation backend.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Generation over an OpenAI-compatible chat completion API.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig, api_key: &str) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GenerationError::Client(format!("Failed to create HTTP client: {}", e)))?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.api_base);

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries.max(1),
        })
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_completion_tokens(self.max_tokens)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: prompt.to_string().into(),
                    name: None,
                },
            )])
            .build()?;

        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // 1s, 2s, 4s, ...
                let delay = Duration::from_secs(1 << (attempt - 1));
                tokio::time::sleep(delay).await;
            }

            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    let content = response
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default();
                    let cleaned = sanitize_response(&content);
                    if cleaned.is_empty() {
                        return Err(GenerationError::EmptyResponse);
                    }
                    debug!(model = %self.model, chars = cleaned.len(), "completion received");
                    return Ok(cleaned);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "completion request failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .map(GenerationError::from)
            .unwrap_or_else(|| GenerationError::Api("Unknown API error after retries".to_string())))
    }
}

/// Strip reasoning tokens and markup from a model reply.
///
/// Removes blocks like `<thinking>...</thinking>`, orphaned tags, asterisk
/// emphasis, and collapses whitespace.
pub fn sanitize_response(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reflect",
        "internal",
        "reasoning",
        "thought",
        "scratchpad",
        "analysis",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    if let Ok(orphan_re) = regex::Regex::new(r"</?[\w]+[^>]*>") {
        result = orphan_re.replace_all(&result, "").to_string();
    }

    result = result.replace('*', "");

    if let Ok(ws_re) = regex::Regex::new(r"\s+") {
        result = ws_re.replace_all(&result, " ").to_string();
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_response_thinking_tags() {
        let input = "<thinking>Let me think about this...</thinking>The answer is 42.";
        assert_eq!(sanitize_response(input), "The answer is 42.");
    }

    #[test]
    fn test_sanitize_response_multiline_tags() {
        let input = "<think>\nMultiple\nlines\n</think>Evidence 2 shows costs fell.";
        assert_eq!(sanitize_response(input), "Evidence 2 shows costs fell.");
    }

    #[test]
    fn test_sanitize_response_emphasis_and_whitespace() {
        let input = "**Rebuttal:**   the   opponent\n\nignores Evidence 1.";
        assert_eq!(sanitize_response(input), "Rebuttal: the opponent ignores Evidence 1.");
    }

    #[test]
    fn test_sanitize_response_only_reasoning_is_empty() {
        let input = "<reasoning>nothing to say</reasoning>";
        assert!(sanitize_response(input).is_empty());
    }

    #[test]
    fn test_new_generator_from_default_config() {
        let config = GenerationConfig::default();
        let generator = OpenAiGenerator::new(&config, "test-key").unwrap();
        assert_eq!(generator.model, config.model);
        assert!(generator.max_retries >= 1);
    }
}
