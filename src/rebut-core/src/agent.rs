//! Debate agents.
//!
//! One agent per side. Agents hold no per-run state and can be shared across
//! concurrent runs.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::generation::GenerationClient;
use crate::prompt::{PromptContext, evidence_query, render_prompt};
use crate::retrieval::{EvidenceItem, EvidenceRetriever};
use crate::state::{DebateState, Position};

/// Evidence items requested per turn.
pub const DEFAULT_TOP_K: usize = 5;

/// An evidence-backed debater for one side.
#[derive(Clone)]
pub struct DebateAgent {
    name: String,
    position: Position,
    generator: Arc<dyn GenerationClient>,
    retriever: Arc<dyn EvidenceRetriever>,
    template: Arc<str>,
    top_k: usize,
}

impl DebateAgent {
    pub fn new(
        name: impl Into<String>,
        position: Position,
        generator: Arc<dyn GenerationClient>,
        retriever: Arc<dyn EvidenceRetriever>,
        template: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            generator,
            retriever,
            template: template.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Set how many evidence items to request.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Get the full display name with side.
    pub fn display_name_with_position(&self) -> String {
        format!("{} ({})", self.name, self.position.display_name())
    }

    /// Fetch evidence for this side. Failures yield no evidence.
    pub async fn gather_evidence(&self, claim: &str) -> Vec<EvidenceItem> {
        let query = evidence_query(claim, self.position);
        match self.retriever.search(&query, self.top_k).await {
            Ok(items) => {
                debug!(agent = %self.name, hits = items.len(), "evidence retrieved");
                items
            }
            Err(e) => {
                warn!(agent = %self.name, error = %e, "evidence retrieval failed, continuing without evidence");
                Vec::new()
            }
        }
    }

    /// Build the prompt for the state's current round.
    pub fn build_prompt(&self, state: &DebateState, evidence: &[EvidenceItem]) -> String {
        render_prompt(
            &self.template,
            &PromptContext {
                name: &self.name,
                position: self.position,
                claim: state.claim(),
                round: state.round_number(),
                max_rounds: state.max_rounds(),
                history: state.history(),
                evidence,
            },
        )
    }

    /// Produce this side's text for the current round.
    ///
    /// Never fails: a generation error becomes a placeholder that names the
    /// failure.
    pub async fn produce(&self, state: &DebateState) -> String {
        let evidence = self.gather_evidence(state.claim()).await;
        let prompt = self.build_prompt(state, &evidence);

        match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(agent = %self.name, round = state.round_number(), error = %e, "generation failed");
                error_placeholder(&e)
            }
        }
    }
}

/// Text recorded for a turn whose generation failed.
pub fn error_placeholder(reason: &dyn std::fmt::Display) -> String {
    format!("Error generating response: {}", reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptsConfig;
    use crate::error::{GenerationError, RetrievalError};
    use crate::retrieval::InMemoryRetriever;
    use crate::state::{DebateMode, RunSettings};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records prompts and answers with a fixed reply.
    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationClient for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("A concise argument.".to_string())
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl GenerationClient for BrokenGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Api("quota exceeded".to_string()))
        }
    }

    struct BrokenRetriever;

    #[async_trait]
    impl EvidenceRetriever for BrokenRetriever {
        async fn search(&self, _q: &str, _k: usize) -> Result<Vec<EvidenceItem>, RetrievalError> {
            Err(RetrievalError::Unavailable("index offline".to_string()))
        }
    }

    fn state() -> DebateState {
        DebateState::new(
            "Remote work is better",
            RunSettings {
                max_rounds: 4,
                include_audio: false,
                debate_mode: DebateMode::Both,
                pro_voice: "Rachel".to_string(),
                con_voice: "Adam".to_string(),
            },
        )
        .unwrap()
    }

    fn template() -> String {
        PromptsConfig::default().template
    }

    #[tokio::test]
    async fn test_produce_injects_evidence() {
        let generator = Arc::new(RecordingGenerator::default());
        let mut corpus = InMemoryRetriever::new();
        corpus.add_texts(["Remote work raised output by 13%."], Some(&["stanford-trial"]));

        let agent = DebateAgent::new(
            "Proponent",
            Position::Pro,
            generator.clone(),
            Arc::new(corpus),
            template(),
        );

        let text = agent.produce(&state()).await;
        assert_eq!(text, "A concise argument.");

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Evidence 1 (stanford-trial): Remote work raised output by 13%."));
        assert!(prompts[0].contains("Your PRO response:"));
    }

    #[tokio::test]
    async fn test_retrieval_failure_still_answers() {
        let generator = Arc::new(RecordingGenerator::default());
        let agent = DebateAgent::new(
            "Opponent",
            Position::Con,
            generator.clone(),
            Arc::new(BrokenRetriever),
            template(),
        );

        let text = agent.produce(&state()).await;
        assert_eq!(text, "A concise argument.");
        assert!(generator.prompts.lock().unwrap()[0].contains("No evidence was retrieved"));
    }

    #[tokio::test]
    async fn test_generation_failure_yields_placeholder() {
        let agent = DebateAgent::new(
            "Opponent",
            Position::Con,
            Arc::new(BrokenGenerator),
            Arc::new(BrokenRetriever),
            template(),
        );

        let text = agent.produce(&state()).await;
        assert_eq!(text, "Error generating response: API error: quota exceeded");
    }

    #[test]
    fn test_display_name_with_position() {
        let agent = DebateAgent::new(
            "Proponent",
            Position::Pro,
            Arc::new(BrokenGenerator),
            Arc::new(BrokenRetriever),
            template(),
        );
        assert_eq!(agent.display_name_with_position(), "Proponent (PRO)");
    }
}
