//! End-to-end properties of a debate run over scripted backends.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use rebut_core::{
    AudioController, Config, DebateEngine, DebateError, DebateEvent, DebateMode, DebateRequest,
    DebateResponse, EvidenceItem, EvidenceRetriever, GenerationClient, GenerationError,
    InMemoryRetriever, NoEvidence, Position, RetrievalError, Turn,
};

/// Answers with the side and round found in the prompt; fails on one round.
struct ScriptedGenerator {
    fail_round: Option<u32>,
}

fn prompt_round(prompt: &str) -> u32 {
    prompt
        .lines()
        .find_map(|l| l.trim().strip_prefix("ROUND: "))
        .and_then(|r| r.split('/').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let round = prompt_round(prompt);
        if self.fail_round == Some(round) {
            return Err(GenerationError::Api("backend timeout".to_string()));
        }
        let side = if prompt.contains("Your PRO response:") { "pro" } else { "con" };
        let evidence = if prompt.contains("Evidence 1 (") { "with evidence" } else { "no evidence" };
        Ok(format!("{} argument {} ({})", side, round, evidence))
    }
}

struct FailingRetriever;

#[async_trait]
impl EvidenceRetriever for FailingRetriever {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<EvidenceItem>, RetrievalError> {
        Err(RetrievalError::Unavailable("vector index down".to_string()))
    }
}

fn engine(generator: ScriptedGenerator, retriever: Arc<dyn EvidenceRetriever>) -> DebateEngine {
    DebateEngine::from_config(
        &Config::default(),
        Arc::new(generator),
        retriever,
        Arc::new(AudioController::disabled()),
    )
    .unwrap()
}

fn default_engine() -> DebateEngine {
    engine(ScriptedGenerator { fail_round: None }, Arc::new(NoEvidence))
}

async fn stream_turns(engine: &DebateEngine, request: DebateRequest) -> Vec<DebateEvent> {
    engine.run_streamed(request).collect().await
}

fn key(turn: &Turn) -> (Position, u32, String) {
    (turn.speaker, turn.round, turn.text.clone())
}

#[tokio::test]
async fn test_turn_count_and_parity() {
    let engine = default_engine();
    for max_rounds in 1..=7 {
        let transcript = engine
            .run(DebateRequest::new("Cities should ban cars").with_rounds(max_rounds))
            .await
            .unwrap();

        assert_eq!(transcript.total_exchanges(), max_rounds as usize);
        for (i, turn) in transcript.turns.iter().enumerate() {
            let index = i as u32 + 1;
            assert_eq!(turn.round, index);
            let expected = if index % 2 == 1 { Position::Pro } else { Position::Con };
            assert_eq!(turn.speaker, expected);
        }
    }
}

#[tokio::test]
async fn test_batch_and_stream_agree() {
    let engine = default_engine();
    let request = DebateRequest::new("Nuclear power is safe").with_rounds(5);

    let batch = engine.run(request.clone()).await.unwrap();
    let events = stream_turns(&engine, request).await;

    let streamed: Vec<(Position, u32, String)> = events
        .iter()
        .filter_map(|e| match e {
            DebateEvent::Message {
                speaker,
                round,
                message,
                ..
            } => Some((*speaker, *round, message.clone())),
            _ => None,
        })
        .collect();
    let batched: Vec<_> = batch.turns.iter().map(key).collect();
    assert_eq!(streamed, batched);

    match events.last() {
        Some(DebateEvent::Complete {
            total_exchanges,
            conversation_history,
        }) => {
            assert_eq!(*total_exchanges, 5);
            let completed: Vec<_> = conversation_history.iter().map(key).collect();
            assert_eq!(completed, batched);
        }
        other => panic!("expected complete event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_event_order() {
    let events = stream_turns(&default_engine(), DebateRequest::new("X is good").with_rounds(3)).await;

    assert_eq!(events.len(), 5);
    assert_eq!(
        events[0],
        DebateEvent::Start {
            claim: "X is good".to_string()
        }
    );
    for (i, event) in events[1..4].iter().enumerate() {
        match event {
            DebateEvent::Message { round, .. } => assert_eq!(*round, i as u32 + 1),
            other => panic!("expected message, got {:?}", other),
        }
    }
    assert!(matches!(events[4], DebateEvent::Complete { total_exchanges: 3, .. }));
}

#[tokio::test]
async fn test_audio_gating_truth_table() {
    let engine = default_engine();
    for include_audio in [false, true] {
        for mode in [DebateMode::TextOnly, DebateMode::Both] {
            let request = DebateRequest::new("claim")
                .with_rounds(4)
                .with_audio(include_audio)
                .with_mode(mode);
            let expected = include_audio && mode == DebateMode::Both;

            let transcript = engine.run(request.clone()).await.unwrap();
            assert!(transcript.turns.iter().all(|t| t.play_audio == expected && t.show_text));

            for event in stream_turns(&engine, request).await {
                if let DebateEvent::Message { play_audio, show_text, .. } = event {
                    assert_eq!(play_audio, expected);
                    assert!(show_text);
                }
            }
        }
    }
}

#[tokio::test]
async fn test_generation_failure_is_contained_to_its_turn() {
    let engine = engine(ScriptedGenerator { fail_round: Some(2) }, Arc::new(NoEvidence));
    let transcript = engine
        .run(DebateRequest::new("claim").with_rounds(4))
        .await
        .unwrap();

    let texts: Vec<&str> = transcript.turns.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "pro argument 1 (no evidence)",
            "Error generating response: API error: backend timeout",
            "pro argument 3 (no evidence)",
            "con argument 4 (no evidence)",
        ]
    );
}

#[tokio::test]
async fn test_retrieval_failure_never_aborts() {
    let engine = engine(ScriptedGenerator { fail_round: None }, Arc::new(FailingRetriever));
    let transcript = engine
        .run(DebateRequest::new("claim").with_rounds(3))
        .await
        .unwrap();

    assert_eq!(transcript.turns.len(), 3);
    assert!(transcript.turns.iter().all(|t| !t.text.is_empty()));
    assert!(transcript.turns.iter().all(|t| t.text.ends_with("(no evidence)")));
}

#[tokio::test]
async fn test_evidence_reaches_prompt() {
    let mut corpus = InMemoryRetriever::new();
    corpus.add_texts(["Four-day weeks cut burnout in trials."], Some(&["uk-pilot"]));
    let engine = engine(ScriptedGenerator { fail_round: None }, Arc::new(corpus));

    let transcript = engine
        .run(DebateRequest::new("Four-day weeks work").with_rounds(2))
        .await
        .unwrap();
    assert_eq!(transcript.turns[0].text, "pro argument 1 (with evidence)");
}

#[tokio::test]
async fn test_two_round_scenario_response() {
    let transcript = default_engine()
        .run(DebateRequest::new("X is good").with_rounds(2).with_audio(false))
        .await
        .unwrap();
    let response = DebateResponse::from(transcript);

    assert!(response.success);
    assert_eq!(response.claim, "X is good");
    assert_eq!(response.total_exchanges, 2);
    let shape: Vec<(Position, u32)> = response
        .conversation_history
        .iter()
        .map(|t| (t.speaker, t.round))
        .collect();
    assert_eq!(shape, vec![(Position::Pro, 1), (Position::Con, 2)]);
}

#[tokio::test]
async fn test_zero_rounds_rejected_in_both_modes() {
    let engine = default_engine();
    let request = DebateRequest::new("claim").with_rounds(0);

    let err = engine.run(request.clone()).await.unwrap_err();
    assert!(matches!(err, DebateError::InvalidRounds(0)));

    let events = stream_turns(&engine, request).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], DebateEvent::Error { message } if message.contains("at least 1")));
}

#[tokio::test]
async fn test_abort_mid_stream_emits_error() {
    let engine = default_engine();
    let run = engine.start(DebateRequest::new("claim").with_rounds(4)).unwrap();
    let abort = run.abort_handle();
    let mut stream = run.into_stream();

    assert!(matches!(stream.next().await, Some(DebateEvent::Start { .. })));
    assert!(matches!(stream.next().await, Some(DebateEvent::Message { round: 1, .. })));
    abort.abort();

    match stream.next().await {
        Some(DebateEvent::Error { message }) => assert!(message.contains("aborted after 1 of 4")),
        other => panic!("expected error event, got {:?}", other),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_aborted_batch_keeps_partial_history() {
    let engine = default_engine();
    let mut run = engine.start(DebateRequest::new("claim").with_rounds(4)).unwrap();
    run.advance().await.unwrap();
    run.advance().await.unwrap();
    run.abort_handle().abort();

    let err = run.run_to_completion().await.unwrap_err();
    assert!(matches!(err, DebateError::Aborted { completed: 2, .. }));
    assert_eq!(run.history().len(), 2);
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let engine = default_engine();
    let a = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run(DebateRequest::new("claim A").with_rounds(3)).await }
    });
    let b = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run(DebateRequest::new("claim B").with_rounds(6)).await }
    });

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    assert_eq!((a.claim.as_str(), a.turns.len()), ("claim A", 3));
    assert_eq!((b.claim.as_str(), b.turns.len()), ("claim B", 6));
}
