//! Prompt construction for debate turns.
//!
//! One template serves both sides; the side only changes the placeholders.

use regex::{Captures, Regex};

use crate::retrieval::EvidenceItem;
use crate::state::{Position, Turn};

/// Everything a template needs to render one turn's prompt.
pub struct PromptContext<'a> {
    pub name: &'a str,
    pub position: Position,
    pub claim: &'a str,
    pub round: u32,
    pub max_rounds: u32,
    pub history: &'a [Turn],
    pub evidence: &'a [EvidenceItem],
}

/// Retrieval query for a side, e.g. `"X is good pro arguments"`.
pub fn evidence_query(claim: &str, position: Position) -> String {
    format!("{} {} arguments", claim, position.as_str())
}

/// Chronological rendering of prior turns.
pub fn render_history(history: &[Turn]) -> String {
    if history.is_empty() {
        return "No previous exchanges. You are opening the debate.".to_string();
    }

    let mut context = String::from("Previous exchanges:\n");
    for turn in history {
        context.push_str(&format!(
            "{} (round {}): {}\n",
            turn.speaker.display_name(),
            turn.round,
            turn.text
        ));
    }
    context
}

/// Numbered evidence with source attribution.
pub fn render_evidence(evidence: &[EvidenceItem]) -> String {
    if evidence.is_empty() {
        return "No evidence was retrieved. Argue from reasoning alone.".to_string();
    }

    evidence
        .iter()
        .enumerate()
        .map(|(i, ev)| format!("Evidence {} ({}): {}", i + 1, ev.source, ev.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fill a template's placeholders in one pass.
///
/// Substituted values are never rescanned, so braces inside a claim or a
/// previous turn stay literal. Unknown placeholders are left untouched.
pub fn render_prompt(template: &str, ctx: &PromptContext<'_>) -> String {
    let Ok(placeholder) = Regex::new(r"\{(\w+)\}") else {
        return template.to_string();
    };

    placeholder
        .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
            "name" => ctx.name.to_string(),
            "position" => ctx.position.display_name().to_string(),
            "claim" => ctx.claim.to_string(),
            "round" => ctx.round.to_string(),
            "max_rounds" => ctx.max_rounds.to_string(),
            "history" => render_history(ctx.history),
            "evidence" => render_evidence(ctx.evidence),
            _ => caps[0].to_string(),
        })
        .into_owned()
}
