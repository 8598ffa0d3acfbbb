//! Phase 4 — Synthesize (§4.11).
//!
//! Renders the final long-form article from the session's accumulated
//! scratchpad, grounded entirely in what Phases 0-3 actually recorded.
//! This is the only phase that does not operate window-by-window: one
//! streamed call sees the whole scratchpad summary at once.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::ResearchConfig;
use crate::error::Result;
use crate::llm::{ChatRequest, LlmProvider};
use crate::model::goal::SynthesizedGoal;
use crate::prompt::PromptComposer;
use crate::session::store::JsonSessionStore;
use crate::ui::bus::UiBus;

use super::support::stream_with_retry;

/// Runs Phase 4: synthesizes the final article and persists it as the
/// `phase4` artifact. Does not itself change the session status; the
/// caller marks the session `Completed` once this returns.
///
/// # Errors
///
/// Propagates LLM transport errors once the retry budget is spent, and
/// session persistence errors.
pub async fn run(
    session_store: &JsonSessionStore,
    synthesized_goal: &SynthesizedGoal,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    now: i64,
) -> Result<String> {
    ui.display_header("phase4", "Synthesize").await;

    let scratchpad_summary = session_store.get_scratchpad_summary().await;
    let quality_assessment = session_store
        .get_phase_artifact("phase0")
        .await
        .and_then(|phase0| phase0.get("quality_assessment").cloned())
        .unwrap_or(serde_json::Value::Null);

    let goal_text = render_synthesized_goal(synthesized_goal);
    let quality_text = serde_json::to_string(&quality_assessment).unwrap_or_default();

    let mut vars = HashMap::new();
    vars.insert("synthesized_goal", goal_text.as_str());
    vars.insert("scratchpad_summary", scratchpad_summary.as_str());
    vars.insert("quality_assessment", quality_text.as_str());
    let messages = composer.compose("phase4", &vars);

    let request = ChatRequest {
        model: config.synthesizer_model.clone(),
        messages,
        temperature: Some(0.4),
        max_tokens: Some(8192),
        json_mode: false,
        stream: true,
        tools: Vec::new(),
    };

    let read_timeout = Duration::from_secs(config.llm_read_timeout_secs);
    let article = stream_with_retry(provider, ui, &request, read_timeout, config.llm_retry_attempts).await?;
    ui.clear_stream_buffer().await;

    session_store
        .save_phase_artifact("phase4", serde_json::json!({"article": article}), now)
        .await?;
    ui.display_report(&article, None).await;

    Ok(article)
}

fn render_synthesized_goal(goal: &SynthesizedGoal) -> String {
    format!(
        "{}\n\nComponent questions:\n{}\n\n{}\n\nScope: {}",
        goal.comprehensive_topic,
        goal.component_questions
            .iter()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n"),
        goal.unifying_theme,
        goal.research_scope
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_synthesized_goal_includes_component_questions_verbatim() {
        let goal = SynthesizedGoal {
            comprehensive_topic: "topic".into(),
            component_questions: vec!["why did X happen?".into(), "what about Y?".into()],
            unifying_theme: "theme".into(),
            research_scope: "scope".into(),
        };
        let rendered = render_synthesized_goal(&goal);
        assert!(rendered.contains("why did X happen?"));
        assert!(rendered.contains("what about Y?"));
        assert!(rendered.contains("topic"));
        assert!(rendered.contains("scope"));
    }
}
