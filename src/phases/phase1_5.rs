//! Phase 1.5 — Synthesize Goal (§4.8).
//!
//! Generates a single comprehensive framing around the accepted Phase 1
//! goals. The model only contributes `comprehensive_topic`,
//! `unifying_theme`, and `research_scope`; `component_questions` is
//! always the accepted goals' `goal_text` values, assigned by this code
//! rather than trusted from the model's response, enforcing the
//! verbatim-preservation invariant (§8) unconditionally rather than
//! merely checking it after the fact.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::ResearchConfig;
use crate::error::Result;
use crate::llm::{ChatRequest, LlmProvider};
use crate::model::goal::{SuggestedGoal, SynthesizedGoal};
use crate::prompt::PromptComposer;
use crate::session::store::JsonSessionStore;
use crate::ui::bus::UiBus;

use super::support::{lenient_parse, stream_with_retry};

/// Runs Phase 1.5, returning the synthesized goal.
pub async fn run(
    session_store: &JsonSessionStore,
    accepted_goals: &[SuggestedGoal],
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    now: i64,
) -> Result<SynthesizedGoal> {
    ui.display_header("phase1_5", "Synthesize Goal").await;

    let accepted_goals_text = render_accepted_goals(accepted_goals);

    let mut vars = HashMap::new();
    vars.insert("accepted_goals", accepted_goals_text.as_str());
    let messages = composer.compose("phase1_5", &vars);

    let request = ChatRequest {
        model: config.planner_model.clone(),
        messages,
        temperature: Some(0.2),
        max_tokens: Some(1024),
        json_mode: true,
        stream: true,
        tools: Vec::new(),
    };

    let read_timeout = Duration::from_secs(config.llm_read_timeout_secs);
    let text = stream_with_retry(provider, ui, &request, read_timeout, config.llm_retry_attempts).await?;
    ui.clear_stream_buffer().await;
    let value = lenient_parse(&text)?;

    let synthesized = SynthesizedGoal {
        comprehensive_topic: value
            .get("comprehensive_topic")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string(),
        component_questions: accepted_goals.iter().map(|g| g.goal_text.clone()).collect(),
        unifying_theme: value
            .get("unifying_theme")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string(),
        research_scope: value
            .get("research_scope")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };

    debug_assert!(synthesized.preserves_goals(accepted_goals));

    ui.display_synthesized_goal(&synthesized).await;
    session_store.set_synthesized_goal(synthesized.clone(), now).await?;
    session_store
        .save_phase_artifact("phase1_5", serde_json::to_value(&synthesized).unwrap_or_default(), now)
        .await?;
    Ok(synthesized)
}

fn render_accepted_goals(goals: &[SuggestedGoal]) -> String {
    goals
        .iter()
        .map(|g| format!("{}. {} ({})", g.id, g.goal_text, g.rationale))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::goal::GoalStatus;
    use crate::model::plan::DataKind;

    fn goal(id: i64, text: &str) -> SuggestedGoal {
        SuggestedGoal {
            id,
            goal_text: text.to_string(),
            rationale: "because".to_string(),
            uses: vec![DataKind::Transcript],
            status: GoalStatus::Accepted,
        }
    }

    #[test]
    fn test_render_accepted_goals_lists_all() {
        let goals = vec![goal(1, "find X"), goal(2, "find Y")];
        let rendered = render_accepted_goals(&goals);
        assert!(rendered.contains("find X"));
        assert!(rendered.contains("find Y"));
    }
}
