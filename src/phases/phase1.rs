//! Phase 1 — Discover Goals, with amendment loop (§4.7).
//!
//! A bounded accept/amend cycle: the model proposes goals, the operator
//! is shown them and asked how to amend, and an empty reply accepts
//! them. The final allotted round is accepted unconditionally, so the
//! cycle always terminates rather than looping forever.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::ResearchConfig;
use crate::error::{Error, PhaseError, Result};
use crate::llm::{ChatRequest, LlmProvider};
use crate::model::goal::{GoalStatus, SuggestedGoal};
use crate::prompt::PromptComposer;
use crate::session::store::JsonSessionStore;
use crate::ui::bus::UiBus;

use super::support::{lenient_parse, render_data_abstract, render_research_role, stream_with_retry};

/// Runs Phase 1's accept/amend loop and returns the accepted goal list.
///
/// # Errors
///
/// Returns [`PhaseError::EmptyGoals`] if any generation round yields no
/// goals.
pub async fn run(
    session_store: &JsonSessionStore,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    now: i64,
) -> Result<Vec<SuggestedGoal>> {
    ui.display_header("phase1", "Discover Goals").await;

    let phase0 = session_store.get_phase_artifact("phase0").await.ok_or_else(|| {
        Error::Phase(PhaseError::InconsistentArtifacts {
            message: "phase1 requires a phase0 artifact".to_string(),
        })
    })?;
    let role = session_store.get_phase_artifact("phase0_5").await.ok_or_else(|| {
        Error::Phase(PhaseError::InconsistentArtifacts {
            message: "phase1 requires a phase0_5 artifact".to_string(),
        })
    })?;

    let data_abstract = render_data_abstract(&phase0);
    let research_role = render_research_role(&role);

    let max_rounds = config.max_amendment_rounds.max(1);
    let mut amendment = String::new();
    let mut goals = Vec::new();

    for round in 0..max_rounds {
        goals = generate_goals(&research_role, &data_abstract, &amendment, config, composer, provider, ui).await?;
        if goals.is_empty() {
            return Err(Error::Phase(PhaseError::EmptyGoals));
        }

        ui.display_goals(&goals).await;

        let is_final_round = round + 1 == max_rounds;
        if is_final_round {
            break;
        }

        let reply = ui.prompt_user("how to amend?", None).await;
        if reply.trim().is_empty() {
            break;
        }
        session_store.set_post_phase1_feedback(&reply, now).await?;
        amendment = reply;
    }

    for goal in &mut goals {
        goal.status = GoalStatus::Accepted;
    }

    let artifact = serde_json::json!({ "suggested_goals": goals });
    session_store.save_phase_artifact("phase1", artifact, now).await?;
    Ok(goals)
}

async fn generate_goals(
    research_role: &str,
    data_abstract: &str,
    amendment: &str,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
) -> Result<Vec<SuggestedGoal>> {
    let mut vars = HashMap::new();
    vars.insert("research_role", research_role);
    vars.insert("data_abstract", data_abstract);
    vars.insert("amendment", amendment);
    let messages = composer.compose("phase1", &vars);

    let request = ChatRequest {
        model: config.planner_model.clone(),
        messages,
        temperature: Some(0.3),
        max_tokens: Some(2048),
        json_mode: true,
        stream: true,
        tools: Vec::new(),
    };

    let read_timeout = Duration::from_secs(config.llm_read_timeout_secs);
    let text = stream_with_retry(provider, ui, &request, read_timeout, config.llm_retry_attempts).await?;
    ui.clear_stream_buffer().await;
    let value = lenient_parse(&text)?;
    Ok(parse_goals(&value))
}

/// Parses a model-returned goal array (or a `{goals: [...]}` wrapper)
/// into [`SuggestedGoal`]s, assigning sequential ids and defaulting
/// `status` to `Proposed` (the caller promotes accepted goals).
fn parse_goals(value: &serde_json::Value) -> Vec<SuggestedGoal> {
    let array = value
        .as_array()
        .cloned()
        .or_else(|| value.get("goals").and_then(serde_json::Value::as_array).cloned())
        .unwrap_or_default();

    array
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            let goal_text = entry.get("goal_text").and_then(serde_json::Value::as_str)?.to_string();
            let rationale = entry
                .get("rationale")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            let uses = entry
                .get("uses")
                .and_then(serde_json::Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| serde_json::from_value(v.clone()).ok())
                        .collect()
                })
                .unwrap_or_default();
            Some(SuggestedGoal {
                id: i64::try_from(idx + 1).unwrap_or(i64::MAX),
                goal_text,
                rationale,
                uses,
                status: GoalStatus::Proposed,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_goals_plain_array() {
        let value = serde_json::json!([
            {"goal_text": "find X", "rationale": "because", "uses": ["transcript"]},
            {"goal_text": "find Y", "rationale": "also", "uses": ["comments"]},
        ]);
        let goals = parse_goals(&value);
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].id, 1);
        assert_eq!(goals[1].goal_text, "find Y");
    }

    #[test]
    fn test_parse_goals_wrapper_object() {
        let value = serde_json::json!({"goals": [{"goal_text": "find X", "rationale": "r", "uses": []}]});
        let goals = parse_goals(&value);
        assert_eq!(goals.len(), 1);
    }

    #[test]
    fn test_parse_goals_skips_entries_missing_goal_text() {
        let value = serde_json::json!([{"rationale": "r"}, {"goal_text": "ok", "rationale": "r"}]);
        let goals = parse_goals(&value);
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].goal_text, "ok");
    }

    #[test]
    fn test_parse_goals_empty_array_yields_empty() {
        let value = serde_json::json!([]);
        assert!(parse_goals(&value).is_empty());
    }
}
