//! Phase 0.5 — Research Role (§4.6).
//!
//! Generates a `{role, rationale}` pair describing the analyst persona
//! the remaining phases write their prompts around, grounded in an
//! abstract of the batch's data quality and optional operator feedback
//! solicited before generation.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::ResearchConfig;
use crate::error::{Error, PhaseError, Result};
use crate::llm::{ChatRequest, LlmProvider};
use crate::prompt::PromptComposer;
use crate::session::store::JsonSessionStore;
use crate::ui::bus::UiBus;

use super::support::{lenient_parse, render_data_abstract, stream_with_retry};

/// Runs Phase 0.5: builds a data abstract from the `phase0` artifact,
/// solicits optional feedback, and persists the resulting research role
/// both as the `phase0_5` artifact and as session metadata.
pub async fn run(
    session_store: &JsonSessionStore,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    now: i64,
) -> Result<()> {
    ui.display_header("phase0_5", "Research Role").await;

    let phase0 = session_store
        .get_phase_artifact("phase0")
        .await
        .ok_or_else(|| Error::Phase(PhaseError::InconsistentArtifacts {
            message: "phase0_5 requires a phase0 artifact".to_string(),
        }))?;

    let data_abstract = render_data_abstract(&phase0);
    let feedback = ui
        .prompt_user(
            "Any feedback on the research role before we begin? (leave blank to skip)",
            None,
        )
        .await;

    let mut vars = HashMap::new();
    vars.insert("data_abstract", data_abstract.as_str());
    vars.insert("feedback", feedback.as_str());
    let messages = composer.compose("phase0_5", &vars);

    let request = ChatRequest {
        model: config.planner_model.clone(),
        messages,
        temperature: Some(0.2),
        max_tokens: Some(512),
        json_mode: true,
        stream: true,
        tools: Vec::new(),
    };

    let read_timeout = Duration::from_secs(config.llm_read_timeout_secs);
    let text = stream_with_retry(provider, ui, &request, read_timeout, config.llm_retry_attempts).await?;
    ui.clear_stream_buffer().await;
    let role = lenient_parse(&text)?;

    if !feedback.trim().is_empty() {
        session_store.set_pre_phase1_feedback(&feedback, now).await?;
    }
    session_store.set_research_role(role.clone(), now).await?;
    session_store.save_phase_artifact("phase0_5", role, now).await?;
    Ok(())
}

