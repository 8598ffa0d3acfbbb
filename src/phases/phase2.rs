//! Phase 2 — Finalize Plan (§4.9).
//!
//! The windowing/content-kind decisions are deterministic heuristics
//! over transcript size, not model output; only a step's `notes` and
//! optional `step_type` are generated. Those heuristics are a pure
//! function over a profile struct, kept entirely free of LLM calls so
//! the parts that matter for a resumed run stay reproducible.

use std::collections::HashMap;
use std::time::Duration;

use crate::batch::Batch;
use crate::config::{
    DEFAULT_ALL_STRATEGY_WORD_CEILING, DEFAULT_SEQUENTIAL_WORD_FLOOR, ResearchConfig,
};
use crate::error::Result;
use crate::llm::{ChatRequest, LlmProvider};
use crate::model::goal::SuggestedGoal;
use crate::model::plan::{ChunkStrategy, DataKind, PlanStep, validate_plan};
use crate::prompt::PromptComposer;
use crate::session::store::JsonSessionStore;
use crate::ui::bus::UiBus;

use super::support::{lenient_parse, stream_with_retry};

/// Outcome of Phase 2's plan-confirmation prompt.
pub enum PlanOutcome {
    /// The operator confirmed; the plan is ready for Phase 3.
    Confirmed(Vec<PlanStep>),
    /// The operator declined (or did not respond "yes"); the caller must
    /// set the session status to cancelled and stop.
    Cancelled,
}

/// Runs Phase 2: builds a deterministic plan skeleton from `accepted_goals`
/// and `batch`, fills in `notes`/`step_type` per step via one LLM call
/// each, displays the plan, and confirms it with the operator.
pub async fn run(
    session_store: &JsonSessionStore,
    batch: &Batch,
    accepted_goals: &[SuggestedGoal],
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    now: i64,
) -> Result<PlanOutcome> {
    ui.display_header("phase2", "Finalize Plan").await;

    let total_words = batch.total_transcript_words();
    let (base_strategy, chunk_size, append_previous_findings) =
        chunk_strategy_for(total_words, batch.is_single_source(), config);

    let mut steps = Vec::with_capacity(accepted_goals.len() + 1);
    for (idx, goal) in accepted_goals.iter().enumerate() {
        let step_id = i64::try_from(idx + 1).unwrap_or(i64::MAX);
        let required_data = required_data_for(&goal.uses);
        let (notes, step_type) = generate_step_notes(
            &goal.goal_text,
            required_data,
            base_strategy,
            config,
            composer,
            provider,
            ui,
        )
        .await?;

        steps.push(PlanStep {
            step_id,
            goal: goal.goal_text.clone(),
            required_data,
            chunk_strategy: base_strategy,
            chunk_size: if base_strategy == ChunkStrategy::Sequential {
                Some(chunk_size)
            } else {
                None
            },
            notes,
            step_type,
        });
    }

    if append_previous_findings {
        let step_id = i64::try_from(steps.len() + 1).unwrap_or(i64::MAX);
        steps.push(PlanStep {
            step_id,
            goal: "Synthesize findings across all prior steps".to_string(),
            required_data: DataKind::Transcript,
            chunk_strategy: ChunkStrategy::PreviousFindings,
            chunk_size: None,
            notes: None,
            step_type: Some("synthesis".to_string()),
        });
    }

    validate_plan(&steps)?;
    ui.display_plan(&steps).await;

    let reply = ui
        .prompt_user(
            "Proceed with this plan?",
            Some(&["yes".to_string(), "no".to_string()]),
        )
        .await;

    if !reply.trim().eq_ignore_ascii_case("yes") {
        return Ok(PlanOutcome::Cancelled);
    }

    let artifact = serde_json::json!({ "steps": steps });
    session_store.save_phase_artifact("phase2", artifact, now).await?;
    Ok(PlanOutcome::Confirmed(steps))
}

/// Maps a goal's `uses` list to a single [`DataKind`] for its plan step:
/// both transcript and comments present → `transcript_with_comments`;
/// otherwise the lone kind used; empty → `transcript`.
fn required_data_for(uses: &[DataKind]) -> DataKind {
    let has_transcript = uses.contains(&DataKind::Transcript);
    let has_comments = uses.contains(&DataKind::Comments);
    if uses.contains(&DataKind::TranscriptWithComments) || (has_transcript && has_comments) {
        DataKind::TranscriptWithComments
    } else if has_comments {
        DataKind::Comments
    } else if uses.contains(&DataKind::Metadata) && !has_transcript {
        DataKind::Metadata
    } else {
        DataKind::Transcript
    }
}

/// The deterministic §4.9 heuristic: `(chunk_strategy, chunk_size,
/// append_previous_findings_step)` for a batch of `total_words`.
fn chunk_strategy_for(
    total_words: usize,
    single_source: bool,
    config: &ResearchConfig,
) -> (ChunkStrategy, usize, bool) {
    if total_words < DEFAULT_ALL_STRATEGY_WORD_CEILING {
        (ChunkStrategy::All, 0, false)
    } else if total_words < DEFAULT_SEQUENTIAL_WORD_FLOOR {
        if single_source {
            (ChunkStrategy::All, 0, false)
        } else {
            (ChunkStrategy::Sequential, 4_000, false)
        }
    } else {
        (ChunkStrategy::Sequential, config.chunk_size_words, true)
    }
}

#[allow(clippy::too_many_arguments)]
async fn generate_step_notes(
    goal: &str,
    required_data: DataKind,
    chunk_strategy: ChunkStrategy,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
) -> Result<(Option<String>, Option<String>)> {
    let required_data_str = format!("{required_data:?}");
    let chunk_strategy_str = format!("{chunk_strategy:?}");

    let mut vars = HashMap::new();
    vars.insert("goal", goal);
    vars.insert("required_data", required_data_str.as_str());
    vars.insert("chunk_strategy", chunk_strategy_str.as_str());
    let messages = composer.compose("phase2", &vars);

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
    let value = lenient_parse(&text).unwrap_or(serde_json::Value::Null);

    let notes = value.get("notes").and_then(serde_json::Value::as_str).map(str::to_string);
    let step_type = value.get("step_type").and_then(serde_json::Value::as_str).map(str::to_string);
    Ok((notes, step_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ResearchConfig {
        ResearchConfig::builder().build().unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_chunk_strategy_small_uses_all() {
        let (strategy, _, append) = chunk_strategy_for(3_000, false, &config());
        assert_eq!(strategy, ChunkStrategy::All);
        assert!(!append);
    }

    #[test]
    fn test_chunk_strategy_medium_single_source_uses_all() {
        let (strategy, _, append) = chunk_strategy_for(7_000, true, &config());
        assert_eq!(strategy, ChunkStrategy::All);
        assert!(!append);
    }

    #[test]
    fn test_chunk_strategy_medium_multi_source_uses_sequential_4000() {
        let (strategy, size, append) = chunk_strategy_for(7_000, false, &config());
        assert_eq!(strategy, ChunkStrategy::Sequential);
        assert_eq!(size, 4_000);
        assert!(!append);
    }

    #[test]
    fn test_chunk_strategy_large_uses_sequential_and_appends_previous_findings() {
        let (strategy, size, append) = chunk_strategy_for(15_000, false, &config());
        assert_eq!(strategy, ChunkStrategy::Sequential);
        assert_eq!(size, config().chunk_size_words);
        assert!(append);
    }

    #[test]
    fn test_required_data_for_both_kinds_merges() {
        let kind = required_data_for(&[DataKind::Transcript, DataKind::Comments]);
        assert_eq!(kind, DataKind::TranscriptWithComments);
    }

    #[test]
    fn test_required_data_for_comments_only() {
        assert_eq!(required_data_for(&[DataKind::Comments]), DataKind::Comments);
    }

    #[test]
    fn test_required_data_for_empty_defaults_transcript() {
        assert_eq!(required_data_for(&[]), DataKind::Transcript);
    }
}
