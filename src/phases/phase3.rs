//! Phase 3 — Execute (§4.10).
//!
//! Runs one plan step to completion: builds the step's windows per its
//! `chunk_strategy`, drives each window through a streamed LLM call with
//! a bounded mid-stream retrieval loop, folds window findings into a
//! single deduplicated result via [`super::aggregate`], and persists the
//! step's artifact, scratchpad entry, and digest. A window that never
//! yields a parseable result degrades to a zero-confidence contribution
//! rather than aborting the step, the same per-unit error isolation
//! Phase 0 uses for a single item's summarization failure.

use std::collections::HashMap;
use std::time::Duration;

use crate::batch::{Batch, BatchItem};
use crate::config::ResearchConfig;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::message::{assistant_message, user_message};
use crate::llm::{ChatRequest, LlmProvider};
use crate::model::finding::{Findings, PointsOfInterest, StepFinding};
use crate::model::plan::{ChunkStrategy, DataKind, PlanStep};
use crate::model::retrieval::RetrievalRequest;
use crate::prompt::PromptComposer;
use crate::retrieval::RetrievalHandler;
use crate::session::store::JsonSessionStore;
use crate::ui::bus::UiBus;
use crate::windowing::{SampleUnit, Window, window_all, window_previous_findings, window_random_sample, window_sequential};

use super::aggregate::Aggregator;
use super::support::{lenient_parse, stream_parsed_with_retry};

/// The outcome of running one window through the model, independent of
/// whether the model ever produced a parseable result.
#[derive(Debug, Default)]
struct WindowResult {
    findings: Findings,
    insights: String,
    confidence: f64,
    retrieval_sources: Vec<String>,
}

/// Runs Phase 3 for a single plan step, returning its finalized
/// [`StepFinding`] and persisting every associated session artifact.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    session_store: &JsonSessionStore,
    batch: &Batch,
    step: &PlanStep,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    embedder: Option<&dyn Embedder>,
    now: i64,
) -> Result<StepFinding> {
    ui.display_header("phase3", &format!("Execute: {}", step.goal)).await;

    let snapshot = session_store.snapshot().await;
    let step_digests = snapshot.step_digests.iter().cloned().collect::<Vec<_>>().join("\n");
    let scratchpad_summary = session_store.get_scratchpad_summary().await;

    let content = content_for_step(batch, step.required_data);
    let windows = build_windows(&content, step, config, &scratchpad_summary);

    let retrieval_handler = match embedder {
        Some(embedder) => RetrievalHandler::with_embedder(batch, embedder),
        None => RetrievalHandler::new(batch),
    };

    let mut followups_used: u32 = 0;
    let mut aggregator = Aggregator::new();
    let mut summaries: Vec<String> = Vec::new();
    let mut insight_lines: Vec<String> = Vec::new();
    let mut window_confidences: Vec<f64> = Vec::new();
    let mut retrieval_sources: Vec<String> = Vec::new();
    let mut running_findings = String::new();

    let total_windows = windows.len();
    for (idx, window) in windows.iter().enumerate() {
        ui.display_progress(idx + 1, total_windows, &format!("step {} window", step.step_id)).await;

        let result = run_window(
            step,
            window,
            &step_digests,
            &running_findings,
            config,
            composer,
            provider,
            ui,
            &retrieval_handler,
            &mut followups_used,
        )
        .await;
        ui.clear_stream_buffer().await;

        let contributed = !result.findings.summary.trim().is_empty() || !result.insights.trim().is_empty();
        if contributed {
            window_confidences.push(result.confidence);
        }
        if !result.findings.summary.trim().is_empty() {
            summaries.push(result.findings.summary.clone());
        }
        if !result.insights.trim().is_empty() {
            insight_lines.push(result.insights.clone());
            running_findings.push_str(&result.insights);
            running_findings.push('\n');
        }
        retrieval_sources.extend(result.retrieval_sources);
        aggregator.merge_window(result.findings.points_of_interest, config.dedup_per_window_cap);
    }

    let points_of_interest = aggregator.finish();
    let confidence = if window_confidences.is_empty() {
        0.0
    } else {
        window_confidences.iter().sum::<f64>() / window_confidences.len() as f64
    };

    let mut sources = base_sources(batch, step, &snapshot);
    sources.extend(retrieval_sources);
    sources.sort_unstable();
    sources.dedup();

    let finding = StepFinding {
        step_id: step.step_id,
        findings: Findings {
            summary: summaries.join("\n\n"),
            points_of_interest,
            analysis_details: None,
        },
        insights: insight_lines.join("\n"),
        confidence,
        sources,
    };

    let artifact = serde_json::json!({
        "step_finding": finding,
        "window_count": total_windows,
        "followup_count": followups_used,
        "started_at": now,
        "completed_at": now,
    });
    session_store
        .save_phase_artifact(&format!("phase3_step_{}", step.step_id), artifact, now)
        .await?;
    session_store
        .update_scratchpad(
            step.step_id,
            serde_json::to_value(&finding.findings).unwrap_or_default(),
            &finding.insights,
            finding.confidence,
            finding.sources.clone(),
            now,
        )
        .await?;
    session_store.append_step_digest(build_step_digest(&finding), config.step_digest_cap).await?;

    ui.display_step_complete(&serde_json::to_value(&finding).unwrap_or_default()).await;
    Ok(finding)
}

#[allow(clippy::too_many_arguments)]
async fn run_window(
    step: &PlanStep,
    window: &Window,
    step_digests: &str,
    running_findings: &str,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    retrieval: &RetrievalHandler<'_>,
    followups_used: &mut u32,
) -> WindowResult {
    let mut vars = HashMap::new();
    vars.insert("goal", step.goal.as_str());
    vars.insert("step_digests", step_digests);
    vars.insert("running_findings", running_findings);
    vars.insert("window_content", window.content.as_str());
    let mut messages = composer.compose("phase3", &vars);

    let read_timeout = Duration::from_secs(config.llm_read_timeout_secs);
    let mut retrieval_sources: Vec<String> = Vec::new();
    let mut forced_finalize = false;

    loop {
        let request = ChatRequest {
            model: config.executor_model.clone(),
            messages: messages.clone(),
            temperature: Some(0.2),
            max_tokens: Some(2048),
            json_mode: true,
            stream: true,
            tools: Vec::new(),
        };

        let (text, values) =
            match stream_parsed_with_retry(provider, ui, &request, read_timeout, config.llm_retry_attempts).await {
                Ok(result) => result,
                Err(_) => return WindowResult::default(),
            };

        let requests = extract_requests(&values);
        if requests.is_empty() || forced_finalize {
            let parsed = values.last().cloned().or_else(|| lenient_parse(&text).ok()).unwrap_or(serde_json::Value::Null);
            let mut result = window_result_from_value(&parsed);
            result.retrieval_sources = retrieval_sources;
            return result;
        }

        if *followups_used >= config.max_followups {
            messages.push(assistant_message(&text));
            messages.push(user_message(
                "No further retrieval rounds remain. Finalize your analysis with the content you already have.",
            ));
            forced_finalize = true;
            continue;
        }

        messages.push(assistant_message(&text));
        let mut retrieved = String::new();
        for raw_request in &requests {
            let Ok(parsed_request) = serde_json::from_value::<RetrievalRequest>(raw_request.clone()) else {
                continue;
            };
            let result = retrieval.resolve(&parsed_request);
            retrieval_sources.push(parsed_request.source_link_id.clone());
            retrieved.push_str(&format!("[{}: {}]\n{}\n\n", parsed_request.id, parsed_request.reason, result.content));
        }
        *followups_used += 1;
        messages.push(user_message(&format!(
            "Retrieved content:\n{retrieved}\nContinue your analysis with this additional content."
        )));
    }
}

/// Finds the last mid-stream `requests[]` array emitted so far, if any.
fn extract_requests(values: &[serde_json::Value]) -> Vec<serde_json::Value> {
    for value in values.iter().rev() {
        if let Some(array) = value.get("requests").and_then(serde_json::Value::as_array) {
            if !array.is_empty() {
                return array.clone();
            }
        }
    }
    Vec::new()
}

fn window_result_from_value(value: &serde_json::Value) -> WindowResult {
    let findings_value = value.get("findings").cloned().unwrap_or_else(|| value.clone());
    let findings: Findings = serde_json::from_value(findings_value).unwrap_or_default();
    let insights = value.get("insights").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
    let confidence = value
        .get("confidence")
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);
    WindowResult {
        findings,
        insights,
        confidence,
        retrieval_sources: Vec::new(),
    }
}

/// Builds this step's windows from `content`, dispatching by
/// `chunk_strategy`. `all` falls back to `sequential` when the content
/// exceeds the relevant char budget, per the windowing module's
/// documented contract.
fn build_windows(content: &str, step: &PlanStep, config: &ResearchConfig, scratchpad_summary: &str) -> Vec<Window> {
    match step.chunk_strategy {
        ChunkStrategy::All => {
            let (window, exceeded) = window_all(content, budget_for(step.required_data, config));
            if exceeded {
                window_sequential(content, config.chunk_size_words, config.chunk_overlap_words)
            } else {
                vec![window]
            }
        }
        ChunkStrategy::Sequential => {
            let chunk_size = step.chunk_size.unwrap_or(config.chunk_size_words);
            window_sequential(content, chunk_size, config.chunk_overlap_words)
        }
        ChunkStrategy::RandomSample => {
            let (cap, unit) = match step.required_data {
                DataKind::Comments => (config.random_sample_item_cap, SampleUnit::Items),
                _ => (config.random_sample_word_cap, SampleUnit::Words),
            };
            vec![window_random_sample(content, cap, unit)]
        }
        ChunkStrategy::PreviousFindings => vec![window_previous_findings(scratchpad_summary)],
    }
}

fn budget_for(kind: DataKind, config: &ResearchConfig) -> usize {
    match kind {
        DataKind::Transcript | DataKind::TranscriptWithComments => config.transcript_char_budget,
        DataKind::Comments => config.comments_char_budget,
        DataKind::Metadata => config.metadata_char_budget,
    }
}

fn relevant_content(item: &BatchItem, kind: DataKind) -> String {
    match kind {
        DataKind::Transcript => item.transcript_text().to_string(),
        DataKind::Comments => item.comments_text(),
        DataKind::TranscriptWithComments => format!("{}\n{}", item.transcript_text(), item.comments_text()),
        DataKind::Metadata => serde_json::to_string(&item.metadata).unwrap_or_default(),
    }
}

/// Concatenates every batch item's relevant content for `kind`,
/// skipping items that contribute nothing, each demarcated by its
/// `link_id` so windows can be traced back to a source.
fn content_for_step(batch: &Batch, kind: DataKind) -> String {
    batch
        .items
        .iter()
        .filter_map(|item| {
            let body = relevant_content(item, kind);
            if body.trim().is_empty() {
                None
            } else {
                Some(format!("=== {} ===\n{body}", item.link_id))
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The link ids this step drew on before any mid-stream retrieval: the
/// whole batch's non-empty items for ordinary strategies, or the union
/// of sources already recorded in the scratchpad for a
/// `previous_findings` synthesis step.
fn base_sources(batch: &Batch, step: &PlanStep, snapshot: &crate::model::session::Session) -> Vec<String> {
    if step.chunk_strategy == ChunkStrategy::PreviousFindings {
        let mut sources: Vec<String> = snapshot.scratchpad.values().flat_map(|entry| entry.sources.clone()).collect();
        sources.sort_unstable();
        sources.dedup();
        return sources;
    }
    batch
        .items
        .iter()
        .filter(|item| !relevant_content(item, step.required_data).trim().is_empty())
        .map(|item| item.link_id.clone())
        .collect()
}

/// Renders a digest capped at 400 words, per the digest retention contract.
fn build_step_digest(finding: &StepFinding) -> String {
    let raw = format!("Step {}: {} | insights: {}", finding.step_id, finding.findings.summary, finding.insights);
    let words: Vec<&str> = raw.split_whitespace().collect();
    if words.len() <= 400 {
        raw
    } else {
        format!("{}...", words[..400].join(" "))
    }
}
