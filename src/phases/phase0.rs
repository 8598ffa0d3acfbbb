//! Phase 0 — Prepare (§4.5).
//!
//! Summarizes each batch item's transcript and comments into a
//! [`ContentMarker`] set via one LLM call per item, and computes a
//! deterministic data-quality assessment over the whole batch. A single
//! item's summarization failure degrades to an empty marker set rather
//! than aborting the phase, so one bad item never blocks the rest of
//! the batch.

use std::collections::HashMap;
use std::time::Duration;

use crate::batch::Batch;
use crate::config::ResearchConfig;
use crate::error::Result;
use crate::llm::{ChatRequest, LlmProvider};
use crate::model::marker::ContentMarker;
use crate::prompt::PromptComposer;
use crate::ui::bus::{MessageLevel, UiBus};

use super::support::{lenient_parse, stream_with_retry};

/// Wraps [`summarize_item`]'s outcome for an item, degrading a failure to
/// an empty marker set and a warning instead of aborting the phase.
async fn summarize_item_or_degrade(
    item: &crate::batch::BatchItem,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    read_timeout: Duration,
) -> ContentMarker {
    match summarize_item(item, config, composer, provider, ui, read_timeout).await {
        Ok(marker) => marker,
        Err(err) => {
            tracing::warn!(link_id = %item.link_id, %err, "phase0: item summarization failed, degrading to empty markers");
            ui.display_message(
                &format!("{}: summarization failed, using empty markers ({err})", item.link_id),
                MessageLevel::Warn,
            )
            .await;
            ContentMarker::empty()
        }
    }
}

/// Runs Phase 0 over every item in `batch`, returning the JSON value to
/// persist as the `phase0` artifact.
pub async fn run(
    batch: &Batch,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
) -> Result<serde_json::Value> {
    ui.display_header("phase0", "Prepare").await;
    let read_timeout = Duration::from_secs(config.llm_read_timeout_secs);

    let mut items = Vec::with_capacity(batch.items.len());
    for (idx, item) in batch.items.iter().enumerate() {
        ui.display_progress(idx + 1, batch.items.len(), &item.title).await;

        let marker = summarize_item_or_degrade(item, config, composer, provider, ui, read_timeout).await;

        let summary_value = serde_json::to_value(&marker).unwrap_or(serde_json::Value::Null);
        ui.display_summary(&item.link_id, "transcript_and_comments", &summary_value).await;

        items.push(serde_json::json!({
            "link_id": item.link_id,
            "source": item.source,
            "url": item.url,
            "title": item.title,
            "transcript": item.transcript,
            "comments": item.comments,
            "metadata": item.metadata,
            "summary": marker,
        }));
    }

    let quality_assessment = assess_quality(batch);

    Ok(serde_json::json!({
        "items": items,
        "quality_assessment": quality_assessment,
    }))
}

async fn summarize_item(
    item: &crate::batch::BatchItem,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    read_timeout: Duration,
) -> Result<ContentMarker> {
    let transcript = truncate_chars(item.transcript_text(), config.transcript_char_budget);
    let comments = truncate_chars(&item.comments_text(), config.comments_char_budget);

    let mut vars = HashMap::new();
    vars.insert("transcript", transcript.as_str());
    vars.insert("comments", comments.as_str());
    let messages = composer.compose("phase0", &vars);

    let request = ChatRequest {
        model: config.planner_model.clone(),
        messages,
        temperature: Some(0.0),
        max_tokens: Some(2048),
        json_mode: true,
        stream: true,
        tools: Vec::new(),
    };

    let text = stream_with_retry(provider, ui, &request, read_timeout, config.llm_retry_attempts).await?;
    ui.clear_stream_buffer().await;
    let value = lenient_parse(&text)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Truncates `text` to at most `budget` characters (by char count, not bytes).
fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        text.to_string()
    } else {
        text.chars().take(budget).collect()
    }
}

/// Computes a deterministic data-quality assessment for the batch: raw
/// statistics plus boolean flags the later phases can use as context.
fn assess_quality(batch: &Batch) -> serde_json::Value {
    let total_items = batch.items.len();
    let total_transcript_words = batch.total_transcript_words();
    let total_comments: usize = batch.items.iter().map(|i| i.comments.len()).sum();
    let items_missing_transcript = batch
        .items
        .iter()
        .filter(|i| i.transcript_text().trim().is_empty())
        .count();
    let items_with_no_comments = batch.items.iter().filter(|i| i.comments.is_empty()).count();

    let word_counts: Vec<usize> = batch
        .items
        .iter()
        .map(|i| i.transcript_text().split_whitespace().count())
        .collect();
    let max_words = word_counts.iter().copied().max().unwrap_or(0);
    let avg_words = if total_items == 0 {
        0.0
    } else {
        total_transcript_words as f64 / total_items as f64
    };

    let mut flags = Vec::new();
    if batch.is_single_source() {
        flags.push("single_source");
    }
    if total_items > 0 && items_missing_transcript as f64 / total_items as f64 > 0.3 {
        flags.push("sparsity");
    }
    if total_items > 0 && items_with_no_comments as f64 / total_items as f64 > 0.5 {
        flags.push("low_comment_coverage");
    }
    if avg_words > 0.0 && max_words as f64 / (avg_words + 1.0) > 5.0 {
        flags.push("imbalance");
    }
    if total_transcript_words >= crate::config::DEFAULT_SEQUENTIAL_WORD_FLOOR {
        flags.push("long_content");
    }

    serde_json::json!({
        "total_items": total_items,
        "total_transcript_words": total_transcript_words,
        "total_comments": total_comments,
        "items_missing_transcript": items_missing_transcript,
        "items_with_no_comments": items_with_no_comments,
        "flags": flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchItem, Comment, Source};

    fn item(link_id: &str, source: Source, words: usize, comments: usize) -> BatchItem {
        BatchItem {
            link_id: link_id.to_string(),
            source,
            url: String::new(),
            title: String::new(),
            transcript: Some((0..words).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")),
            comments: (0..comments)
                .map(|i| Comment {
                    text: format!("comment {i}"),
                    likes: None,
                    replies: None,
                })
                .collect(),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_assess_quality_flags_single_source() {
        let batch = Batch {
            batch_id: "b".into(),
            items: vec![item("a", Source::Youtube, 100, 5), item("b", Source::Youtube, 100, 5)],
        };
        let quality = assess_quality(&batch);
        let flags: Vec<&str> = quality["flags"]
            .as_array()
            .unwrap_or_else(|| unreachable!())
            .iter()
            .map(|v| v.as_str().unwrap_or_default())
            .collect();
        assert!(flags.contains(&"single_source"));
    }

    #[test]
    fn test_assess_quality_flags_low_comment_coverage() {
        let batch = Batch {
            batch_id: "b".into(),
            items: vec![item("a", Source::Youtube, 100, 0), item("b", Source::Reddit, 100, 0)],
        };
        let quality = assess_quality(&batch);
        let flags: Vec<&str> = quality["flags"]
            .as_array()
            .unwrap_or_else(|| unreachable!())
            .iter()
            .map(|v| v.as_str().unwrap_or_default())
            .collect();
        assert!(flags.contains(&"low_comment_coverage"));
        assert!(!flags.contains(&"single_source"));
    }

    #[test]
    fn test_truncate_chars_under_budget_unchanged() {
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_truncate_chars_over_budget_truncated() {
        let long = "a".repeat(50);
        assert_eq!(truncate_chars(&long, 10).chars().count(), 10);
    }
}
