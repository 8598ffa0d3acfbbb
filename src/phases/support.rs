//! Shared plumbing used by every phase: streamed LLM dispatch with
//! retry-on-timeout (§5 "Timeouts"), and forgiving JSON extraction from
//! a model response.
//!
//! The retry loop is a one-shot-per-window specialization of the
//! teacher's tool-calling `agentic_loop` (round-trip, inspect, repeat),
//! adapted from tool-call dispatch to streamed-token accumulation with
//! a timeout-and-backoff retry instead of a tool-result append.

use std::time::Duration;

use tokio_stream::StreamExt as _;

use crate::error::{Error, LlmError, Result};
use crate::llm::{ChatRequest, LlmProvider};
use crate::stream::parser::StreamParser;
use crate::ui::bus::UiBus;

/// Streams one chat completion to its end, forwarding every token to
/// `ui.display_stream`, retrying the whole call up to `retry_attempts`
/// times on a read timeout or transport error.
///
/// # Errors
///
/// Returns [`LlmError::TimeoutExhausted`] once the retry budget is
/// spent, or propagates the last transport error.
pub(crate) async fn stream_with_retry(
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    request: &ChatRequest,
    read_timeout: Duration,
    retry_attempts: u32,
) -> Result<String> {
    let mut last_err: Option<Error> = None;
    for attempt in 1..=retry_attempts.max(1) {
        match stream_once(provider, ui, request, read_timeout).await {
            Ok(text) => return Ok(text),
            Err(err) => {
                last_err = Some(err);
                if attempt < retry_attempts.max(1) {
                    let backoff = Duration::from_millis(200 * 2u64.saturating_pow(attempt - 1));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        Error::Llm(LlmError::TimeoutExhausted {
            attempts: retry_attempts,
        })
    }))
}

async fn stream_once(
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    request: &ChatRequest,
    read_timeout: Duration,
) -> Result<String> {
    let mut stream = provider.chat_stream(request).await.map_err(Error::Llm)?;
    let mut text = String::new();
    loop {
        match tokio::time::timeout(read_timeout, stream.next()).await {
            Ok(Some(Ok(token))) => {
                ui.display_stream(&token).await;
                text.push_str(&token);
            }
            Ok(Some(Err(err))) => return Err(Error::Llm(err)),
            Ok(None) => return Ok(text),
            Err(_) => {
                return Err(Error::Llm(LlmError::TimeoutExhausted { attempts: 1 }));
            }
        }
    }
}

/// Streams a chat completion while feeding every token through a
/// [`StreamParser`], so mid-stream balanced JSON values (e.g. a
/// `requests[]` block emitted before the model's narrative conclusion)
/// are available as soon as they close, independent of when the
/// provider ends the turn.
///
/// Returns the full accumulated text and every top-level JSON value the
/// parser completed along the way, in emission order.
pub(crate) async fn stream_parsed_with_retry(
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    request: &ChatRequest,
    read_timeout: Duration,
    retry_attempts: u32,
) -> Result<(String, Vec<serde_json::Value>)> {
    let mut last_err: Option<Error> = None;
    for attempt in 1..=retry_attempts.max(1) {
        match stream_parsed_once(provider, ui, request, read_timeout).await {
            Ok(result) => return Ok(result),
            Err(err) => {
                last_err = Some(err);
                if attempt < retry_attempts.max(1) {
                    let backoff = Duration::from_millis(200 * 2u64.saturating_pow(attempt - 1));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        Error::Llm(LlmError::TimeoutExhausted {
            attempts: retry_attempts,
        })
    }))
}

async fn stream_parsed_once(
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    request: &ChatRequest,
    read_timeout: Duration,
) -> Result<(String, Vec<serde_json::Value>)> {
    let mut stream = provider.chat_stream(request).await.map_err(Error::Llm)?;
    let mut parser = StreamParser::new();
    let mut text = String::new();
    let mut values = Vec::new();
    loop {
        match tokio::time::timeout(read_timeout, stream.next()).await {
            Ok(Some(Ok(token))) => {
                ui.display_stream(&token).await;
                text.push_str(&token);
                values.extend(parser.push(&token));
            }
            Ok(Some(Err(err))) => return Err(Error::Llm(err)),
            Ok(None) => return Ok((text, values)),
            Err(_) => {
                return Err(Error::Llm(LlmError::TimeoutExhausted { attempts: 1 }));
            }
        }
    }
}

/// Renders a short textual abstract of a `phase0` artifact's quality
/// assessment and item count, used as shared context for Phase 0.5 and
/// Phase 1 prompts.
pub(crate) fn render_data_abstract(phase0: &serde_json::Value) -> String {
    let item_count = phase0.get("items").and_then(serde_json::Value::as_array).map_or(0, Vec::len);
    let quality = phase0.get("quality_assessment").cloned().unwrap_or(serde_json::Value::Null);
    format!(
        "{item_count} source item(s) summarized. Quality assessment: {}",
        serde_json::to_string(&quality).unwrap_or_default()
    )
}

/// Renders a research role JSON value (`{role, rationale}`) as a short
/// textual summary for downstream prompts.
pub(crate) fn render_research_role(role: &serde_json::Value) -> String {
    let role_name = role.get("role").and_then(serde_json::Value::as_str).unwrap_or("analyst");
    let rationale = role.get("rationale").and_then(serde_json::Value::as_str).unwrap_or("");
    format!("{role_name}: {rationale}")
}

/// Forgivingly extracts a single top-level JSON value from a model
/// response: strips markdown code fences, then tries a direct parse,
/// then falls back to a balanced-scan of the raw text. Mirrors the
/// teacher's `SubcallAgent::parse_findings` / `PrimaryAgent::parse_plan`
/// lenient-parsing idiom.
///
/// # Errors
///
/// Returns [`crate::error::StreamParseError::Unparseable`] if no
/// balanced, parseable top-level value can be found.
pub(crate) fn lenient_parse(content: &str) -> Result<serde_json::Value> {
    let mut parser = StreamParser::new();
    let _ = parser.push(content);
    parser.finish()
}
