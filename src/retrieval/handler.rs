//! Dispatches [`RetrievalRequest`]s to batch-data operations (§4.3).
//!
//! Mirrors the dispatch-by-name shape of a tool executor: [`resolve`]
//! never propagates an error out to its caller. A missing `link_id` or
//! an invalid parameter fails only the single request, with a short
//! error string inlined into the returned content, so one bad retrieval
//! call never aborts the enclosing Phase-3 step.
//!
//! [`resolve`]: RetrievalHandler::resolve

use crate::batch::Batch;
use crate::config::{
    DEFAULT_COMMENTS_CHAR_BUDGET as COMMENTS_CHAR_BUDGET,
    DEFAULT_METADATA_CHAR_BUDGET as METADATA_CHAR_BUDGET,
    DEFAULT_TRANSCRIPT_CHAR_BUDGET as TRANSCRIPT_CHAR_BUDGET,
};
use crate::embedding::{self, Embedder};
use crate::model::plan::DataKind;
use crate::model::retrieval::{RetrievalMethod, RetrievalRequest, RetrievalResult};

/// Default context expansion, in words, around each keyword hit.
const DEFAULT_CONTEXT_WINDOW: usize = 50;
/// Default number of semantic-search chunks considered.
const DEFAULT_TOP_K: usize = 5;
/// Word count of each chunk scored during a `semantic` search.
const SEMANTIC_CHUNK_WORDS: usize = 200;

/// Resolves retrieval requests against one batch's data.
pub struct RetrievalHandler<'a> {
    batch: &'a Batch,
    embedder: Option<&'a dyn Embedder>,
}

impl<'a> RetrievalHandler<'a> {
    /// Creates a handler with no embedder; `semantic` always falls back
    /// to `keyword`.
    #[must_use]
    pub fn new(batch: &'a Batch) -> Self {
        Self {
            batch,
            embedder: None,
        }
    }

    /// Creates a handler backed by an embedder for `semantic` requests.
    #[must_use]
    pub fn with_embedder(batch: &'a Batch, embedder: &'a dyn Embedder) -> Self {
        Self {
            batch,
            embedder: Some(embedder),
        }
    }

    /// Resolves a single retrieval request. Never fails: a bad request
    /// yields a [`RetrievalResult`] whose `content` is an error string.
    #[must_use]
    pub fn resolve(&self, request: &RetrievalRequest) -> RetrievalResult {
        let Some(item) = self.batch.get(&request.source_link_id) else {
            return error_result(format!("unknown link_id: {}", request.source_link_id));
        };

        match request.method {
            RetrievalMethod::WordRange => self.word_range(item, &request.parameters),
            RetrievalMethod::Keyword => self.keyword(item, &request.parameters),
            RetrievalMethod::Semantic => self.semantic(item, &request.parameters),
            RetrievalMethod::CommentsFilter => self.comments_filter(item, &request.parameters),
            RetrievalMethod::All => self.all(item, request.content_type),
        }
    }

    fn word_range(
        &self,
        item: &crate::batch::BatchItem,
        params: &serde_json::Value,
    ) -> RetrievalResult {
        let Some(start) = params.get("start").and_then(serde_json::Value::as_u64) else {
            return error_result("word_range: missing `start` parameter".to_string());
        };
        let Some(end) = params.get("end").and_then(serde_json::Value::as_u64) else {
            return error_result("word_range: missing `end` parameter".to_string());
        };
        let (start, end) = (start as usize, end as usize);

        let words: Vec<&str> = item.transcript_text().split_whitespace().collect();
        if start > end || start >= words.len() {
            return error_result(format!(
                "word_range: out of bounds (start={start}, end={end}, len={})",
                words.len()
            ));
        }
        let clamped_end = end.min(words.len());
        let slice = &words[start..clamped_end];
        RetrievalResult {
            content: slice.join(" "),
            truncated: false,
            span_info: format!("words {start}..{clamped_end} of {}", words.len()),
        }
    }

    fn keyword(
        &self,
        item: &crate::batch::BatchItem,
        params: &serde_json::Value,
    ) -> RetrievalResult {
        let Some(keywords) = params.get("keywords").and_then(serde_json::Value::as_array) else {
            return error_result("keyword: missing `keywords` parameter".to_string());
        };
        let keywords: Vec<String> = keywords
            .iter()
            .filter_map(|v| v.as_str().map(str::to_lowercase))
            .collect();
        if keywords.is_empty() {
            return error_result("keyword: `keywords` must be a non-empty array".to_string());
        }
        let context_window = params
            .get("context_window")
            .and_then(serde_json::Value::as_u64)
            .map_or(DEFAULT_CONTEXT_WINDOW, |v| v as usize);

        let words: Vec<&str> = item.transcript_text().split_whitespace().collect();
        keyword_search(&words, &keywords, context_window, TRANSCRIPT_CHAR_BUDGET)
    }

    fn semantic(
        &self,
        item: &crate::batch::BatchItem,
        params: &serde_json::Value,
    ) -> RetrievalResult {
        let Some(query) = params.get("query").and_then(serde_json::Value::as_str) else {
            return error_result("semantic: missing `query` parameter".to_string());
        };
        let top_k = params
            .get("top_k")
            .and_then(serde_json::Value::as_u64)
            .map_or(DEFAULT_TOP_K, |v| v as usize);

        let Some(embedder) = self.embedder else {
            return self.semantic_keyword_fallback(item, query);
        };

        let words: Vec<&str> = item.transcript_text().split_whitespace().collect();
        if words.is_empty() {
            return RetrievalResult {
                content: String::new(),
                truncated: false,
                span_info: "empty transcript".to_string(),
            };
        }

        let chunks: Vec<(usize, usize)> = (0..words.len())
            .step_by(SEMANTIC_CHUNK_WORDS)
            .map(|start| (start, (start + SEMANTIC_CHUNK_WORDS).min(words.len())))
            .collect();

        let Ok(query_embedding) = embedder.embed(query) else {
            return self.semantic_keyword_fallback(item, query);
        };

        let mut scored: Vec<(f32, usize, usize)> = Vec::with_capacity(chunks.len());
        for &(start, end) in &chunks {
            let text = words[start..end].join(" ");
            let Ok(chunk_embedding) = embedder.embed(&text) else {
                continue;
            };
            let score = embedding::cosine_similarity(&query_embedding, &chunk_embedding);
            scored.push((score, start, end));
        }
        if scored.is_empty() {
            return self.semantic_keyword_fallback(item, query);
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k.max(1));
        scored.sort_by_key(|&(_, start, _)| start);

        let (content, truncated) = join_with_budget(
            scored
                .iter()
                .map(|&(_, start, end)| words[start..end].join(" ")),
            TRANSCRIPT_CHAR_BUDGET,
        );

        RetrievalResult {
            content,
            truncated,
            span_info: format!("top {} semantic chunks of {}", scored.len(), chunks.len()),
        }
    }

    fn semantic_keyword_fallback(
        &self,
        item: &crate::batch::BatchItem,
        query: &str,
    ) -> RetrievalResult {
        let keywords: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .filter(|w| w.len() > 2)
            .collect();
        if keywords.is_empty() {
            return RetrievalResult {
                content: String::new(),
                truncated: false,
                span_info: "semantic fallback: query had no usable terms".to_string(),
            };
        }
        let words: Vec<&str> = item.transcript_text().split_whitespace().collect();
        keyword_search(
            &words,
            &keywords,
            DEFAULT_CONTEXT_WINDOW,
            TRANSCRIPT_CHAR_BUDGET,
        )
    }

    fn comments_filter(
        &self,
        item: &crate::batch::BatchItem,
        params: &serde_json::Value,
    ) -> RetrievalResult {
        let keywords: Option<Vec<String>> = params
            .get("keywords")
            .and_then(serde_json::Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_lowercase))
                    .collect()
            });
        let sort_by = params
            .get("sort_by")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("relevance");
        let limit = params
            .get("limit")
            .and_then(serde_json::Value::as_u64)
            .map_or(20, |v| v as usize);

        let mut comments: Vec<&crate::batch::Comment> = item.comments.iter().collect();
        if let Some(ref kws) = keywords {
            comments.retain(|c| {
                let lower = c.text.to_lowercase();
                kws.iter().any(|k| lower.contains(k.as_str()))
            });
        }

        match sort_by {
            "likes" => comments.sort_by_key(|c| std::cmp::Reverse(c.likes.unwrap_or(0))),
            "replies" => comments.sort_by_key(|c| std::cmp::Reverse(c.replies.unwrap_or(0))),
            _ => {
                if let Some(ref kws) = keywords {
                    comments.sort_by_key(|c| {
                        let lower = c.text.to_lowercase();
                        std::cmp::Reverse(kws.iter().filter(|k| lower.contains(k.as_str())).count())
                    });
                }
            }
        }
        comments.truncate(limit);

        let (content, truncated) = join_with_budget(
            comments.iter().map(|c| c.text.clone()),
            COMMENTS_CHAR_BUDGET,
        );

        RetrievalResult {
            content,
            truncated,
            span_info: format!("{} comments, sort_by={sort_by}", comments.len()),
        }
    }

    fn all(&self, item: &crate::batch::BatchItem, content_type: DataKind) -> RetrievalResult {
        let (raw, budget): (String, usize) = match content_type {
            DataKind::Transcript => (item.transcript_text().to_string(), TRANSCRIPT_CHAR_BUDGET),
            DataKind::Comments => (item.comments_text(), COMMENTS_CHAR_BUDGET),
            DataKind::TranscriptWithComments => (
                format!("{}\n\n{}", item.transcript_text(), item.comments_text()),
                TRANSCRIPT_CHAR_BUDGET,
            ),
            DataKind::Metadata => (
                serde_json::to_string_pretty(&item.metadata).unwrap_or_default(),
                METADATA_CHAR_BUDGET,
            ),
        };
        let truncated = raw.chars().count() > budget;
        let content: String = raw.chars().take(budget).collect();
        let content = if truncated {
            format!("{content}\n[... truncated, exceeded {budget}-char budget]")
        } else {
            content
        };
        RetrievalResult {
            content,
            truncated,
            span_info: format!("all/{content_type:?}"),
        }
    }
}

fn error_result(message: String) -> RetrievalResult {
    RetrievalResult {
        content: format!("retrieval error: {message}"),
        truncated: false,
        span_info: "error".to_string(),
    }
}

/// Finds each keyword occurrence, expands it by `context_window` words on
/// either side, merges overlapping spans, and joins the resulting spans
/// (subject to `budget` chars).
fn keyword_search(
    words: &[&str],
    keywords: &[String],
    context_window: usize,
    budget: usize,
) -> RetrievalResult {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for (i, word) in words.iter().enumerate() {
        let lower = word.to_lowercase();
        if keywords.iter().any(|k| lower.contains(k.as_str())) {
            let start = i.saturating_sub(context_window);
            let end = (i + context_window + 1).min(words.len());
            spans.push((start, end));
        }
    }

    if spans.is_empty() {
        return RetrievalResult {
            content: String::new(),
            truncated: false,
            span_info: "no keyword matches".to_string(),
        };
    }

    spans.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    let span_count = merged.len();
    let (content, truncated) =
        join_with_budget(merged.iter().map(|&(s, e)| words[s..e].join(" ")), budget);

    RetrievalResult {
        content,
        truncated,
        span_info: format!("{span_count} merged span(s)"),
    }
}

/// Joins pieces with a separator, stopping once `budget` chars would be
/// exceeded; reports whether anything was left out.
fn join_with_budget(pieces: impl Iterator<Item = String>, budget: usize) -> (String, bool) {
    let mut out = String::new();
    let mut truncated = false;
    for piece in pieces {
        if !out.is_empty() {
            if out.chars().count() + 5 > budget {
                truncated = true;
                break;
            }
            out.push_str("\n...\n");
        }
        let remaining = budget.saturating_sub(out.chars().count());
        if piece.chars().count() > remaining {
            out.extend(piece.chars().take(remaining));
            truncated = true;
            break;
        }
        out.push_str(&piece);
    }
    (out, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchItem, Comment, Source};

    fn item(transcript: &str, comments: Vec<Comment>) -> BatchItem {
        BatchItem {
            link_id: "l1".into(),
            source: Source::Article,
            url: "http://x".into(),
            title: "T".into(),
            transcript: Some(transcript.to_string()),
            comments,
            metadata: serde_json::json!({"duration": 42}),
        }
    }

    fn request(method: RetrievalMethod, params: serde_json::Value) -> RetrievalRequest {
        RetrievalRequest {
            id: "r1".into(),
            content_type: DataKind::Transcript,
            source_link_id: "l1".into(),
            method,
            parameters: params,
            reason: "test".into(),
        }
    }

    #[test]
    fn test_unknown_link_id_inlines_error() {
        let batch = Batch {
            batch_id: "b".into(),
            items: vec![item("one two three", vec![])],
        };
        let handler = RetrievalHandler::new(&batch);
        let mut req = request(RetrievalMethod::WordRange, serde_json::json!({"start":0,"end":1}));
        req.source_link_id = "missing".into();
        let result = handler.resolve(&req);
        assert!(result.content.contains("retrieval error"));
    }

    #[test]
    fn test_word_range_slices_by_word_index() {
        let batch = Batch {
            batch_id: "b".into(),
            items: vec![item("one two three four five", vec![])],
        };
        let handler = RetrievalHandler::new(&batch);
        let req = request(RetrievalMethod::WordRange, serde_json::json!({"start":1,"end":3}));
        let result = handler.resolve(&req);
        assert_eq!(result.content, "two three");
        assert!(!result.truncated);
    }

    #[test]
    fn test_word_range_out_of_bounds_errors() {
        let batch = Batch {
            batch_id: "b".into(),
            items: vec![item("one two", vec![])],
        };
        let handler = RetrievalHandler::new(&batch);
        let req = request(RetrievalMethod::WordRange, serde_json::json!({"start":50,"end":60}));
        let result = handler.resolve(&req);
        assert!(result.content.contains("retrieval error"));
    }

    #[test]
    fn test_keyword_merges_overlapping_spans() {
        let batch = Batch {
            batch_id: "b".into(),
            items: vec![item("a b rust c d rust e f", vec![])],
        };
        let handler = RetrievalHandler::new(&batch);
        let req = request(
            RetrievalMethod::Keyword,
            serde_json::json!({"keywords": ["rust"], "context_window": 1}),
        );
        let result = handler.resolve(&req);
        assert!(result.content.contains("rust"));
        assert!(result.span_info.contains("span"));
    }

    #[test]
    fn test_semantic_falls_back_to_keyword_without_embedder() {
        let batch = Batch {
            batch_id: "b".into(),
            items: vec![item("the quick brown fox jumps over lazy dog", vec![])],
        };
        let handler = RetrievalHandler::new(&batch);
        let req = request(RetrievalMethod::Semantic, serde_json::json!({"query": "quick fox"}));
        let result = handler.resolve(&req);
        assert!(result.content.contains("quick") || result.content.contains("fox"));
    }

    #[test]
    fn test_comments_filter_sorts_by_likes() {
        let batch = Batch {
            batch_id: "b".into(),
            items: vec![item(
                "",
                vec![
                    Comment { text: "low".into(), likes: Some(1), replies: None },
                    Comment { text: "high".into(), likes: Some(99), replies: None },
                ],
            )],
        };
        let handler = RetrievalHandler::new(&batch);
        let req = request(
            RetrievalMethod::CommentsFilter,
            serde_json::json!({"sort_by": "likes", "limit": 1}),
        );
        let result = handler.resolve(&req);
        assert_eq!(result.content, "high");
    }

    #[test]
    fn test_all_truncates_to_budget() {
        let batch = Batch {
            batch_id: "b".into(),
            items: vec![item(&"word ".repeat(20_000), vec![])],
        };
        let handler = RetrievalHandler::new(&batch);
        let mut req = request(RetrievalMethod::All, serde_json::json!({}));
        req.content_type = DataKind::Transcript;
        let result = handler.resolve(&req);
        assert!(result.truncated);
        assert!(result.content.contains("truncated"));
    }

    #[test]
    fn test_all_metadata_returns_json() {
        let batch = Batch {
            batch_id: "b".into(),
            items: vec![item("x", vec![])],
        };
        let handler = RetrievalHandler::new(&batch);
        let mut req = request(RetrievalMethod::All, serde_json::json!({}));
        req.content_type = DataKind::Metadata;
        let result = handler.resolve(&req);
        assert!(result.content.contains("duration"));
    }
}
