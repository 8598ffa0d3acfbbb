//! Mid-stream retrieval request types (§4.3).

use serde::{Deserialize, Serialize};

use crate::model::plan::DataKind;

/// Which Retrieval Handler operation a [`RetrievalRequest`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    /// Slice a transcript by word index range.
    WordRange,
    /// Keyword search with expanded context windows.
    Keyword,
    /// Cosine-similarity search, falling back to keyword on no embedder.
    Semantic,
    /// Comment search/sort, optionally keyword-filtered.
    CommentsFilter,
    /// Full content of a kind, subject to a char budget.
    All,
}

/// A retrieval request emitted mid-stream by the model while a Phase 3
/// window is being answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    /// An id for this request, unique within the response.
    pub id: String,
    /// Which kind of content the request targets.
    pub content_type: DataKind,
    /// The batch item the request targets.
    pub source_link_id: String,
    /// Which Retrieval Handler operation resolves this request.
    pub method: RetrievalMethod,
    /// Method-specific parameters (e.g. `start`/`end`, `keywords`, `query`).
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// The model's stated reason for the request, echoed back for context.
    pub reason: String,
}

/// The result of resolving a [`RetrievalRequest`] against batch data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The retrieved content, or an inlined error string on failure.
    pub content: String,
    /// Whether `content` was truncated to fit a char budget.
    pub truncated: bool,
    /// Human-readable description of what span/slice was retrieved.
    pub span_info: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_request_round_trip() {
        let req = RetrievalRequest {
            id: "r1".into(),
            content_type: DataKind::Transcript,
            source_link_id: "link1".into(),
            method: RetrievalMethod::Keyword,
            parameters: serde_json::json!({"keywords": ["foo"], "context_window": 50}),
            reason: "need more context".into(),
        };
        let json = serde_json::to_string(&req).unwrap_or_else(|_| unreachable!());
        let back: RetrievalRequest =
            serde_json::from_str(&json).unwrap_or_else(|_| unreachable!());
        assert_eq!(back, req);
    }

    #[test]
    fn test_retrieval_method_snake_case() {
        let method: RetrievalMethod =
            serde_json::from_str("\"word_range\"").unwrap_or_else(|_| unreachable!());
        assert_eq!(method, RetrievalMethod::WordRange);
    }

    #[test]
    fn test_retrieval_method_comments_filter_snake_case() {
        let method: RetrievalMethod =
            serde_json::from_str("\"comments_filter\"").unwrap_or_else(|_| unreachable!());
        assert_eq!(method, RetrievalMethod::CommentsFilter);
    }
}
