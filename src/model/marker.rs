//! Phase 0 per-item content marker types.

use serde::{Deserialize, Serialize};

/// The structured marker set produced by summarizing a single batch
/// item's transcript and comments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMarker {
    /// Factual statements extracted from the transcript.
    #[serde(default)]
    pub key_facts: Vec<String>,
    /// Opinions expressed in the transcript.
    #[serde(default)]
    pub key_opinions: Vec<String>,
    /// Numeric or quantitative datapoints mentioned in the transcript.
    #[serde(default)]
    pub key_datapoints: Vec<String>,
    /// Topic areas the transcript touches on.
    #[serde(default)]
    pub topic_areas: Vec<String>,
    /// Factual statements extracted from the comments.
    #[serde(default)]
    pub key_facts_from_comments: Vec<String>,
    /// Opinions expressed in the comments.
    #[serde(default)]
    pub key_opinions_from_comments: Vec<String>,
    /// Recurring themes across the comments.
    #[serde(default)]
    pub major_themes: Vec<String>,
    /// A short description of the overall comment sentiment.
    pub sentiment_overview: Option<String>,
}

impl ContentMarker {
    /// An all-empty marker, used when per-item summarization fails and
    /// the item must degrade gracefully rather than abort Phase 0.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_marker_has_no_content() {
        let marker = ContentMarker::empty();
        assert!(marker.key_facts.is_empty());
        assert!(marker.sentiment_overview.is_none());
    }

    #[test]
    fn test_marker_deserializes_partial_json() {
        let marker: ContentMarker =
            serde_json::from_str(r#"{"key_facts":["a"]}"#).unwrap_or_else(|_| unreachable!());
        assert_eq!(marker.key_facts, vec!["a".to_string()]);
        assert!(marker.major_themes.is_empty());
    }
}
