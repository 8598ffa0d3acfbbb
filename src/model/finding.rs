//! Phase 3 per-step finding types.

use serde::{Deserialize, Serialize};

/// A single multi-perspective point of interest entry.
///
/// The canonical text field varies by which `points_of_interest`
/// sub-array the entry lives in (`claim`, `quote`, `topic`, ...); the
/// remaining fields record who said it and any opposing perspective.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterestEntry {
    /// The canonical deduplication text (claim, quote, topic, etc.).
    pub text: String,
    /// Who raised this point, if known.
    pub speaker: Option<String>,
    /// Who argued for this point, if distinct from `speaker`.
    pub proponent: Option<String>,
    /// Who argued against this point, if any.
    pub opponent: Option<String>,
    /// Additional opposing viewpoints merged in from duplicate entries.
    #[serde(default)]
    pub opposing_views: Vec<String>,
    /// Link ids that contributed to this entry.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// The six categorized sub-arrays of points of interest produced by a
/// Phase 3 step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointsOfInterest {
    /// Claims made by speakers in the source content.
    #[serde(default)]
    pub key_claims: Vec<PointOfInterestEntry>,
    /// Direct quotes or evidence supporting a claim.
    #[serde(default)]
    pub notable_evidence: Vec<PointOfInterestEntry>,
    /// Topics where speakers disagree.
    #[serde(default)]
    pub controversial_topics: Vec<PointOfInterestEntry>,
    /// Findings that contradict expectations.
    #[serde(default)]
    pub surprising_insights: Vec<PointOfInterestEntry>,
    /// Concrete illustrative examples.
    #[serde(default)]
    pub specific_examples: Vec<PointOfInterestEntry>,
    /// Questions the content raises but does not answer.
    #[serde(default)]
    pub open_questions: Vec<PointOfInterestEntry>,
}

/// The inner `findings` object of a [`StepFinding`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    /// A prose summary of what this step discovered.
    pub summary: String,
    /// Categorized points of interest, deduplicated across windows.
    #[serde(default)]
    pub points_of_interest: PointsOfInterest,
    /// Optional free-form analysis detail beyond the summary.
    pub analysis_details: Option<String>,
}

/// The finalized output of a single Phase 3 plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFinding {
    /// The plan step this finding belongs to.
    pub step_id: i64,
    /// The categorized findings for this step.
    pub findings: Findings,
    /// Condensed insight text derived from `findings`.
    pub insights: String,
    /// Mean window confidence, weighted by non-empty contributions, in `[0, 1]`.
    pub confidence: f64,
    /// Union of link ids that contributed non-empty content.
    pub sources: Vec<String>,
}
