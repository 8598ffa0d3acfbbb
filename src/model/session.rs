//! The session aggregate (§3, §4.1): phase artifacts, scratchpad, and
//! step digests for one research run.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::model::goal::SynthesizedGoal;

/// Lifecycle status of a research session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but no phase has completed.
    Initialized,
    /// At least one phase artifact exists and Phase 4 has not run.
    InProgress,
    /// Phase 4 completed.
    Completed,
    /// The orchestrator escalated a persistent transport failure.
    Failed,
    /// The operator declined the plan confirmation prompt.
    Cancelled,
}

/// A single phase's persisted output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseArtifact {
    /// The phase's output, as an opaque JSON value (the concrete shape
    /// depends on which phase key this artifact is stored under).
    pub data: serde_json::Value,
    /// Unix timestamp (seconds) of when this artifact was saved.
    pub saved_at: i64,
}

/// A scratchpad entry recorded when a Phase 3 step completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScratchpadEntry {
    /// The step's findings, as an opaque JSON value (a [`crate::model::finding::Findings`]).
    pub findings: serde_json::Value,
    /// Condensed insight text for this step.
    pub insights: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Link ids that contributed non-empty content to this step.
    pub sources: Vec<String>,
    /// Unix timestamp (seconds) of when this entry was recorded.
    pub timestamp: i64,
}

/// The session aggregate: identity, metadata, phase artifacts,
/// scratchpad, and step digests for one research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Identity; defaults to the batch id.
    pub session_id: String,
    /// Unix timestamp (seconds) of creation.
    pub created_at: i64,
    /// Unix timestamp (seconds) of the last mutation.
    pub updated_at: i64,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// The batch id this session was created from.
    pub batch_id: String,
    /// The Phase 0.5 research role, if generated.
    pub research_role: Option<serde_json::Value>,
    /// The Phase 1.5 synthesized goal, if generated.
    pub synthesized_goal: Option<SynthesizedGoal>,
    /// Amendment feedback solicited before Phase 1 goal discovery.
    pub pre_phase1_feedback: Option<String>,
    /// Amendment feedback solicited after Phase 1 goal discovery.
    pub post_phase1_feedback: Option<String>,
    /// The Phase 0 data quality assessment.
    pub quality_assessment: Option<serde_json::Value>,
    /// Phase-key → artifact. Keys: `phase0`, `phase0_5`, `phase1`,
    /// `phase1_5`, `phase2`, `phase3`, `phase3_step_{id}`, `phase4`.
    #[serde(default)]
    pub phase_artifacts: HashMap<String, PhaseArtifact>,
    /// Step-id → scratchpad entry, in step-id order.
    #[serde(default)]
    pub scratchpad: BTreeMap<i64, ScratchpadEntry>,
    /// Compact per-step digests, oldest first, capped in length.
    #[serde(default)]
    pub step_digests: VecDeque<String>,
    /// Free-form session metadata set via `set_metadata`.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    /// Creates a freshly initialized session for `batch_id`.
    #[must_use]
    pub fn new(session_id: impl Into<String>, batch_id: impl Into<String>, now: i64) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Initialized,
            batch_id: batch_id.into(),
            research_role: None,
            synthesized_goal: None,
            pre_phase1_feedback: None,
            post_phase1_feedback: None,
            quality_assessment: None,
            phase_artifacts: HashMap::new(),
            scratchpad: BTreeMap::new(),
            step_digests: VecDeque::new(),
            metadata: HashMap::new(),
        }
    }

    /// Records `data` as the artifact for `phase_key`, stamped with `now`.
    pub fn save_phase_artifact(&mut self, phase_key: impl Into<String>, data: serde_json::Value, now: i64) {
        self.phase_artifacts.insert(
            phase_key.into(),
            PhaseArtifact {
                data,
                saved_at: now,
            },
        );
        self.updated_at = now;
        if self.status == SessionStatus::Initialized {
            self.status = SessionStatus::InProgress;
        }
    }

    /// Returns the stored data for `phase_key`, if any artifact exists.
    #[must_use]
    pub fn get_phase_artifact(&self, phase_key: &str) -> Option<&serde_json::Value> {
        self.phase_artifacts.get(phase_key).map(|a| &a.data)
    }

    /// Upserts the scratchpad entry for `step_id`.
    pub fn update_scratchpad(
        &mut self,
        step_id: i64,
        findings: serde_json::Value,
        insights: impl Into<String>,
        confidence: f64,
        sources: Vec<String>,
        now: i64,
    ) {
        self.scratchpad.insert(
            step_id,
            ScratchpadEntry {
                findings,
                insights: insights.into(),
                confidence,
                sources,
                timestamp: now,
            },
        );
        self.updated_at = now;
    }

    /// Deterministic textual rendering of the scratchpad, in step-id
    /// order, used as downstream-phase context.
    #[must_use]
    pub fn get_scratchpad_summary(&self) -> String {
        let mut out = String::new();
        for (step_id, entry) in &self.scratchpad {
            let _ = writeln!(out, "## Step {step_id}");
            let _ = writeln!(out, "insights: {}", entry.insights);
            if let Some(summary) = entry.findings.get("summary").and_then(serde_json::Value::as_str) {
                let _ = writeln!(out, "summary: {summary}");
            }
            for field in ["key_claims", "notable_evidence", "specific_examples"] {
                if let Some(items) = entry
                    .findings
                    .pointer(&format!("/points_of_interest/{field}"))
                    .and_then(serde_json::Value::as_array)
                {
                    for item in items.iter().take(3) {
                        if let Some(text) = item.get("text").and_then(serde_json::Value::as_str) {
                            let _ = writeln!(out, "- {field}: {text}");
                        }
                    }
                }
            }
            if !entry.sources.is_empty() {
                let _ = writeln!(out, "sources: {}", entry.sources.join(", "));
            }
        }
        out
    }

    /// Appends a step digest, dropping the oldest entry if `cap` would be exceeded.
    pub fn append_step_digest(&mut self, digest: impl Into<String>, cap: usize) {
        self.step_digests.push_back(digest.into());
        while self.step_digests.len() > cap {
            self.step_digests.pop_front();
        }
    }

    /// Sets a free-form metadata key.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value, now: i64) {
        self.metadata.insert(key.into(), value);
        self.updated_at = now;
    }

    /// Records the Phase 0 data quality assessment.
    pub fn set_quality_assessment(&mut self, value: serde_json::Value, now: i64) {
        self.quality_assessment = Some(value);
        self.updated_at = now;
    }

    /// Records the Phase 0.5 research role.
    pub fn set_research_role(&mut self, value: serde_json::Value, now: i64) {
        self.research_role = Some(value);
        self.updated_at = now;
    }

    /// Records feedback solicited before Phase 1's first run.
    pub fn set_pre_phase1_feedback(&mut self, feedback: impl Into<String>, now: i64) {
        self.pre_phase1_feedback = Some(feedback.into());
        self.updated_at = now;
    }

    /// Records feedback solicited after a Phase 1 amendment round.
    pub fn set_post_phase1_feedback(&mut self, feedback: impl Into<String>, now: i64) {
        self.post_phase1_feedback = Some(feedback.into());
        self.updated_at = now;
    }

    /// Records the Phase 1.5 synthesized goal.
    pub fn set_synthesized_goal(&mut self, goal: SynthesizedGoal, now: i64) {
        self.synthesized_goal = Some(goal);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults_initialized() {
        let session = Session::new("s1", "b1", 1_000);
        assert_eq!(session.status, SessionStatus::Initialized);
        assert_eq!(session.session_id, "s1");
        assert_eq!(session.batch_id, "b1");
    }

    #[test]
    fn test_save_phase_artifact_transitions_to_in_progress() {
        let mut session = Session::new("s1", "b1", 1_000);
        session.save_phase_artifact("phase0", serde_json::json!({"ok": true}), 1_001);
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(
            session.get_phase_artifact("phase0"),
            Some(&serde_json::json!({"ok": true}))
        );
        assert_eq!(session.updated_at, 1_001);
    }

    #[test]
    fn test_get_phase_artifact_missing_is_none() {
        let session = Session::new("s1", "b1", 1_000);
        assert!(session.get_phase_artifact("phase0").is_none());
    }

    #[test]
    fn test_update_scratchpad_then_summary_in_step_order() {
        let mut session = Session::new("s1", "b1", 1_000);
        session.update_scratchpad(
            2,
            serde_json::json!({"summary": "second"}),
            "insight2",
            0.5,
            vec!["link2".into()],
            1_001,
        );
        session.update_scratchpad(
            1,
            serde_json::json!({"summary": "first"}),
            "insight1",
            0.9,
            vec!["link1".into()],
            1_002,
        );
        let summary = session.get_scratchpad_summary();
        let first_pos = summary.find("Step 1").unwrap_or_else(|| unreachable!());
        let second_pos = summary.find("Step 2").unwrap_or_else(|| unreachable!());
        assert!(first_pos < second_pos);
        assert!(summary.contains("insight1"));
        assert!(summary.contains("link2"));
    }

    #[test]
    fn test_append_step_digest_respects_cap() {
        let mut session = Session::new("s1", "b1", 1_000);
        for i in 0..15 {
            session.append_step_digest(format!("digest{i}"), 12);
        }
        assert_eq!(session.step_digests.len(), 12);
        assert_eq!(session.step_digests.front(), Some(&"digest3".to_string()));
        assert_eq!(session.step_digests.back(), Some(&"digest14".to_string()));
    }

    #[test]
    fn test_set_metadata() {
        let mut session = Session::new("s1", "b1", 1_000);
        session.set_metadata("key", serde_json::json!("value"), 1_001);
        assert_eq!(session.metadata.get("key"), Some(&serde_json::json!("value")));
    }

    #[test]
    fn test_set_quality_assessment() {
        let mut session = Session::new("s1", "b1", 1_000);
        session.set_quality_assessment(serde_json::json!({"flags": ["sparsity"]}), 1_001);
        assert_eq!(
            session.quality_assessment,
            Some(serde_json::json!({"flags": ["sparsity"]}))
        );
    }

    #[test]
    fn test_set_synthesized_goal() {
        let mut session = Session::new("s1", "b1", 1_000);
        let goal = SynthesizedGoal {
            comprehensive_topic: "t".into(),
            component_questions: vec!["q1".into()],
            unifying_theme: "u".into(),
            research_scope: "s".into(),
        };
        session.set_synthesized_goal(goal.clone(), 1_001);
        assert_eq!(session.synthesized_goal, Some(goal));
    }

    #[test]
    fn test_session_serde_round_trip() {
        let mut session = Session::new("s1", "b1", 1_000);
        session.save_phase_artifact("phase0", serde_json::json!({"a": 1}), 1_001);
        let json = serde_json::to_string(&session).unwrap_or_else(|_| unreachable!());
        let back: Session = serde_json::from_str(&json).unwrap_or_else(|_| unreachable!());
        assert_eq!(back.session_id, session.session_id);
        assert_eq!(back.phase_artifacts.len(), 1);
    }
}
