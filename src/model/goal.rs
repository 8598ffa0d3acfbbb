//! Phase 1 / 1.5 goal types.

use serde::{Deserialize, Serialize};

use crate::model::plan::DataKind;

/// A goal suggested by Phase 1 (Discover Goals).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedGoal {
    /// Sequential id within the goal list.
    pub id: i64,
    /// The goal text, carried verbatim into `SynthesizedGoal::component_questions`.
    pub goal_text: String,
    /// Why this goal was suggested.
    pub rationale: String,
    /// Which kinds of source data this goal draws on.
    pub uses: Vec<DataKind>,
    /// Acceptance status of the goal.
    pub status: GoalStatus,
}

/// Status of a suggested goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Proposed, not yet accepted or rejected.
    Proposed,
    /// Accepted into the plan.
    Accepted,
    /// Dropped by an amendment round.
    Dropped,
}

/// The synthesized research goal produced by Phase 1.5.
///
/// Invariant: `component_questions` has the same length as the accepted
/// Phase-1 goal list, and each entry equals some goal's `goal_text`
/// character-for-character — Phase 1.5 never regenerates questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedGoal {
    /// A single comprehensive framing of the overall research topic.
    pub comprehensive_topic: String,
    /// Verbatim goal texts preserved from Phase 1, in original order.
    pub component_questions: Vec<String>,
    /// The unifying theme tying the component questions together.
    pub unifying_theme: String,
    /// The scope of the research (what's in bounds, what isn't).
    pub research_scope: String,
}

impl SynthesizedGoal {
    /// Checks the component-question preservation invariant: the
    /// multiset of `component_questions` equals the multiset of
    /// `goal_text` among the given accepted goals.
    #[must_use]
    pub fn preserves_goals(&self, accepted_goals: &[SuggestedGoal]) -> bool {
        let mut expected: Vec<&str> = accepted_goals.iter().map(|g| g.goal_text.as_str()).collect();
        let mut actual: Vec<&str> = self.component_questions.iter().map(String::as_str).collect();
        expected.sort_unstable();
        actual.sort_unstable();
        expected == actual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(id: i64, text: &str) -> SuggestedGoal {
        SuggestedGoal {
            id,
            goal_text: text.to_string(),
            rationale: "because".to_string(),
            uses: vec![DataKind::Transcript],
            status: GoalStatus::Accepted,
        }
    }

    #[test]
    fn test_preserves_goals_true() {
        let goals = vec![goal(1, "a"), goal(2, "b")];
        let synth = SynthesizedGoal {
            comprehensive_topic: "t".into(),
            component_questions: vec!["b".into(), "a".into()],
            unifying_theme: "u".into(),
            research_scope: "s".into(),
        };
        assert!(synth.preserves_goals(&goals));
    }

    #[test]
    fn test_preserves_goals_false_on_regeneration() {
        let goals = vec![goal(1, "a"), goal(2, "b")];
        let synth = SynthesizedGoal {
            comprehensive_topic: "t".into(),
            component_questions: vec!["a".into(), "b-paraphrased".into()],
            unifying_theme: "u".into(),
            research_scope: "s".into(),
        };
        assert!(!synth.preserves_goals(&goals));
    }

    #[test]
    fn test_preserves_goals_false_on_length_mismatch() {
        let goals = vec![goal(1, "a"), goal(2, "b")];
        let synth = SynthesizedGoal {
            comprehensive_topic: "t".into(),
            component_questions: vec!["a".into()],
            unifying_theme: "u".into(),
            research_scope: "s".into(),
        };
        assert!(!synth.preserves_goals(&goals));
    }
}
