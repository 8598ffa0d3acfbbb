//! Phase 2 plan types.

use serde::{Deserialize, Serialize};

use crate::error::{PhaseError, Result};

/// Which slice of source data a plan step or goal draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// The transcript only.
    Transcript,
    /// The comments only.
    Comments,
    /// Transcript plus comments.
    TranscriptWithComments,
    /// Only item metadata.
    Metadata,
}

/// How a plan step's content is windowed before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// One window covering the entire content of the required kind.
    All,
    /// Sliding windows of `chunk_size` words with overlap.
    Sequential,
    /// A uniform random sample of items or words.
    RandomSample,
    /// A single window rendering the scratchpad summary; no external content.
    PreviousFindings,
}

/// A single step of the finalized Phase-2 plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step identifier; steps are dense starting at 1.
    pub step_id: i64,
    /// The goal text this step investigates.
    pub goal: String,
    /// Which kind of source data this step requires.
    pub required_data: DataKind,
    /// How content is windowed for this step.
    pub chunk_strategy: ChunkStrategy,
    /// Chunk size in words; only meaningful when `chunk_strategy == Sequential`.
    pub chunk_size: Option<usize>,
    /// Free-form notes carried into the prompt.
    pub notes: Option<String>,
    /// An optional step-type label (e.g. "synthesis").
    pub step_type: Option<String>,
}

/// Validates the step-id-density and `previous_findings`-placement
/// invariants over a whole plan.
///
/// # Errors
///
/// Returns [`PhaseError::NonDenseStepIds`] if step ids are not exactly
/// `{1, ..., N}`, or [`PhaseError::InvalidPreviousFindingsStep`] if more
/// than one step uses `previous_findings`, or one does but isn't last.
pub fn validate_plan(steps: &[PlanStep]) -> Result<()> {
    let mut ids: Vec<i64> = steps.iter().map(|s| s.step_id).collect();
    ids.sort_unstable();
    let dense = ids
        .iter()
        .enumerate()
        .all(|(i, &id)| id == i64::try_from(i + 1).unwrap_or(i64::MAX));
    if !dense {
        return Err(PhaseError::NonDenseStepIds { ids }.into());
    }

    let previous_findings_positions: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.chunk_strategy == ChunkStrategy::PreviousFindings)
        .map(|(i, _)| i)
        .collect();

    match previous_findings_positions.as_slice() {
        [] => Ok(()),
        [only] if *only == steps.len() - 1 => Ok(()),
        _ => Err(PhaseError::InvalidPreviousFindingsStep.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: i64, strategy: ChunkStrategy) -> PlanStep {
        PlanStep {
            step_id: id,
            goal: "goal".into(),
            required_data: DataKind::Transcript,
            chunk_strategy: strategy,
            chunk_size: None,
            notes: None,
            step_type: None,
        }
    }

    #[test]
    fn test_validate_plan_dense_ok() {
        let steps = vec![
            step(1, ChunkStrategy::All),
            step(2, ChunkStrategy::Sequential),
        ];
        assert!(validate_plan(&steps).is_ok());
    }

    #[test]
    fn test_validate_plan_non_dense_rejected() {
        let steps = vec![step(1, ChunkStrategy::All), step(3, ChunkStrategy::All)];
        assert!(validate_plan(&steps).is_err());
    }

    #[test]
    fn test_validate_plan_previous_findings_must_be_last() {
        let steps = vec![
            step(1, ChunkStrategy::PreviousFindings),
            step(2, ChunkStrategy::All),
        ];
        assert!(validate_plan(&steps).is_err());
    }

    #[test]
    fn test_validate_plan_previous_findings_last_ok() {
        let steps = vec![
            step(1, ChunkStrategy::Sequential),
            step(2, ChunkStrategy::PreviousFindings),
        ];
        assert!(validate_plan(&steps).is_ok());
    }

    #[test]
    fn test_validate_plan_two_previous_findings_rejected() {
        let steps = vec![
            step(1, ChunkStrategy::PreviousFindings),
            step(2, ChunkStrategy::PreviousFindings),
        ];
        assert!(validate_plan(&steps).is_err());
    }

    #[test]
    fn test_validate_plan_empty_ok() {
        assert!(validate_plan(&[]).is_ok());
    }
}
