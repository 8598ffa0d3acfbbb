//! The `UiBus` capability set (§4.4).
//!
//! A handful of required methods — here, just [`UiBus::prompt_user`],
//! the only operation that suspends — plus a larger set of
//! display/notify methods with no-op defaults, so a bus that only cares
//! about a subset of events can implement just those.

use async_trait::async_trait;

use crate::model::goal::{SuggestedGoal, SynthesizedGoal};
use crate::model::plan::PlanStep;

/// Severity for [`UiBus::display_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Informational.
    Info,
    /// Warning: degraded but not fatal.
    Warn,
    /// Error: surfaced before the orchestrator exits.
    Error,
}

/// A choice offered alongside a [`UiBus::prompt_user`] prompt.
pub type Choice = String;

/// Capability set a phase drives to report progress and solicit input.
///
/// Implementations must be `Send + Sync`: phases hold a `&dyn UiBus` (or
/// `Arc<dyn UiBus>`) across `.await` points during LLM streaming.
#[async_trait]
pub trait UiBus: Send + Sync {
    /// Announces the start of a new phase section.
    async fn display_header(&self, _phase: &str, _title: &str) {}

    /// Emits a free-text status message at the given severity.
    async fn display_message(&self, _text: &str, _level: MessageLevel) {}

    /// Emits a coarse-grained progress update (e.g. step N of M).
    async fn display_progress(&self, _current: usize, _total: usize, _label: &str) {}

    /// Emits one streamed LLM token for live display.
    async fn display_stream(&self, _token: &str) {}

    /// Signals that the current stream display buffer should be cleared
    /// (e.g. between windows).
    async fn clear_stream_buffer(&self) {}

    /// Announces a phase transition.
    async fn notify_phase_change(&self, _phase_key: &str) {}

    /// Displays the Phase-1 suggested goal list.
    async fn display_goals(&self, _goals: &[SuggestedGoal]) {}

    /// Displays the Phase-1.5 synthesized goal.
    async fn display_synthesized_goal(&self, _goal: &SynthesizedGoal) {}

    /// Displays the finalized Phase-2 plan.
    async fn display_plan(&self, _plan: &[PlanStep]) {}

    /// Displays a Phase-0 per-item summary.
    async fn display_summary(&self, _link_id: &str, _kind: &str, _data: &serde_json::Value) {}

    /// Displays the final Phase-4 report, optionally noting where it was
    /// persisted.
    async fn display_report(&self, _text: &str, _path: Option<&str>) {}

    /// Notifies that a Phase-3 step has completed, carrying its
    /// serialized [`crate::model::finding::StepFinding`].
    async fn display_step_complete(&self, _step: &serde_json::Value) {}

    /// Notifies that the whole research workflow has finished (any
    /// terminal status).
    async fn notify_workflow_complete(&self) {}

    /// The only blocking operation on the bus: presents `text` (and
    /// optional `choices`) to the operator and suspends until a response
    /// arrives or a hard timeout elapses, returning an empty string in
    /// the latter case.
    async fn prompt_user(&self, text: &str, choices: Option<&[Choice]>) -> String;
}
