//! Drives the seven research phases in order for one session (§4.12).
//!
//! [`run_research`] is the single public entry point the CLI (and any
//! other frontend) calls. It owns resume-point determination, the
//! session=batch identity invariant, the cooperative cancellation check
//! between steps, and the persistent-transport-failure escalation
//! heuristic; each phase module owns its own prompt composition and
//! persistence.

use tokio_util::sync::CancellationToken;

use crate::batch::Batch;
use crate::config::ResearchConfig;
use crate::error::{Error, Result};
use crate::llm::LlmProvider;
use crate::model::goal::SuggestedGoal;
use crate::model::plan::PlanStep;
use crate::model::session::{Session, SessionStatus};
use crate::phases::{phase0, phase0_5, phase1, phase1_5, phase2, phase3, phase4};
use crate::phases::phase2::PlanOutcome;
use crate::prompt::PromptComposer;
use crate::session::store::JsonSessionStore;
use crate::ui::bus::UiBus;

/// Where a resumed (or fresh) run picks up, per the resume-point
/// priority order: a `phase4` artifact means the run is already
/// complete; otherwise the most advanced phase with a persisted
/// artifact decides where execution continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePoint {
    /// No phase artifact exists yet.
    Phase0,
    /// `phase0` exists; start Phase 0.5.
    Phase0_5,
    /// `phase0_5` exists; start Phase 1.
    Phase1,
    /// `phase1` exists; start Phase 1.5.
    Phase1_5,
    /// `phase1_5` exists; start Phase 2.
    Phase2,
    /// `phase2` exists (and, per the plan, some steps may already be
    /// recorded); resume Phase 3 from `from_step`.
    Phase3 {
        /// The smallest step id with no `phase3_step_{id}` artifact yet.
        from_step: i64,
    },
    /// Every plan step has a `phase3_step_{id}` artifact but `phase4`
    /// does not exist yet; run only Phase 4.
    Phase4,
    /// `phase4` exists; nothing left to do.
    Complete,
}

/// The terminal outcome of [`run_research`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Phase 4 completed and the session status was set to `completed`.
    Completed,
    /// The operator declined the Phase 2 plan confirmation.
    Cancelled,
    /// A cancellation signal was observed between steps.
    OperatorCancelled,
}

/// Determines where a run should resume from a session snapshot, per
/// the priority order in §4.12: `phase4` present beats everything
/// (already complete); a `phase3_step_*` artifact beats `phase2`; a
/// bare `phase2` resumes Phase 3 from step 1; otherwise resume at the
/// first missing artifact walking phase0 → phase0_5 → phase1 →
/// phase1_5 → phase2.
#[must_use]
pub fn resume_point(session: &Session) -> ResumePoint {
    if session.get_phase_artifact("phase4").is_some() {
        return ResumePoint::Complete;
    }

    let has_step_artifacts = session.phase_artifacts.keys().any(|k| k.starts_with("phase3_step_"));
    if has_step_artifacts || session.get_phase_artifact("phase2").is_some() {
        let steps = plan_steps_from_session(session);
        let next_step = steps
            .iter()
            .map(|s| s.step_id)
            .filter(|id| session.get_phase_artifact(&format!("phase3_step_{id}")).is_none())
            .min();
        return match next_step {
            Some(from_step) => ResumePoint::Phase3 { from_step },
            None if steps.is_empty() => ResumePoint::Phase3 { from_step: 1 },
            None => ResumePoint::Phase4,
        };
    }

    if session.get_phase_artifact("phase1_5").is_some() {
        ResumePoint::Phase2
    } else if session.get_phase_artifact("phase1").is_some() {
        ResumePoint::Phase1_5
    } else if session.get_phase_artifact("phase0_5").is_some() {
        ResumePoint::Phase1
    } else if session.get_phase_artifact("phase0").is_some() {
        ResumePoint::Phase0_5
    } else {
        ResumePoint::Phase0
    }
}

fn plan_steps_from_session(session: &Session) -> Vec<PlanStep> {
    session
        .get_phase_artifact("phase2")
        .and_then(|artifact| artifact.get("steps"))
        .and_then(|steps| serde_json::from_value(steps.clone()).ok())
        .unwrap_or_default()
}

fn accepted_goals_from_session(session: &Session) -> Vec<SuggestedGoal> {
    session
        .get_phase_artifact("phase1")
        .and_then(|artifact| artifact.get("suggested_goals"))
        .and_then(|goals| serde_json::from_value(goals.clone()).ok())
        .unwrap_or_default()
}

/// Runs the full research pipeline for one batch, creating or resuming
/// the session backing it. `session_id` defaults to `batch_id` when
/// `None`: this function never creates a new session id for an
/// existing batch, and always adopts `batch_id` as the session id when
/// no prior session is found.
///
/// # Errors
///
/// Propagates any phase's error. A persistent Phase 3 transport
/// failure (every step finishes with confidence `0.0`) is escalated by
/// setting the session status to `failed` and returning
/// [`Error::Llm`].
#[allow(clippy::too_many_arguments)]
pub async fn run_research(
    batch_id: &str,
    session_id: Option<&str>,
    batch: &Batch,
    config: &ResearchConfig,
    composer: &PromptComposer,
    provider: &dyn LlmProvider,
    ui: &dyn UiBus,
    cancellation: &CancellationToken,
    now: impl Fn() -> i64,
) -> Result<RunOutcome> {
    let resolved_session_id = session_id.unwrap_or(batch_id);
    let session_store = JsonSessionStore::create_or_load(
        &config.sessions_dir,
        resolved_session_id,
        batch_id,
        std::time::Duration::from_millis(config.autosave_debounce_ms),
        now(),
    )
    .await?;

    let snapshot = session_store.snapshot().await;
    let mut point = resume_point(&snapshot);

    if point == ResumePoint::Phase0 {
        let phase0_value = phase0::run(batch, config, composer, provider, ui).await?;
        let quality_assessment = phase0_value.get("quality_assessment").cloned().unwrap_or(serde_json::Value::Null);
        session_store.save_phase_artifact("phase0", phase0_value, now()).await?;
        session_store.set_quality_assessment(quality_assessment, now()).await?;
        point = ResumePoint::Phase0_5;
    }
    if cancellation.is_cancelled() {
        return finish_cancelled(&session_store, now()).await;
    }

    if point == ResumePoint::Phase0_5 {
        phase0_5::run(&session_store, config, composer, provider, ui, now()).await?;
        point = ResumePoint::Phase1;
    }
    if cancellation.is_cancelled() {
        return finish_cancelled(&session_store, now()).await;
    }

    if point == ResumePoint::Phase1 {
        phase1::run(&session_store, config, composer, provider, ui, now()).await?;
        point = ResumePoint::Phase1_5;
    }
    if cancellation.is_cancelled() {
        return finish_cancelled(&session_store, now()).await;
    }

    if point == ResumePoint::Phase1_5 {
        let accepted_goals = accepted_goals_from_session(&session_store.snapshot().await);
        phase1_5::run(&session_store, &accepted_goals, config, composer, provider, ui, now()).await?;
        point = ResumePoint::Phase2;
    }
    if cancellation.is_cancelled() {
        return finish_cancelled(&session_store, now()).await;
    }

    if point == ResumePoint::Phase2 {
        let accepted_goals = accepted_goals_from_session(&session_store.snapshot().await);
        match phase2::run(&session_store, batch, &accepted_goals, config, composer, provider, ui, now()).await? {
            PlanOutcome::Confirmed(_) => {
                point = ResumePoint::Phase3 { from_step: 1 };
            }
            PlanOutcome::Cancelled => {
                session_store.set_status(SessionStatus::Cancelled, now()).await?;
                return Ok(RunOutcome::Cancelled);
            }
        }
    }

    if let ResumePoint::Phase3 { from_step } = point {
        let plan = plan_steps_from_session(&session_store.snapshot().await);
        let mut confidences = Vec::with_capacity(plan.len());
        for step in plan.iter().filter(|s| s.step_id >= from_step) {
            if cancellation.is_cancelled() {
                return finish_cancelled(&session_store, now()).await;
            }
            let finding = phase3::run(&session_store, batch, step, config, composer, provider, ui, None, now()).await?;
            confidences.push(finding.confidence);
        }

        if !confidences.is_empty() && confidences.iter().all(|&c| c == 0.0) {
            session_store.set_status(SessionStatus::Failed, now()).await?;
            ui.display_message(
                "every Phase 3 step returned zero confidence; treating this as a persistent transport failure",
                crate::ui::bus::MessageLevel::Error,
            )
            .await;
            return Err(Error::Llm(crate::error::LlmError::TimeoutExhausted {
                attempts: config.llm_retry_attempts,
            }));
        }
    }

    if cancellation.is_cancelled() {
        return finish_cancelled(&session_store, now()).await;
    }

    let synthesized_goal = session_store
        .snapshot()
        .await
        .synthesized_goal
        .ok_or_else(|| {
            Error::Phase(crate::error::PhaseError::InconsistentArtifacts {
                message: "phase4 requires a synthesized goal".to_string(),
            })
        })?;
    phase4::run(&session_store, &synthesized_goal, config, composer, provider, ui, now()).await?;
    session_store.set_status(SessionStatus::Completed, now()).await?;
    ui.notify_workflow_complete().await;
    Ok(RunOutcome::Completed)
}

async fn finish_cancelled(session_store: &JsonSessionStore, now: i64) -> Result<RunOutcome> {
    session_store.set_status(SessionStatus::Cancelled, now).await?;
    Ok(RunOutcome::OperatorCancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::session::Session;

    fn session(batch_id: &str) -> Session {
        Session::new(batch_id, batch_id, 1_000)
    }

    #[test]
    fn test_resume_point_fresh_session_is_phase0() {
        assert_eq!(resume_point(&session("b1")), ResumePoint::Phase0);
    }

    #[test]
    fn test_resume_point_phase0_present_resumes_phase0_5() {
        let mut s = session("b1");
        s.save_phase_artifact("phase0", serde_json::json!({}), 1_001);
        assert_eq!(resume_point(&s), ResumePoint::Phase0_5);
    }

    #[test]
    fn test_resume_point_phase1_5_present_resumes_phase2() {
        let mut s = session("b1");
        s.save_phase_artifact("phase0", serde_json::json!({}), 1_001);
        s.save_phase_artifact("phase0_5", serde_json::json!({}), 1_002);
        s.save_phase_artifact("phase1", serde_json::json!({}), 1_003);
        s.save_phase_artifact("phase1_5", serde_json::json!({}), 1_004);
        assert_eq!(resume_point(&s), ResumePoint::Phase2);
    }

    #[test]
    fn test_resume_point_phase2_present_resumes_phase3_from_step_1() {
        let mut s = session("b1");
        s.save_phase_artifact(
            "phase2",
            serde_json::json!({"steps": [{"step_id": 1, "goal": "g", "required_data": "transcript", "chunk_strategy": "all", "chunk_size": null, "notes": null, "step_type": null}]}),
            1_005,
        );
        assert_eq!(resume_point(&s), ResumePoint::Phase3 { from_step: 1 });
    }

    #[test]
    fn test_resume_point_skips_completed_steps() {
        let mut s = session("b1");
        s.save_phase_artifact(
            "phase2",
            serde_json::json!({"steps": [
                {"step_id": 1, "goal": "g1", "required_data": "transcript", "chunk_strategy": "all", "chunk_size": null, "notes": null, "step_type": null},
                {"step_id": 2, "goal": "g2", "required_data": "transcript", "chunk_strategy": "all", "chunk_size": null, "notes": null, "step_type": null},
            ]}),
            1_005,
        );
        s.save_phase_artifact("phase3_step_1", serde_json::json!({}), 1_006);
        assert_eq!(resume_point(&s), ResumePoint::Phase3 { from_step: 2 });
    }

    #[test]
    fn test_resume_point_all_steps_done_resumes_phase4() {
        let mut s = session("b1");
        s.save_phase_artifact(
            "phase2",
            serde_json::json!({"steps": [
                {"step_id": 1, "goal": "g1", "required_data": "transcript", "chunk_strategy": "all", "chunk_size": null, "notes": null, "step_type": null},
            ]}),
            1_005,
        );
        s.save_phase_artifact("phase3_step_1", serde_json::json!({}), 1_006);
        assert_eq!(resume_point(&s), ResumePoint::Phase4);
    }

    #[test]
    fn test_resume_point_phase4_present_is_complete() {
        let mut s = session("b1");
        s.save_phase_artifact("phase4", serde_json::json!({}), 1_007);
        assert_eq!(resume_point(&s), ResumePoint::Complete);
    }
}
