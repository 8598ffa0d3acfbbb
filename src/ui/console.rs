//! `ConsoleUiBus`: a minimal stdout/stdin-backed `UiBus` for the thin CLI
//! surface (§6 "CLI surface"). The CLI binary has no WebSocket transport
//! of its own; this exists only so `run` has a concrete bus to drive the
//! orchestrator against.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::io::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::model::goal::{SuggestedGoal, SynthesizedGoal};
use crate::model::plan::PlanStep;

use super::bus::{Choice, MessageLevel, UiBus};

/// Prints progress and prompts to stdout/stderr, reads `prompt_user`
/// responses from stdin.
#[derive(Debug, Default)]
pub struct ConsoleUiBus {
    prompt_timeout: Duration,
}

impl ConsoleUiBus {
    /// Creates a console bus with the given `prompt_user` hard timeout.
    #[must_use]
    pub fn new(prompt_timeout: Duration) -> Self {
        Self { prompt_timeout }
    }
}

#[async_trait]
impl UiBus for ConsoleUiBus {
    async fn display_header(&self, phase: &str, title: &str) {
        println!("\n== [{phase}] {title} ==");
    }

    async fn display_message(&self, text: &str, level: MessageLevel) {
        match level {
            MessageLevel::Info => info!("{text}"),
            MessageLevel::Warn => warn!("{text}"),
            MessageLevel::Error => error!("{text}"),
        }
    }

    async fn display_progress(&self, current: usize, total: usize, label: &str) {
        println!("[{current}/{total}] {label}");
    }

    async fn display_stream(&self, token: &str) {
        print!("{token}");
        let _ = std::io::stdout().flush();
    }

    async fn clear_stream_buffer(&self) {
        println!();
    }

    async fn notify_phase_change(&self, phase_key: &str) {
        println!("-- phase: {phase_key} --");
    }

    async fn display_goals(&self, goals: &[SuggestedGoal]) {
        println!("Suggested goals:");
        for goal in goals {
            println!("  [{}] {}", goal.id, goal.goal_text);
        }
    }

    async fn display_synthesized_goal(&self, goal: &SynthesizedGoal) {
        println!("Synthesized goal: {}", goal.comprehensive_topic);
    }

    async fn display_plan(&self, plan: &[PlanStep]) {
        println!("Plan:");
        for step in plan {
            println!("  step {}: {} ({:?})", step.step_id, step.goal, step.chunk_strategy);
        }
    }

    async fn display_summary(&self, link_id: &str, kind: &str, _data: &serde_json::Value) {
        println!("summary ready for {link_id} ({kind})");
    }

    async fn display_report(&self, text: &str, path: Option<&str>) {
        if let Some(path) = path {
            println!("Report written to {path} ({} chars)", text.len());
        } else {
            println!("{text}");
        }
    }

    async fn display_step_complete(&self, step: &serde_json::Value) {
        let step_id = step.get("step_id").and_then(serde_json::Value::as_i64).unwrap_or(-1);
        let confidence = step.get("confidence").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
        println!("step {step_id} complete (confidence {confidence:.2})");
    }

    async fn notify_workflow_complete(&self) {
        println!("-- workflow complete --");
    }

    async fn prompt_user(&self, text: &str, choices: Option<&[Choice]>) -> String {
        println!("{text}");
        if let Some(choices) = choices {
            for (i, choice) in choices.iter().enumerate() {
                println!("  {}) {choice}", i + 1);
            }
        }
        print!("> ");
        let _ = std::io::stdout().flush();

        let read = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        });

        match tokio::time::timeout(self.prompt_timeout, read).await {
            Ok(Ok(Ok(line))) => line.trim().to_string(),
            Ok(Ok(Err(_)) | Err(_)) | Err(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_display_methods_do_not_panic() {
        let bus = ConsoleUiBus::new(Duration::from_secs(1));
        bus.display_header("phase0", "Prepare").await;
        bus.display_message("hello", MessageLevel::Info).await;
        bus.display_progress(1, 3, "step").await;
        bus.display_stream("tok").await;
        bus.clear_stream_buffer().await;
        bus.notify_phase_change("phase1").await;
        bus.display_summary("link1", "transcript", &serde_json::json!({})).await;
        bus.display_report("report text", None).await;
        bus.display_step_complete(&serde_json::json!({"step_id": 1, "confidence": 0.8})).await;
        bus.notify_workflow_complete().await;
    }
}
