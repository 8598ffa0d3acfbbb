//! `WebSocketUiBus`: the mailbox-map/broadcast-replay logic behind the
//! WebSocket wire frames in §6. This module implements the bus's
//! internal bookkeeping only — framing, handshakes, and the actual
//! socket/HTTP transport are external collaborators (out of scope, see
//! §1) that call [`WebSocketUiBus::broadcast`] to fan a frame out and
//! [`WebSocketUiBus::deliver_user_input`] when an inbound
//! `research:user_input` frame arrives.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tracing::warn;

use crate::model::goal::{SuggestedGoal, SynthesizedGoal};
use crate::model::plan::PlanStep;

use super::bus::{Choice, MessageLevel, UiBus};

/// Server-to-client wire frames (§6 "UI / WebSocket wire").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// `workflow:progress`.
    #[serde(rename = "workflow:progress")]
    WorkflowProgress {
        /// Current unit of progress.
        current: usize,
        /// Total units of progress.
        total: usize,
        /// Human-readable label.
        label: String,
    },
    /// `research:phase_change`.
    #[serde(rename = "research:phase_change")]
    PhaseChange {
        /// The phase key being entered.
        phase: String,
    },
    /// `research:stream_token`.
    #[serde(rename = "research:stream_token")]
    StreamToken {
        /// The streamed token.
        token: String,
    },
    /// `research:goals`.
    #[serde(rename = "research:goals")]
    Goals {
        /// The suggested goal list.
        goals: Vec<SuggestedGoal>,
    },
    /// `research:synthesized_goal`.
    #[serde(rename = "research:synthesized_goal")]
    SynthesizedGoal {
        /// The synthesized goal.
        goal: SynthesizedGoal,
    },
    /// `research:plan`.
    #[serde(rename = "research:plan")]
    Plan {
        /// The finalized plan.
        plan: Vec<PlanStep>,
    },
    /// `research:user_input_required`.
    #[serde(rename = "research:user_input_required")]
    UserInputRequired {
        /// Unique id for this prompt.
        prompt_id: String,
        /// Prompt text.
        prompt: String,
        /// Optional preset choices.
        #[serde(skip_serializing_if = "Option::is_none")]
        choices: Option<Vec<Choice>>,
    },
    /// `phase0:summary`.
    #[serde(rename = "phase0:summary")]
    Phase0Summary {
        /// The batch item this summary covers.
        link_id: String,
        /// Summary kind (e.g. `"transcript"`, `"comments"`).
        kind: String,
        /// The summary payload.
        data: serde_json::Value,
    },
    /// `phase3:step_complete`.
    #[serde(rename = "phase3:step_complete")]
    Phase3StepComplete {
        /// The completed step's finding, serialized.
        step: serde_json::Value,
    },
    /// `phase4:report_ready`.
    #[serde(rename = "phase4:report_ready")]
    Phase4ReportReady {
        /// The final report text.
        report: String,
    },
    /// `workflow:complete`.
    #[serde(rename = "workflow:complete")]
    WorkflowComplete,
    /// `error`.
    #[serde(rename = "error")]
    Error {
        /// The error message.
        message: String,
    },
}

/// Client-to-server wire frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// `research:user_input`.
    #[serde(rename = "research:user_input")]
    UserInput {
        /// The prompt id this responds to.
        prompt_id: String,
        /// The operator's response text.
        response: String,
    },
    /// `workflow:cancel`.
    #[serde(rename = "workflow:cancel")]
    Cancel,
}

/// Mailbox-map/broadcast-replay `UiBus` backing a WebSocket transport.
///
/// Internals:
/// - `broadcast_tx` fans every [`Frame`] out to all currently-subscribed
///   clients; subscribing returns a fresh [`broadcast::Receiver`].
/// - `replay` retains the last `replay_cap` frames so a client that
///   subscribes mid-run (e.g. reconnecting) can catch up without
///   unbounded history.
/// - `mailboxes` maps an in-flight `prompt_id` to the one-shot channel
///   [`UiBus::prompt_user`] is waiting on; the inbound dispatcher
///   completes it via [`deliver_user_input`].
///
/// [`deliver_user_input`]: WebSocketUiBus::deliver_user_input
pub struct WebSocketUiBus {
    broadcast_tx: broadcast::Sender<Frame>,
    mailboxes: Mutex<HashMap<String, oneshot::Sender<String>>>,
    replay: Mutex<VecDeque<Frame>>,
    replay_cap: usize,
    prompt_timeout: Duration,
    next_prompt_id: AtomicU64,
}

impl std::fmt::Debug for WebSocketUiBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketUiBus")
            .field("replay_cap", &self.replay_cap)
            .field("prompt_timeout", &self.prompt_timeout)
            .finish_non_exhaustive()
    }
}

impl WebSocketUiBus {
    /// Creates a bus with the given replay buffer cap and `prompt_user`
    /// hard timeout.
    #[must_use]
    pub fn new(replay_cap: usize, prompt_timeout: Duration) -> Self {
        let (broadcast_tx, _rx) = broadcast::channel(replay_cap.max(16));
        Self {
            broadcast_tx,
            mailboxes: Mutex::new(HashMap::new()),
            replay: Mutex::new(VecDeque::with_capacity(replay_cap)),
            replay_cap,
            prompt_timeout,
            next_prompt_id: AtomicU64::new(1),
        }
    }

    /// Subscribes a newly-connected client: returns the buffered replay
    /// frames (oldest first) plus a live receiver for everything after.
    #[must_use]
    pub fn subscribe(&self) -> (Vec<Frame>, broadcast::Receiver<Frame>) {
        let rx = self.broadcast_tx.subscribe();
        let replay = self
            .replay
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        (replay, rx)
    }

    /// Broadcasts a frame to every connected client and records it in
    /// the replay buffer. Best-effort: a send with no receivers is not
    /// an error (frames are dropped silently when nobody is listening).
    pub fn broadcast(&self, frame: Frame) {
        {
            let mut replay = self
                .replay
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if replay.len() >= self.replay_cap {
                replay.pop_front();
            }
            replay.push_back(frame.clone());
        }
        if self.broadcast_tx.send(frame).is_err() {
            // No subscribers currently connected; not an error.
        }
    }

    /// Completes the mailbox for `prompt_id` with `response`, waking the
    /// suspended `prompt_user` call. A response for an unknown or
    /// already-resolved prompt id is discarded per §4.4.
    pub fn deliver_user_input(&self, prompt_id: &str, response: String) {
        let sender = self
            .mailboxes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(prompt_id);
        match sender {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => warn!(prompt_id, "user_input for unknown or resolved prompt id"),
        }
    }

    /// Handles an inbound client frame, dispatching `UserInput` to the
    /// mailbox map. `Cancel` is left for the orchestrator's cancellation
    /// signal to observe; this method does not itself track it.
    pub fn handle_client_frame(&self, frame: ClientFrame) {
        match frame {
            ClientFrame::UserInput { prompt_id, response } => {
                self.deliver_user_input(&prompt_id, response);
            }
            ClientFrame::Cancel => {}
        }
    }

    fn next_id(&self) -> String {
        let n = self.next_prompt_id.fetch_add(1, Ordering::Relaxed);
        format!("prompt-{n}")
    }
}

#[async_trait]
impl UiBus for WebSocketUiBus {
    async fn display_header(&self, phase: &str, title: &str) {
        self.broadcast(Frame::PhaseChange {
            phase: format!("{phase}: {title}"),
        });
    }

    async fn display_message(&self, text: &str, level: MessageLevel) {
        if level == MessageLevel::Error {
            self.broadcast(Frame::Error {
                message: text.to_string(),
            });
        }
    }

    async fn display_progress(&self, current: usize, total: usize, label: &str) {
        self.broadcast(Frame::WorkflowProgress {
            current,
            total,
            label: label.to_string(),
        });
    }

    async fn display_stream(&self, token: &str) {
        self.broadcast(Frame::StreamToken {
            token: token.to_string(),
        });
    }

    async fn notify_phase_change(&self, phase_key: &str) {
        self.broadcast(Frame::PhaseChange {
            phase: phase_key.to_string(),
        });
    }

    async fn display_goals(&self, goals: &[SuggestedGoal]) {
        self.broadcast(Frame::Goals {
            goals: goals.to_vec(),
        });
    }

    async fn display_synthesized_goal(&self, goal: &SynthesizedGoal) {
        self.broadcast(Frame::SynthesizedGoal { goal: goal.clone() });
    }

    async fn display_plan(&self, plan: &[PlanStep]) {
        self.broadcast(Frame::Plan {
            plan: plan.to_vec(),
        });
    }

    async fn display_summary(&self, link_id: &str, kind: &str, data: &serde_json::Value) {
        self.broadcast(Frame::Phase0Summary {
            link_id: link_id.to_string(),
            kind: kind.to_string(),
            data: data.clone(),
        });
    }

    async fn display_report(&self, text: &str, _path: Option<&str>) {
        self.broadcast(Frame::Phase4ReportReady {
            report: text.to_string(),
        });
    }

    async fn display_step_complete(&self, step: &serde_json::Value) {
        self.broadcast(Frame::Phase3StepComplete { step: step.clone() });
    }

    async fn notify_workflow_complete(&self) {
        self.broadcast(Frame::WorkflowComplete);
    }

    async fn prompt_user(&self, text: &str, choices: Option<&[Choice]>) -> String {
        let prompt_id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.mailboxes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(prompt_id.clone(), tx);

        self.broadcast(Frame::UserInputRequired {
            prompt_id: prompt_id.clone(),
            prompt: text.to_string(),
            choices: choices.map(<[Choice]>::to_vec),
        });

        match tokio::time::timeout(self.prompt_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) | Err(_) => {
                self.mailboxes
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .remove(&prompt_id);
                warn!(prompt_id, "prompt_user timed out or mailbox dropped");
                String::new()
            }
        }
    }
}
