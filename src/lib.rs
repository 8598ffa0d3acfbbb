//! # research-core
//!
//! A multi-phase research orchestration core: given a batch of scraped
//! source material, it drives an LLM collaborator through preparation,
//! goal discovery, plan finalization, paged execution, and final
//! synthesis, persisting progress to a resumable session file at every
//! step.
//!
//! ## Pipeline
//!
//! - **Phase 0 (Prepare)**: summarizes each batch item and assesses
//!   overall data quality.
//! - **Phase 0.5 (Research Role)**: generates the analyst persona the
//!   remaining phases write their prompts around.
//! - **Phase 1 (Discover Goals)**: proposes a goal list through a bounded
//!   operator accept/amend loop.
//! - **Phase 1.5 (Synthesize Goal)**: frames the accepted goals into one
//!   comprehensive research question, preserving each goal's text
//!   verbatim.
//! - **Phase 2 (Finalize Plan)**: turns the goal into a concrete,
//!   deterministic plan of steps with assigned content windows.
//! - **Phase 3 (Execute)**: runs each step's windows through the model,
//!   with bounded mid-stream retrieval and window-to-window
//!   deduplication.
//! - **Phase 4 (Synthesize)**: renders the final article from the
//!   accumulated scratchpad.
//!
//! [`orchestrator::run_research`] drives all seven phases in order and
//! resumes an interrupted run from the most advanced persisted artifact.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod batch;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod model;
pub mod orchestrator;
pub mod phases;
pub mod prompt;
pub mod retrieval;
pub mod session;
pub mod stream;
pub mod ui;
pub mod windowing;

pub use error::{Error, Result};

pub use batch::{Batch, BatchItem, load_batch};
pub use config::ResearchConfig;
pub use orchestrator::{RunOutcome, run_research};
pub use session::store::JsonSessionStore;
