//! Domain data model for the research orchestration core.
//!
//! Pure data types with no I/O: the session aggregate, goals, plan
//! steps, findings, content markers, and retrieval requests that make up
//! the data model for a research session.

pub mod finding;
pub mod goal;
pub mod marker;
pub mod plan;
pub mod retrieval;
pub mod session;

pub use finding::{Findings, PointOfInterestEntry, PointsOfInterest, StepFinding};
pub use goal::{GoalStatus, SuggestedGoal, SynthesizedGoal};
pub use marker::ContentMarker;
pub use plan::{validate_plan, ChunkStrategy, DataKind, PlanStep};
pub use retrieval::{RetrievalMethod, RetrievalRequest, RetrievalResult};
pub use session::{PhaseArtifact, ScratchpadEntry, Session, SessionStatus};
