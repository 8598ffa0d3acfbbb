//! Error types for the research orchestration core.
//!
//! A comprehensive error hierarchy using `thiserror`, mirroring the
//! per-subsystem split used throughout this codebase: a root [`Error`]
//! wraps subsystem-specific enums, each describing one of the error
//! kinds from the error-handling design (session-fatal, input-invalid,
//! recoverable-per-window, recoverable-per-step, operator-cancelled).

use thiserror::Error;

/// Result type alias for research-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the research orchestration core.
#[derive(Error, Debug)]
pub enum Error {
    /// Session-fatal: the session store could not be loaded or saved.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Input-invalid: a phase produced data that violates an invariant.
    #[error("phase error: {0}")]
    Phase(#[from] PhaseError),

    /// Stream parser failed to extract a balanced top-level JSON object.
    #[error("stream parse error: {0}")]
    StreamParse(#[from] StreamParseError),

    /// LLM transport/timeout error, exhausted its retry budget.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// UI bus error (prompt dispatch/timeout bookkeeping).
    #[error("UI bus error: {0}")]
    Ui(#[from] UiError),

    /// I/O error reading batch/session/prompt files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Operator-cancelled: a cancellation signal was observed.
    #[error("operation cancelled")]
    Cancelled,
}

/// Session store errors. Loading a truncated/corrupt session file, or
/// failing to write one, is session-fatal per the error-handling design.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The on-disk session file is not valid JSON or has no recognizable
    /// top-level shape.
    #[error("session file is corrupt: {path}: {reason}")]
    Corrupt {
        /// Path to the corrupt session file.
        path: String,
        /// Parse failure detail.
        reason: String,
    },

    /// The sessions directory could not be created or written to.
    #[error("sessions directory not writable: {path}: {reason}")]
    NotWritable {
        /// Directory path.
        path: String,
        /// Underlying reason.
        reason: String,
    },

    /// Serialization of the session to JSON failed.
    #[error("session serialization failed: {0}")]
    Serialization(String),

    /// Atomic rename of the temp file onto the session file failed.
    #[error("session write failed: {path}: {reason}")]
    WriteFailed {
        /// Path to the session file.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Input-invalid errors: data that violates a documented invariant.
#[derive(Error, Debug)]
pub enum PhaseError {
    /// Phase 1 produced an empty goal list.
    #[error("phase 1 produced no goals")]
    EmptyGoals,

    /// A plan's step ids are not dense starting at 1.
    #[error("plan step ids are not dense starting at 1: {ids:?}")]
    NonDenseStepIds {
        /// The step ids as found.
        ids: Vec<i64>,
    },

    /// More than one `previous_findings` step, or it is not last.
    #[error("plan has an invalid previous_findings step arrangement")]
    InvalidPreviousFindingsStep,

    /// Two phase artifacts disagree in a way that cannot be reconciled.
    #[error("inconsistent phase artifacts: {message}")]
    InconsistentArtifacts {
        /// Description of the inconsistency.
        message: String,
    },

    /// Component-question preservation invariant violated.
    #[error("synthesized component questions do not match phase-1 goal texts")]
    ComponentQuestionMismatch,
}

/// Stream parser errors.
#[derive(Error, Debug)]
pub enum StreamParseError {
    /// The stream closed without ever producing a balanced top-level
    /// JSON object.
    #[error(
        "unparseable: stream closed without a balanced top-level object (preview: {preview:?})"
    )]
    Unparseable {
        /// A short preview of the buffered content for diagnostics.
        preview: String,
    },
}

/// LLM transport errors (external collaborator failures).
#[derive(Error, Debug)]
pub enum LlmError {
    /// No API key configured for the selected provider.
    #[error("no API key configured")]
    ApiKeyMissing,

    /// The configured provider name is not recognized.
    #[error("unsupported LLM provider: {name}")]
    UnsupportedProvider {
        /// The unrecognized provider name.
        name: String,
    },

    /// The request to the provider failed.
    #[error("LLM API request failed: {message}")]
    ApiRequest {
        /// Error detail from the provider client.
        message: String,
        /// HTTP status code, if known.
        status: Option<u16>,
    },

    /// The streaming response failed mid-stream.
    #[error("LLM stream error: {message}")]
    Stream {
        /// Error detail.
        message: String,
    },

    /// Read timeout elapsed and the retry budget for this window is
    /// exhausted.
    #[error("LLM read timeout, retries exhausted ({attempts} attempts)")]
    TimeoutExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The response text could not be parsed into the expected shape.
    #[error("failed to parse LLM response: {message}")]
    ResponseParse {
        /// Parse failure detail.
        message: String,
        /// The raw content that failed to parse.
        content: String,
    },
}

/// UI bus errors.
#[derive(Error, Debug)]
pub enum UiError {
    /// A `prompt_user` call's mailbox was never completed or looked up
    /// for an unregistered prompt id.
    #[error("unknown prompt id: {prompt_id}")]
    UnknownPromptId {
        /// The prompt id in question.
        prompt_id: String,
    },

    /// The broadcast channel to connected clients has no receivers and
    /// the frame could not be delivered to anyone (non-fatal; logged).
    #[error("broadcast dispatch failed: {0}")]
    BroadcastFailed(String),
}

/// I/O errors reading batch directories, session files, or prompt
/// template directories.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read a file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write a file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to create a directory.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// A scraped batch item was missing its `link_id`, which is fatal
    /// for that item.
    #[error("batch item missing link_id: {path}")]
    MissingLinkId {
        /// Path to the offending item file.
        path: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        Self::Generic(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config {
            message: "bad config".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad config");
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(Error::Cancelled.to_string(), "operation cancelled");
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::Corrupt {
            path: "sessions/session_x.json".to_string(),
            reason: "unexpected EOF".to_string(),
        };
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn test_phase_error_non_dense() {
        let err = PhaseError::NonDenseStepIds { ids: vec![1, 3] };
        assert!(err.to_string().contains("[1, 3]"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(IoError::Generic(_))));
    }

    #[test]
    fn test_from_serde_json_to_session_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("nope").unwrap_err();
        let err: SessionError = json_err.into();
        assert!(matches!(err, SessionError::Serialization(_)));
    }

    #[test]
    fn test_error_from_subsystems() {
        let err: Error = SessionError::Serialization("x".into()).into();
        assert!(matches!(err, Error::Session(_)));
        let err: Error = PhaseError::EmptyGoals.into();
        assert!(matches!(err, Error::Phase(_)));
        let err: Error = StreamParseError::Unparseable {
            preview: "x".into(),
        }
        .into();
        assert!(matches!(err, Error::StreamParse(_)));
        let err: Error = LlmError::ApiKeyMissing.into();
        assert!(matches!(err, Error::Llm(_)));
        let err: Error = UiError::UnknownPromptId {
            prompt_id: "p1".into(),
        }
        .into();
        assert!(matches!(err, Error::Ui(_)));
    }
}
