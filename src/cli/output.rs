//! Output formatting for CLI commands.
//!
//! Supports text, JSON, and NDJSON output formats.

use serde::Serialize;

use crate::error::{Error, LlmError, SessionError};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
    /// Newline-delimited JSON (NDJSON) for streaming.
    /// Each record is a single JSON object on its own line.
    Ndjson,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" | "stream" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Returns true if this format is a streaming format.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Ndjson)
    }
}

/// The process exit code a CLI run should terminate with (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The run completed (Phase 4 finished).
    Completed,
    /// The operator cancelled the run (declined plan confirmation, or a
    /// cancellation signal was observed between steps).
    Cancelled,
    /// An LLM transport or I/O failure was escalated to session-fatal.
    Failed,
    /// The session file on disk could not be parsed.
    CorruptSession,
}

impl ExitStatus {
    /// The numeric process exit code for this status.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Cancelled => 2,
            Self::Failed => 3,
            Self::CorruptSession => 4,
        }
    }
}

/// Classifies an [`Error`] into the exit status it should produce.
#[must_use]
pub const fn exit_status_for(error: &Error) -> ExitStatus {
    match error {
        Error::Cancelled => ExitStatus::Cancelled,
        Error::Session(SessionError::Corrupt { .. }) => ExitStatus::CorruptSession,
        _ => ExitStatus::Failed,
    }
}

/// Formats a value as pretty JSON, degrading to an empty object on a
/// serialization failure that should never happen for our own types.
#[must_use]
pub fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats an error for output.
///
/// When format is JSON/NDJSON, returns a structured error object. When
/// format is Text, returns the error message string.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let (error_type, suggestion) = get_error_details(error);
            let json = serde_json::json!({
                "success": false,
                "error": {
                    "type": error_type,
                    "message": error.to_string(),
                    "suggestion": suggestion
                }
            });
            format_json(&json)
        }
    }
}

/// Extracts error type and recovery suggestion from an error.
const fn get_error_details(error: &Error) -> (&'static str, Option<&'static str>) {
    match error {
        Error::Session(e) => match e {
            SessionError::Corrupt { .. } => (
                "SessionCorrupt",
                Some("the session file is unreadable; start a new session with a different --session id"),
            ),
            SessionError::NotWritable { .. } => (
                "SessionNotWritable",
                Some("check permissions on the sessions directory"),
            ),
            SessionError::Serialization(_) => ("SessionSerializationError", None),
            SessionError::WriteFailed { .. } => ("SessionWriteFailed", None),
        },
        Error::Phase(_) => ("PhaseError", None),
        Error::StreamParse(_) => ("StreamParseError", None),
        Error::Llm(e) => match e {
            LlmError::ApiKeyMissing => (
                "ApiKeyMissing",
                Some("set the provider API key environment variable"),
            ),
            LlmError::UnsupportedProvider { .. } => ("UnsupportedProvider", None),
            LlmError::ApiRequest { .. } => ("ApiRequestFailed", None),
            LlmError::Stream { .. } => ("StreamFailed", None),
            LlmError::TimeoutExhausted { .. } => (
                "TimeoutExhausted",
                Some("rerun with --resume once the provider is reachable again"),
            ),
            LlmError::ResponseParse { .. } => ("ResponseParseFailed", None),
        },
        Error::Ui(_) => ("UiBusError", None),
        Error::Io(_) => ("IoError", Some("verify the batch directory exists and is readable")),
        Error::Config { .. } => ("ConfigError", None),
        Error::Cancelled => ("Cancelled", None),
    }
}

/// Formats a byte size as human-readable.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Truncates a string to max length with ellipsis.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s[..max_len].to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("ndjson"), OutputFormat::Ndjson);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("anything-else"), OutputFormat::Text);
    }

    #[test]
    fn test_exit_status_codes() {
        assert_eq!(ExitStatus::Completed.code(), 0);
        assert_eq!(ExitStatus::Cancelled.code(), 2);
        assert_eq!(ExitStatus::Failed.code(), 3);
        assert_eq!(ExitStatus::CorruptSession.code(), 4);
    }

    #[test]
    fn test_exit_status_for_cancelled() {
        assert_eq!(exit_status_for(&Error::Cancelled), ExitStatus::Cancelled);
    }

    #[test]
    fn test_exit_status_for_corrupt_session() {
        let err = Error::Session(SessionError::Corrupt {
            path: "p".into(),
            reason: "r".into(),
        });
        assert_eq!(exit_status_for(&err), ExitStatus::CorruptSession);
    }

    #[test]
    fn test_exit_status_for_llm_failure() {
        let err = Error::Llm(LlmError::TimeoutExhausted { attempts: 3 });
        assert_eq!(exit_status_for(&err), ExitStatus::Failed);
    }

    #[test]
    fn test_format_error_text_is_plain_message() {
        let err = Error::Cancelled;
        assert_eq!(format_error(&err, OutputFormat::Text), "operation cancelled");
    }

    #[test]
    fn test_format_error_json_is_structured() {
        let err = Error::Cancelled;
        let out = format_error(&err, OutputFormat::Json);
        assert!(out.contains("\"success\": false"));
        assert!(out.contains("\"Cancelled\""));
    }

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn test_truncate_long_string_gets_ellipsis() {
        assert_eq!(truncate("abcdefghij", 5), "ab...");
    }

    #[test]
    fn test_format_size_scales() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
