//! Push-state JSON extractor for streamed LLM output (§4.2).
//!
//! [`StreamParser`] is fed token-sized chunks as they arrive and emits a
//! [`serde_json::Value`] each time the buffered text contains a balanced
//! top-level `{...}` or `[...]` object, independent of whether the
//! provider has finished the turn. This is what lets Phase 3 notice a
//! `retrieval_request` object mid-stream and dispatch it immediately,
//! while the model keeps generating its narrative continuation.
//!
//! Bracket/brace depth is tracked with string and escape awareness so
//! that braces inside string literals (including escaped quotes) never
//! perturb the depth count. Markdown code fences (`` ``` ``/`` ```json
//! ``) are not special-cased during scanning: since they contain no
//! brace/bracket characters they are silently skipped over like any
//! other prose the model emits around the JSON.

use crate::error::{Result, StreamParseError};

/// Maximum preview length included in an [`StreamParseError::Unparseable`]
/// diagnostic.
const PREVIEW_LEN: usize = 200;

/// Incremental, forgiving JSON-object extractor.
#[derive(Debug, Default)]
pub struct StreamParser {
    buffer: String,
    /// Byte offset in `buffer` where the current in-progress top-level
    /// value started, if we are inside one.
    object_start: Option<usize>,
    depth: i64,
    in_string: bool,
    escape: bool,
}

impl StreamParser {
    /// Creates an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of streamed text and returns every balanced
    /// top-level JSON value completed as a result of appending it, in
    /// the order they closed.
    ///
    /// Text that never starts a `{` or `[` (prose, fences, whitespace)
    /// is retained in the buffer for diagnostics but otherwise ignored
    /// by the depth tracker.
    pub fn push(&mut self, chunk: &str) -> Vec<serde_json::Value> {
        let mut completed = Vec::new();
        let start_len = self.buffer.len();
        self.buffer.push_str(chunk);

        for (offset, ch) in self.buffer[start_len..].char_indices() {
            let idx = start_len + offset;
            self.step(idx, ch, &mut completed);
        }

        completed
    }

    fn step(&mut self, idx: usize, ch: char, completed: &mut Vec<serde_json::Value>) {
        if self.object_start.is_none() {
            if ch == '{' || ch == '[' {
                self.object_start = Some(idx);
                self.depth = 1;
                self.in_string = false;
                self.escape = false;
            }
            return;
        }

        if self.in_string {
            if self.escape {
                self.escape = false;
            } else if ch == '\\' {
                self.escape = true;
            } else if ch == '"' {
                self.in_string = false;
            }
            return;
        }

        match ch {
            '"' => self.in_string = true,
            '{' | '[' => self.depth += 1,
            '}' | ']' => {
                self.depth -= 1;
                if self.depth == 0 {
                    let Some(start) = self.object_start.take() else {
                        return;
                    };
                    let end = idx + ch.len_utf8();
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&self.buffer[start..end]) {
                        completed.push(value);
                    }
                }
            }
            _ => {}
        }
    }

    /// Whether the parser is currently inside an unbalanced top-level
    /// object (i.e. more stream is expected before the next `push` can
    /// emit anything).
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.object_start.is_some()
    }

    /// Consumes the parser at stream end and extracts a single JSON
    /// value using the fallback chain: balanced-object scan (already
    /// consumed by `push`, but re-run here in case the caller never
    /// called `push` incrementally), then fenced-code-block stripping,
    /// then wrapper-object (`{"...": [...]}`) unwrapping is left to the
    /// caller since the expected wrapper key is schema-specific here we
    /// only guarantee a single top-level JSON value or array.
    ///
    /// # Errors
    ///
    /// Returns [`StreamParseError::Unparseable`] if the buffered text
    /// never contains a balanced, parseable top-level JSON value.
    pub fn finish(self) -> Result<serde_json::Value> {
        let trimmed = self.buffer.trim();

        let stripped = strip_fence(trimmed);

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(stripped) {
            return Ok(value);
        }

        if let Some(value) = extract_first_balanced(stripped) {
            return Ok(value);
        }

        let preview: String = stripped.chars().take(PREVIEW_LEN).collect();
        Err(StreamParseError::Unparseable { preview }.into())
    }
}

/// Strips a leading/trailing markdown fence (`` ``` `` or `` ```json ``).
fn strip_fence(text: &str) -> &str {
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.trim_start();
        rest.strip_suffix("```").map_or(rest, str::trim_end)
    } else {
        text
    }
}

/// Scans for the first balanced `{...}` or `[...]` anywhere in `text`,
/// used as a last-resort fallback when the whole trimmed buffer is not
/// itself valid JSON (e.g. the model prefixed it with commentary).
fn extract_first_balanced(text: &str) -> Option<serde_json::Value> {
    let mut parser = StreamParser::new();
    let mut results = parser.push(text);
    if results.is_empty() {
        None
    } else {
        Some(results.remove(0))
    }
}
