//! Research orchestration configuration.
//!
//! [`ResearchConfig`] centralizes every tunable the phases and the
//! orchestrator need. Values resolve in priority order: explicit builder
//! calls, then environment variables, then the `DEFAULT_*` constants
//! below — the same precedence chain the agent subsystem's own
//! configuration layer uses.

use crate::error::{Error, Result};

/// Default autosave debounce interval in milliseconds.
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 500;

/// Default cap on the Phase 1 amendment loop.
pub const DEFAULT_MAX_AMENDMENT_ROUNDS: u32 = 3;

/// Default cap on retrieval follow-up rounds within a single step.
pub const DEFAULT_MAX_FOLLOWUPS: u32 = 3;

/// Default `prompt_user` hard timeout in seconds.
pub const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 300;

/// Default LLM read timeout in seconds.
pub const DEFAULT_LLM_READ_TIMEOUT_SECS: u64 = 120;

/// Default number of retry attempts per window on LLM transport failure.
pub const DEFAULT_LLM_RETRY_ATTEMPTS: u32 = 3;

/// Default sequential chunk size, in words.
pub const DEFAULT_CHUNK_SIZE_WORDS: usize = 3_000;

/// Default sequential chunk overlap, in words.
pub const DEFAULT_CHUNK_OVERLAP_WORDS: usize = 400;

/// Default per-call transcript character budget.
pub const DEFAULT_TRANSCRIPT_CHAR_BUDGET: usize = 50_000;

/// Default per-call comments character budget.
pub const DEFAULT_COMMENTS_CHAR_BUDGET: usize = 15_000;

/// Default per-call metadata character budget.
pub const DEFAULT_METADATA_CHAR_BUDGET: usize = 10_000;

/// Default cap on step digests retained in a session.
pub const DEFAULT_STEP_DIGEST_CAP: usize = 12;

/// Default cap on per-window dedup additions to a `points_of_interest`
/// sub-array.
pub const DEFAULT_DEDUP_PER_WINDOW_CAP: usize = 10;

/// Default word cap for a `random_sample` window over transcript-like content.
pub const DEFAULT_RANDOM_SAMPLE_WORD_CAP: usize = 3_000;

/// Default item (line) cap for a `random_sample` window over comment-like content.
pub const DEFAULT_RANDOM_SAMPLE_ITEM_CAP: usize = 200;

/// Default cap on the UI bus's per-batch broadcast replay buffer.
pub const DEFAULT_BROADCAST_REPLAY_CAP: usize = 100;

/// Default words-total threshold below which Phase 2 picks `all`.
pub const DEFAULT_ALL_STRATEGY_WORD_CEILING: usize = 5_000;

/// Default words-total threshold above which Phase 2 always picks
/// `sequential` plus a final `previous_findings` step.
pub const DEFAULT_SEQUENTIAL_WORD_FLOOR: usize = 10_000;

/// Resolved configuration for a research run.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Directory holding scraped batches, one subdirectory per batch id.
    pub batches_dir: std::path::PathBuf,
    /// Directory holding session JSON files.
    pub sessions_dir: std::path::PathBuf,
    /// Directory holding prompt template directories, one per phase.
    pub prompts_dir: std::path::PathBuf,
    /// LLM model name used for planning-style phases.
    pub planner_model: String,
    /// LLM model name used for Phase 3 per-window analysis.
    pub executor_model: String,
    /// LLM model name used for Phase 4 synthesis.
    pub synthesizer_model: String,
    /// Autosave debounce interval.
    pub autosave_debounce_ms: u64,
    /// Maximum Phase 1 amendment loop iterations.
    pub max_amendment_rounds: u32,
    /// Maximum retrieval follow-up rounds per step.
    pub max_followups: u32,
    /// `prompt_user` hard timeout, in seconds.
    pub prompt_timeout_secs: u64,
    /// LLM read timeout, in seconds.
    pub llm_read_timeout_secs: u64,
    /// LLM retry attempts per window.
    pub llm_retry_attempts: u32,
    /// Sequential chunk size, in words.
    pub chunk_size_words: usize,
    /// Sequential chunk overlap, in words.
    pub chunk_overlap_words: usize,
    /// Per-call transcript character budget.
    pub transcript_char_budget: usize,
    /// Per-call comments character budget.
    pub comments_char_budget: usize,
    /// Per-call metadata character budget.
    pub metadata_char_budget: usize,
    /// Step digest retention cap.
    pub step_digest_cap: usize,
    /// Per-window dedup addition cap.
    pub dedup_per_window_cap: usize,
    /// Broadcast replay buffer cap.
    pub broadcast_replay_cap: usize,
    /// Word cap for a `random_sample` window over transcript-like content.
    pub random_sample_word_cap: usize,
    /// Item cap for a `random_sample` window over comment-like content.
    pub random_sample_item_cap: usize,
}

impl ResearchConfig {
    /// Starts a new builder.
    #[must_use]
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }
}

/// Builder for [`ResearchConfig`].
///
/// `build()` resolves every unset field from the environment, then from
/// the `DEFAULT_*` constants.
#[derive(Debug, Default)]
pub struct ResearchConfigBuilder {
    batches_dir: Option<std::path::PathBuf>,
    sessions_dir: Option<std::path::PathBuf>,
    prompts_dir: Option<std::path::PathBuf>,
    planner_model: Option<String>,
    executor_model: Option<String>,
    synthesizer_model: Option<String>,
    autosave_debounce_ms: Option<u64>,
    max_amendment_rounds: Option<u32>,
    max_followups: Option<u32>,
    prompt_timeout_secs: Option<u64>,
    llm_read_timeout_secs: Option<u64>,
    llm_retry_attempts: Option<u32>,
    chunk_size_words: Option<usize>,
    chunk_overlap_words: Option<usize>,
}

macro_rules! builder_setter {
    ($name:ident, $ty:ty) => {
        /// Sets the corresponding field explicitly.
        #[must_use]
        pub fn $name(mut self, value: $ty) -> Self {
            self.$name = Some(value.into());
            self
        }
    };
}

impl ResearchConfigBuilder {
    builder_setter!(batches_dir, std::path::PathBuf);
    builder_setter!(sessions_dir, std::path::PathBuf);
    builder_setter!(prompts_dir, std::path::PathBuf);
    builder_setter!(planner_model, String);
    builder_setter!(executor_model, String);
    builder_setter!(synthesizer_model, String);
    builder_setter!(autosave_debounce_ms, u64);
    builder_setter!(max_amendment_rounds, u32);
    builder_setter!(max_followups, u32);
    builder_setter!(prompt_timeout_secs, u64);
    builder_setter!(llm_read_timeout_secs, u64);
    builder_setter!(llm_retry_attempts, u32);
    builder_setter!(chunk_size_words, usize);
    builder_setter!(chunk_overlap_words, usize);

    /// Resolves the final configuration: explicit values, then
    /// environment variables, then defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is set but cannot be
    /// parsed to the expected type.
    pub fn build(self) -> Result<ResearchConfig> {
        Ok(ResearchConfig {
            batches_dir: self
                .batches_dir
                .or_else(|| env_path("RESEARCH_BATCHES_DIR"))
                .unwrap_or_else(|| std::path::PathBuf::from("./batches")),
            sessions_dir: self
                .sessions_dir
                .or_else(|| env_path("RESEARCH_SESSIONS_DIR"))
                .unwrap_or_else(|| std::path::PathBuf::from("./sessions")),
            prompts_dir: self
                .prompts_dir
                .or_else(|| env_path("RESEARCH_PROMPTS_DIR"))
                .unwrap_or_else(|| std::path::PathBuf::from("./prompts")),
            planner_model: self
                .planner_model
                .or_else(|| env_string("RESEARCH_PLANNER_MODEL"))
                .unwrap_or_else(|| "gpt-5-mini".to_string()),
            executor_model: self
                .executor_model
                .or_else(|| env_string("RESEARCH_EXECUTOR_MODEL"))
                .unwrap_or_else(|| "gpt-5-mini".to_string()),
            synthesizer_model: self
                .synthesizer_model
                .or_else(|| env_string("RESEARCH_SYNTHESIZER_MODEL"))
                .unwrap_or_else(|| "gpt-5".to_string()),
            autosave_debounce_ms: self
                .autosave_debounce_ms
                .or_else(|| env_parse("RESEARCH_AUTOSAVE_DEBOUNCE_MS"))
                .unwrap_or(DEFAULT_AUTOSAVE_DEBOUNCE_MS),
            max_amendment_rounds: self
                .max_amendment_rounds
                .or_else(|| env_parse("RESEARCH_MAX_AMENDMENT_ROUNDS"))
                .unwrap_or(DEFAULT_MAX_AMENDMENT_ROUNDS),
            max_followups: self
                .max_followups
                .or_else(|| env_parse("RESEARCH_MAX_FOLLOWUPS"))
                .unwrap_or(DEFAULT_MAX_FOLLOWUPS),
            prompt_timeout_secs: self
                .prompt_timeout_secs
                .or_else(|| env_parse("RESEARCH_PROMPT_TIMEOUT_SECS"))
                .unwrap_or(DEFAULT_PROMPT_TIMEOUT_SECS),
            llm_read_timeout_secs: self
                .llm_read_timeout_secs
                .or_else(|| env_parse("RESEARCH_LLM_READ_TIMEOUT_SECS"))
                .unwrap_or(DEFAULT_LLM_READ_TIMEOUT_SECS),
            llm_retry_attempts: self
                .llm_retry_attempts
                .or_else(|| env_parse("RESEARCH_LLM_RETRY_ATTEMPTS"))
                .unwrap_or(DEFAULT_LLM_RETRY_ATTEMPTS),
            chunk_size_words: self
                .chunk_size_words
                .or_else(|| env_parse("RESEARCH_CHUNK_SIZE_WORDS"))
                .unwrap_or(DEFAULT_CHUNK_SIZE_WORDS),
            chunk_overlap_words: self
                .chunk_overlap_words
                .or_else(|| env_parse("RESEARCH_CHUNK_OVERLAP_WORDS"))
                .unwrap_or(DEFAULT_CHUNK_OVERLAP_WORDS),
            transcript_char_budget: DEFAULT_TRANSCRIPT_CHAR_BUDGET,
            comments_char_budget: DEFAULT_COMMENTS_CHAR_BUDGET,
            metadata_char_budget: DEFAULT_METADATA_CHAR_BUDGET,
            step_digest_cap: DEFAULT_STEP_DIGEST_CAP,
            dedup_per_window_cap: DEFAULT_DEDUP_PER_WINDOW_CAP,
            broadcast_replay_cap: DEFAULT_BROADCAST_REPLAY_CAP,
            random_sample_word_cap: DEFAULT_RANDOM_SAMPLE_WORD_CAP,
            random_sample_item_cap: DEFAULT_RANDOM_SAMPLE_ITEM_CAP,
        })
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_path(key: &str) -> Option<std::path::PathBuf> {
    std::env::var(key).ok().map(std::path::PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Validates an environment-provided numeric string, surfacing a
/// [`Error::Config`] instead of silently falling back on a parse
/// failure. Used by callers that want strict validation rather than the
/// lenient `build()` precedence chain.
///
/// # Errors
///
/// Returns an error if `raw` cannot be parsed as `T`.
pub fn parse_strict<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| Error::Config {
        message: format!("invalid value for {key}: {raw:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResearchConfig::builder().build().unwrap_or_else(|_| unreachable!());
        assert_eq!(config.autosave_debounce_ms, DEFAULT_AUTOSAVE_DEBOUNCE_MS);
        assert_eq!(config.max_amendment_rounds, DEFAULT_MAX_AMENDMENT_ROUNDS);
        assert_eq!(config.max_followups, DEFAULT_MAX_FOLLOWUPS);
        assert_eq!(config.chunk_size_words, DEFAULT_CHUNK_SIZE_WORDS);
        assert_eq!(config.chunk_overlap_words, DEFAULT_CHUNK_OVERLAP_WORDS);
    }

    #[test]
    fn test_explicit_overrides_default() {
        let config = ResearchConfig::builder()
            .max_followups(7)
            .chunk_size_words(1000_usize)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.max_followups, 7);
        assert_eq!(config.chunk_size_words, 1000);
    }

    #[test]
    fn test_parse_strict_rejects_garbage() {
        let result: Result<u32> = parse_strict("RESEARCH_MAX_FOLLOWUPS", "not-a-number");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_strict_accepts_valid() {
        let result: Result<u32> = parse_strict("RESEARCH_MAX_FOLLOWUPS", "5");
        assert_eq!(result.unwrap_or_else(|_| unreachable!()), 5);
    }
}
