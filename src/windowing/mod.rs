//! Word-based windowing over batch content for Phase 3 (§4.10.1).
//!
//! Adapted from the fixed-size chunker's sliding-window-with-overlap
//! idiom, switched from character to word boundaries: Phase 3 windows
//! are measured in words, not bytes, since the budget that matters here
//! is model context, not storage.

use rand::seq::SliceRandom;

/// A single unit of content dispatched to the model for one Phase-3
/// LLM call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// The window's text content.
    pub content: String,
    /// Zero-based index of this window among its siblings.
    pub window_index: usize,
    /// Total windows produced for this step.
    pub total_windows: usize,
    /// Whether `content` was truncated to fit a char budget.
    pub truncated: bool,
}

/// What a `random_sample` window should count against its cap: whole
/// words (transcript-like content) or whole lines (comment-like
/// content, one comment per line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleUnit {
    /// Sample up to N words.
    Words,
    /// Sample up to K lines (items).
    Items,
}

/// Builds the single `all` window: the entire content, truncated to
/// `char_budget`. Returns whether the content exceeded the budget — the
/// caller (Phase 3) falls back to `sequential` when it does, per
/// §4.10.1.
#[must_use]
pub fn window_all(content: &str, char_budget: usize) -> (Window, bool) {
    let truncated = content.chars().count() > char_budget;
    let text: String = content.chars().take(char_budget).collect();
    let text = if truncated {
        format!("{text}\n[... truncated, exceeded {char_budget}-char budget]")
    } else {
        text
    };
    (
        Window {
            content: text,
            window_index: 0,
            total_windows: 1,
            truncated,
        },
        truncated,
    )
}

/// Builds `sequential` windows: `chunk_size` words per window, with
/// `overlap` words shared between consecutive windows.
///
/// # Panics
///
/// Does not panic; an `overlap >= chunk_size` is treated as `chunk_size
/// - 1` to guarantee forward progress.
#[must_use]
pub fn window_sequential(content: &str, chunk_size: usize, overlap: usize) -> Vec<Window> {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.is_empty() {
        return vec![Window {
            content: String::new(),
            window_index: 0,
            total_windows: 1,
            truncated: false,
        }];
    }

    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size.saturating_sub(1));
    let step = chunk_size - overlap;

    let mut spans = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        spans.push((start, end));
        if end == words.len() {
            break;
        }
        start += step;
    }

    let total_windows = spans.len();
    spans
        .into_iter()
        .enumerate()
        .map(|(window_index, (start, end))| Window {
            content: words[start..end].join(" "),
            window_index,
            total_windows,
            truncated: false,
        })
        .collect()
}

/// Builds a single `random_sample` window: a uniform, without-replacement
/// sample of up to `cap` units (words or lines, per `unit`), rejoined in
/// their original relative order.
#[must_use]
pub fn window_random_sample(content: &str, cap: usize, unit: SampleUnit) -> Window {
    let units: Vec<&str> = match unit {
        SampleUnit::Words => content.split_whitespace().collect(),
        SampleUnit::Items => content.lines().filter(|l| !l.trim().is_empty()).collect(),
    };

    if units.len() <= cap {
        return Window {
            content: units.join(if unit == SampleUnit::Words { " " } else { "\n" }),
            window_index: 0,
            total_windows: 1,
            truncated: false,
        };
    }

    let mut indices: Vec<usize> = (0..units.len()).collect();
    indices.shuffle(&mut rand::rng());
    let mut sampled: Vec<usize> = indices.into_iter().take(cap).collect();
    sampled.sort_unstable();

    let joined = sampled
        .into_iter()
        .map(|i| units[i])
        .collect::<Vec<_>>()
        .join(if unit == SampleUnit::Words { " " } else { "\n" });

    Window {
        content: joined,
        window_index: 0,
        total_windows: 1,
        truncated: true,
    }
}

/// Builds the single `previous_findings` window: a deterministic render
/// of the scratchpad summary (§4.1), with no external batch content.
#[must_use]
pub fn window_previous_findings(scratchpad_summary: &str) -> Window {
    Window {
        content: scratchpad_summary.to_string(),
        window_index: 0,
        total_windows: 1,
        truncated: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_all_within_budget() {
        let (window, exceeded) = window_all("short content", 1000);
        assert!(!exceeded);
        assert_eq!(window.content, "short content");
        assert_eq!(window.total_windows, 1);
    }

    #[test]
    fn test_window_all_truncates_and_reports_exceeded() {
        let content = "word ".repeat(1000);
        let (window, exceeded) = window_all(&content, 20);
        assert!(exceeded);
        assert!(window.truncated);
        assert!(window.content.contains("truncated"));
    }

    #[test]
    fn test_window_sequential_overlaps() {
        let content = (0..20).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let windows = window_sequential(&content, 10, 3);
        assert!(windows.len() >= 2);
        assert_eq!(windows[0].total_windows, windows.len());
        let first_words: Vec<&str> = windows[0].content.split_whitespace().collect();
        let second_words: Vec<&str> = windows[1].content.split_whitespace().collect();
        assert!(first_words.iter().rev().take(3).eq(second_words.iter().take(3)));
    }

    #[test]
    fn test_window_sequential_single_window_when_short() {
        let windows = window_sequential("one two three", 3000, 400);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].content, "one two three");
    }

    #[test]
    fn test_window_sequential_empty_content() {
        let windows = window_sequential("", 100, 10);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].content, "");
    }

    #[test]
    fn test_window_random_sample_under_cap_keeps_all() {
        let window = window_random_sample("a b c", 10, SampleUnit::Words);
        assert_eq!(window.content, "a b c");
        assert!(!window.truncated);
    }

    #[test]
    fn test_window_random_sample_over_cap_samples() {
        let content = (0..100).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let window = window_random_sample(&content, 10, SampleUnit::Words);
        assert_eq!(window.content.split_whitespace().count(), 10);
        assert!(window.truncated);
    }

    #[test]
    fn test_window_random_sample_items_preserves_relative_order() {
        let content = "line0\nline1\nline2\nline3\nline4";
        let window = window_random_sample(content, 3, SampleUnit::Items);
        let lines: Vec<&str> = window.content.lines().collect();
        let mut sorted = lines.clone();
        sorted.sort_unstable();
        let indices: Vec<usize> = lines
            .iter()
            .map(|l| l.trim_start_matches("line").parse::<usize>().unwrap_or(0))
            .collect();
        let mut sorted_indices = indices.clone();
        sorted_indices.sort_unstable();
        assert_eq!(indices, sorted_indices);
    }

    #[test]
    fn test_window_previous_findings_wraps_summary_verbatim() {
        let window = window_previous_findings("step 1: found X");
        assert_eq!(window.content, "step 1: found X");
        assert_eq!(window.total_windows, 1);
    }
}
