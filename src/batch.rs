//! Scraped batch loading (§6 "Scraper outputs").
//!
//! The scrapers themselves are an external collaborator with a fixed
//! contract: a batch directory holding one already-normalized JSON file
//! per source item. This module only reads that contract; it does not
//! know anything about YouTube/Bilibili/Reddit/article-specific payload
//! quirks (those are out of scope per §1).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoError, Result};

/// Which platform a batch item was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// YouTube video.
    Youtube,
    /// Bilibili video.
    Bilibili,
    /// Reddit thread.
    Reddit,
    /// Article/blog post.
    Article,
}

/// A single comment on a batch item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment text.
    pub text: String,
    /// Like count, if reported by the scraper.
    pub likes: Option<u64>,
    /// Reply count, if reported by the scraper.
    pub replies: Option<u64>,
}

/// One normalized scraped source item, as produced by the (out-of-scope)
/// scrapers and consumed by Phase 0.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    /// Unique id within the batch; referenced by findings, retrieval
    /// requests, and scratchpad sources.
    pub link_id: String,
    /// Which platform this item came from.
    pub source: Source,
    /// Canonical source URL.
    pub url: String,
    /// Item title.
    pub title: String,
    /// Full transcript text. Missing is allowed (e.g. an article with no
    /// separate transcript field — see [`BatchItem::transcript_text`]).
    #[serde(default)]
    pub transcript: Option<String>,
    /// Comments, if the platform and item have any.
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Free-form per-item metadata, preserved opaquely.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl BatchItem {
    /// Returns the transcript text, or an empty string if the item has none.
    #[must_use]
    pub fn transcript_text(&self) -> &str {
        self.transcript.as_deref().unwrap_or("")
    }

    /// Joins all comment text with newlines, for windowing/retrieval.
    #[must_use]
    pub fn comments_text(&self) -> String {
        self.comments
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A loaded batch: every item found under `<batches_dir>/<batch_id>/`.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// The batch id this was loaded from.
    pub batch_id: String,
    /// Loaded items, in directory listing order.
    pub items: Vec<BatchItem>,
}

impl Batch {
    /// Looks up an item by `link_id`.
    #[must_use]
    pub fn get(&self, link_id: &str) -> Option<&BatchItem> {
        self.items.iter().find(|i| i.link_id == link_id)
    }

    /// Total transcript word count across every item, used by the
    /// Phase 2 chunk-strategy heuristics.
    #[must_use]
    pub fn total_transcript_words(&self) -> usize {
        self.items
            .iter()
            .map(|i| i.transcript_text().split_whitespace().count())
            .sum()
    }

    /// Whether every item shares the same `source`, used by the Phase 2
    /// "single-source" heuristic branch.
    #[must_use]
    pub fn is_single_source(&self) -> bool {
        let mut sources = self.items.iter().map(|i| i.source);
        let Some(first) = sources.next() else {
            return true;
        };
        sources.all(|s| s == first)
    }
}

/// Loads every item from `<batches_dir>/<batch_id>/`.
///
/// Each file must parse as a [`BatchItem`]. A file missing `link_id`
/// (i.e. failing schema validation on that field) is fatal for that
/// item per §6, surfaced as [`IoError::MissingLinkId`]; it does not
/// abort loading the rest of the batch.
///
/// # Errors
///
/// Returns an error if the batch directory does not exist or cannot be
/// listed, or if any item file is fatally malformed (missing `link_id`).
pub fn load_batch(batches_dir: &Path, batch_id: &str) -> Result<Batch> {
    let dir = batches_dir.join(batch_id);
    let entries = std::fs::read_dir(&dir).map_err(|e| {
        Error::Io(IoError::ReadFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            Error::Io(IoError::ReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            Error::Io(IoError::ReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        if value.get("link_id").and_then(serde_json::Value::as_str).is_none() {
            return Err(Error::Io(IoError::MissingLinkId {
                path: path.display().to_string(),
            }));
        }
        let item: BatchItem = serde_json::from_value(value).map_err(|e| {
            Error::Io(IoError::ReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        items.push(item);
    }

    Ok(Batch {
        batch_id: batch_id.to_string(),
        items,
    })
}
