//! Cross-window points-of-interest deduplication and merge (§4.10.3).
//!
//! A window's `points_of_interest` entries are folded into the step's
//! running set one window at a time. Two entries collide when their
//! `text` field normalizes to the same signature (lowercased, trimmed,
//! whitespace-collapsed); a collision merges fields (proponents,
//! opponents, opposing views, sources) into the first-seen entry rather
//! than discarding the new one, accumulating evidence instead of
//! overwriting it. Each sub-array accepts at most `dedup_per_window_cap`
//! new entries per window, so one verbose window cannot crowd out the
//! rest of a step's findings.
//!
//! All six `points_of_interest` sub-arrays key off the same `text`
//! field on [`PointOfInterestEntry`] — "claim"/"quote"/"topic" language
//! elsewhere names what that field *holds* in each sub-array, not a
//! distinct struct field, so one merge routine serves all six.

use std::collections::HashSet;

use crate::model::finding::{PointOfInterestEntry, PointsOfInterest};

/// Accumulates deduplicated points of interest across a step's windows.
#[derive(Debug, Default)]
pub(crate) struct Aggregator {
    poi: PointsOfInterest,
}

impl Aggregator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Folds one window's points of interest into the running set,
    /// capping new-entry additions per sub-array at `cap`.
    pub(crate) fn merge_window(&mut self, window: PointsOfInterest, cap: usize) {
        merge_field(&mut self.poi.key_claims, window.key_claims, cap);
        merge_field(&mut self.poi.notable_evidence, window.notable_evidence, cap);
        merge_field(&mut self.poi.controversial_topics, window.controversial_topics, cap);
        merge_field(&mut self.poi.surprising_insights, window.surprising_insights, cap);
        merge_field(&mut self.poi.specific_examples, window.specific_examples, cap);
        merge_field(&mut self.poi.open_questions, window.open_questions, cap);
    }

    /// Runs the final exact-text dedup safeguard and returns the
    /// finished set.
    pub(crate) fn finish(mut self) -> PointsOfInterest {
        dedupe_exact_text(&mut self.poi.key_claims);
        dedupe_exact_text(&mut self.poi.notable_evidence);
        dedupe_exact_text(&mut self.poi.controversial_topics);
        dedupe_exact_text(&mut self.poi.surprising_insights);
        dedupe_exact_text(&mut self.poi.specific_examples);
        dedupe_exact_text(&mut self.poi.open_questions);
        self.poi
    }
}

/// Normalizes `text` to a dedup signature: lowercased, trimmed, with
/// runs of whitespace collapsed to a single space.
fn normalize_signature(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn merge_field(existing: &mut Vec<PointOfInterestEntry>, incoming: Vec<PointOfInterestEntry>, cap: usize) {
    let mut added = 0usize;
    for entry in incoming {
        let signature = normalize_signature(&entry.text);
        if let Some(found) = existing
            .iter_mut()
            .find(|e| normalize_signature(&e.text) == signature)
        {
            merge_entry(found, entry);
        } else if added < cap {
            existing.push(entry);
            added += 1;
        }
    }
}

/// Merges `incoming` into `existing` on a signature collision: scalar
/// fields are first-occurrence-wins, list/collection fields accumulate.
fn merge_entry(existing: &mut PointOfInterestEntry, incoming: PointOfInterestEntry) {
    if existing.speaker.is_none() {
        existing.speaker = incoming.speaker;
    }
    if existing.proponent.is_none() {
        existing.proponent = incoming.proponent;
    }
    if existing.opponent.is_none() {
        existing.opponent = incoming.opponent;
    } else if let Some(opponent) = incoming.opponent {
        if !existing.opposing_views.contains(&opponent) {
            existing.opposing_views.push(opponent);
        }
    }

    for view in incoming.opposing_views {
        if !existing.opposing_views.contains(&view) {
            existing.opposing_views.push(view);
        }
    }

    for source in incoming.sources {
        if !existing.sources.contains(&source) {
            existing.sources.push(source);
        }
    }
}

/// Final safeguard: drops any entry whose exact `text` duplicates an
/// earlier one in the same sub-array, keeping the first occurrence.
fn dedupe_exact_text(entries: &mut Vec<PointOfInterestEntry>) {
    let mut seen: HashSet<String> = HashSet::with_capacity(entries.len());
    entries.retain(|entry| seen.insert(entry.text.clone()));
}
