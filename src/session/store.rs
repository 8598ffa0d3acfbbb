//! Atomic JSON-on-disk session persistence.
//!
//! One [`JsonSessionStore`] guards one [`Session`] behind a single
//! `tokio::sync::Mutex`, serializing writers within this process exactly
//! as the persistence contract requires. Writes go to a temp file next
//! to the target and are renamed into place, so a reader never observes
//! a half-written session.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::{Error, IoError, Result, SessionError};
use crate::model::session::Session;

struct Inner {
    session: Session,
    dirty: bool,
    last_flush: Instant,
}

/// A durable, single-process session store backed by one JSON file per
/// session.
pub struct JsonSessionStore {
    path: PathBuf,
    autosave_debounce: Duration,
    inner: Mutex<Inner>,
}

impl JsonSessionStore {
    /// Opens the existing session file at `<sessions_dir>/session_<id>.json`,
    /// or creates a fresh, initialized [`Session`] for `batch_id` if none
    /// exists yet. `session_id` defaults to `batch_id` at the call site;
    /// this type makes no such assumption itself.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Corrupt`] if the file exists but is not
    /// valid JSON, and [`SessionError::NotWritable`] if the sessions
    /// directory cannot be created.
    pub async fn create_or_load(
        sessions_dir: &Path,
        session_id: &str,
        batch_id: &str,
        autosave_debounce: Duration,
        now: i64,
    ) -> Result<Self> {
        std::fs::create_dir_all(sessions_dir).map_err(|e| {
            Error::Session(SessionError::NotWritable {
                path: sessions_dir.display().to_string(),
                reason: e.to_string(),
            })
        })?;

        let path = session_path(sessions_dir, session_id);
        let session = if path.exists() {
            load(&path)?
        } else {
            Session::new(session_id, batch_id, now)
        };

        Ok(Self {
            path,
            autosave_debounce,
            inner: Mutex::new(Inner {
                session,
                dirty: false,
                last_flush: Instant::now() - autosave_debounce,
            }),
        })
    }

    /// Records `data` as the artifact for `phase_key`. Forces an
    /// immediate flush regardless of the autosave debounce, matching
    /// the persistence contract's "forced on phase-artifact save" rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written to disk.
    pub async fn save_phase_artifact(
        &self,
        phase_key: &str,
        data: serde_json::Value,
        now: i64,
    ) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.session.save_phase_artifact(phase_key, data, now);
        guard.dirty = true;
        self.flush_locked(&mut guard).await
    }

    /// Returns the stored data for `phase_key`, cloned out of the
    /// in-memory session.
    pub async fn get_phase_artifact(&self, phase_key: &str) -> Option<serde_json::Value> {
        let guard = self.inner.lock().await;
        guard.session.get_phase_artifact(phase_key).cloned()
    }

    /// Upserts the scratchpad entry for `step_id` and triggers an
    /// autosave check.
    ///
    /// # Errors
    ///
    /// Returns an error if an autosave flush is due and fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_scratchpad(
        &self,
        step_id: i64,
        findings: serde_json::Value,
        insights: &str,
        confidence: f64,
        sources: Vec<String>,
        now: i64,
    ) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard
            .session
            .update_scratchpad(step_id, findings, insights, confidence, sources, now);
        guard.dirty = true;
        self.autosave_if_due(&mut guard).await
    }

    /// Deterministic textual rendering of the scratchpad (§4.1).
    pub async fn get_scratchpad_summary(&self) -> String {
        let guard = self.inner.lock().await;
        guard.session.get_scratchpad_summary()
    }

    /// Appends a step digest, respecting `cap`, and triggers an autosave check.
    ///
    /// # Errors
    ///
    /// Returns an error if an autosave flush is due and fails.
    pub async fn append_step_digest(&self, digest: String, cap: usize) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.session.append_step_digest(digest, cap);
        guard.dirty = true;
        self.autosave_if_due(&mut guard).await
    }

    /// Sets a free-form session metadata key and triggers an autosave check.
    ///
    /// # Errors
    ///
    /// Returns an error if an autosave flush is due and fails.
    pub async fn set_metadata(&self, key: &str, value: serde_json::Value, now: i64) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.session.set_metadata(key, value, now);
        guard.dirty = true;
        self.autosave_if_due(&mut guard).await
    }

    /// Returns a clone of the current in-memory session, for resume-point
    /// inspection or reporting.
    pub async fn snapshot(&self) -> Session {
        self.inner.lock().await.session.clone()
    }

    /// Records the Phase 0 data quality assessment and triggers an
    /// autosave check.
    ///
    /// # Errors
    ///
    /// Returns an error if an autosave flush is due and fails.
    pub async fn set_quality_assessment(&self, value: serde_json::Value, now: i64) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.session.set_quality_assessment(value, now);
        guard.dirty = true;
        self.autosave_if_due(&mut guard).await
    }

    /// Records the Phase 0.5 research role and triggers an autosave check.
    ///
    /// # Errors
    ///
    /// Returns an error if an autosave flush is due and fails.
    pub async fn set_research_role(&self, value: serde_json::Value, now: i64) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.session.set_research_role(value, now);
        guard.dirty = true;
        self.autosave_if_due(&mut guard).await
    }

    /// Records pre-Phase-1 amendment feedback and triggers an autosave check.
    ///
    /// # Errors
    ///
    /// Returns an error if an autosave flush is due and fails.
    pub async fn set_pre_phase1_feedback(&self, feedback: &str, now: i64) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.session.set_pre_phase1_feedback(feedback, now);
        guard.dirty = true;
        self.autosave_if_due(&mut guard).await
    }

    /// Records post-Phase-1 amendment feedback and triggers an autosave check.
    ///
    /// # Errors
    ///
    /// Returns an error if an autosave flush is due and fails.
    pub async fn set_post_phase1_feedback(&self, feedback: &str, now: i64) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.session.set_post_phase1_feedback(feedback, now);
        guard.dirty = true;
        self.autosave_if_due(&mut guard).await
    }

    /// Records the Phase 1.5 synthesized goal and triggers an autosave check.
    ///
    /// # Errors
    ///
    /// Returns an error if an autosave flush is due and fails.
    pub async fn set_synthesized_goal(
        &self,
        goal: crate::model::goal::SynthesizedGoal,
        now: i64,
    ) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.session.set_synthesized_goal(goal, now);
        guard.dirty = true;
        self.autosave_if_due(&mut guard).await
    }

    /// Mutates the in-memory session status and forces a flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written to disk.
    pub async fn set_status(&self, status: crate::model::session::SessionStatus, now: i64) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.session.status = status;
        guard.session.updated_at = now;
        guard.dirty = true;
        self.flush_locked(&mut guard).await
    }

    /// Forces a write of the in-memory session to disk if it is dirty.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or atomic rename fails.
    pub async fn flush(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        self.flush_locked(&mut guard).await
    }

    async fn autosave_if_due(&self, guard: &mut Inner) -> Result<()> {
        if guard.dirty && guard.last_flush.elapsed() >= self.autosave_debounce {
            self.flush_locked(guard).await
        } else {
            Ok(())
        }
    }

    async fn flush_locked(&self, guard: &mut Inner) -> Result<()> {
        if !guard.dirty {
            return Ok(());
        }
        write_atomic(&self.path, &guard.session)?;
        guard.dirty = false;
        guard.last_flush = Instant::now();
        Ok(())
    }
}

fn session_path(sessions_dir: &Path, session_id: &str) -> PathBuf {
    sessions_dir.join(format!("session_{session_id}.json"))
}

fn load(path: &Path) -> Result<Session> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Io(IoError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        Error::Session(SessionError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    })
}

fn write_atomic(path: &Path, session: &Session) -> Result<()> {
    let serialized = serde_json::to_string_pretty(session)
        .map_err(|e| Error::Session(SessionError::Serialization(e.to_string())))?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, serialized).map_err(|e| {
        Error::Session(SessionError::WriteFailed {
            path: tmp_path.display().to_string(),
            reason: e.to_string(),
        })
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        Error::Session(SessionError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_or_load_creates_fresh_session() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let store = JsonSessionStore::create_or_load(
            dir.path(),
            "sess1",
            "batch1",
            Duration::from_millis(500),
            1_000,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.session_id, "sess1");
        assert_eq!(snapshot.batch_id, "batch1");
    }

    #[tokio::test]
    async fn test_save_phase_artifact_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let store = JsonSessionStore::create_or_load(
            dir.path(),
            "sess1",
            "batch1",
            Duration::from_millis(500),
            1_000,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
        store
            .save_phase_artifact("phase0", serde_json::json!({"ok": true}), 1_001)
            .await
            .unwrap_or_else(|_| unreachable!());

        let reloaded = JsonSessionStore::create_or_load(
            dir.path(),
            "sess1",
            "batch1",
            Duration::from_millis(500),
            1_002,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
        let data = reloaded.get_phase_artifact("phase0").await;
        assert_eq!(data, Some(serde_json::json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_corrupt_session_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join("session_sess1.json"), "not json").unwrap_or_else(|_| unreachable!());
        let result = JsonSessionStore::create_or_load(
            dir.path(),
            "sess1",
            "batch1",
            Duration::from_millis(500),
            1_000,
        )
        .await;
        assert!(matches!(result, Err(Error::Session(SessionError::Corrupt { .. }))));
    }

    #[tokio::test]
    async fn test_update_scratchpad_respects_debounce_then_flushes_on_demand() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let store = JsonSessionStore::create_or_load(
            dir.path(),
            "sess1",
            "batch1",
            Duration::from_secs(3600),
            1_000,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
        store
            .update_scratchpad(1, serde_json::json!({"summary": "s"}), "i", 0.5, vec![], 1_001)
            .await
            .unwrap_or_else(|_| unreachable!());

        // Long debounce means the on-disk file is untouched so far.
        assert!(!dir.path().join("session_sess1.json").exists());

        store.flush().await.unwrap_or_else(|_| unreachable!());
        assert!(dir.path().join("session_sess1.json").exists());
    }
}
