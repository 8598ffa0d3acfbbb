//! Integration tests for research-core: batch loading, session
//! persistence, and resume-point determination exercised together
//! across module boundaries (unit tests elsewhere cover each module in
//! isolation).

use std::time::Duration;

use research_core::batch::load_batch;
use research_core::error::{Error, SessionError};
use research_core::orchestrator::{ResumePoint, resume_point};
use research_core::session::store::JsonSessionStore;

fn write_item(dir: &std::path::Path, name: &str, json: &str) {
    std::fs::write(dir.join(name), json).unwrap_or_else(|_| unreachable!());
}

#[test]
fn test_load_batch_end_to_end_with_comments() {
    let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
    let batch_dir = dir.path().join("batch1");
    std::fs::create_dir_all(&batch_dir).unwrap_or_else(|_| unreachable!());
    write_item(
        &batch_dir,
        "a.json",
        r#"{"link_id":"a","source":"reddit","url":"http://x","title":"A",
            "transcript":"one two three","comments":[{"text":"nice","likes":4}]}"#,
    );

    let batch = load_batch(dir.path(), "batch1").unwrap_or_else(|_| unreachable!());
    let item = batch.get("a").unwrap_or_else(|| unreachable!());
    assert_eq!(item.comments_text(), "nice");
    assert_eq!(batch.total_transcript_words(), 3);
}

#[tokio::test]
async fn test_session_store_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());

    {
        let store = JsonSessionStore::create_or_load(
            dir.path(),
            "batch1",
            "batch1",
            Duration::from_millis(10),
            1_000,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
        store
            .save_phase_artifact("phase0", serde_json::json!({"items": []}), 1_001)
            .await
            .unwrap_or_else(|_| unreachable!());
        store
            .update_scratchpad(1, serde_json::json!({"summary": "s"}), "insight", 0.8, vec!["a".into()], 1_002)
            .await
            .unwrap_or_else(|_| unreachable!());
        store.flush().await.unwrap_or_else(|_| unreachable!());
    }

    let reopened = JsonSessionStore::create_or_load(
        dir.path(),
        "batch1",
        "batch1",
        Duration::from_millis(10),
        1_003,
    )
    .await
    .unwrap_or_else(|_| unreachable!());
    let snapshot = reopened.snapshot().await;
    assert_eq!(snapshot.session_id, "batch1");
    assert_eq!(snapshot.batch_id, "batch1");
    assert!(snapshot.get_phase_artifact("phase0").is_some());
    assert_eq!(snapshot.scratchpad.len(), 1);

    // session_id always equals batch_id for a fresh session, per the
    // never-create-a-new-session-id-for-an-existing-batch invariant.
    assert_eq!(resume_point(&snapshot), ResumePoint::Phase0_5);
}

#[tokio::test]
async fn test_corrupt_session_file_surfaces_as_session_error() {
    let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
    std::fs::write(dir.path().join("session_batch1.json"), "{not json").unwrap_or_else(|_| unreachable!());

    let result = JsonSessionStore::create_or_load(
        dir.path(),
        "batch1",
        "batch1",
        Duration::from_millis(10),
        1_000,
    )
    .await;

    assert!(matches!(result, Err(Error::Session(SessionError::Corrupt { .. }))));
}

#[tokio::test]
async fn test_resume_point_walks_forward_as_phases_complete() {
    let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
    let store = JsonSessionStore::create_or_load(
        dir.path(),
        "batch1",
        "batch1",
        Duration::from_millis(10),
        1_000,
    )
    .await
    .unwrap_or_else(|_| unreachable!());

    assert_eq!(resume_point(&store.snapshot().await), ResumePoint::Phase0);

    store.save_phase_artifact("phase0", serde_json::json!({}), 1_001).await.unwrap_or_else(|_| unreachable!());
    assert_eq!(resume_point(&store.snapshot().await), ResumePoint::Phase0_5);

    store.save_phase_artifact("phase0_5", serde_json::json!({}), 1_002).await.unwrap_or_else(|_| unreachable!());
    assert_eq!(resume_point(&store.snapshot().await), ResumePoint::Phase1);

    store.save_phase_artifact("phase1", serde_json::json!({}), 1_003).await.unwrap_or_else(|_| unreachable!());
    assert_eq!(resume_point(&store.snapshot().await), ResumePoint::Phase1_5);

    store.save_phase_artifact("phase1_5", serde_json::json!({}), 1_004).await.unwrap_or_else(|_| unreachable!());
    assert_eq!(resume_point(&store.snapshot().await), ResumePoint::Phase2);

    store
        .save_phase_artifact(
            "phase2",
            serde_json::json!({"steps": [
                {"step_id": 1, "goal": "g1", "required_data": "transcript", "chunk_strategy": "all", "chunk_size": null, "notes": null, "step_type": null},
            ]}),
            1_005,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(resume_point(&store.snapshot().await), ResumePoint::Phase3 { from_step: 1 });

    store.save_phase_artifact("phase3_step_1", serde_json::json!({}), 1_006).await.unwrap_or_else(|_| unreachable!());
    assert_eq!(resume_point(&store.snapshot().await), ResumePoint::Phase4);

    store.save_phase_artifact("phase4", serde_json::json!({}), 1_007).await.unwrap_or_else(|_| unreachable!());
    assert_eq!(resume_point(&store.snapshot().await), ResumePoint::Complete);
}

mod property_tests {
    use proptest::prelude::*;
    use research_core::cli::output::{format_size, truncate};

    proptest! {
        #[test]
        fn truncate_respects_max_len_or_returns_input_unchanged(s in "[a-z]{0,80}", max_len in 4usize..40) {
            let out = truncate(&s, max_len);
            if s.len() <= max_len {
                prop_assert_eq!(out, s);
            } else {
                prop_assert!(out.len() <= max_len);
                prop_assert!(out.ends_with("..."));
            }
        }

        #[test]
        fn format_size_never_panics(bytes in 0usize..usize::MAX) {
            let _ = format_size(bytes);
        }
    }
}
