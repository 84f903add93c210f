use std::future::Future;

use super::{sample_state, TestResult};
use crate::{SessionStore, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "save_increments_sequentially",
        save_increments_sequentially(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "save_replaces_state",
        save_replaces_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "stale_version_returns_conflict",
        stale_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "future_version_returns_conflict",
        future_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_leaves_state_untouched",
        conflict_leaves_state_untouched(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "save_missing_is_not_found",
        save_missing_is_not_found(factory).await,
    ));

    results
}

async fn save_increments_sequentially<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_session("s-1", sample_state(0))
        .await
        .map_err(|e| format!("create: {e}"))?;
    for expected in 0..5i64 {
        let new_version = store
            .save_session("s-1", expected, sample_state(expected as u32 + 1))
            .await
            .map_err(|e| format!("save from {expected}: {e}"))?;
        if new_version != expected + 1 {
            return Err(format!(
                "expected new version {}, got {new_version}",
                expected + 1
            ));
        }
    }
    let loaded = store
        .load_session("s-1")
        .await
        .map_err(|e| format!("load: {e}"))?;
    if loaded.version != 5 {
        return Err(format!("expected stored version 5, got {}", loaded.version));
    }
    Ok(())
}

async fn save_replaces_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_session("s-1", sample_state(0))
        .await
        .map_err(|e| format!("create: {e}"))?;
    store
        .save_session("s-1", 0, sample_state(7))
        .await
        .map_err(|e| format!("save: {e}"))?;
    let loaded = store
        .load_session("s-1")
        .await
        .map_err(|e| format!("load: {e}"))?;
    if loaded.state != sample_state(7) {
        return Err(format!("state not replaced: {}", loaded.state));
    }
    Ok(())
}

/// Two writers load version 0; the second save must lose.
async fn stale_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_session("s-1", sample_state(0))
        .await
        .map_err(|e| format!("create: {e}"))?;
    store
        .save_session("s-1", 0, sample_state(1))
        .await
        .map_err(|e| format!("first save: {e}"))?;
    match store.save_session("s-1", 0, sample_state(2)).await {
        Err(StorageError::VersionConflict {
            session_id,
            expected_version: 0,
            actual_version: 1,
        }) if session_id == "s-1" => Ok(()),
        other => Err(format!("expected VersionConflict(0 vs 1), got {other:?}")),
    }
}

async fn future_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_session("s-1", sample_state(0))
        .await
        .map_err(|e| format!("create: {e}"))?;
    match store.save_session("s-1", 1, sample_state(1)).await {
        Err(StorageError::VersionConflict { .. }) => Ok(()),
        other => Err(format!("expected VersionConflict, got {other:?}")),
    }
}

async fn conflict_leaves_state_untouched<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_session("s-1", sample_state(0))
        .await
        .map_err(|e| format!("create: {e}"))?;
    let _ = store.save_session("s-1", 3, sample_state(9)).await;
    let loaded = store
        .load_session("s-1")
        .await
        .map_err(|e| format!("load: {e}"))?;
    if loaded.version != 0 || loaded.state != sample_state(0) {
        return Err(format!(
            "conflicting save modified the record: version {}, state {}",
            loaded.version, loaded.state
        ));
    }
    Ok(())
}

async fn save_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.save_session("nope", 0, sample_state(0)).await {
        Err(StorageError::SessionNotFound { .. }) => Ok(()),
        other => Err(format!("expected SessionNotFound, got {other:?}")),
    }
}
