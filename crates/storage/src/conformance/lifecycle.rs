use std::future::Future;

use super::{sample_state, TestResult};
use crate::{SessionStore, StorageError};

pub(super) async fn run_lifecycle_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "lifecycle",
            "create_starts_at_version_0",
            create_starts_at_version_0(factory).await,
        ),
        TestResult::from_result(
            "lifecycle",
            "load_returns_created_state",
            load_returns_created_state(factory).await,
        ),
        TestResult::from_result(
            "lifecycle",
            "duplicate_create_is_rejected",
            duplicate_create_is_rejected(factory).await,
        ),
        TestResult::from_result(
            "lifecycle",
            "load_missing_is_not_found",
            load_missing_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "lifecycle",
            "delete_removes_session",
            delete_removes_session(factory).await,
        ),
        TestResult::from_result(
            "lifecycle",
            "delete_missing_is_not_found",
            delete_missing_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "lifecycle",
            "invalid_id_is_rejected",
            invalid_id_is_rejected(factory).await,
        ),
        TestResult::from_result(
            "lifecycle",
            "list_honours_limit",
            list_honours_limit(factory).await,
        ),
    ]
}

async fn create_starts_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let record = store
        .create_session("s-1", sample_state(0))
        .await
        .map_err(|e| format!("create: {e}"))?;
    if record.version != 0 {
        return Err(format!("expected version 0, got {}", record.version));
    }
    if record.session_id != "s-1" {
        return Err(format!("expected id 's-1', got '{}'", record.session_id));
    }
    Ok(())
}

async fn load_returns_created_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_session("s-1", sample_state(3))
        .await
        .map_err(|e| format!("create: {e}"))?;
    let loaded = store
        .load_session("s-1")
        .await
        .map_err(|e| format!("load: {e}"))?;
    if loaded.state != sample_state(3) {
        return Err(format!("state mismatch: {}", loaded.state));
    }
    Ok(())
}

async fn duplicate_create_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
    match store.create_session("s-1", sample_state(1)).await {
        Err(StorageError::AlreadyExists { session_id }) if session_id == "s-1" => {}
        other => return Err(format!("expected AlreadyExists, got {other:?}")),
    }
    // The original state must survive the rejected create.
    let loaded = store
        .load_session("s-1")
        .await
        .map_err(|e| format!("load: {e}"))?;
    if loaded.state != sample_state(0) {
        return Err("duplicate create overwrote state".to_string());
    }
    Ok(())
}

async fn load_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.load_session("nope").await {
        Err(StorageError::SessionNotFound { session_id }) if session_id == "nope" => Ok(()),
        other => Err(format!("expected SessionNotFound, got {other:?}")),
    }
}

async fn delete_removes_session<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .delete_session("s-1")
        .await
        .map_err(|e| format!("delete: {e}"))?;
    match store.load_session("s-1").await {
        Err(StorageError::SessionNotFound { .. }) => Ok(()),
        other => Err(format!("expected SessionNotFound after delete, got {other:?}")),
    }
}

async fn delete_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.delete_session("nope").await {
        Err(StorageError::SessionNotFound { .. }) => Ok(()),
        other => Err(format!("expected SessionNotFound, got {other:?}")),
    }
}

async fn invalid_id_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for bad in ["", "../escape", "a b", "x/y"] {
        match store.create_session(bad, sample_state(0)).await {
            Err(StorageError::InvalidSessionId { .. }) => {}
            other => return Err(format!("id {bad:?}: expected InvalidSessionId, got {other:?}")),
        }
    }
    Ok(())
}

async fn list_honours_limit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for i in 0..3 {
        store
            .create_session(&format!("s-{i}"), sample_state(i))
            .await
            .map_err(|e| format!("create s-{i}: {e}"))?;
    }
    let all = store
        .list_sessions(0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if all.len() != 3 {
        return Err(format!("expected 3 sessions, got {}", all.len()));
    }
    let two = store
        .list_sessions(2)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if two.len() != 2 {
        return Err(format!("expected 2 sessions with limit, got {}", two.len()));
    }
    Ok(())
}
