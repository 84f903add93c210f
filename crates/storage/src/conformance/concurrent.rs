use std::future::Future;
use std::sync::Arc;

use super::{sample_state, TestResult};
use crate::{SessionStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_saves_exactly_one_wins",
            concurrent_saves_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_creates_exactly_one_wins",
            concurrent_creates_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_saves_different_sessions_all_succeed",
            concurrent_saves_different_sessions_all_succeed(factory).await,
        ),
    ]
}

// ── Concurrent save: exactly one wins ───────────────────────────────────────

/// N tasks all save the same session from version 0. Exactly one succeeds;
/// the rest must get VersionConflict, and the stored version ends at 1.
async fn concurrent_saves_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    store
        .create_session("s-1", sample_state(0))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            match s.save_session("s-1", 0, sample_state(i as u32 + 1)).await {
                Ok(_) => Ok(true),
                Err(StorageError::VersionConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }

    let record = store
        .load_session("s-1")
        .await
        .map_err(|e| format!("load: {e}"))?;
    if record.version != 1 {
        return Err(format!("expected version 1, got {}", record.version));
    }
    Ok(())
}

// ── Concurrent create: exactly one wins ─────────────────────────────────────

async fn concurrent_creates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            match s.create_session("s-1", sample_state(i as u32)).await {
                Ok(_) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

// ── Concurrent saves to different sessions: all succeed ─────────────────────

/// No false conflicts when there is no contention.
async fn concurrent_saves_different_sessions_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    for i in 0..N {
        store
            .create_session(&format!("s-{i}"), sample_state(0))
            .await
            .map_err(|e| format!("create s-{i}: {e}"))?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.save_session(&format!("s-{i}"), 0, sample_state(1)).await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let version = handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
        if version != 1 {
            return Err(format!("s-{i}: expected version 1, got {version}"));
        }
    }
    Ok(())
}
