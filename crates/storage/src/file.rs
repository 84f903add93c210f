//! `SessionStore` backed by one JSON file per session.
//!
//! Files are written to a temporary name and renamed into place, so a
//! reader never sees a half-written record. A process-wide mutex
//! serialises writers; the store is not safe to share between processes
//! writing the same directory concurrently.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::memory::sort_and_limit;
use crate::record::{now_rfc3339, validate_session_id, SessionRecord, SessionSummary};
use crate::traits::SessionStore;

#[derive(Debug)]
pub struct FileSessionStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Open (and create if needed) a session directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf, StorageError> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{session_id}.json")))
    }

    async fn read_record(&self, session_id: &str) -> Result<SessionRecord, StorageError> {
        let path = self.path_for(session_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::SessionNotFound {
                    session_id: session_id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let path = self.path_for(&record.session_id)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create_session(
        &self,
        session_id: &str,
        state: serde_json::Value,
    ) -> Result<SessionRecord, StorageError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(session_id)?;
        if tokio::fs::try_exists(&path).await? {
            return Err(StorageError::AlreadyExists {
                session_id: session_id.to_string(),
            });
        }
        let now = now_rfc3339();
        let record = SessionRecord {
            session_id: session_id.to_string(),
            state,
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        };
        self.write_record(&record).await?;
        Ok(record)
    }

    async fn load_session(&self, session_id: &str) -> Result<SessionRecord, StorageError> {
        self.read_record(session_id).await
    }

    async fn save_session(
        &self,
        session_id: &str,
        expected_version: i64,
        state: serde_json::Value,
    ) -> Result<i64, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.read_record(session_id).await?;
        if record.version != expected_version {
            return Err(StorageError::VersionConflict {
                session_id: session_id.to_string(),
                expected_version,
                actual_version: record.version,
            });
        }
        record.state = state;
        record.version += 1;
        record.updated_at = now_rfc3339();
        self.write_record(&record).await?;
        Ok(record.version)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(session_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::SessionNotFound {
                    session_id: session_id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, StorageError> {
        let mut summaries = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            // Skip foreign files in the directory rather than failing the listing.
            if let Ok(record) = serde_json::from_slice::<SessionRecord>(&bytes) {
                summaries.push(SessionSummary::from(&record));
            }
        }
        sort_and_limit(&mut summaries, limit);
        Ok(summaries)
    }
}
