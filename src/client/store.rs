//! Session cache backends.
//!
//! A store is keyed by credential fingerprint and only ever hands out live
//! sessions; expired entries are dropped on read.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::session::Session;
use crate::error::{Result, SessionStoreError, SyncError};

/// Trait for session cache backends.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the live session for `fingerprint`, if any.
    async fn get(&self, fingerprint: &str) -> Result<Option<Session>>;

    /// Stores a session under its fingerprint, replacing any previous one.
    async fn put(&self, session: Session) -> Result<()>;

    /// Drops the session for `fingerprint`.
    async fn remove(&self, fingerprint: &str) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

/// In-process session cache.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, fingerprint: &str) -> Result<Option<Session>> {
        {
            let entries = self.entries.read().await;
            match entries.get(fingerprint) {
                None => return Ok(None),
                Some(session) if !session.is_expired() => return Ok(Some(session.clone())),
                Some(_) => {}
            }
        }

        debug!("Dropping expired session {}", short(fingerprint));
        let mut entries = self.entries.write().await;
        if entries.get(fingerprint).is_some_and(Session::is_expired) {
            entries.remove(fingerprint);
        }
        Ok(None)
    }

    async fn put(&self, session: Session) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(session.fingerprint.clone(), session);
        Ok(())
    }

    async fn remove(&self, fingerprint: &str) -> Result<()> {
        self.entries.write().await.remove(fingerprint);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

/// Session cache persisted as one JSON file per fingerprint.
///
/// Survives across process runs, so sequential invocations reuse a session
/// until its TTL runs out.
#[derive(Debug)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Creates a store under the user cache directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no cache directory.
    pub fn new() -> Result<Self> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| SyncError::internal("Cannot determine the user cache directory"))?
            .join("dpsync")
            .join("sessions");
        Ok(Self::with_dir(dir))
    }

    /// Creates a store in a custom directory.
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.json"))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_failed(format!("Failed to create session directory: {e}")))?;

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| write_failed(format!("Failed to create session file: {e}")))?;
        file.write_all(content)
            .await
            .map_err(|e| write_failed(format!("Failed to write session file: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| write_failed(format!("Failed to sync session file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| write_failed(format!("Failed to restrict session file: {e}")))?;
        }

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| write_failed(format!("Failed to rename session file: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, fingerprint: &str) -> Result<Option<Session>> {
        let path = self.path_for(fingerprint);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionStoreError::Corrupted {
                    message: format!("Failed to read {}: {e}", path.display()),
                }
                .into());
            }
        };

        let session: Session = match serde_json::from_str(&content) {
            Ok(session) => session,
            Err(e) => {
                warn!("Discarding unreadable session file {}: {e}", path.display());
                self.remove(fingerprint).await?;
                return Ok(None);
            }
        };

        if session.fingerprint != fingerprint || session.is_expired() {
            debug!("Dropping stale session {}", short(fingerprint));
            self.remove(fingerprint).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn put(&self, session: Session) -> Result<()> {
        let path = self.path_for(&session.fingerprint);
        let content = serde_json::to_vec(&session)
            .map_err(|e| write_failed(format!("Failed to serialize session: {e}")))?;
        self.write_file(&path, &content).await?;
        debug!("Session {} cached in {}", short(&session.fingerprint), path.display());
        Ok(())
    }

    async fn remove(&self, fingerprint: &str) -> Result<()> {
        match fs::remove_file(self.path_for(fingerprint)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(write_failed(format!("Failed to delete session file: {e}"))),
        }
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}

fn write_failed(message: String) -> SyncError {
    SessionStoreError::WriteFailed { message }.into()
}

/// Fingerprint prefix for log lines.
fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;
    use tempfile::TempDir;

    fn session(fingerprint: &str) -> Session {
        Session::new("10.0.0.3", fingerprint, "JSESSIONID=abc", Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let store = MemorySessionStore::new();
        assert!(store.get("fp").await.unwrap().is_none());

        store.put(session("fp")).await.unwrap();
        let loaded = store.get("fp").await.unwrap().expect("session should be cached");
        assert_eq!(loaded.cookie_header(), "JSESSIONID=abc");

        store.remove("fp").await.unwrap();
        assert!(store.get("fp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_drops_expired() {
        let store = MemorySessionStore::new();
        let stale = session("fp").established_at(Utc::now() - ChronoDuration::seconds(700));
        store.put(stale).await.unwrap();
        assert!(store.get("fp").await.unwrap().is_none());
        assert!(store.entries.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = FileSessionStore::with_dir(temp.path().join("sessions"));

        store.put(session("fp1")).await.unwrap();
        let loaded = store.get("fp1").await.unwrap().expect("session should persist");
        assert_eq!(loaded.host, "10.0.0.3");

        let reopened = FileSessionStore::with_dir(temp.path().join("sessions"));
        assert!(reopened.get("fp1").await.unwrap().is_some());

        reopened.remove("fp1").await.unwrap();
        assert!(store.get("fp1").await.unwrap().is_none());
        reopened.remove("fp1").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_drops_expired_and_corrupted() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = FileSessionStore::with_dir(temp.path());

        let stale = session("old").established_at(Utc::now() - ChronoDuration::seconds(601));
        store.put(stale).await.unwrap();
        assert!(store.get("old").await.unwrap().is_none());
        assert!(!temp.path().join("old.json").exists());

        std::fs::write(temp.path().join("bad.json"), "not json").unwrap();
        assert!(store.get("bad").await.unwrap().is_none());
        assert!(!temp.path().join("bad.json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = FileSessionStore::with_dir(temp.path());
        store.put(session("fp")).await.unwrap();

        let mode = std::fs::metadata(temp.path().join("fp.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
