//! Durable session storage
//!
//! A single small JSON record read at startup and overwritten after every
//! processed frame. A missing or corrupt record means "start fresh".

use super::Session;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Session store errors
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("Failed to write session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persistence of the resumable session
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the last saved session; absence or corruption yields a fresh one
    async fn load(&self) -> Session;

    /// Overwrite the saved session
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;
}

/// Session record stored as a JSON file
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Create a store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the session file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SessionStoreError {
        SessionStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Session {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No session file, starting fresh");
                return Session::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable session file, starting fresh");
                return Session::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt session file, starting fresh");
                Session::default()
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let json = serde_json::to_vec(session)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        // Write-then-rename so a crash never leaves a half-written record
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        Ok(())
    }
}

/// In-memory store that keeps every saved record
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    initial: Session,
    saved: Mutex<Vec<Session>>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose first `load` returns `session`
    pub fn with_session(session: Session) -> Self {
        Self {
            initial: session,
            saved: Mutex::new(Vec::new()),
        }
    }

    /// Most recently saved session (or the initial one)
    pub async fn current(&self) -> Session {
        self.saved
            .lock()
            .await
            .last()
            .cloned()
            .unwrap_or_else(|| self.initial.clone())
    }

    /// Every saved record, oldest first
    pub async fn history(&self) -> Vec<Session> {
        self.saved.lock().await.clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Session {
        self.current().await
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.saved.lock().await.push(session.clone());
        Ok(())
    }
}
