// ============================
// crates/admin-lib/src/auth/session_cache.rs
// ============================
//! Flat-file persistence of the signed-in session, so a restart can pick
//! the session up without a network round trip.
use std::path::{Path, PathBuf};

use tokio::fs as tokio_fs;
use tracing::{debug, warn};

use crate::error::AppError;
use santorini_common::Session;

#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted session. A missing file is `None`; an unreadable
    /// one is removed and treated as missing.
    pub async fn load(&self) -> Result<Option<Session>, AppError> {
        let content = match tokio_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str::<Session>(&content) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "discarding corrupt session cache");
                self.clear().await?;
                Ok(None)
            }
        }
    }

    /// Persist `session`, replacing any previous one
    pub async fn store(&self, session: &Session) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio_fs::create_dir_all(parent).await?;
            }
        }

        // write then rename so a crash never leaves half a file behind
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(session)?;
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        match tokio_fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
