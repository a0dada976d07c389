//! Persisted auth session for smartmark.
//!
//! The hosted identity service carries sessions in cookies; this core has
//! no cookie jar, so the token pair is kept in a JSON file under the data
//! directory instead, written on sign-in and refresh, removed on sign-out.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::errors::AuthError;
use crate::types::session::AuthSession;

/// File name of the persisted session inside the data directory.
const SESSION_FILE: &str = "session.json";

/// JSON-file persistence for the current [`AuthSession`].
#[derive(Debug, Clone)]
pub struct SessionFileStore {
    path: PathBuf,
}

impl SessionFileStore {
    /// Creates a store that reads and writes the given file path.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at the conventional `session.json` inside `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(SESSION_FILE))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the session, replacing any previous one.
    pub fn save(&self, session: &AuthSession) -> Result<(), AuthError> {
        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| AuthError::Storage(e.to_string()))
    }

    /// Reads the persisted session. A missing file is `None`; an
    /// unreadable or unparsable file is a storage error.
    pub fn load(&self) -> Result<Option<AuthSession>, AuthError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Storage(e.to_string())),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    /// Removes the persisted session. Removing an absent session is fine.
    pub fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }

    /// True if a session file exists.
    pub fn has_session(&self) -> bool {
        self.path.exists()
    }
}
