//! Locally stored login session.
//!
//! The backend keeps no server-side session; the client only remembers the
//! email it logged in with.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    /// RFC 3339 login time.
    #[serde(default)]
    pub logged_in_at: Option<String>,
}

impl Session {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            logged_in_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

/// `<config_dir>/textflow/session.toml`
pub fn session_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("textflow").join("session.toml"))
}

/// Read the session at `path`. A missing or unreadable file means no session.
pub fn load_from_path(path: &Path) -> Option<Session> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<Session>(&content) {
        Ok(session) if !session.email.trim().is_empty() => Some(session),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt session file");
            None
        }
    }
}

pub fn save_to_path(session: &Session, path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CoreError::Config(format!("Failed to create session directory: {}", e)))?;
    }
    let content = toml::to_string(session)
        .map_err(|e| CoreError::Config(format!("Failed to serialize session: {}", e)))?;
    std::fs::write(path, content)
        .map_err(|e| CoreError::Config(format!("Failed to write session: {}", e)))
}

/// Remove the session file. Returns whether a session existed.
pub fn clear_at_path(path: &Path) -> Result<bool, CoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CoreError::Config(format!("Failed to remove session: {}", e))),
    }
}

pub fn load() -> Option<Session> {
    session_path().and_then(|p| load_from_path(&p))
}

pub fn save(session: &Session) -> Result<PathBuf, CoreError> {
    let path = session_path()
        .ok_or_else(|| CoreError::Config("Could not determine config directory".to_string()))?;
    save_to_path(session, &path)?;
    Ok(path)
}

pub fn clear() -> Result<bool, CoreError> {
    match session_path() {
        Some(path) => clear_at_path(&path),
        None => Ok(false),
    }
}

/// Identity for analysis requests: explicit flag, then stored session,
/// then the configured account email. `None` means guest.
pub fn resolve_identity(
    flag: Option<&str>,
    session: Option<&Session>,
    configured: Option<&str>,
) -> Option<String> {
    flag.filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .or_else(|| session.map(|s| s.email.clone()))
        .or_else(|| {
            configured
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
}
